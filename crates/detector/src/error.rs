//! Error types for bad node detection.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures reported by an [`ObjectStore`](crate::store::ObjectStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} '{name}' was modified concurrently")]
    Conflict { kind: String, name: String },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Classify a Kubernetes API error for the object `kind`/`name`.
    pub fn from_kube(kind: &str, name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref response) if response.code == 404 => Self::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(ref response) if response.code == 409 => Self::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            other => Self::Kube(other),
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors surfaced by the detector and the time lock
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The pacing lock of `owner` is still held. Expected during the pause
    /// between two terminations.
    #[error("Time lock for '{owner}' is held until {until}")]
    AlreadyLocked { owner: String, until: DateTime<Utc> },
}

impl DetectorError {
    #[must_use]
    pub fn is_already_locked(&self) -> bool {
        matches!(self, Self::AlreadyLocked { .. })
    }

    #[must_use]
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}

pub type Result<T, E = DetectorError> = std::result::Result<T, E>;
