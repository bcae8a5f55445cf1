//! # Pacing Time Lock
//!
//! A cooperative, TTL-based lock used to pause between two node terminations.
//! Each component owns one annotation on a shared coordination `Namespace`
//! (the `default` namespace unless configured otherwise):
//!
//! ```text
//! $ kubectl get ns default -o jsonpath='{.metadata.annotations}'
//! {"aws-operator.timelock.platform/until":"2026-10-19T12:10:00Z"}
//! ```
//!
//! The lock is held while the stored timestamp lies strictly in the future.
//! Nothing renews it; it lapses on its own once the TTL has passed. Writes are
//! conditional on the namespace `resourceVersion`, so two callers racing on
//! the record get a conflict instead of clobbering each other.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::error::{DetectorError, Result};
use crate::store::ObjectStore;

/// Suffix of the per-owner annotation key on the coordination record
pub const TIME_LOCK_SUFFIX: &str = "timelock.platform/until";

/// Annotation key holding the expiry of `owner`'s lock.
#[must_use]
pub fn lock_key(owner: &str) -> String {
    format!("{owner}.{TIME_LOCK_SUFFIX}")
}

/// Distributed time lock scoped to a single owner
#[derive(Clone)]
pub struct TimeLock {
    store: Arc<dyn ObjectStore<Namespace>>,
    record: String,
    owner: String,
    ttl: chrono::Duration,
}

impl TimeLock {
    /// Create a time lock for `owner` on the coordination namespace `record`.
    pub fn new(
        store: Arc<dyn ObjectStore<Namespace>>,
        record: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<Self> {
        if record.is_empty() {
            return Err(DetectorError::InvalidConfig(
                "time lock record must not be empty".to_string(),
            ));
        }
        if owner.is_empty() {
            return Err(DetectorError::InvalidConfig(
                "time lock owner must not be empty".to_string(),
            ));
        }
        if ttl.is_zero() {
            return Err(DetectorError::InvalidConfig(
                "time lock TTL must not be zero".to_string(),
            ));
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| {
            DetectorError::InvalidConfig(format!("time lock TTL out of range: {e}"))
        })?;

        Ok(Self {
            store,
            record: record.to_string(),
            owner: owner.to_string(),
            ttl,
        })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn record(&self) -> &str {
        &self.record
    }

    /// Acquire the lock now. See [`TimeLock::try_acquire_at`].
    pub async fn acquire(&self) -> Result<DateTime<Utc>> {
        self.try_acquire_at(Utc::now()).await
    }

    /// Acquire the lock as of `now` and return the new expiry.
    ///
    /// Fails with [`DetectorError::AlreadyLocked`] while a previous
    /// acquisition is still live.
    pub async fn try_acquire_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut record = self.store.get(&self.record).await?;

        if let Some(until) = expiry(&record, &self.owner).filter(|until| *until > now) {
            debug!(
                owner = %self.owner,
                until = %format_expiry(until),
                "Time lock is still held"
            );
            return Err(DetectorError::AlreadyLocked {
                owner: self.owner.clone(),
                until,
            });
        }

        let until = expiry_after(now, self.ttl);
        record
            .annotations_mut()
            .insert(lock_key(&self.owner), format_expiry(until));
        self.store.replace(&self.record, &record).await?;

        info!(
            owner = %self.owner,
            record = %self.record,
            until = %format_expiry(until),
            "Acquired time lock"
        );
        Ok(until)
    }

    /// Expiry of the lock if it is currently held.
    pub async fn locked_until(&self) -> Result<Option<DateTime<Utc>>> {
        self.locked_until_at(Utc::now()).await
    }

    pub async fn locked_until_at(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let record = self.store.get(&self.record).await?;
        Ok(expiry(&record, &self.owner).filter(|until| *until > now))
    }

    /// Release this owner's lock early.
    pub async fn release(&self) -> Result<bool> {
        self.release_owner(&self.owner).await
    }

    /// Drop the lock of any `owner` from the shared record. Returns whether a
    /// key was removed; the record is left untouched otherwise.
    pub async fn release_owner(&self, owner: &str) -> Result<bool> {
        let mut record = self.store.get(&self.record).await?;

        if record.annotations_mut().remove(&lock_key(owner)).is_none() {
            debug!(owner = %owner, "No time lock to release");
            return Ok(false);
        }

        self.store.replace(&self.record, &record).await?;
        info!(owner = %owner, record = %self.record, "Released time lock");
        Ok(true)
    }
}

fn expiry(record: &Namespace, owner: &str) -> Option<DateTime<Utc>> {
    let raw = record.annotations().get(&lock_key(owner))?;

    match DateTime::parse_from_rfc3339(raw) {
        Ok(until) => Some(until.with_timezone(&Utc)),
        Err(err) => {
            warn!(
                owner = %owner,
                value = %raw,
                error = %err,
                "Ignoring unparsable time lock expiry"
            );
            None
        }
    }
}

/// `now + ttl` rounded up to the next whole second, so the stored expiry
/// never ends the lock before the full TTL has passed.
fn expiry_after(now: DateTime<Utc>, ttl: chrono::Duration) -> DateTime<Utc> {
    let until = now + ttl;
    if until.timestamp_subsec_nanos() == 0 {
        until
    } else {
        (until + chrono::Duration::seconds(1)).trunc_subsecs(0)
    }
}

fn format_expiry(until: DateTime<Utc>) -> String {
    until.to_rfc3339_opts(SecondsFormat::Secs, true)
}
