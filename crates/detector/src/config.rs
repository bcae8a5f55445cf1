//! Detector configuration.

use std::time::Duration;

use crate::error::{DetectorError, Result};

/// Default share of the fleet a single pass may mark for termination
pub const DEFAULT_MAX_TERMINATION_FRACTION: f64 = 0.10;

/// Default number of not-ready ticks before a node is marked
pub const DEFAULT_TICK_THRESHOLD: u32 = 6;

/// Default pause between two passes that may terminate nodes
pub const DEFAULT_PAUSE_BETWEEN_TERMINATIONS: Duration = Duration::from_secs(10 * 60);

/// Namespace whose annotations hold the time locks
pub const DEFAULT_COORDINATION_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Identity of the calling component; scopes the pacing lock
    pub owner: String,

    /// Maximum share of all nodes returned by a single pass,
    /// ie. 0.5 on a 10 node cluster returns at most 5 nodes
    pub max_termination_fraction: f64,

    /// How many passes a node must be seen unhealthy (net of healthy passes)
    /// before it is marked for termination
    pub tick_threshold: u32,

    /// Once a pass returned nodes for termination, further passes are paused
    /// for this long
    pub pause_between_terminations: Duration,

    /// Namespace used as the shared coordination record
    pub coordination_namespace: String,
}

impl DetectorConfig {
    #[must_use]
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            max_termination_fraction: DEFAULT_MAX_TERMINATION_FRACTION,
            tick_threshold: DEFAULT_TICK_THRESHOLD,
            pause_between_terminations: DEFAULT_PAUSE_BETWEEN_TERMINATIONS,
            coordination_namespace: DEFAULT_COORDINATION_NAMESPACE.to_string(),
        }
    }

    #[must_use]
    pub fn with_max_termination_fraction(mut self, fraction: f64) -> Self {
        self.max_termination_fraction = fraction;
        self
    }

    #[must_use]
    pub fn with_tick_threshold(mut self, threshold: u32) -> Self {
        self.tick_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_pause_between_terminations(mut self, pause: Duration) -> Self {
        self.pause_between_terminations = pause;
        self
    }

    #[must_use]
    pub fn with_coordination_namespace(mut self, namespace: &str) -> Self {
        self.coordination_namespace = namespace.to_string();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.is_empty() {
            return Err(DetectorError::InvalidConfig(
                "owner must not be empty".to_string(),
            ));
        }
        if !(self.max_termination_fraction > 0.0 && self.max_termination_fraction <= 1.0) {
            return Err(DetectorError::InvalidConfig(format!(
                "max termination fraction must be in (0, 1], got {}",
                self.max_termination_fraction
            )));
        }
        if self.tick_threshold == 0 {
            return Err(DetectorError::InvalidConfig(
                "tick threshold must be at least 1".to_string(),
            ));
        }
        if self.pause_between_terminations.is_zero() {
            return Err(DetectorError::InvalidConfig(
                "pause between terminations must not be zero".to_string(),
            ));
        }
        if self.coordination_namespace.is_empty() {
            return Err(DetectorError::InvalidConfig(
                "coordination namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectorConfig::new("aws-operator");
        assert!((config.max_termination_fraction - 0.10).abs() < f64::EPSILON);
        assert_eq!(config.tick_threshold, 6);
        assert_eq!(config.pause_between_terminations, Duration::from_secs(600));
        assert_eq!(config.coordination_namespace, "default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(DetectorConfig::new("").validate().is_err());
        assert!(DetectorConfig::new("a")
            .with_max_termination_fraction(0.0)
            .validate()
            .is_err());
        assert!(DetectorConfig::new("a")
            .with_max_termination_fraction(1.5)
            .validate()
            .is_err());
        assert!(DetectorConfig::new("a")
            .with_max_termination_fraction(f64::NAN)
            .validate()
            .is_err());
        assert!(DetectorConfig::new("a")
            .with_tick_threshold(0)
            .validate()
            .is_err());
        assert!(DetectorConfig::new("a")
            .with_pause_between_terminations(Duration::ZERO)
            .validate()
            .is_err());
        assert!(DetectorConfig::new("a")
            .with_coordination_namespace("")
            .validate()
            .is_err());
        assert!(DetectorConfig::new("a")
            .with_max_termination_fraction(1.0)
            .validate()
            .is_ok());
    }
}
