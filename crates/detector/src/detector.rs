//! Bad node detection pass.
//!
//! One call to [`Detector::detect_bad_nodes`] walks every node once, moves
//! its tick counter, and returns the nodes that are safe to terminate now.
//! The pass is sequential and fails fast: the first store error aborts it
//! without a partial result, while counter writes already made stay in place.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Namespace, Node};
use kube::ResourceExt;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::error::{DetectorError, Result};
use crate::lock::TimeLock;
use crate::selector::{select_candidates, termination_limit};
use crate::store::ObjectStore;
use crate::tick::update_tick;

/// Outcome of the pacing lock for one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Pacing {
    /// No node was marked, so the lock was left alone. A quiet pass does not
    /// arm the pause between terminations.
    NotAttempted,
    /// The lock was taken by this pass
    Acquired { until: DateTime<Utc> },
    /// A previous termination is still within its pause window
    Paused { until: DateTime<Utc> },
}

/// Nodes marked for termination by one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadNodes {
    /// Node names in store list order
    pub nodes: Vec<String>,
    pub pacing: Pacing,
}

impl BadNodes {
    /// Whether the caller should go ahead and terminate [`BadNodes::nodes`].
    #[must_use]
    pub fn should_terminate(&self) -> bool {
        !self.nodes.is_empty() && matches!(self.pacing, Pacing::Acquired { .. })
    }
}

pub struct Detector {
    nodes: Arc<dyn ObjectStore<Node>>,
    lock: TimeLock,
    config: DetectorConfig,
}

impl Detector {
    pub fn new(
        nodes: Arc<dyn ObjectStore<Node>>,
        records: Arc<dyn ObjectStore<Namespace>>,
        config: DetectorConfig,
    ) -> Result<Self> {
        config.validate()?;

        let lock = TimeLock::new(
            records,
            &config.coordination_namespace,
            &config.owner,
            config.pause_between_terminations,
        )?;

        Ok(Self {
            nodes,
            lock,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Pacing lock shared by every pass of this detector
    #[must_use]
    pub fn lock(&self) -> &TimeLock {
        &self.lock
    }

    pub async fn detect_bad_nodes(&self) -> Result<BadNodes> {
        self.detect_bad_nodes_at(Utc::now()).await
    }

    /// Run one detection pass as of `now`.
    ///
    /// A held pacing lock is not an error: the marked nodes are still
    /// returned with [`Pacing::Paused`] and the caller decides whether to act.
    pub async fn detect_bad_nodes_at(&self, now: DateTime<Utc>) -> Result<BadNodes> {
        let nodes = self.nodes.list().await?;
        let fleet_size = nodes.len();

        // nodes that reached the tick threshold
        let mut marked = Vec::new();
        for node in nodes {
            let tick = update_tick(self.nodes.as_ref(), &node, now).await?;
            if tick.count >= self.config.tick_threshold {
                debug!(
                    node = %node.name_any(),
                    tick = tick.count,
                    threshold = self.config.tick_threshold,
                    "Node reached not-ready threshold"
                );
                marked.push(node);
            }
        }

        let marked_count = marked.len();
        let candidates =
            select_candidates(marked, fleet_size, self.config.max_termination_fraction);
        let nodes: Vec<String> = candidates.iter().map(ResourceExt::name_any).collect();

        info!(
            fleet_size,
            marked = marked_count,
            selected = nodes.len(),
            limit = termination_limit(fleet_size, self.config.max_termination_fraction),
            "Found nodes marked for termination"
        );

        if nodes.is_empty() {
            return Ok(BadNodes {
                nodes,
                pacing: Pacing::NotAttempted,
            });
        }

        let pacing = match self.lock.try_acquire_at(now).await {
            Ok(until) => Pacing::Acquired { until },
            Err(DetectorError::AlreadyLocked { until, .. }) => {
                info!(
                    owner = %self.config.owner,
                    until = %until,
                    "Skipping node termination due to pause between terminations"
                );
                Pacing::Paused { until }
            }
            Err(e) => return Err(e),
        };

        Ok(BadNodes { nodes, pacing })
    }
}
