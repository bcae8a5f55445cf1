//! Node health evaluation.
//!
//! A node is unhealthy when one of its monitored conditions reports a fault
//! that has persisted for at least [`NOT_READY_DEBOUNCE_SECS`]. Short flaps of
//! the kubelet are ignored.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, NodeCondition};

/// Minimum time a fault condition must hold before it counts
pub const NOT_READY_DEBOUNCE_SECS: i64 = 30;

const CONDITION_READY: &str = "Ready";
const CONDITION_DISK_PRESSURE: &str = "DiskPressure";
const STATUS_TRUE: &str = "True";

/// Condition that made a node unhealthy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFault {
    /// `Ready` is `False` or `Unknown`
    NotReady,
    /// `DiskPressure` is `True`
    DiskPressure,
}

impl NodeFault {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotReady => "NotReady",
            Self::DiskPressure => "DiskPressure",
        }
    }
}

impl std::fmt::Display for NodeFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the first debounced fault reported by the node, if any.
///
/// Disk pressure is checked independently of readiness, so a node that is
/// `Ready` but out of disk is still reported.
#[must_use]
pub fn node_fault(node: &Node, now: DateTime<Utc>) -> Option<NodeFault> {
    let conditions = node.status.as_ref()?.conditions.as_ref()?;

    conditions
        .iter()
        .filter(|c| has_persisted(c, now))
        .find_map(condition_fault)
}

#[must_use]
pub fn is_unhealthy(node: &Node, now: DateTime<Utc>) -> bool {
    node_fault(node, now).is_some()
}

fn condition_fault(condition: &NodeCondition) -> Option<NodeFault> {
    match condition.type_.as_str() {
        CONDITION_READY if condition.status != STATUS_TRUE => Some(NodeFault::NotReady),
        CONDITION_DISK_PRESSURE if condition.status == STATUS_TRUE => Some(NodeFault::DiskPressure),
        _ => None,
    }
}

// A condition without any timestamp never counts as persisted.
fn has_persisted(condition: &NodeCondition, now: DateTime<Utc>) -> bool {
    let Some(since) = condition
        .last_transition_time
        .as_ref()
        .or(condition.last_heartbeat_time.as_ref())
    else {
        return false;
    };

    now.signed_duration_since(since.0) >= chrono::Duration::seconds(NOT_READY_DEBOUNCE_SECS)
}
