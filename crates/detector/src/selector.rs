//! Candidate selection.
//!
//! Bounds the blast radius of a single pass: at most one master node, and no
//! more than a fraction of the fleet. Both filters keep the order the store
//! listed the nodes in; there is no severity ranking.

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

/// Label carrying the node role
pub const ROLE_LABEL: &str = "role";
pub const MASTER_ROLE: &str = "master";

/// Upstream role labels, set on control plane nodes by kubeadm and friends.
const CONTROL_PLANE_LABELS: [&str; 2] = [
    "node-role.kubernetes.io/master",
    "node-role.kubernetes.io/control-plane",
];

#[must_use]
pub fn is_master(node: &Node) -> bool {
    let labels = node.labels();
    labels.get(ROLE_LABEL).is_some_and(|role| role == MASTER_ROLE)
        || CONTROL_PLANE_LABELS.iter().any(|l| labels.contains_key(*l))
}

/// Keep only the first master node. Every other node passes through in its
/// original relative order.
#[must_use]
pub fn keep_single_master(nodes: Vec<Node>) -> Vec<Node> {
    let mut found_master = false;

    nodes
        .into_iter()
        .filter(|node| {
            if !is_master(node) {
                return true;
            }
            !std::mem::replace(&mut found_master, true)
        })
        .collect()
}

/// Maximum number of nodes a single pass may mark for termination.
///
/// `round(node_count * fraction)`, rounded half away from zero, never below 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn termination_limit(node_count: usize, fraction: f64) -> usize {
    let limit = (node_count as f64 * fraction).round();
    if limit < 1.0 {
        1
    } else {
        limit as usize
    }
}

/// Apply the master filter, then truncate to the fleet limit.
#[must_use]
pub fn select_candidates(marked: Vec<Node>, fleet_size: usize, fraction: f64) -> Vec<Node> {
    let mut candidates = keep_single_master(marked);
    candidates.truncate(termination_limit(fleet_size, fraction));
    candidates
}
