//! Not-ready tick counter.
//!
//! Each detection pass moves a node's tick by one: up when the node is
//! unhealthy, down (never below zero) when it is healthy. The value is kept in
//! a node annotation so it survives across passes and controller restarts.
//! Isolated flaps bleed off again while a node that stays broken climbs
//! steadily towards the termination threshold.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::health::node_fault;
use crate::store::ObjectStore;

/// Annotation holding the tick counter as a base-10 integer
pub const TICK_ANNOTATION: &str = "nodes.platform/not-ready-tick";

/// Result of one tick evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickUpdate {
    pub count: u32,
    /// Whether the annotation must be written back
    pub changed: bool,
}

/// Compute the next tick value for `node` without touching the store.
///
/// A malformed annotation counts as zero and is flagged for rewrite. A count
/// beyond `u32::MAX` is clamped to it rather than reset.
#[must_use]
pub fn next_tick(node: &Node, now: DateTime<Utc>) -> TickUpdate {
    let (mut count, mut changed) = match node.annotations().get(TICK_ANNOTATION) {
        None => (0, false),
        Some(raw) => match raw.parse::<u64>() {
            Ok(count) => (u32::try_from(count).unwrap_or(u32::MAX), false),
            Err(err) => {
                warn!(
                    node = %node.name_any(),
                    value = %raw,
                    error = %err,
                    "Resetting malformed not-ready tick"
                );
                (0, true)
            }
        },
    };

    if node_fault(node, now).is_some() {
        count = count.saturating_add(1);
        changed = true;
    } else if count > 0 {
        count -= 1;
        changed = true;
    }

    TickUpdate { count, changed }
}

/// Compute the next tick for `node` and persist it when it changed.
///
/// The write replaces the node as it was listed, so it fails with
/// [`StoreError::Conflict`] if the node changed in between.
pub async fn update_tick(
    store: &dyn ObjectStore<Node>,
    node: &Node,
    now: DateTime<Utc>,
) -> Result<TickUpdate, StoreError> {
    let update = next_tick(node, now);
    if !update.changed {
        return Ok(update);
    }

    let name = node.name_any();
    let mut updated = node.clone();
    updated
        .annotations_mut()
        .insert(TICK_ANNOTATION.to_string(), update.count.to_string());
    store.replace(&name, &updated).await?;

    debug!(
        node = %name,
        tick = update.count,
        fault = ?node_fault(node, now),
        "Updated not-ready tick"
    );

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn node(name: &str, ready: bool, tick: Option<&str>) -> Node {
        let annotations =
            tick.map(|t| BTreeMap::from([(TICK_ANNOTATION.to_string(), t.to_string())]));
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                annotations,
                ..Default::default()
            },
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: if ready { "True" } else { "False" }.to_string(),
                    last_transition_time: Some(Time(now() - chrono::Duration::minutes(5))),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn tick(count: u32, changed: bool) -> TickUpdate {
        TickUpdate { count, changed }
    }

    #[test]
    fn test_healthy_node_without_annotation() {
        assert_eq!(next_tick(&node("a", true, None), now()), tick(0, false));
    }

    #[test]
    fn test_unhealthy_node_increments() {
        assert_eq!(next_tick(&node("a", false, Some("5")), now()), tick(6, true));
        assert_eq!(next_tick(&node("a", false, None), now()), tick(1, true));
    }

    #[test]
    fn test_healthy_node_decrements() {
        assert_eq!(next_tick(&node("a", true, Some("5")), now()), tick(4, true));
        assert_eq!(next_tick(&node("a", true, Some("0")), now()), tick(0, false));
    }

    #[test]
    fn test_malformed_annotation_is_reset() {
        assert_eq!(next_tick(&node("a", false, Some("garbage")), now()), tick(1, true));
        assert_eq!(next_tick(&node("a", true, Some("garbage")), now()), tick(0, true));
        assert_eq!(next_tick(&node("a", true, Some("-3")), now()), tick(0, true));
    }

    #[test]
    fn test_oversized_annotation_is_clamped() {
        let huge = Some("4294967296");
        assert_eq!(next_tick(&node("a", true, huge), now()), tick(u32::MAX - 1, true));
        assert_eq!(next_tick(&node("a", false, huge), now()), tick(u32::MAX, true));
    }

    #[tokio::test]
    async fn test_update_tick_persists_changes() {
        let store = MemoryStore::new([node("worker-1", false, Some("2"))]);
        let listed = store.list().await.unwrap();

        let update = update_tick(&store, &listed[0], now()).await.unwrap();
        assert_eq!(update, tick(3, true));

        let stored = store.object("worker-1").await.unwrap();
        assert_eq!(stored.annotations().get(TICK_ANNOTATION).map(String::as_str), Some("3"));
    }

    #[tokio::test]
    async fn test_update_tick_normalizes_garbage() {
        let store = MemoryStore::new([node("worker-1", true, Some("n/a"))]);
        let listed = store.list().await.unwrap();

        update_tick(&store, &listed[0], now()).await.unwrap();

        let stored = store.object("worker-1").await.unwrap();
        assert_eq!(stored.annotations().get(TICK_ANNOTATION).map(String::as_str), Some("0"));
    }

    #[tokio::test]
    async fn test_update_tick_skips_unchanged() {
        let store = MemoryStore::new([node("worker-1", true, None)]);
        let listed = store.list().await.unwrap();

        update_tick(&store, &listed[0], now()).await.unwrap();
        assert_eq!(store.write_count(), 0);
        assert!(store.object("worker-1").await.unwrap().annotations().is_empty());
    }

    #[tokio::test]
    async fn test_update_tick_surfaces_conflict() {
        let store = MemoryStore::new([node("worker-1", false, None)]);
        let stale = store.list().await.unwrap().remove(0);
        update_tick(&store, &stale, now()).await.unwrap();

        let err = update_tick(&store, &stale, now()).await.unwrap_err();
        assert!(err.is_conflict());
    }
}
