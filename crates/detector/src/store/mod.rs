//! Object store abstraction.
//!
//! Every read and write of detector state goes through [`ObjectStore`]: node
//! tick counters live in `Node` annotations and pacing locks live in the
//! annotations of a shared `Namespace`. Writes are replaces of the whole
//! object and carry the `resourceVersion` observed on read, so a concurrent
//! writer is reported as [`StoreError::Conflict`] instead of being silently
//! overwritten.

mod kubernetes;
mod memory;

pub use kubernetes::KubeStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;

/// Narrow list/get/replace access to one resource kind.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// List every object of the kind, in store order.
    async fn list(&self) -> Result<Vec<K>, StoreError>;

    /// Fetch a single object by name.
    async fn get(&self, name: &str) -> Result<K, StoreError>;

    /// Replace an existing object, conditional on its `resourceVersion`.
    async fn replace(&self, name: &str, object: &K) -> Result<K, StoreError>;
}
