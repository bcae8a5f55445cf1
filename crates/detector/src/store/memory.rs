use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use tokio::sync::{Mutex, RwLock};

use super::ObjectStore;
use crate::error::StoreError;

/// In-process [`ObjectStore`] with the same optimistic concurrency rules as
/// the API server: every write bumps `resourceVersion`, and a replace that
/// carries a stale version is rejected with [`StoreError::Conflict`].
///
/// Failures can be injected per object to exercise error paths.
pub struct MemoryStore<K> {
    kind: String,
    objects: RwLock<Vec<K>>,
    list_failure: Mutex<Option<String>>,
    write_failures: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl<K> MemoryStore<K>
where
    K: Resource + Clone,
    K::DynamicType: Default,
{
    /// Seed the store. List order follows the iteration order of `objects`.
    pub fn new(objects: impl IntoIterator<Item = K>) -> Self {
        let objects = objects
            .into_iter()
            .map(|mut object| {
                object
                    .meta_mut()
                    .resource_version
                    .get_or_insert_with(|| "1".to_string());
                object
            })
            .collect();

        Self {
            kind: K::kind(&K::DynamicType::default()).into_owned(),
            objects: RwLock::new(objects),
            list_failure: Mutex::new(None),
            write_failures: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Current stored copy of `name`.
    pub async fn object(&self, name: &str) -> Option<K> {
        self.objects
            .read()
            .await
            .iter()
            .find(|o| o.name_any() == name)
            .cloned()
    }

    /// Make every subsequent `list` fail with `message`.
    pub async fn fail_list(&self, message: &str) {
        *self.list_failure.lock().await = Some(message.to_string());
    }

    /// Make every subsequent `replace` of `name` fail with `message`.
    pub async fn fail_writes_to(&self, name: &str, message: &str) {
        self.write_failures
            .lock()
            .await
            .insert(name.to_string(), message.to_string());
    }

    /// Number of successful replaces so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
    K::DynamicType: Default,
{
    async fn list(&self) -> Result<Vec<K>, StoreError> {
        if let Some(message) = self.list_failure.lock().await.clone() {
            return Err(StoreError::Backend(message));
        }
        Ok(self.objects.read().await.clone())
    }

    async fn get(&self, name: &str) -> Result<K, StoreError> {
        self.object(name).await.ok_or_else(|| StoreError::NotFound {
            kind: self.kind.clone(),
            name: name.to_string(),
        })
    }

    async fn replace(&self, name: &str, object: &K) -> Result<K, StoreError> {
        if let Some(message) = self.write_failures.lock().await.get(name) {
            return Err(StoreError::Backend(message.clone()));
        }

        let mut objects = self.objects.write().await;
        let Some(slot) = objects.iter_mut().find(|o| o.name_any() == name) else {
            return Err(StoreError::NotFound {
                kind: self.kind.clone(),
                name: name.to_string(),
            });
        };

        let current = slot.meta().resource_version.clone();
        if let Some(expected) = object.meta().resource_version.as_deref() {
            if current.as_deref() != Some(expected) {
                return Err(StoreError::Conflict {
                    kind: self.kind.clone(),
                    name: name.to_string(),
                });
            }
        }

        let next = current
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;

        let mut stored = object.clone();
        stored.meta_mut().resource_version = Some(next.to_string());
        *slot = stored.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(stored)
    }
}
