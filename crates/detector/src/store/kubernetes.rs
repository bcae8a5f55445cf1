use std::fmt::Debug;

use async_trait::async_trait;
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::ObjectStore;
use crate::error::StoreError;

/// [`ObjectStore`] backed by the Kubernetes API for a cluster-scoped kind
/// such as `Node` or `Namespace`.
#[derive(Clone)]
pub struct KubeStore<K> {
    api: Api<K>,
    kind: String,
}

impl<K> KubeStore<K>
where
    K: Resource + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::from_api(Api::all(client))
    }

    #[must_use]
    pub fn from_api(api: Api<K>) -> Self {
        let kind = K::kind(&K::DynamicType::default()).into_owned();
        Self { api, kind }
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug + Send + Sync + 'static,
    K::DynamicType: Default,
{
    async fn list(&self) -> Result<Vec<K>, StoreError> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(|e| StoreError::from_kube(&self.kind, "*", e))?;

        debug!(kind = %self.kind, count = list.items.len(), "Listed objects");
        Ok(list.items)
    }

    async fn get(&self, name: &str) -> Result<K, StoreError> {
        self.api
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube(&self.kind, name, e))
    }

    async fn replace(&self, name: &str, object: &K) -> Result<K, StoreError> {
        self.api
            .replace(name, &PostParams::default(), object)
            .await
            .map_err(|e| StoreError::from_kube(&self.kind, name, e))
    }
}
