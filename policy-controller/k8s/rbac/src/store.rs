//! The policy store: typed CRUD over the objects the reconcilers own.
//!
//! Reconcilers are written against the [`Store`] trait so that passes can be exercised without an
//! API server. [`KubeStore`] and [`KubeClusterStore`] implement it for namespaced and
//! cluster-scoped resources, respectively.

use athenz_policy_controller_k8s_api::{
    Api, Client, ClusterResourceScope, DeleteParams, Error as KubeError, ListParams,
    NamespaceResourceScope, PostParams, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, marker::PhantomData};

/// Identifies an object by namespace and name. Cluster-scoped objects have an empty namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ObjectId),

    #[error("{0} already exists")]
    AlreadyExists(ObjectId),

    #[error("{0} was modified concurrently")]
    Conflict(ObjectId),

    #[error(transparent)]
    Api(#[from] KubeError),
}

#[async_trait::async_trait]
pub trait Store<T>: Send + Sync {
    /// Lists all objects of the kind, across all namespaces.
    async fn list(&self) -> Result<Vec<T>, StoreError>;

    async fn get(&self, id: &ObjectId) -> Result<Option<T>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if an object with the same identity exists.
    async fn create(&self, obj: T) -> Result<T, StoreError>;

    /// Replaces an object. The object's resource version must match the live object's.
    async fn replace(&self, obj: T) -> Result<T, StoreError>;

    async fn delete(&self, id: &ObjectId) -> Result<(), StoreError>;
}

/// A [`Store`] for a namespaced resource kind.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

/// A [`Store`] for a cluster-scoped resource kind.
pub struct KubeClusterStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

// === impl ObjectId ===

impl ObjectId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    pub fn of<K: ResourceExt>(obj: &K) -> Self {
        Self::new(obj.namespace().unwrap_or_default(), obj.name_unchecked())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            return self.name.fmt(f);
        }
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl StoreError ===

impl StoreError {
    fn from_api(id: &ObjectId, error: KubeError) -> Self {
        match error {
            KubeError::Api(rsp) if rsp.code == 404 => Self::NotFound(id.clone()),
            KubeError::Api(rsp) if rsp.code == 409 && rsp.reason == "AlreadyExists" => {
                Self::AlreadyExists(id.clone())
            }
            KubeError::Api(rsp) if rsp.code == 409 => Self::Conflict(id.clone()),
            error => Self::Api(error),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Conflicts and API failures may succeed if the operation is attempted against fresh state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Api(_))
    }
}

// === impl KubeStore ===

impl<K> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl<K> Store<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    K: Clone + fmt::Debug + DeserializeOwned + Serialize + Send + Sync + 'static,
{
    async fn list(&self) -> Result<Vec<K>, StoreError> {
        let list = Api::<K>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<K>, StoreError> {
        let obj = self.api(&id.namespace).get_opt(&id.name).await?;
        Ok(obj)
    }

    async fn create(&self, obj: K) -> Result<K, StoreError> {
        let id = ObjectId::of(&obj);
        self.api(&id.namespace)
            .create(&PostParams::default(), &obj)
            .await
            .map_err(|e| StoreError::from_api(&id, e))
    }

    async fn replace(&self, obj: K) -> Result<K, StoreError> {
        let id = ObjectId::of(&obj);
        self.api(&id.namespace)
            .replace(&id.name, &PostParams::default(), &obj)
            .await
            .map_err(|e| StoreError::from_api(&id, e))
    }

    async fn delete(&self, id: &ObjectId) -> Result<(), StoreError> {
        self.api(&id.namespace)
            .delete(&id.name, &DeleteParams::default())
            .await
            .map_err(|e| StoreError::from_api(id, e))?;
        Ok(())
    }
}

// === impl KubeClusterStore ===

impl<K> KubeClusterStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> KubeClusterStore<K>
where
    K: Resource<Scope = ClusterResourceScope, DynamicType = ()>,
{
    fn api(&self) -> Api<K> {
        Api::all(self.client.clone())
    }
}

#[async_trait::async_trait]
impl<K> Store<K> for KubeClusterStore<K>
where
    K: Resource<Scope = ClusterResourceScope, DynamicType = ()>,
    K: Clone + fmt::Debug + DeserializeOwned + Serialize + Send + Sync + 'static,
{
    async fn list(&self) -> Result<Vec<K>, StoreError> {
        let list = self.api().list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<K>, StoreError> {
        let obj = self.api().get_opt(&id.name).await?;
        Ok(obj)
    }

    async fn create(&self, obj: K) -> Result<K, StoreError> {
        let id = ObjectId::of(&obj);
        self.api()
            .create(&PostParams::default(), &obj)
            .await
            .map_err(|e| StoreError::from_api(&id, e))
    }

    async fn replace(&self, obj: K) -> Result<K, StoreError> {
        let id = ObjectId::of(&obj);
        self.api()
            .replace(&id.name, &PostParams::default(), &obj)
            .await
            .map_err(|e| StoreError::from_api(&id, e))
    }

    async fn delete(&self, id: &ObjectId) -> Result<(), StoreError> {
        self.api()
            .delete(&id.name, &DeleteParams::default())
            .await
            .map_err(|e| StoreError::from_api(id, e))?;
        Ok(())
    }
}
