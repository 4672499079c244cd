use crate::{ControllerMetrics, LiveIndex, ObjectId, Store, StoreError};
use athenz_policy_controller_k8s_api::Resource;
use kube::core::object::HasSpec;
use std::marker::PhantomData;

/// The result of an update that did not fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Update {
    Updated,
    Unchanged,
}

/// Lists, creates, updates and deletes the objects of a single kind.
///
/// Updates compare specs structurally and only write when they differ, so a pass against an
/// unchanged cluster issues no writes.
pub struct Manager<K, S> {
    store: S,
    metrics: ControllerMetrics,
    _kind: PhantomData<fn() -> K>,
}

// === impl Manager ===

impl<K, S> Manager<K, S>
where
    K: Resource<DynamicType = ()> + HasSpec + Send + Sync + 'static,
    K::Spec: PartialEq,
    S: Store<K>,
{
    pub fn new(store: S, metrics: ControllerMetrics) -> Self {
        Self {
            store,
            metrics,
            _kind: PhantomData,
        }
    }

    /// Indexes all live objects of the kind, across namespaces.
    pub async fn list_existing(&self) -> Result<LiveIndex<K>, StoreError> {
        let objects = self.store.list().await?;
        Ok(LiveIndex::new(objects))
    }

    pub async fn create(&self, desired: K) -> Result<(), StoreError> {
        let res = self.store.create(desired).await;
        self.metrics.write(&K::kind(&()), "create", &res);
        res.map(|_| ())
    }

    /// Replaces `live` with `desired` if their specs differ, carrying the live object's resource
    /// version so that concurrent modifications are detected.
    pub async fn update(&self, live: &K, mut desired: K) -> Result<Update, StoreError> {
        if live.spec() == desired.spec() {
            return Ok(Update::Unchanged);
        }
        desired.meta_mut().resource_version = live.meta().resource_version.clone();
        let res = self.store.replace(desired).await;
        self.metrics.write(&K::kind(&()), "update", &res);
        res.map(|_| Update::Updated)
    }

    /// Deletes an object. An object that is already gone is reported as `NotFound` but counted as
    /// a successful write.
    pub async fn delete(&self, id: &ObjectId) -> Result<(), StoreError> {
        let res = self.store.delete(id).await;
        match &res {
            Err(error) if error.is_not_found() => {
                self.metrics
                    .write(&K::kind(&()), "delete", &Ok::<(), StoreError>(()))
            }
            res => self.metrics.write(&K::kind(&()), "delete", res),
        }
        res
    }
}
