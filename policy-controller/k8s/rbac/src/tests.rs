
use crate::{ObjectId, Store, StoreError};
use athenz_policy_controller_core::{DiscoverDomain, Domain, DomainError};
use athenz_policy_controller_k8s_api::{Error as KubeError, ErrorResponse, Resource, ResourceExt};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

/// A write issued against a [`FakeStore`], whether or not it succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    Create(ObjectId),
    Replace(ObjectId),
    Delete(ObjectId),
}

/// A change made by another writer just before a [`FakeStore`] handles a matching write.
pub enum Concurrent<K> {
    Create(K),
    Modify,
    Delete,
}

/// An in-memory policy store that enforces the API server's write semantics and records every
/// write it receives.
pub struct FakeStore<K> {
    state: Arc<Mutex<State<K>>>,
}

struct State<K> {
    objects: BTreeMap<ObjectId, K>,
    writes: Vec<Write>,
    version: u64,
    fail_list: bool,
    concurrent: Vec<(Write, Concurrent<K>)>,
}

#[derive(Default)]
pub struct FakeDomains {
    domains: Mutex<HashMap<String, Domain>>,
    failing: Mutex<HashSet<String>>,
}

// === impl FakeStore ===

impl<K> Clone for FakeStore<K> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<K> Default for FakeStore<K> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                objects: BTreeMap::new(),
                writes: Vec::new(),
                version: 0,
                fail_list: false,
                concurrent: Vec::new(),
            })),
        }
    }
}

impl<K: Resource + Clone> FakeStore<K> {
    /// Adds an object without recording a write.
    pub fn seed(&self, mut obj: K) {
        let mut state = self.state.lock();
        state.version += 1;
        obj.meta_mut().resource_version = Some(state.version.to_string());
        state.objects.insert(ObjectId::of(&obj), obj);
    }

    pub fn object(&self, id: &ObjectId) -> Option<K> {
        self.state.lock().objects.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.state.lock().objects.keys().cloned().collect()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.lock().fail_list = fail;
    }

    /// Applies `change` to the stored object right before `write` is handled, as though another
    /// client raced the caller.
    pub fn race(&self, write: Write, change: Concurrent<K>) {
        self.state.lock().concurrent.push((write, change));
    }
}

// === impl Write ===

impl Write {
    fn id(&self) -> &ObjectId {
        match self {
            Self::Create(id) | Self::Replace(id) | Self::Delete(id) => id,
        }
    }
}

// === impl State ===

impl<K: Resource + Clone> State<K> {
    fn record(&mut self, write: Write) {
        if let Some(i) = self.concurrent.iter().position(|(w, _)| *w == write) {
            let (_, change) = self.concurrent.remove(i);
            let id = write.id().clone();
            match change {
                Concurrent::Create(mut obj) => {
                    self.version += 1;
                    obj.meta_mut().resource_version = Some(self.version.to_string());
                    self.objects.insert(id, obj);
                }
                Concurrent::Modify => {
                    self.version += 1;
                    let version = self.version.to_string();
                    if let Some(obj) = self.objects.get_mut(&id) {
                        obj.meta_mut().resource_version = Some(version);
                    }
                }
                Concurrent::Delete => {
                    self.objects.remove(&id);
                }
            }
        }
        self.writes.push(write);
    }
}

#[async_trait::async_trait]
impl<K> Store<K> for FakeStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    async fn list(&self) -> Result<Vec<K>, StoreError> {
        let state = self.state.lock();
        if state.fail_list {
            return Err(StoreError::Api(KubeError::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: "unavailable".to_string(),
                reason: "ServiceUnavailable".to_string(),
                code: 503,
            })));
        }
        Ok(state.objects.values().cloned().collect())
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<K>, StoreError> {
        Ok(self.state.lock().objects.get(id).cloned())
    }

    async fn create(&self, mut obj: K) -> Result<K, StoreError> {
        let id = ObjectId::of(&obj);
        let mut state = self.state.lock();
        state.record(Write::Create(id.clone()));
        if state.objects.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        state.version += 1;
        obj.meta_mut().resource_version = Some(state.version.to_string());
        state.objects.insert(id, obj.clone());
        Ok(obj)
    }

    async fn replace(&self, mut obj: K) -> Result<K, StoreError> {
        let id = ObjectId::of(&obj);
        let mut state = self.state.lock();
        state.record(Write::Replace(id.clone()));
        let live_version = match state.objects.get(&id) {
            Some(live) => live.resource_version(),
            None => return Err(StoreError::NotFound(id)),
        };
        if obj.resource_version() != live_version {
            return Err(StoreError::Conflict(id));
        }
        state.version += 1;
        obj.meta_mut().resource_version = Some(state.version.to_string());
        state.objects.insert(id, obj.clone());
        Ok(obj)
    }

    async fn delete(&self, id: &ObjectId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.record(Write::Delete(id.clone()));
        match state.objects.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id.clone())),
        }
    }
}

// === impl FakeDomains ===

impl FakeDomains {
    pub fn set(&self, domain: Domain) {
        self.domains.lock().insert(domain.name.clone(), domain);
    }

    pub fn remove(&self, name: &str) {
        self.domains.lock().remove(name);
    }

    pub fn fail(&self, name: &str, fail: bool) {
        let mut failing = self.failing.lock();
        if fail {
            failing.insert(name.to_string());
        } else {
            failing.remove(name);
        }
    }
}

#[async_trait::async_trait]
impl DiscoverDomain for FakeDomains {
    async fn get_domain(&self, name: &str) -> Result<Domain, DomainError> {
        if self.failing.lock().contains(name) {
            return Err(DomainError::Unavailable {
                name: name.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.domains
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(name.to_string()))
    }
}
