use crate::Synced;
use athenz_policy_controller_k8s_api::{Namespace, ResourceExt};
use kubert::index::ClusterRemoved;
use parking_lot::RwLock;
use std::{collections::BTreeSet, sync::Arc};
use tokio::sync::watch;

pub type SharedNamespaceIndex = Arc<RwLock<NamespaceIndex>>;

/// Tracks the names of all namespaces in the cluster.
#[derive(Debug, Default)]
pub struct NamespaceIndex {
    names: BTreeSet<String>,
    synced: Synced,
}

// === impl NamespaceIndex ===

impl NamespaceIndex {
    pub fn shared() -> SharedNamespaceIndex {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Namespace names, in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn synced(&self) -> watch::Receiver<bool> {
        self.synced.receiver()
    }
}

impl kubert::index::IndexClusterResource<Namespace> for NamespaceIndex {
    fn apply(&mut self, ns: Namespace) {
        let name = ns.name_unchecked();
        if self.names.insert(name.clone()) {
            tracing::debug!(%name, "Added namespace");
        }
    }

    fn delete(&mut self, name: String) {
        if self.names.remove(&name) {
            tracing::debug!(%name, "Removed namespace");
        }
    }

    fn reset(&mut self, namespaces: Vec<Namespace>, _: ClusterRemoved) {
        self.names = namespaces.iter().map(ResourceExt::name_unchecked).collect();
        tracing::debug!(namespaces = self.names.len(), "Reset");
        self.synced.mark();
    }
}

impl crate::metrics::SizedIndex for NamespaceIndex {
    fn size(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use athenz_policy_controller_k8s_api::ObjectMeta;
    use kubert::index::IndexClusterResource;

    fn ns(name: &str) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn tracks_namespaces() {
        let mut index = NamespaceIndex::default();
        let synced = index.synced();
        assert!(!*synced.borrow());

        index.reset(vec![ns("b"), ns("a")], Default::default());
        assert!(*synced.borrow());
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["a", "b"]);

        index.apply(ns("c"));
        index.delete("a".to_string());
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["b", "c"]);

        index.reset(vec![ns("d")], Default::default());
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["d"]);
    }
}
