use crate::{Synced, Trigger};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use athenz_policy_controller_core::naming;
use athenz_policy_controller_k8s_api::{ResourceExt, Service};
use kubert::index::NamespacedRemoved;
use parking_lot::RwLock;
use std::{collections::BTreeSet, sync::Arc};
use tokio::sync::watch;

/// Marks a service for enforcement when set to `true`.
pub const AUTHZ_ENABLED_ANNOTATION: &str = "authz.istio.io/enabled";

pub type SharedServiceIndex = Arc<RwLock<ServiceIndex>>;

/// Tracks the services, by namespace, that have opted into enforcement.
///
/// Every service event pokes the onboarding trigger, whether or not it changes the enabled set, so
/// that drift in the cluster configuration is corrected on the next pass.
#[derive(Debug)]
pub struct ServiceIndex {
    enabled: HashMap<String, HashSet<String>>,
    trigger: Trigger,
    synced: Synced,
}

fn is_enabled(svc: &Service) -> bool {
    svc.annotations()
        .get(AUTHZ_ENABLED_ANNOTATION)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

// === impl ServiceIndex ===

impl ServiceIndex {
    pub fn shared(trigger: Trigger) -> SharedServiceIndex {
        Arc::new(RwLock::new(Self {
            enabled: HashMap::default(),
            trigger,
            synced: Synced::default(),
        }))
    }

    /// Returns the sorted identifiers of all enabled services.
    pub fn enabled_services(&self, dns_suffix: &str) -> Vec<String> {
        self.enabled
            .iter()
            .flat_map(|(ns, names)| {
                names
                    .iter()
                    .map(move |name| naming::service_identifier(name, ns, dns_suffix))
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn synced(&self) -> watch::Receiver<bool> {
        self.synced.receiver()
    }

    fn update(&mut self, ns: String, name: String, enabled: bool) {
        if enabled {
            if self.enabled.entry(ns).or_default().insert(name.clone()) {
                tracing::debug!(%name, "Service enabled");
            }
            return;
        }
        self.remove(&ns, &name);
    }

    fn remove(&mut self, ns: &str, name: &str) {
        if let Some(names) = self.enabled.get_mut(ns) {
            if names.remove(name) {
                tracing::debug!(%ns, %name, "Service disabled");
            }
            if names.is_empty() {
                self.enabled.remove(ns);
            }
        }
    }
}

impl kubert::index::IndexNamespacedResource<Service> for ServiceIndex {
    fn apply(&mut self, svc: Service) {
        let enabled = is_enabled(&svc);
        let ns = svc.namespace().unwrap_or_default();
        let name = svc.name_unchecked();
        self.update(ns, name, enabled);
        self.trigger.trigger();
    }

    fn delete(&mut self, ns: String, name: String) {
        self.remove(&ns, &name);
        self.trigger.trigger();
    }

    fn reset(&mut self, svcs: Vec<Service>, _: NamespacedRemoved) {
        self.enabled.clear();
        for svc in svcs {
            if is_enabled(&svc) {
                let ns = svc.namespace().unwrap_or_default();
                self.enabled
                    .entry(ns)
                    .or_default()
                    .insert(svc.name_unchecked());
            }
        }
        self.synced.mark();
        self.trigger.trigger();
    }
}

impl crate::metrics::SizedIndex for ServiceIndex {
    fn size(&self) -> usize {
        self.enabled.values().map(|names| names.len()).sum()
    }
}
