//! Maintains the singleton `ClusterRbacConfig` inclusion list.
//!
//! The config exists only while at least one service has enforcement enabled. Its inclusion list
//! is patched incrementally: entries for services that are no longer enabled are removed and new
//! services are appended, so unrelated entries keep their positions. Everything else on the live
//! object is written back as it was read.

use crate::{ControllerMetrics, ObjectId, Store, StoreError};
use athenz_policy_controller_k8s_api::rbac::{
    cluster_rbac_config::DEFAULT_NAME, ClusterRbacConfig, ClusterRbacConfigSpec,
};
use athenz_policy_controller_k8s_index::SharedServiceIndex;
use std::collections::HashSet;
use tracing::{debug, info};

pub struct Onboarding<S> {
    services: SharedServiceIndex,
    store: S,
    dns_suffix: String,
    metrics: ControllerMetrics,
}

/// What a pass did to the cluster config.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No services are enabled and the config does not exist.
    Absent,
    Created,
    Updated,
    Unchanged,
    Deleted,
}

// === impl Onboarding ===

impl<S: Store<ClusterRbacConfig>> Onboarding<S> {
    pub fn new(
        services: SharedServiceIndex,
        store: S,
        dns_suffix: impl Into<String>,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            services,
            store,
            dns_suffix: dns_suffix.into(),
            metrics,
        }
    }

    pub async fn sync(&self) -> Result<Outcome, StoreError> {
        let res = self.reconcile().await;
        self.metrics.sync("onboarding", &res);
        if let Ok(outcome) = &res {
            debug!(?outcome, "Reconciled");
        }
        res
    }

    async fn reconcile(&self) -> Result<Outcome, StoreError> {
        let enabled = self.services.read().enabled_services(&self.dns_suffix);
        let id = ObjectId::cluster(DEFAULT_NAME);

        let Some(mut config) = self.store.get(&id).await? else {
            if enabled.is_empty() {
                return Ok(Outcome::Absent);
            }
            info!(services = enabled.len(), "Creating cluster RBAC config");
            let config =
                ClusterRbacConfig::new(DEFAULT_NAME, ClusterRbacConfigSpec::inclusion(enabled));
            let res = self.store.create(config).await;
            self.metrics.write("ClusterRbacConfig", "create", &res);
            return res.map(|_| Outcome::Created);
        };

        let changed = if config.spec.included_services().is_none() {
            info!("Resetting cluster RBAC config to inclusion mode");
            config.spec = ClusterRbacConfigSpec::inclusion(enabled);
            true
        } else {
            let target = config.spec.inclusion.get_or_insert_with(Default::default);
            match patch(&target.services, &enabled) {
                Some(services) => {
                    target.services = services;
                    true
                }
                None => false,
            }
        };

        let services = config.spec.included_services().map_or(0, Vec::len);
        if services == 0 {
            info!("No services enabled; deleting cluster RBAC config");
            let res = match self.store.delete(&id).await {
                Err(error) if error.is_not_found() => Ok(()),
                res => res,
            };
            self.metrics.write("ClusterRbacConfig", "delete", &res);
            return res.map(|()| Outcome::Deleted);
        }
        if !changed {
            return Ok(Outcome::Unchanged);
        }

        info!(services, "Updating cluster RBAC config");
        let res = self.store.replace(config).await;
        self.metrics.write("ClusterRbacConfig", "update", &res);
        res.map(|_| Outcome::Updated)
    }
}

/// Returns the patched list if it differs from `current`: entries that are not in `desired` are
/// removed and entries missing from `current` are appended in order.
fn patch(current: &[String], desired: &[String]) -> Option<Vec<String>> {
    let want = desired.iter().collect::<HashSet<_>>();
    let have = current.iter().collect::<HashSet<_>>();

    let mut services = current
        .iter()
        .filter(|s| want.contains(s))
        .cloned()
        .collect::<Vec<_>>();
    let removed = services.len() != current.len();
    let added = desired
        .iter()
        .filter(|s| !have.contains(s))
        .cloned()
        .collect::<Vec<_>>();
    if !removed && added.is_empty() {
        return None;
    }
    services.extend(added);
    Some(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strs(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn patch_preserves_order() {
        assert_eq!(patch(&strs(&["a", "b"]), &strs(&["b", "a"])), None);
        assert_eq!(
            patch(&strs(&["c", "a", "b"]), &strs(&["a", "b", "d"])),
            Some(strs(&["a", "b", "d"]))
        );
        assert_eq!(
            patch(&strs(&["b", "x", "a"]), &strs(&["a", "b"])),
            Some(strs(&["b", "a"]))
        );
        assert_eq!(patch(&strs(&["a"]), &[]), Some(vec![]));
    }
}
