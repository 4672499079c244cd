//! The main reconciliation pass.

use crate::{
    service_role::{self, RuleManager},
    service_role_binding::{self, BindingManager},
    ControllerMetrics, LiveIndex, Manager, ObjectId, Store, StoreError, Update,
};
use athenz_policy_controller_core::{naming, DiscoverDomain, Domain, Role};
use athenz_policy_controller_k8s_api::{
    rbac::{ServiceRole, ServiceRoleBinding},
    Resource,
};
use athenz_policy_controller_k8s_index::SharedNamespaceIndex;
use kube::core::object::HasSpec;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Converges `ServiceRole` and `ServiceRoleBinding` objects onto the roles of the domains that
/// correspond to the cluster's namespaces.
pub struct Controller<D, R, B> {
    domains: D,
    namespaces: SharedNamespaceIndex,
    rules: RuleManager<R>,
    bindings: BindingManager<B>,
    dns_suffix: String,
    metrics: ControllerMetrics,
}

/// Counts the outcomes of a single pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    pub domain_errors: usize,
}

/// The live objects of both kinds, as of the start of a pass.
struct Live {
    rules: LiveIndex<ServiceRole>,
    bindings: LiveIndex<ServiceRoleBinding>,
}

// === impl Controller ===

impl<D, R, B> Controller<D, R, B>
where
    D: DiscoverDomain,
    R: Store<ServiceRole>,
    B: Store<ServiceRoleBinding>,
{
    pub fn new(
        domains: D,
        namespaces: SharedNamespaceIndex,
        rules: R,
        bindings: B,
        dns_suffix: impl Into<String>,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            domains,
            namespaces,
            rules: RuleManager::new(rules, metrics.clone()),
            bindings: BindingManager::new(bindings, metrics.clone()),
            dns_suffix: dns_suffix.into(),
            metrics,
        }
    }

    /// Runs a single reconciliation pass.
    ///
    /// Failures to write individual objects are logged and counted; the pass only fails if the
    /// live objects cannot be listed.
    pub async fn sync(&self) -> Result<PassStats, StoreError> {
        let res = self.reconcile().await;
        self.metrics.sync("rules", &res);
        if let Ok(stats) = &res {
            let PassStats {
                created,
                updated,
                deleted,
                failed,
                domain_errors,
            } = stats;
            info!(created, updated, deleted, failed, domain_errors, "Reconciled");
        }
        res
    }

    async fn reconcile(&self) -> Result<PassStats, StoreError> {
        let mut live = Live {
            rules: self.rules.list_existing().await?,
            bindings: self.bindings.list_existing().await?,
        };
        let namespaces = self
            .namespaces
            .read()
            .names()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut stats = PassStats::default();
        let mut failed_domains = HashSet::new();
        for namespace in &namespaces {
            let domain_name = naming::namespace_to_domain(namespace);
            let domain = match self.domains.get_domain(&domain_name).await {
                Ok(domain) => domain,
                Err(error) => {
                    warn!(%namespace, domain = %domain_name, %error, "Failed to fetch domain");
                    self.metrics.domain_error();
                    failed_domains.insert(domain_name);
                    continue;
                }
            };
            for role in &domain.roles {
                self.sync_role(namespace, &domain_name, &domain, role, &mut live, &mut stats)
                    .await;
            }
        }
        stats.domain_errors = failed_domains.len();

        sweep(&self.rules, &live.rules, &failed_domains, &mut stats).await;
        sweep(&self.bindings, &live.bindings, &failed_domains, &mut stats).await;
        Ok(stats)
    }

    async fn sync_role(
        &self,
        namespace: &str,
        domain_name: &str,
        domain: &Domain,
        role: &Role,
        live: &mut Live,
        stats: &mut PassStats,
    ) {
        let Some(simple_name) = naming::role_simple_name(domain_name, &role.name) else {
            debug!(%namespace, role = %role.name, "Role belongs to another domain");
            return;
        };
        let Some(name) = naming::service_role_name(simple_name) else {
            debug!(%namespace, role = %role.name, "Not a service role");
            return;
        };

        let rule = match service_role::desired(
            namespace,
            &self.dns_suffix,
            simple_name,
            domain.assertions_for(&role.name),
        ) {
            Ok(rule) => rule,
            Err(error) => {
                warn!(%namespace, role = %role.name, %error, "Skipping role");
                stats.failed += 1;
                return;
            }
        };
        apply(&self.rules, &mut live.rules, rule, stats).await;

        if role.members.is_empty() {
            debug!(%namespace, %name, "Role has no members; skipping binding");
            return;
        }
        if let Some(binding) = service_role_binding::desired(namespace, name, &role.members) {
            apply(&self.bindings, &mut live.bindings, binding, stats).await;
        }
    }
}

/// Creates `desired` if no live object claims its identity; otherwise updates the live object.
async fn apply<K, S>(
    manager: &Manager<K, S>,
    live: &mut LiveIndex<K>,
    desired: K,
    stats: &mut PassStats,
) where
    K: Resource<DynamicType = ()> + HasSpec + Send + Sync + 'static,
    K::Spec: PartialEq,
    S: Store<K>,
{
    let kind = K::kind(&());
    let id = ObjectId::of(&desired);
    match live.claim(&id) {
        None => match manager.create(desired).await {
            Ok(()) => {
                info!(%kind, %id, "Created");
                stats.created += 1;
            }
            Err(error) => {
                warn!(%kind, %id, %error, "Failed to create");
                stats.failed += 1;
            }
        },
        Some(obj) => match manager.update(obj, desired).await {
            Ok(Update::Updated) => {
                info!(%kind, %id, "Updated");
                stats.updated += 1;
            }
            Ok(Update::Unchanged) => debug!(%kind, %id, "Unchanged"),
            Err(error) => {
                warn!(%kind, %id, %error, "Failed to update");
                stats.failed += 1;
            }
        },
    }
}

/// Deletes live objects that no desired object claimed, except in namespaces whose domain could
/// not be fetched.
async fn sweep<K, S>(
    manager: &Manager<K, S>,
    live: &LiveIndex<K>,
    failed_domains: &HashSet<String>,
    stats: &mut PassStats,
) where
    K: Resource<DynamicType = ()> + HasSpec + Send + Sync + 'static,
    K::Spec: PartialEq,
    S: Store<K>,
{
    let kind = K::kind(&());
    for id in live.unprocessed() {
        let domain = naming::namespace_to_domain(&id.namespace);
        if failed_domains.contains(&domain) {
            debug!(%kind, %id, %domain, "Domain unavailable; retaining");
            continue;
        }
        match manager.delete(id).await {
            Ok(()) => {
                info!(%kind, %id, "Deleted");
                stats.deleted += 1;
            }
            Err(error) if error.is_not_found() => debug!(%kind, %id, "Already deleted"),
            Err(error) => {
                warn!(%kind, %id, %error, "Failed to delete");
                stats.failed += 1;
            }
        }
    }
}
