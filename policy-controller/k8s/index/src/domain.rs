use crate::{Synced, Trigger};
use athenz_policy_controller_core::{Assertion, Domain, DomainError, Effect, Policy, Role};
use athenz_policy_controller_k8s_api::{
    athenz::{self, AthenzDomain, AthenzDomainSpec},
    ResourceExt,
};
use kubert::index::ClusterRemoved;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::watch;

pub type SharedDomainIndex = Arc<RwLock<DomainIndex>>;

/// Caches the authority domains mirrored into the cluster as `AthenzDomain` resources, keyed by
/// resource name.
///
/// Any change to a domain pokes the main reconciliation trigger.
#[derive(Debug)]
pub struct DomainIndex {
    domains: HashMap<String, Domain>,
    trigger: Trigger,
    synced: Synced,
}

// === impl DomainIndex ===

impl DomainIndex {
    pub fn shared(trigger: Trigger) -> SharedDomainIndex {
        Arc::new(RwLock::new(Self {
            domains: HashMap::default(),
            trigger,
            synced: Synced::default(),
        }))
    }

    pub fn get(&self, name: &str) -> Result<Domain, DomainError> {
        self.domains
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(name.to_string()))
    }

    pub fn synced(&self) -> watch::Receiver<bool> {
        self.synced.receiver()
    }
}

impl kubert::index::IndexClusterResource<AthenzDomain> for DomainIndex {
    fn apply(&mut self, resource: AthenzDomain) {
        let name = resource.name_unchecked();
        let domain = convert(name.clone(), resource.spec);
        if self.domains.get(&name) == Some(&domain) {
            tracing::trace!(%name, "Domain unchanged");
            return;
        }
        tracing::debug!(%name, roles = domain.roles.len(), "Domain updated");
        self.domains.insert(name, domain);
        self.trigger.trigger();
    }

    fn delete(&mut self, name: String) {
        if self.domains.remove(&name).is_some() {
            tracing::debug!(%name, "Domain removed");
            self.trigger.trigger();
        }
    }

    fn reset(&mut self, resources: Vec<AthenzDomain>, _: ClusterRemoved) {
        let domains = resources
            .into_iter()
            .map(|r| {
                let name = r.name_unchecked();
                (name.clone(), convert(name, r.spec))
            })
            .collect::<HashMap<_, _>>();
        if domains != self.domains {
            self.domains = domains;
            self.trigger.trigger();
        }
        self.synced.mark();
    }
}

impl crate::metrics::SizedIndex for DomainIndex {
    fn size(&self) -> usize {
        self.domains.len()
    }
}

fn convert(name: String, spec: AthenzDomainSpec) -> Domain {
    let roles = spec
        .domain
        .roles
        .iter()
        .map(|role| Role {
            name: role.name.clone(),
            members: role.member_names().map(str::to_string).collect(),
        })
        .collect();

    let policies = spec
        .domain
        .policies
        .map(|signed| signed.contents.policies)
        .unwrap_or_default()
        .into_iter()
        .map(|policy| Policy {
            name: policy.name,
            assertions: policy.assertions.into_iter().map(convert_assertion).collect(),
        })
        .collect();

    Domain {
        name,
        roles,
        policies,
    }
}

fn convert_assertion(assertion: athenz::Assertion) -> Assertion {
    let effect = match assertion.effect.as_deref() {
        None | Some("") => Effect::Allow,
        Some(effect) => effect.parse().unwrap_or_else(|error: String| {
            tracing::warn!(role = %assertion.role, %error, "Ignoring assertion");
            Effect::Deny
        }),
    };
    Assertion {
        role: assertion.role,
        action: assertion.action,
        resource: assertion.resource,
        effect,
    }
}
