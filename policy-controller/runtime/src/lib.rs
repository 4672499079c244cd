#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use athenz_policy_controller_core as core;
pub use athenz_policy_controller_k8s_api as k8s;
pub use athenz_policy_controller_k8s_index as index;
pub use athenz_policy_controller_k8s_rbac as rbac;

mod args;

pub use self::args::Args;

/// Serves authority domain lookups from the `AthenzDomain` cache.
#[derive(Clone, Debug)]
struct DomainDiscover(index::SharedDomainIndex);

impl DomainDiscover {
    pub fn new(index: index::SharedDomainIndex) -> Self {
        Self(index)
    }
}

#[async_trait::async_trait]
impl core::DiscoverDomain for DomainDiscover {
    async fn get_domain(&self, name: &str) -> Result<core::Domain, core::DomainError> {
        self.0.read().get(name)
    }
}
