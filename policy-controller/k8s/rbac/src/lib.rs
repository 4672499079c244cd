//! Athenz Policy Controller RBAC Reconcilers
//!
//! Two independent control loops write mesh RBAC objects:
//!
//! - The [`Controller`] maps each namespace onto an authority domain and derives one
//!   `ServiceRole` (and, when the role has members, one `ServiceRoleBinding`) per service role in
//!   the domain. Live objects that no longer correspond to a role are swept, except in namespaces
//!   whose domain could not be fetched during the pass.
//! - [`Onboarding`] maintains the singleton `ClusterRbacConfig` inclusion list from the set of
//!   services that carry the enforcement annotation.
//!
//! ```text
//! [ Namespace ] -> [ AthenzDomain ] -> [ ServiceRole ] <- [ ServiceRoleBinding ]
//! [ Service ] -> [ ClusterRbacConfig ]
//! ```
//!
//! Each loop is driven by a [`queue`] worker that runs at most one pass at a time.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod controller;
mod live;
mod manager;
mod metrics;
pub mod onboarding;
pub mod queue;
pub mod service_role;
pub mod service_role_binding;
pub mod store;

#[cfg(test)]
mod tests;

pub use self::{
    controller::{Controller, PassStats},
    live::LiveIndex,
    manager::{Manager, Update},
    metrics::ControllerMetrics,
    onboarding::{Onboarding, Outcome},
    queue::RetryPolicy,
    store::{KubeClusterStore, KubeStore, ObjectId, Store, StoreError},
};
