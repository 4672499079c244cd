//! Athenz Policy Controller Indexes
//!
//! The controller keeps watch-backed caches of the cluster state it reads on every pass:
//!
//! - `Namespace` names, each of which maps onto an authority domain;
//! - `AthenzDomain` resources, which mirror the authority's domains into the cluster;
//! - `Service` resources that carry the enforcement annotation, which drive onboarding.
//!
//! Indexes never write to the cluster. Instead, they poke a [`Trigger`] when a change should cause
//! a reconciliation pass to run. Each index also reports when it has observed its initial listing
//! so that the controller does not act on a partial view of the cluster.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod domain;
pub mod metrics;
pub mod namespace;
pub mod service;
mod synced;
mod trigger;

pub use self::{
    domain::{DomainIndex, SharedDomainIndex},
    namespace::{NamespaceIndex, SharedNamespaceIndex},
    service::{ServiceIndex, SharedServiceIndex, AUTHZ_ENABLED_ANNOTATION},
    synced::{wait_synced, Synced},
    trigger::Trigger,
};
