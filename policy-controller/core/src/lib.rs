#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod domain;
pub mod naming;

pub use self::{
    domain::{Assertion, DiscoverDomain, Domain, DomainError, Effect, Policy, Role},
    naming::NamingError,
};
