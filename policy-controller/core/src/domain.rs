use std::{fmt, str::FromStr, sync::Arc};

/// A snapshot of an authority domain: its roles and the policies that grant
/// those roles access to resources.
///
/// Snapshots are fetched fresh on every reconciliation pass and are never
/// cached across passes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub roles: Vec<Role>,
    pub policies: Vec<Policy>,
}

/// A named group of principals within a domain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Role {
    /// The fully-qualified role name, e.g. `my.domain:role.service.role.reader`.
    pub name: String,

    /// Principal identifiers, e.g. `user.foo` or `my.domain.frontend`.
    pub members: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub assertions: Vec<Assertion>,
}

/// Binds a role to an action on a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assertion {
    /// The fully-qualified name of the role this assertion applies to.
    pub role: String,

    /// An HTTP method, in any case.
    pub action: String,

    /// `<role-ref>:<optional-path>`
    pub resource: String,

    pub effect: Effect,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("domain {0} not found")]
    NotFound(String),

    #[error("domain {name} is unavailable: {reason}")]
    Unavailable { name: String, reason: String },
}

/// Looks up authority domains by name.
///
/// Implementations may be slow or unreliable; callers treat every error as
/// transient.
#[async_trait::async_trait]
pub trait DiscoverDomain: Send + Sync {
    async fn get_domain(&self, name: &str) -> Result<Domain, DomainError>;
}

// === impl Domain ===

impl Domain {
    /// Returns every assertion, across all of the domain's policies, that
    /// applies to the given fully-qualified role name.
    pub fn assertions_for<'d>(&'d self, role: &'d str) -> impl Iterator<Item = &'d Assertion> + 'd {
        self.policies
            .iter()
            .flat_map(|p| p.assertions.iter())
            .filter(move |a| a.role == role)
    }
}

// === impl Assertion ===

impl Assertion {
    /// The path component of the assertion's resource: everything after the
    /// first `:`. Returns `None` when there is no path or it is empty.
    pub fn path(&self) -> Option<&str> {
        match self.resource.split_once(':') {
            Some((_, path)) if !path.is_empty() => Some(path),
            _ => None,
        }
    }
}

// === impl Effect ===

impl FromStr for Effect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("allow") {
            return Ok(Self::Allow);
        }
        if s.eq_ignore_ascii_case("deny") {
            return Ok(Self::Deny);
        }
        Err(format!("invalid assertion effect: {s:?}"))
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => "ALLOW".fmt(f),
            Self::Deny => "DENY".fmt(f),
        }
    }
}

// === impl DiscoverDomain ===

#[async_trait::async_trait]
impl<T: DiscoverDomain + ?Sized> DiscoverDomain for Arc<T> {
    async fn get_domain(&self, name: &str) -> Result<Domain, DomainError> {
        (**self).get_domain(name).await
    }
}
