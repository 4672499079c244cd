//! A cluster-scoped mirror of an authority domain.
//!
//! `AthenzDomain` resources are maintained by a separate syncer; each is named
//! after its domain and carries the domain's signed contents inline.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "athenz.io",
    version = "v1",
    kind = "AthenzDomain",
    shortname = "domain"
)]
#[serde(rename_all = "camelCase")]
pub struct AthenzDomainSpec {
    #[serde(default)]
    pub domain: DomainData,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainData {
    pub name: String,

    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<SignedPolicies>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_members: Vec<RoleMember>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleMember {
    pub member_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignedPolicies {
    #[serde(default)]
    pub contents: DomainPolicies,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainPolicies {
    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub policies: Vec<Policy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub name: String,

    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    pub role: String,
    pub resource: String,
    pub action: String,

    /// `ALLOW` or `DENY`; the authority treats a missing effect as `ALLOW`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

// === impl Role ===

impl Role {
    /// Iterates over the role's member names, preferring the detailed member
    /// list and falling back to the plain one. Duplicates are skipped.
    pub fn member_names(&self) -> impl Iterator<Item = &str> + '_ {
        let mut seen = std::collections::HashSet::new();
        self.role_members
            .iter()
            .map(|m| m.member_name.as_str())
            .chain(self.members.iter().map(String::as_str))
            .filter(move |m| seen.insert(*m))
    }
}
