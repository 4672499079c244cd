use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SERVICE_ROLE_KIND: &str = "ServiceRole";

/// Grants the rules of a `ServiceRole` to a set of subjects.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "rbac.istio.io",
    version = "v1alpha1",
    kind = "ServiceRoleBinding",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRoleBindingSpec {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    pub kind: String,
    pub name: String,
}

// === impl RoleRef ===

impl RoleRef {
    pub fn service_role(name: impl Into<String>) -> Self {
        Self {
            kind: SERVICE_ROLE_KIND.to_string(),
            name: name.into(),
        }
    }
}

// === impl Subject ===

impl Subject {
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            group: None,
        }
    }
}
