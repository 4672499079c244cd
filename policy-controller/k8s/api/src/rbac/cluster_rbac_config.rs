use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The mesh only reads the cluster RBAC config with this name.
pub const DEFAULT_NAME: &str = "default";

/// Controls which services the mesh enforces authorization for.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "rbac.istio.io",
    version = "v1alpha1",
    kind = "ClusterRbacConfig"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRbacConfigSpec {
    #[serde(default)]
    pub mode: Mode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion: Option<Target>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusion: Option<Target>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    #[default]
    Off,
    On,
    OnWithInclusion,
    OnWithExclusion,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default)]
    pub services: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
}

// === impl ClusterRbacConfigSpec ===

impl ClusterRbacConfigSpec {
    /// Enforces authorization only for the given services.
    pub fn inclusion(services: Vec<String>) -> Self {
        Self {
            mode: Mode::OnWithInclusion,
            inclusion: Some(Target {
                services,
                namespaces: vec![],
            }),
            exclusion: None,
        }
    }

    /// The included services, if the config is in inclusion mode.
    pub fn included_services(&self) -> Option<&Vec<String>> {
        match (self.mode, self.inclusion.as_ref()) {
            (Mode::OnWithInclusion, Some(target)) => Some(&target.services),
            _ => None,
        }
    }
}
