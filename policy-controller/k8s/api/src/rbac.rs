//! Mesh authorization resources in the `rbac.istio.io/v1alpha1` API group.

pub mod cluster_rbac_config;
pub mod service_role;
pub mod service_role_binding;

pub use self::{
    cluster_rbac_config::{ClusterRbacConfig, ClusterRbacConfigSpec, Mode, Target},
    service_role::{AccessRule, ServiceRole, ServiceRoleSpec},
    service_role_binding::{RoleRef, ServiceRoleBinding, ServiceRoleBindingSpec, Subject},
};

pub const API_GROUP: &str = "rbac.istio.io";
