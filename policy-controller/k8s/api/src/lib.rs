#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod athenz;
pub mod rbac;

pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Namespace, Service},
    },
    ClusterResourceScope, NamespaceResourceScope,
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, PostParams, ResourceExt},
    core::ErrorResponse,
    runtime::watcher,
    Client, Error, Resource,
};
