//! Derives `ServiceRoleBinding` objects from a domain role's members.

use crate::Manager;
use athenz_policy_controller_core::naming;
use athenz_policy_controller_k8s_api::rbac::{
    RoleRef, ServiceRoleBinding, ServiceRoleBindingSpec, Subject,
};

/// Manages the `ServiceRoleBinding` objects derived from domain roles.
pub type BindingManager<S> = Manager<ServiceRoleBinding, S>;

/// Builds the binding that grants the `ServiceRole` named `name` to a role's members.
///
/// Returns `None` when there are no members to bind. Members that cannot be rendered as a mesh
/// subject are skipped.
pub fn desired(namespace: &str, name: &str, members: &[String]) -> Option<ServiceRoleBinding> {
    let subjects = members
        .iter()
        .filter_map(|member| match naming::member_subject(member) {
            Ok(user) => Some(Subject::user(user)),
            Err(error) => {
                tracing::warn!(%namespace, %name, %error, "Skipping member");
                None
            }
        })
        .collect::<Vec<_>>();
    if subjects.is_empty() {
        return None;
    }

    let mut obj = ServiceRoleBinding::new(
        name,
        ServiceRoleBindingSpec {
            subjects,
            role_ref: RoleRef::service_role(name),
        },
    );
    obj.metadata.namespace = Some(namespace.to_string());
    Some(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn binds_members_as_subjects() {
        let binding = desired(
            "athenz-domain",
            "client-writer-role",
            &["user.foo".to_string(), "my.domain.frontend".to_string()],
        )
        .expect("binding must be built");

        assert_eq!(binding.metadata.name.as_deref(), Some("client-writer-role"));
        assert_eq!(binding.metadata.namespace.as_deref(), Some("athenz-domain"));
        assert_eq!(
            binding.spec,
            ServiceRoleBindingSpec {
                subjects: vec![
                    Subject::user("user/sa/foo"),
                    Subject::user("my.domain/sa/frontend"),
                ],
                role_ref: RoleRef {
                    kind: "ServiceRole".to_string(),
                    name: "client-writer-role".to_string(),
                },
            }
        );
    }

    #[test]
    fn no_members_no_binding() {
        assert!(desired("ns", "reader", &[]).is_none());
        assert!(desired("ns", "reader", &["nodot".to_string()]).is_none());
    }

    #[test]
    fn skips_malformed_members() {
        let binding = desired(
            "ns",
            "reader",
            &["nodot".to_string(), "user.bar".to_string()],
        )
        .expect("binding must be built");
        assert_eq!(binding.spec.subjects, vec![Subject::user("user/sa/bar")]);
    }
}
