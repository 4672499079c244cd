//! Derives `ServiceRole` objects from a domain role's assertions.

use crate::Manager;
use athenz_policy_controller_core::{naming, Assertion, Effect, NamingError};
use athenz_policy_controller_k8s_api::rbac::{AccessRule, ServiceRole, ServiceRoleSpec};
use std::collections::BTreeMap;

/// Manages the `ServiceRole` objects derived from domain roles.
pub type RuleManager<S> = Manager<ServiceRole, S>;

/// Builds the desired `ServiceRole` for a role.
///
/// `role` is the role's simple name, e.g. `service.role.reader`. The object is named after the
/// role with the service role prefix stripped and grants access to the service named by the last
/// `.`-delimited segment of the role.
///
/// Assertions are grouped by path, producing one rule per distinct path (assertions without a
/// path share a single rule that omits paths). Each rule lists one uppercased method per
/// assertion, sorted. Assertions that do not allow access are ignored.
pub fn desired<'a>(
    namespace: &str,
    dns_suffix: &str,
    role: &str,
    assertions: impl IntoIterator<Item = &'a Assertion>,
) -> Result<ServiceRole, NamingError> {
    let name = naming::service_role_name(role)
        .ok_or_else(|| NamingError::MalformedRoleName(role.to_string()))?;
    let sa = naming::service_account(role)?;
    let service = naming::service_identifier(sa, namespace, dns_suffix);

    let mut methods_by_path = BTreeMap::<Option<&str>, Vec<String>>::new();
    for assertion in assertions {
        if assertion.effect != Effect::Allow {
            tracing::debug!(%role, resource = %assertion.resource, "Skipping denied assertion");
            continue;
        }
        methods_by_path
            .entry(assertion.path())
            .or_default()
            .push(assertion.action.to_uppercase());
    }

    let rules = methods_by_path
        .into_iter()
        .map(|(path, mut methods)| {
            methods.sort();
            AccessRule {
                services: vec![service.clone()],
                paths: path.map(str::to_string).into_iter().collect(),
                methods,
            }
        })
        .collect();

    let mut obj = ServiceRole::new(name, ServiceRoleSpec { rules });
    obj.metadata.namespace = Some(namespace.to_string());
    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn allow(action: &str, resource: &str) -> Assertion {
        Assertion {
            role: "my.domain:role.service.role.reader".to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            effect: Effect::Allow,
        }
    }

    #[test]
    fn groups_by_path() {
        let assertions = [
            allow("get", "my.domain:/details*"),
            allow("get", "my.domain:/reviews"),
        ];
        let role = desired("my-domain", "svc.cluster.local", "service.role.reader", &assertions)
            .expect("role must be valid");

        assert_eq!(role.metadata.name.as_deref(), Some("reader"));
        assert_eq!(role.metadata.namespace.as_deref(), Some("my-domain"));
        assert_eq!(
            role.spec.rules,
            vec![
                AccessRule {
                    services: vec!["reader.my-domain.svc.cluster.local".to_string()],
                    paths: vec!["/details*".to_string()],
                    methods: vec!["GET".to_string()],
                },
                AccessRule {
                    services: vec!["reader.my-domain.svc.cluster.local".to_string()],
                    paths: vec!["/reviews".to_string()],
                    methods: vec!["GET".to_string()],
                },
            ]
        );
    }

    #[test]
    fn pathless_assertions_share_a_rule() {
        let assertions = [
            allow("post", "my.domain:"),
            allow("get", "my.domain"),
            allow("GET", "my.domain"),
        ];
        let role = desired("my-domain", "cluster", "service.role.reader", &assertions)
            .expect("role must be valid");

        assert_eq!(
            role.spec.rules,
            vec![AccessRule {
                services: vec!["reader.my-domain.cluster".to_string()],
                paths: vec![],
                methods: vec!["GET".to_string(), "GET".to_string(), "POST".to_string()],
            }]
        );
    }

    #[test]
    fn output_is_independent_of_assertion_order() {
        let mut assertions = vec![
            allow("put", "my.domain:/b"),
            allow("get", "my.domain:/a"),
            allow("delete", "my.domain:/b"),
            allow("get", "my.domain"),
        ];
        let a = desired("ns", "cluster", "service.role.reader", &assertions).expect("valid");
        assertions.reverse();
        let b = desired("ns", "cluster", "service.role.reader", &assertions).expect("valid");
        assert_eq!(a.spec, b.spec);
    }

    #[test]
    fn denied_assertions_grant_nothing() {
        let mut deny = allow("delete", "my.domain:/admin");
        deny.effect = Effect::Deny;
        let role = desired("ns", "cluster", "service.role.reader", [&deny]).expect("valid");
        assert!(role.spec.rules.is_empty());
    }

    #[test]
    fn rejects_malformed_role_names() {
        let none = std::iter::empty::<&Assertion>;
        assert_eq!(
            desired("ns", "cluster", "admin", none()).map(|_| ()),
            Err(NamingError::MalformedRoleName("admin".to_string()))
        );
        assert_eq!(
            desired("ns", "cluster", "service.role.reader.", none()).map(|_| ()),
            Err(NamingError::MalformedRoleName(
                "service.role.reader.".to_string()
            ))
        );
    }
}
