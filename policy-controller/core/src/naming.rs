//! Naming conventions shared between the authority and the mesh.
//!
//! - A namespace maps to a domain by turning `-` into `.`; a literal `-` in a
//!   domain name is written as `--` in the namespace.
//! - A domain role named `<domain>:role.service.role.<name>` yields rule and
//!   binding objects named `<name>`.
//! - The service account targeted by a role is the last `.`-delimited segment
//!   of the role's name.
//! - A member `<domain>.<name>` is bound as the subject `<domain>/sa/<name>`.

/// Prefix that marks a domain role as a mesh service role.
pub const SERVICE_ROLE_PREFIX: &str = "service.role.";

const ROLE_INFIX: &str = ":role.";
const SUBJECT_INFIX: &str = "/sa/";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NamingError {
    #[error("role name {0:?} does not end in a service account segment")]
    MalformedRoleName(String),

    #[error("member {0:?} is not of the form <domain>.<name>")]
    MalformedMember(String),
}

pub fn namespace_to_domain(namespace: &str) -> String {
    let mut domain = String::with_capacity(namespace.len());
    let mut chars = namespace.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '-' {
            domain.push(c);
            continue;
        }
        if chars.peek() == Some(&'-') {
            chars.next();
            domain.push('-');
        } else {
            domain.push('.');
        }
    }
    domain
}

pub fn domain_to_namespace(domain: &str) -> String {
    let mut namespace = String::with_capacity(domain.len());
    for c in domain.chars() {
        match c {
            '-' => namespace.push_str("--"),
            '.' => namespace.push('-'),
            c => namespace.push(c),
        }
    }
    namespace
}

/// Strips `<domain>:role.` from a fully-qualified role name.
pub fn role_simple_name<'r>(domain: &str, role: &'r str) -> Option<&'r str> {
    role.strip_prefix(domain)?.strip_prefix(ROLE_INFIX)
}

/// Returns the rule object name for a role's simple name, if the role follows
/// the service role convention.
pub fn service_role_name(simple_name: &str) -> Option<&str> {
    simple_name
        .strip_prefix(SERVICE_ROLE_PREFIX)
        .filter(|name| !name.is_empty())
}

/// Returns the service account targeted by a role: the last `.`-delimited
/// segment of its name.
pub fn service_account(role_name: &str) -> Result<&str, NamingError> {
    match role_name.rsplit_once('.') {
        Some((_, sa)) if !sa.is_empty() => Ok(sa),
        _ => Err(NamingError::MalformedRoleName(role_name.to_string())),
    }
}

/// `<name>.<namespace>.<dns-suffix>`
pub fn service_identifier(name: &str, namespace: &str, dns_suffix: &str) -> String {
    format!("{name}.{namespace}.{dns_suffix}")
}

/// Renders an authority member as a mesh subject, e.g. `user.foo` becomes
/// `user/sa/foo`.
pub fn member_subject(member: &str) -> Result<String, NamingError> {
    match member.rsplit_once('.') {
        Some((domain, name)) if !domain.is_empty() && !name.is_empty() => {
            Ok(format!("{domain}{SUBJECT_INFIX}{name}"))
        }
        _ => Err(NamingError::MalformedMember(member.to_string())),
    }
}
