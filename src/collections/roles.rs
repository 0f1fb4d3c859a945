//! Role vocabularies.
//!
//! Two independent role domains exist and are never conflated: the
//! platform role lives on the user record itself, the organization
//! role on the membership join record. A rule that checks
//! organization authority must reference the membership role.

pub const ROLE_USER: &str = "user";
pub const ROLE_AGENT: &str = "agent";
pub const ROLE_ADMIN: &str = "admin";

/// Valid values for the `users.role` field.
pub const ALL_PLATFORM_ROLES: &[&str] = &[ROLE_USER, ROLE_AGENT, ROLE_ADMIN];

pub const ORG_ROLE_OWNER: &str = "owner";
pub const ORG_ROLE_ADMIN: &str = "admin";
pub const ORG_ROLE_MEMBER: &str = "member";

/// Valid values for the `org_members.role` field.
pub const ALL_ORG_ROLES: &[&str] = &[ORG_ROLE_OWNER, ORG_ROLE_ADMIN, ORG_ROLE_MEMBER];

pub fn string_values(roles: &[&str]) -> Vec<String> {
    roles.iter().map(|r| r.to_string()).collect()
}
