//! The org_members join collection: one user, one organization, one
//! role. The unique (user, organization) index enforces one membership
//! per pair; concurrent creation attempts rely on the store rejecting
//! the second insert.

use crate::collections::roles::{ALL_ORG_ROLES, string_values};
use crate::core::error::StoreError;
use crate::core::rules::{self, OrgScope};
use crate::core::schema::{CollectionSpec, FieldSpec, FieldType, IndexSpec, RuleSet};
use crate::core::store::{Store, USERS};
use crate::collections::organizations::ORGANIZATIONS;

pub const ORG_MEMBERS: &str = "org_members";

pub fn spec() -> CollectionSpec {
    let mut spec = CollectionSpec::base(ORG_MEMBERS);
    spec.fields = vec![
        FieldSpec::new(
            "user",
            FieldType::Relation {
                target: USERS.to_string(),
                required: true,
                max_select: 1,
                cascade_delete: true,
            },
        ),
        FieldSpec::new(
            "organization",
            FieldType::Relation {
                target: ORGANIZATIONS.to_string(),
                required: true,
                max_select: 1,
                cascade_delete: true,
            },
        ),
        FieldSpec::new(
            "role",
            FieldType::Select {
                values: string_values(ALL_ORG_ROLES),
                max_select: 1,
                required: true,
            },
        ),
    ];
    spec.indexes = vec![
        // One membership per user per org.
        IndexSpec::new("idx_org_members_unique", true, &["user", "organization"]),
        IndexSpec::new("idx_org_members_org", false, &["organization"]),
    ];
    spec
}

/// Deferred until both referenced collections exist.
pub fn ensure(store: &Store) -> Result<(), StoreError> {
    store.ensure_collection(&spec())?;
    Ok(())
}

pub fn apply_access_rules(store: &Store) -> Result<(), StoreError> {
    let member = rules::all(&[
        rules::AUTH_PRESENT,
        &rules::membership_of(OrgScope::Via("organization")),
    ]);
    let admin = rules::all(&[&member, &rules::role_in(&["owner", "admin"])]);
    store.apply_rules(
        ORG_MEMBERS,
        &RuleSet {
            list: Some(member.clone()),
            view: Some(member),
            create: Some(admin.clone()),
            update: Some(admin.clone()),
            delete: Some(admin),
        },
    )?;
    Ok(())
}
