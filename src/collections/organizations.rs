//! The organizations collection: tenant roots.
//!
//! Provisioned with only its create rule (no cross-collection
//! dependency); the member/admin/owner rules reference `org_members`
//! and are applied by a later pass, after the join collection exists.
//! Creating an organization cascades an owner membership for the
//! creating principal.

use crate::collections::org_members::ORG_MEMBERS;
use crate::collections::roles::ORG_ROLE_OWNER;
use crate::core::error::StoreError;
use crate::core::hooks::RecordEvent;
use crate::core::rules::{self, OrgScope};
use crate::core::schema::{CollectionSpec, FieldSpec, FieldType, IndexSpec, RuleSet};
use crate::core::store::{JsonMap, Store};
use serde_json::Value;
use tracing::warn;

pub const ORGANIZATIONS: &str = "organizations";

fn text(name: &str, required: bool) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Text {
            required,
            max: None,
            pattern: None,
        },
    )
}

pub fn spec() -> CollectionSpec {
    let mut spec = CollectionSpec::base(ORGANIZATIONS);
    spec.fields = vec![
        text("name", true),
        text("slug", true),
        FieldSpec::new("website", FieldType::Url),
        text("phone", false),
        text("address", false),
        text("city", false),
        FieldSpec::new(
            "state",
            FieldType::Text {
                required: false,
                max: Some(2),
                pattern: None,
            },
        ),
        text("zip_code", false),
    ];
    spec.indexes = vec![IndexSpec::new("idx_organizations_slug", true, &["slug"])];
    // Only the create rule is set here; it has no cross-collection
    // dependency.
    spec.rules.create = Some(rules::AUTH_PRESENT.to_string());
    spec
}

pub fn ensure(store: &Store) -> Result<(), StoreError> {
    store.ensure_collection(&spec())?;
    Ok(())
}

/// Membership-gated access rules; must run after `org_members` exists.
pub fn apply_access_rules(store: &Store) -> Result<(), StoreError> {
    let member = rules::all(&[rules::AUTH_PRESENT, &rules::membership_of(OrgScope::Itself)]);
    let admin = rules::all(&[&member, &rules::role_in(&["owner", "admin"])]);
    let owner = rules::all(&[&member, &rules::role_in(&["owner"])]);
    store.apply_rules(
        ORGANIZATIONS,
        &RuleSet {
            list: Some(member.clone()),
            view: Some(member),
            create: Some(rules::AUTH_PRESENT.to_string()),
            update: Some(admin),
            delete: Some(owner),
        },
    )?;
    Ok(())
}

/// Post-create cascade: the creating principal becomes the
/// organization's owner. Requires a request principal; internal saves
/// without one are skipped.
pub fn owner_membership(store: &Store, ev: &mut RecordEvent) -> Result<(), StoreError> {
    let Some(auth) = ev.auth else {
        warn!(
            organization = %ev.record.id,
            "organization created without a principal; skipping owner membership"
        );
        return Ok(());
    };
    let mut member = JsonMap::new();
    member.insert("user".to_string(), Value::String(auth.id.clone()));
    member.insert(
        "organization".to_string(),
        Value::String(ev.record.id.clone()),
    );
    member.insert("role".to_string(), Value::String(ORG_ROLE_OWNER.to_string()));
    store.save_record(ORG_MEMBERS, member)?;
    Ok(())
}
