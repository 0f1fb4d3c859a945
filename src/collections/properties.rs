//! Properties: org-owned records. Rules are membership-gated through
//! the owning organization and applied after `org_members` exists.

use crate::collections::organizations::ORGANIZATIONS;
use crate::core::error::StoreError;
use crate::core::rules::{self, OrgScope};
use crate::core::schema::{CollectionSpec, FieldSpec, FieldType, IndexSpec, RuleSet};
use crate::core::store::Store;

pub const PROPERTIES: &str = "properties";

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
    let mut spec = CollectionSpec::base(PROPERTIES);
    spec.fields = vec![
        FieldSpec::new(
            "organization",
            FieldType::Relation {
                target: ORGANIZATIONS.to_string(),
                required: true,
                max_select: 1,
                cascade_delete: true,
            },
        ),
        text("property_name", true),
        text("address", true),
        text("city", true),
        FieldSpec::new(
            "state",
            FieldType::Text {
                required: false,
                max: Some(2),
                pattern: None,
            },
        ),
        FieldSpec::new(
            "zip_code",
            FieldType::Text {
                required: false,
                max: None,
                pattern: Some(r"^\d{5}(-\d{4})?$".to_string()),
            },
        ),
        text("county", false),
        FieldSpec::new("year_built", FieldType::Number),
        FieldSpec::new("number_of_units", FieldType::Number),
        FieldSpec::new("building_sf", FieldType::Number),
        FieldSpec::new("lot_sf", FieldType::Number),
    ];
    spec.indexes = vec![IndexSpec::new("idx_properties_org", false, &["organization"])];
    spec
}

pub fn ensure(store: &Store) -> Result<(), StoreError> {
    store.ensure_collection(&spec())?;
    Ok(())
}

/// Must run after org_members exists.
pub fn apply_access_rules(store: &Store) -> Result<(), StoreError> {
    let member = rules::all(&[
        rules::AUTH_PRESENT,
        &rules::membership_of(OrgScope::Via("organization")),
    ]);
    let admin = rules::all(&[&member, &rules::role_in(&["owner", "admin"])]);
    store.apply_rules(
        PROPERTIES,
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
