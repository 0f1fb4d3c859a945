//! Per-user settings. One record per user, owner-scoped rules set at
//! creation time (they have no cross-collection dependency, so no
//! separate rule pass is needed).

use crate::core::error::StoreError;
use crate::core::schema::{CollectionSpec, FieldSpec, FieldType, IndexSpec, RuleSet};
use crate::core::store::{Store, USERS};

pub const SETTINGS: &str = "settings";

pub fn spec() -> CollectionSpec {
    let mut spec = CollectionSpec::base(SETTINGS);
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
        FieldSpec::new("email_notifications", FieldType::Bool),
        FieldSpec::new("sms_notifications", FieldType::Bool),
        FieldSpec::new(
            "theme",
            FieldType::Select {
                values: vec!["light".into(), "dark".into(), "system".into()],
                max_select: 1,
                required: false,
            },
        ),
        FieldSpec::new(
            "timezone",
            FieldType::Text {
                required: false,
                max: None,
                pattern: None,
            },
        ),
        FieldSpec::new("preferences", FieldType::Json),
    ];
    // One settings record per user.
    spec.indexes = vec![IndexSpec::new("idx_user_settings_user", true, &["user"])];

    // Only the owner (or a platform admin) can touch their settings.
    let owner_rule = "@request.auth.id = user || @request.auth.role = \"admin\"".to_string();
    spec.rules = RuleSet {
        list: Some(owner_rule.clone()),
        view: Some(owner_rule.clone()),
        create: Some(owner_rule.clone()),
        update: Some(owner_rule.clone()),
        delete: Some(owner_rule),
    };
    spec
}

pub fn ensure(store: &Store) -> Result<(), StoreError> {
    store.ensure_collection(&spec())?;
    Ok(())
}
