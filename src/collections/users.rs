//! Extensions to the seeded users auth collection, plus its hooks:
//! platform-role defaulting before create and the settings cascade
//! after.

use crate::collections::roles::{ALL_PLATFORM_ROLES, ROLE_USER, string_values};
use crate::collections::settings::SETTINGS;
use crate::core::error::StoreError;
use crate::core::hooks::RecordEvent;
use crate::core::schema::{FieldSpec, FieldType};
use crate::core::store::{JsonMap, Store, USERS};
use serde_json::Value;

pub fn extra_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(
            "phone",
            FieldType::Text {
                required: true,
                max: None,
                pattern: Some(r"^\+?[1-9]\d{1,14}$".to_string()),
            },
        ),
        FieldSpec::new(
            "role",
            FieldType::Select {
                values: string_values(ALL_PLATFORM_ROLES),
                max_select: 1,
                required: true,
            },
        ),
    ]
}

/// Add the custom user fields if they are not there yet; existing
/// fields are left untouched.
pub fn ensure_fields(store: &Store) -> Result<(), StoreError> {
    store.ensure_fields(USERS, &extra_fields())?;
    Ok(())
}

/// Pre-create: default the platform role on signup so it is visible to
/// rule evaluation and validation.
pub fn default_role(_store: &Store, ev: &mut RecordEvent) -> Result<(), StoreError> {
    if ev.record.get_str("role").is_empty() {
        ev.record.set("role", Value::String(ROLE_USER.to_string()));
    }
    Ok(())
}

/// Post-create: every user gets exactly one settings record with the
/// platform defaults.
pub fn settings_cascade(store: &Store, ev: &mut RecordEvent) -> Result<(), StoreError> {
    let mut settings = JsonMap::new();
    settings.insert("user".to_string(), Value::String(ev.record.id.clone()));
    settings.insert("email_notifications".to_string(), Value::Bool(true));
    settings.insert("sms_notifications".to_string(), Value::Bool(false));
    settings.insert("theme".to_string(), Value::String("system".to_string()));
    store.save_record(SETTINGS, settings)?;
    Ok(())
}
