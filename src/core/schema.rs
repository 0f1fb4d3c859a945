//! Schema value types: collections, fields, indexes, and rule sets.
//!
//! These are the serde-round-trippable specs persisted in the
//! `_collections` meta table, plus the DDL rendering that maps them onto
//! SQLite tables. The schema is additive-only: nothing here removes or
//! retypes an existing field, and a rule slot that is already set is
//! never overwritten by the provisioning path.

use crate::core::error::StoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collection discriminator. Auth collections carry system `email` and
/// `password_hash` columns and act as principal sources for rule
/// evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Base,
    Auth,
}

/// Typed field variants, mirroring the record store's field vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Text {
        #[serde(default)]
        required: bool,
        #[serde(default)]
        max: Option<usize>,
        #[serde(default)]
        pattern: Option<String>,
    },
    Number,
    Bool,
    Url,
    Select {
        values: Vec<String>,
        #[serde(default = "default_max_select")]
        max_select: u32,
        #[serde(default)]
        required: bool,
    },
    Relation {
        target: String,
        #[serde(default)]
        required: bool,
        #[serde(default = "default_max_select")]
        max_select: u32,
        #[serde(default)]
        cascade_delete: bool,
    },
    Json,
}

fn default_max_select() -> u32 {
    1
}

impl FieldType {
    /// SQLite column affinity for this field.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Number => "REAL",
            FieldType::Bool => "INTEGER",
            _ => "TEXT",
        }
    }

    pub fn is_required(&self) -> bool {
        match self {
            FieldType::Text { required, .. }
            | FieldType::Select { required, .. }
            | FieldType::Relation { required, .. } => *required,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
}

impl FieldSpec {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
        }
    }

    /// Column clause for CREATE TABLE / ALTER TABLE ADD COLUMN.
    pub fn column_ddl(&self) -> String {
        match &self.field_type {
            FieldType::Relation {
                target,
                cascade_delete,
                ..
            } => {
                let action = if *cascade_delete {
                    " ON DELETE CASCADE"
                } else {
                    ""
                };
                format!(
                    "\"{}\" TEXT REFERENCES \"{}\"(id){}",
                    self.name, target, action
                )
            }
            other => format!("\"{}\" {}", self.name, other.sql_type()),
        }
    }
}

/// A named uniqueness/ordering constraint over one or more columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

impl IndexSpec {
    pub fn new(name: &str, unique: bool, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            unique,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn ddl(&self, table: &str) -> String {
        let cols = self
            .columns
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE {}INDEX IF NOT EXISTS \"{}\" ON \"{}\" ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            table,
            cols
        )
    }
}

/// The five per-collection authorization rule slots.
///
/// `None` means locked (superuser-only); `Some("")` means public. The
/// distinction matters for the apply-rules idempotency guard, which
/// tests whether the list slot is still unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub list: Option<String>,
    pub view: Option<String>,
    pub create: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
}

/// Operation selector into a [`RuleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOp {
    List,
    View,
    Create,
    Update,
    Delete,
}

impl RuleSet {
    pub fn get(&self, op: RuleOp) -> Option<&str> {
        match op {
            RuleOp::List => self.list.as_deref(),
            RuleOp::View => self.view.as_deref(),
            RuleOp::Create => self.create.as_deref(),
            RuleOp::Update => self.update.as_deref(),
            RuleOp::Delete => self.delete.as_deref(),
        }
    }
}

/// Provisioning spec handed to `Store::ensure_collection`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub kind: CollectionKind,
    pub fields: Vec<FieldSpec>,
    pub indexes: Vec<IndexSpec>,
    /// Rules assigned at creation time (rules with cross-collection
    /// dependencies are applied later by a separate pass).
    pub rules: RuleSet,
    /// Referenced collection names that must exist before this one is
    /// created. Relation targets are implied and need not be repeated.
    pub dependencies: Vec<String>,
}

impl CollectionSpec {
    pub fn base(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: CollectionKind::Base,
            fields: Vec::new(),
            indexes: Vec::new(),
            rules: RuleSet::default(),
            dependencies: Vec::new(),
        }
    }

    pub fn auth(name: &str) -> Self {
        Self {
            kind: CollectionKind::Auth,
            ..Self::base(name)
        }
    }

    /// All collections this spec depends on: declared dependencies plus
    /// relation targets.
    pub fn required_collections(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = self.dependencies.iter().map(String::as_str).collect();
        for f in &self.fields {
            if let FieldType::Relation { target, .. } = &f.field_type
                && !deps.contains(&target.as_str())
            {
                deps.push(target);
            }
        }
        deps
    }

    pub fn create_table_sql(&self) -> String {
        let mut cols = vec![
            "id TEXT PRIMARY KEY".to_string(),
            "created TEXT NOT NULL".to_string(),
            "updated TEXT NOT NULL".to_string(),
        ];
        if self.kind == CollectionKind::Auth {
            cols.push("email TEXT UNIQUE".to_string());
            cols.push("password_hash TEXT".to_string());
        }
        for f in &self.fields {
            cols.push(f.column_ddl());
        }
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
            self.name,
            cols.join(", ")
        )
    }
}

/// A resolved collection handle, as cached by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub kind: CollectionKind,
    pub fields: Vec<FieldSpec>,
    pub indexes: Vec<IndexSpec>,
    pub rules: RuleSet,
    /// Free-form collection options (e.g. OAuth2 provider config on
    /// auth collections).
    pub options: Value,
}

impl Collection {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_auth(&self) -> bool {
        self.kind == CollectionKind::Auth
    }

    pub fn rule(&self, op: RuleOp) -> Option<&str> {
        self.rules.get(op)
    }
}

/// System columns that exist on every auth collection and are settable
/// through the auth-record path rather than the field list.
pub const AUTH_SYSTEM_COLUMNS: &[&str] = &["email", "password_hash"];

/// Validate a single field value against its spec. Relation existence
/// is checked separately by the store (it needs a connection).
pub fn validate_value(field: &FieldSpec, value: &Value) -> Result<(), StoreError> {
    let fail = |msg: String| Err(StoreError::Validation(msg));
    match &field.field_type {
        FieldType::Text { max, pattern, .. } => {
            let Some(s) = value.as_str() else {
                return fail(format!("field {} must be a string", field.name));
            };
            if let Some(max) = max
                && s.chars().count() > *max
            {
                return fail(format!("field {} exceeds max length {}", field.name, max));
            }
            if let Some(p) = pattern
                && !s.is_empty()
            {
                let re = Regex::new(p)
                    .map_err(|e| StoreError::Validation(format!("bad pattern on {}: {}", field.name, e)))?;
                if !re.is_match(s) {
                    return fail(format!("field {} does not match pattern", field.name));
                }
            }
            Ok(())
        }
        FieldType::Number => {
            if value.is_number() {
                Ok(())
            } else {
                fail(format!("field {} must be a number", field.name))
            }
        }
        FieldType::Bool => {
            if value.is_boolean() {
                Ok(())
            } else {
                fail(format!("field {} must be a boolean", field.name))
            }
        }
        FieldType::Url => {
            let Some(s) = value.as_str() else {
                return fail(format!("field {} must be a string", field.name));
            };
            if s.is_empty() || s.starts_with("http://") || s.starts_with("https://") {
                Ok(())
            } else {
                fail(format!("field {} must be an http(s) URL", field.name))
            }
        }
        FieldType::Select {
            values, max_select, ..
        } => {
            let selected: Vec<&str> = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items
                    .iter()
                    .map(|v| v.as_str().unwrap_or_default())
                    .collect(),
                _ => return fail(format!("field {} must be a select value", field.name)),
            };
            if selected.len() > *max_select as usize {
                return fail(format!(
                    "field {} allows at most {} selections",
                    field.name, max_select
                ));
            }
            for s in selected {
                if !s.is_empty() && !values.iter().any(|v| v == s) {
                    return fail(format!("field {}: value {:?} not allowed", field.name, s));
                }
            }
            Ok(())
        }
        FieldType::Relation { .. } => {
            if value.is_string() {
                Ok(())
            } else {
                fail(format!("field {} must be a record id", field.name))
            }
        }
        FieldType::Json => Ok(()),
    }
}

/// True when a value counts as "unset" for required-field checks.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_field(pattern: Option<&str>, max: Option<usize>) -> FieldSpec {
        FieldSpec::new(
            "t",
            FieldType::Text {
                required: false,
                max,
                pattern: pattern.map(String::from),
            },
        )
    }

    #[test]
    fn text_pattern_and_max_are_enforced() {
        let phone = text_field(Some(r"^\+?[1-9]\d{1,14}$"), None);
        assert!(validate_value(&phone, &json!("+14155550132")).is_ok());
        assert!(validate_value(&phone, &json!("not-a-phone")).is_err());

        let state = text_field(None, Some(2));
        assert!(validate_value(&state, &json!("CA")).is_ok());
        assert!(validate_value(&state, &json!("CAL")).is_err());
    }

    #[test]
    fn select_rejects_values_outside_the_set() {
        let role = FieldSpec::new(
            "role",
            FieldType::Select {
                values: vec!["owner".into(), "admin".into(), "member".into()],
                max_select: 1,
                required: true,
            },
        );
        assert!(validate_value(&role, &json!("owner")).is_ok());
        assert!(validate_value(&role, &json!("superuser")).is_err());
        assert!(validate_value(&role, &json!(["owner", "admin"])).is_err());
    }

    #[test]
    fn relation_ddl_carries_cascade_clause() {
        let f = FieldSpec::new(
            "organization",
            FieldType::Relation {
                target: "organizations".into(),
                required: true,
                max_select: 1,
                cascade_delete: true,
            },
        );
        assert_eq!(
            f.column_ddl(),
            "\"organization\" TEXT REFERENCES \"organizations\"(id) ON DELETE CASCADE"
        );
    }

    #[test]
    fn required_collections_include_relation_targets() {
        let mut spec = CollectionSpec::base("org_members");
        spec.dependencies.push("users".into());
        spec.fields.push(FieldSpec::new(
            "organization",
            FieldType::Relation {
                target: "organizations".into(),
                required: true,
                max_select: 1,
                cascade_delete: true,
            },
        ));
        let deps = spec.required_collections();
        assert_eq!(deps, vec!["users", "organizations"]);
    }

    #[test]
    fn field_spec_round_trips_through_json() {
        let spec = FieldSpec::new(
            "theme",
            FieldType::Select {
                values: vec!["light".into(), "dark".into(), "system".into()],
                max_select: 1,
                required: false,
            },
        );
        let encoded = serde_json::to_string(&spec).unwrap();
        let decoded: FieldSpec = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, spec);
    }
}
