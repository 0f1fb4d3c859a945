//! The record store: collection provisioning, rule application, and
//! rule-gated record CRUD over a single SQLite database.
//!
//! Provisioning is idempotent and additive-only. `ensure_collection`
//! and `apply_rules` are safe to re-run on every process start; missing
//! dependencies defer instead of failing so a partially migrated store
//! never crashes the host.

use crate::core::db;
use crate::core::error::StoreError;
use crate::core::hooks::{HookDispatcher, HookEvent, RecordEvent};
use crate::core::registry::CollectionRegistry;
use crate::core::rules::{self, EvalContext};
use crate::core::schema::{
    self, Collection, CollectionKind, CollectionSpec, FieldSpec, FieldType, RuleOp, RuleSet,
};
use crate::core::time;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub type JsonMap = Map<String, Value>;

/// The system auth collection for platform administrators.
pub const SUPERUSERS: &str = "_superusers";
/// The system auth collection for end users.
pub const USERS: &str = "users";

const META_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS _collections (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        fields TEXT NOT NULL,
        indexes TEXT NOT NULL,
        list_rule TEXT,
        view_rule TEXT,
        create_rule TEXT,
        update_rule TEXT,
        delete_rule TEXT,
        options TEXT NOT NULL DEFAULT '{}',
        created TEXT NOT NULL,
        updated TEXT NOT NULL
    )
";

/// A record instance: system id and timestamps plus a field-name to
/// value mapping. Relation fields hold foreign ids, not embedded
/// copies.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub id: String,
    pub collection: String,
    pub created: String,
    pub updated: String,
    pub data: JsonMap,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn get_str(&self, field: &str) -> &str {
        self.data.get(field).and_then(Value::as_str).unwrap_or("")
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.data.insert(field.to_string(), value);
    }

    pub fn is_superuser(&self) -> bool {
        self.collection == SUPERUSERS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
    /// A required dependency is missing; nothing was mutated. The next
    /// startup pass retries.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    AlreadyConfigured,
    Deferred,
}

pub struct Store {
    db_path: PathBuf,
    write_lock: Mutex<()>,
    registry: CollectionRegistry,
    hooks: HookDispatcher,
}

impl Store {
    /// Open (or create) the store at `data_dir` and seed the system
    /// auth collections. Safe to call on every process start.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;
        let db_path = db::store_db_path(data_dir);
        let conn = db::db_connect(&db_path)?;
        conn.execute(META_TABLE_SQL, [])?;
        drop(conn);

        let store = Self {
            db_path,
            write_lock: Mutex::new(()),
            registry: CollectionRegistry::new(),
            hooks: HookDispatcher::new(),
        };
        store.ensure_collection(&users_seed_spec())?;
        store.ensure_collection(&superusers_seed_spec())?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn hooks_mut(&mut self) -> &mut HookDispatcher {
        &mut self.hooks
    }

    fn with_read<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError>,
    {
        let conn = db::db_connect(&self.db_path)?;
        f(&conn)
    }

    fn with_write<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Validation("store write lock poisoned".to_string()))?;
        let conn = db::db_connect(&self.db_path)?;
        f(&conn)
    }

    // ---- collection provisioning ----

    /// Create a collection with its fields and indexes exactly once.
    ///
    /// An existing collection is a strict no-op: fields, indexes and
    /// rules are never altered through this path. A missing dependency
    /// defers (logged, no mutation) rather than failing, because
    /// bootstrap runs on every startup and the dependency may resolve
    /// on a later pass.
    pub fn ensure_collection(&self, spec: &CollectionSpec) -> Result<EnsureOutcome, StoreError> {
        let mut names = Vec::new();
        for f in &spec.fields {
            if names.contains(&f.name.as_str()) {
                return Err(StoreError::Validation(format!(
                    "duplicate field {} in collection {}",
                    f.name, spec.name
                )));
            }
            names.push(f.name.as_str());
        }

        self.with_write(|conn| {
            if collection_exists(conn, &spec.name)? {
                return Ok(EnsureOutcome::AlreadyExists);
            }
            for dep in spec.required_collections() {
                if !collection_exists(conn, dep)? {
                    warn!(
                        collection = %spec.name,
                        dependency = dep,
                        "missing dependency; deferring collection provisioning"
                    );
                    return Ok(EnsureOutcome::Deferred);
                }
            }

            let now = time::now_epoch_z();
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO _collections
                   (id, name, kind, fields, indexes,
                    list_rule, view_rule, create_rule, update_rule, delete_rule,
                    options, created, updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, '{}', ?11, ?11)",
                params![
                    time::new_id(),
                    spec.name,
                    kind_str(spec.kind),
                    serde_json::to_string(&spec.fields)
                        .map_err(|e| StoreError::Validation(e.to_string()))?,
                    serde_json::to_string(&spec.indexes)
                        .map_err(|e| StoreError::Validation(e.to_string()))?,
                    spec.rules.list,
                    spec.rules.view,
                    spec.rules.create,
                    spec.rules.update,
                    spec.rules.delete,
                    now,
                ],
            )?;
            tx.execute(&spec.create_table_sql(), [])?;
            for idx in &spec.indexes {
                tx.execute(&idx.ddl(&spec.name), [])?;
            }
            tx.commit()?;
            info!(collection = %spec.name, "created collection");
            Ok(EnsureOutcome::Created)
        })
    }

    /// Additively extend an existing collection with fields it does not
    /// have yet. Existing fields are never altered. Missing collection
    /// defers.
    pub fn ensure_fields(&self, name: &str, fields: &[FieldSpec]) -> Result<bool, StoreError> {
        let Some(col) = self.find_collection(name)? else {
            warn!(collection = name, "collection not found; deferring field extension");
            return Ok(false);
        };
        let missing: Vec<&FieldSpec> = fields
            .iter()
            .filter(|f| col.field(&f.name).is_none())
            .collect();
        if missing.is_empty() {
            return Ok(false);
        }

        self.with_write(|conn| {
            let mut updated_fields = col.fields.clone();
            let tx = conn.unchecked_transaction()?;
            for f in &missing {
                tx.execute(
                    &format!("ALTER TABLE \"{}\" ADD COLUMN {}", name, f.column_ddl()),
                    [],
                )?;
                updated_fields.push((*f).clone());
            }
            tx.execute(
                "UPDATE _collections SET fields = ?1, updated = ?2 WHERE name = ?3",
                params![
                    serde_json::to_string(&updated_fields)
                        .map_err(|e| StoreError::Validation(e.to_string()))?,
                    time::now_epoch_z(),
                    name,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })?;
        self.registry.invalidate(name);
        info!(collection = name, added = missing.len(), "extended collection fields");
        Ok(true)
    }

    /// Attach the full rule set to a collection, exactly once.
    ///
    /// The idempotency guard tests whether the list rule is still
    /// unset: a collection configured with an intentionally permissive
    /// (empty) rule is distinguishable from one never configured. A
    /// non-null rule is never overwritten or reset by this path. All
    /// five slots are assigned in a single persisted update.
    pub fn apply_rules(&self, name: &str, rules: &RuleSet) -> Result<ApplyOutcome, StoreError> {
        let Some(col) = self.find_collection(name)? else {
            warn!(collection = name, "collection not found; deferring rule application");
            return Ok(ApplyOutcome::Deferred);
        };
        if col.rules.list.is_some() {
            return Ok(ApplyOutcome::AlreadyConfigured);
        }
        // A rule that references a collection which does not exist yet
        // would make every list/view fail at evaluation time. Leave the
        // slots unset so the next startup pass retries.
        for slot in [
            &rules.list,
            &rules.view,
            &rules.create,
            &rules.update,
            &rules.delete,
        ] {
            let Some(rule) = slot else { continue };
            for referenced in rules::referenced_collections(rule) {
                if self.find_collection(&referenced)?.is_none() {
                    warn!(
                        collection = name,
                        referenced = %referenced,
                        "rule references a missing collection; deferring rule application"
                    );
                    return Ok(ApplyOutcome::Deferred);
                }
            }
        }

        self.with_write(|conn| {
            conn.execute(
                "UPDATE _collections
                 SET list_rule = ?1, view_rule = ?2, create_rule = ?3,
                     update_rule = ?4, delete_rule = ?5, updated = ?6
                 WHERE name = ?7",
                params![
                    rules.list,
                    rules.view,
                    rules.create,
                    rules.update,
                    rules.delete,
                    time::now_epoch_z(),
                    name,
                ],
            )?;
            Ok(())
        })?;
        self.registry.invalidate(name);
        info!(collection = name, "applied access rules");
        Ok(ApplyOutcome::Applied)
    }

    /// Replace a collection's free-form options blob (e.g. OAuth2
    /// provider config).
    pub fn update_collection_options(&self, name: &str, options: Value) -> Result<(), StoreError> {
        if self.find_collection(name)?.is_none() {
            return Err(StoreError::NotFound(format!("collection {}", name)));
        }
        self.with_write(|conn| {
            conn.execute(
                "UPDATE _collections SET options = ?1, updated = ?2 WHERE name = ?3",
                params![options.to_string(), time::now_epoch_z(), name],
            )?;
            Ok(())
        })?;
        self.registry.invalidate(name);
        Ok(())
    }

    /// Resolve a collection handle through the registry cache.
    pub fn find_collection(&self, name: &str) -> Result<Option<Arc<Collection>>, StoreError> {
        self.registry
            .get_or_load(name, || self.with_read(|conn| load_collection(conn, name)))
    }

    pub fn list_collections(&self) -> Result<Vec<Collection>, StoreError> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM _collections ORDER BY created")?;
            let names: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            let mut out = Vec::with_capacity(names.len());
            for n in names {
                if let Some(c) = load_collection(conn, &n)? {
                    out.push(c);
                }
            }
            Ok(out)
        })
    }

    // ---- record operations (request path, rule-gated) ----

    /// Create a record on behalf of a principal: pre-create hooks run
    /// first (so defaults are visible to rule evaluation), then the
    /// create rule, validation, the insert, and finally best-effort
    /// post-create hooks.
    pub fn create_record(
        &self,
        collection: &str,
        auth: Option<&Record>,
        data: JsonMap,
    ) -> Result<Record, StoreError> {
        let col = self.require_collection(collection)?;
        let mut record = self.new_record(collection, data);

        let mut ev = RecordEvent {
            record: &mut record,
            auth,
        };
        self.hooks.dispatch(self, HookEvent::PreCreate, collection, &mut ev)?;

        self.check_rule(&col, RuleOp::Create, auth, &record)?;
        self.with_write(|conn| {
            validate_record(conn, &col, &record.data)?;
            insert_record(conn, &col, &record, None)
        })?;

        let mut ev = RecordEvent {
            record: &mut record,
            auth,
        };
        self.hooks.dispatch(self, HookEvent::PostCreate, collection, &mut ev)?;
        Ok(record)
    }

    /// Internal save used by cascades and bootstrap seeding: no rule
    /// check and no request-level pre-hooks, but post-create hooks
    /// still fire.
    pub fn save_record(&self, collection: &str, data: JsonMap) -> Result<Record, StoreError> {
        let col = self.require_collection(collection)?;
        let mut record = self.new_record(collection, data);
        self.with_write(|conn| {
            validate_record(conn, &col, &record.data)?;
            insert_record(conn, &col, &record, None)
        })?;
        let mut ev = RecordEvent {
            record: &mut record,
            auth: None,
        };
        self.hooks.dispatch(self, HookEvent::PostCreate, collection, &mut ev)?;
        Ok(record)
    }

    pub fn list_records(
        &self,
        collection: &str,
        auth: Option<&Record>,
    ) -> Result<Vec<Record>, StoreError> {
        let col = self.require_collection(collection)?;
        let all = self.find_all_records(collection)?;
        if is_superuser(auth) {
            return Ok(all);
        }
        let Some(rule) = col.rule(RuleOp::List) else {
            return Err(StoreError::Unauthorized(format!(
                "listing {} requires superuser",
                collection
            )));
        };
        let mut visible = Vec::new();
        for record in all {
            if self.eval_rule(rule, auth, &record)? {
                visible.push(record);
            }
        }
        Ok(visible)
    }

    pub fn get_record(
        &self,
        collection: &str,
        auth: Option<&Record>,
        id: &str,
    ) -> Result<Record, StoreError> {
        let col = self.require_collection(collection)?;
        let record = self
            .find_record(collection, id)?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
        self.check_rule(&col, RuleOp::View, auth, &record)?;
        Ok(record)
    }

    pub fn update_record(
        &self,
        collection: &str,
        auth: Option<&Record>,
        id: &str,
        patch: JsonMap,
    ) -> Result<Record, StoreError> {
        let col = self.require_collection(collection)?;
        let mut record = self
            .find_record(collection, id)?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
        self.check_rule(&col, RuleOp::Update, auth, &record)?;

        for (k, v) in patch {
            record.data.insert(k, v);
        }
        record.updated = time::now_epoch_z();
        self.with_write(|conn| {
            validate_record(conn, &col, &record.data)?;
            update_row(conn, &col, &record)
        })?;
        Ok(record)
    }

    pub fn delete_record(
        &self,
        collection: &str,
        auth: Option<&Record>,
        id: &str,
    ) -> Result<(), StoreError> {
        let col = self.require_collection(collection)?;
        let record = self
            .find_record(collection, id)?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
        self.check_rule(&col, RuleOp::Delete, auth, &record)?;
        self.with_write(|conn| {
            conn.execute(
                &format!("DELETE FROM \"{}\" WHERE id = ?1", collection),
                params![record.id],
            )?;
            Ok(())
        })
    }

    // ---- internal record access (no rule checks) ----

    pub fn find_record(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let col = self.require_collection(collection)?;
        self.with_read(|conn| {
            let sql = format!("{} WHERE id = ?1", select_sql(&col));
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_row(params![id], |row| row_to_record(&col, row))
                .optional()
                .map_err(StoreError::from)
        })
    }

    pub fn find_all_records(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let col = self.require_collection(collection)?;
        self.with_read(|conn| {
            let sql = format!("{} ORDER BY created", select_sql(&col));
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row_to_record(&col, row))?;
            rows.collect::<Result<_, _>>().map_err(StoreError::from)
        })
    }

    // ---- auth records ----

    /// Rule-gated registration into an auth collection; runs the full
    /// request path so pre-create defaulting and post-create cascades
    /// fire.
    pub fn register(
        &self,
        collection: &str,
        auth: Option<&Record>,
        email: &str,
        password: &str,
        extra: JsonMap,
    ) -> Result<Record, StoreError> {
        let col = self.require_collection(collection)?;
        if !col.is_auth() {
            return Err(StoreError::Validation(format!(
                "{} is not an auth collection",
                collection
            )));
        }
        let mut data = extra;
        data.insert("email".to_string(), Value::String(email.to_string()));
        let mut record = self.new_record(collection, data);

        let mut ev = RecordEvent {
            record: &mut record,
            auth,
        };
        self.hooks.dispatch(self, HookEvent::PreCreate, collection, &mut ev)?;
        self.check_rule(&col, RuleOp::Create, auth, &record)?;

        let hash = hash_password(password);
        self.with_write(|conn| {
            validate_record(conn, &col, &record.data)?;
            insert_record(conn, &col, &record, Some(&hash))
        })?;

        let mut ev = RecordEvent {
            record: &mut record,
            auth,
        };
        self.hooks.dispatch(self, HookEvent::PostCreate, collection, &mut ev)?;
        Ok(record)
    }

    /// Internal auth-record creation (bootstrap admin seeding). Skips
    /// rules and pre-hooks; post-create hooks still fire.
    pub fn create_auth_record(
        &self,
        collection: &str,
        email: &str,
        password: &str,
        extra: JsonMap,
    ) -> Result<Record, StoreError> {
        let col = self.require_collection(collection)?;
        if !col.is_auth() {
            return Err(StoreError::Validation(format!(
                "{} is not an auth collection",
                collection
            )));
        }
        let mut data = extra;
        data.insert("email".to_string(), Value::String(email.to_string()));
        let mut record = self.new_record(collection, data);
        let hash = hash_password(password);
        self.with_write(|conn| {
            validate_record(conn, &col, &record.data)?;
            insert_record(conn, &col, &record, Some(&hash))
        })?;
        let mut ev = RecordEvent {
            record: &mut record,
            auth: None,
        };
        self.hooks.dispatch(self, HookEvent::PostCreate, collection, &mut ev)?;
        Ok(record)
    }

    /// Verify an email/password pair against an auth collection.
    pub fn authenticate(
        &self,
        collection: &str,
        email: &str,
        password: &str,
    ) -> Result<Record, StoreError> {
        let col = self.require_collection(collection)?;
        if !col.is_auth() {
            return Err(StoreError::Validation(format!(
                "{} is not an auth collection",
                collection
            )));
        }
        let denied = || StoreError::Unauthorized("invalid credentials".to_string());
        let (id, hash): (String, Option<String>) = self.with_read(|conn| {
            conn.query_row(
                &format!(
                    "SELECT id, password_hash FROM \"{}\" WHERE email = ?1",
                    collection
                ),
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(StoreError::from)?
            .ok_or_else(denied)
        })?;
        if !verify_password(hash.as_deref().unwrap_or(""), password) {
            return Err(denied());
        }
        self.find_record(collection, &id)?.ok_or_else(denied)
    }

    // ---- rule evaluation ----

    /// Authorize `op` on `record` for `auth`. Superusers bypass rules;
    /// a null rule slot is superuser-only.
    pub fn check_rule(
        &self,
        col: &Collection,
        op: RuleOp,
        auth: Option<&Record>,
        record: &Record,
    ) -> Result<(), StoreError> {
        if is_superuser(auth) {
            return Ok(());
        }
        let Some(rule) = col.rule(op) else {
            return Err(StoreError::Unauthorized(format!(
                "operation on {} requires superuser",
                col.name
            )));
        };
        if self.eval_rule(rule, auth, record)? {
            Ok(())
        } else {
            Err(StoreError::Unauthorized(format!(
                "access rule rejected the request on {}",
                col.name
            )))
        }
    }

    fn eval_rule(
        &self,
        rule: &str,
        auth: Option<&Record>,
        record: &Record,
    ) -> Result<bool, StoreError> {
        let ctx = EvalContext { auth, record };
        rules::evaluate(rule, &ctx, |name| self.find_all_records(name))
    }

    fn require_collection(&self, name: &str) -> Result<Arc<Collection>, StoreError> {
        self.find_collection(name)?
            .ok_or_else(|| StoreError::NotFound(format!("collection {}", name)))
    }

    fn new_record(&self, collection: &str, data: JsonMap) -> Record {
        let now = time::now_epoch_z();
        Record {
            id: time::new_id(),
            collection: collection.to_string(),
            created: now.clone(),
            updated: now,
            data,
        }
    }
}

fn is_superuser(auth: Option<&Record>) -> bool {
    auth.is_some_and(Record::is_superuser)
}

fn kind_str(kind: CollectionKind) -> &'static str {
    match kind {
        CollectionKind::Base => "base",
        CollectionKind::Auth => "auth",
    }
}

fn collection_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM _collections WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

fn load_collection(conn: &Connection, name: &str) -> Result<Option<Collection>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, name, kind, fields, indexes,
                    list_rule, view_rule, create_rule, update_rule, delete_rule, options
             FROM _collections WHERE name = ?1",
            params![name],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, Option<String>>(9)?,
                    row.get::<_, String>(10)?,
                ))
            },
        )
        .optional()?;
    let Some((id, name, kind, fields, indexes, list, view, create, update, delete, options)) = row
    else {
        return Ok(None);
    };
    let parse = |what: &str, e: serde_json::Error| {
        StoreError::Validation(format!("corrupt {} metadata on {}: {}", what, name, e))
    };
    Ok(Some(Collection {
        id,
        kind: if kind == "auth" {
            CollectionKind::Auth
        } else {
            CollectionKind::Base
        },
        fields: serde_json::from_str(&fields).map_err(|e| parse("field", e))?,
        indexes: serde_json::from_str(&indexes).map_err(|e| parse("index", e))?,
        rules: RuleSet {
            list,
            view,
            create,
            update,
            delete,
        },
        options: serde_json::from_str(&options).unwrap_or(Value::Null),
        name,
    }))
}

fn validate_record(conn: &Connection, col: &Collection, data: &JsonMap) -> Result<(), StoreError> {
    for key in data.keys() {
        let known = col.field(key).is_some()
            || (col.is_auth() && schema::AUTH_SYSTEM_COLUMNS.contains(&key.as_str()));
        if !known {
            return Err(StoreError::Validation(format!(
                "unknown field {} on {}",
                key, col.name
            )));
        }
    }
    for field in &col.fields {
        let value = data.get(&field.name);
        let empty = value.map(schema::is_empty_value).unwrap_or(true);
        if field.field_type.is_required() && empty {
            return Err(StoreError::Validation(format!(
                "field {} is required on {}",
                field.name, col.name
            )));
        }
        let Some(value) = value else { continue };
        if value.is_null() {
            continue;
        }
        schema::validate_value(field, value)?;
        if let FieldType::Relation { target, .. } = &field.field_type
            && let Some(id) = value.as_str()
            && !id.is_empty()
        {
            let exists: Option<i64> = conn
                .query_row(
                    &format!("SELECT 1 FROM \"{}\" WHERE id = ?1", target),
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::Validation(format!(
                    "field {} references missing {} record {}",
                    field.name, target, id
                )));
            }
        }
    }
    Ok(())
}

fn insert_record(
    conn: &Connection,
    col: &Collection,
    record: &Record,
    password_hash: Option<&str>,
) -> Result<(), StoreError> {
    let mut columns: Vec<String> = vec!["id".into(), "created".into(), "updated".into()];
    let mut values: Vec<SqlValue> = vec![
        SqlValue::Text(record.id.clone()),
        SqlValue::Text(record.created.clone()),
        SqlValue::Text(record.updated.clone()),
    ];
    if col.is_auth() {
        columns.push("email".into());
        values.push(match record.data.get("email") {
            Some(Value::String(s)) => SqlValue::Text(s.clone()),
            _ => SqlValue::Null,
        });
        columns.push("password_hash".into());
        values.push(match password_hash {
            Some(h) => SqlValue::Text(h.to_string()),
            None => SqlValue::Null,
        });
    }
    for field in &col.fields {
        if let Some(value) = record.data.get(&field.name) {
            columns.push(format!("\"{}\"", field.name));
            values.push(json_to_sql(&field.field_type, value));
        }
    }
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        col.name,
        columns.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, rusqlite::params_from_iter(values))
        .map_err(map_constraint)?;
    Ok(())
}

fn update_row(conn: &Connection, col: &Collection, record: &Record) -> Result<(), StoreError> {
    let mut sets: Vec<String> = vec!["updated = ?1".into()];
    let mut values: Vec<SqlValue> = vec![SqlValue::Text(record.updated.clone())];
    for field in &col.fields {
        if let Some(value) = record.data.get(&field.name) {
            values.push(json_to_sql(&field.field_type, value));
            sets.push(format!("\"{}\" = ?{}", field.name, values.len()));
        }
    }
    values.push(SqlValue::Text(record.id.clone()));
    let sql = format!(
        "UPDATE \"{}\" SET {} WHERE id = ?{}",
        col.name,
        sets.join(", "),
        values.len()
    );
    conn.execute(&sql, rusqlite::params_from_iter(values))
        .map_err(map_constraint)?;
    Ok(())
}

/// Map SQLite constraint violations onto the store taxonomy. Unique
/// index violations are the concurrency-correctness mechanism for
/// one-per-pair invariants, so they get their own variant.
fn map_constraint(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, ref msg) = err
        && code.code == rusqlite::ErrorCode::ConstraintViolation
    {
        let text = msg.clone().unwrap_or_else(|| code.to_string());
        if text.contains("UNIQUE") {
            return StoreError::Duplicate(text);
        }
        return StoreError::Validation(text);
    }
    StoreError::Sqlite(err)
}

fn select_sql(col: &Collection) -> String {
    let mut columns: Vec<String> = vec!["id".into(), "created".into(), "updated".into()];
    if col.is_auth() {
        columns.push("email".into());
    }
    for field in &col.fields {
        columns.push(format!("\"{}\"", field.name));
    }
    format!("SELECT {} FROM \"{}\"", columns.join(", "), col.name)
}

fn row_to_record(col: &Collection, row: &rusqlite::Row) -> Result<Record, rusqlite::Error> {
    let mut idx = 0;
    let mut next = |_: &str| {
        let i = idx;
        idx += 1;
        i
    };
    let id: String = row.get(next("id"))?;
    let created: String = row.get(next("created"))?;
    let updated: String = row.get(next("updated"))?;
    let mut data = JsonMap::new();
    if col.is_auth() {
        let email: Option<String> = row.get(next("email"))?;
        if let Some(email) = email {
            data.insert("email".to_string(), Value::String(email));
        }
    }
    for field in &col.fields {
        let raw: SqlValue = row.get(next(&field.name))?;
        let value = sql_to_json(&field.field_type, raw);
        if !value.is_null() {
            data.insert(field.name.clone(), value);
        }
    }
    Ok(Record {
        id,
        collection: col.name.clone(),
        created,
        updated,
        data,
    })
}

fn json_to_sql(field_type: &FieldType, value: &Value) -> SqlValue {
    match (field_type, value) {
        (_, Value::Null) => SqlValue::Null,
        (FieldType::Number, v) => v.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        (FieldType::Bool, v) => SqlValue::Integer(i64::from(v.as_bool().unwrap_or(false))),
        (FieldType::Json, v) => SqlValue::Text(v.to_string()),
        (FieldType::Select { .. }, Value::Array(_)) => SqlValue::Text(value.to_string()),
        (_, Value::String(s)) => SqlValue::Text(s.clone()),
        (_, v) => SqlValue::Text(v.to_string()),
    }
}

fn sql_to_json(field_type: &FieldType, raw: SqlValue) -> Value {
    match (field_type, raw) {
        (_, SqlValue::Null) => Value::Null,
        (FieldType::Bool, SqlValue::Integer(i)) => Value::Bool(i != 0),
        (FieldType::Number, SqlValue::Real(f)) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        (FieldType::Number, SqlValue::Integer(i)) => Value::Number(i.into()),
        (FieldType::Json, SqlValue::Text(s)) => {
            serde_json::from_str(&s).unwrap_or(Value::String(s))
        }
        (FieldType::Select { .. }, SqlValue::Text(s)) if s.starts_with('[') => {
            serde_json::from_str(&s).unwrap_or(Value::String(s))
        }
        (_, SqlValue::Text(s)) => Value::String(s),
        (_, SqlValue::Integer(i)) => Value::Number(i.into()),
        (_, SqlValue::Real(f)) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        (_, SqlValue::Blob(_)) => Value::Null,
    }
}

fn hash_password(password: &str) -> String {
    let salt = time::new_id();
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("s1${}${:x}", salt, hasher.finalize())
}

fn verify_password(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some("s1"), Some(salt), Some(digest)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize()) == digest
}

fn users_seed_spec() -> CollectionSpec {
    let mut spec = CollectionSpec::auth(USERS);
    spec.fields.push(FieldSpec::new(
        "name",
        FieldType::Text {
            required: false,
            max: None,
            pattern: None,
        },
    ));
    // Owner-scoped defaults; open self-registration. The bootstrap
    // passes extend the field list but never touch these rules.
    spec.rules = RuleSet {
        list: Some("id = @request.auth.id".to_string()),
        view: Some("id = @request.auth.id".to_string()),
        create: Some(String::new()),
        update: Some("id = @request.auth.id".to_string()),
        delete: None,
    };
    spec
}

fn superusers_seed_spec() -> CollectionSpec {
    // Locked on every slot: only superusers manage superusers.
    CollectionSpec::auth(SUPERUSERS)
}
