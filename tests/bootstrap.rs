//! Bootstrap properties: idempotent provisioning, ordering deferral,
//! and the apply-rules guard.

use tempfile::TempDir;
use warren::collections::{org_members, organizations, properties, settings};
use warren::core::config::Config;
use warren::core::schema::RuleSet;
use warren::core::store::{ApplyOutcome, EnsureOutcome, Store, USERS};

fn test_config(tmp: &TempDir) -> Config {
    Config {
        data_dir: tmp.path().to_path_buf(),
        ..Config::default()
    }
}

#[test]
fn full_startup_provisions_every_collection_with_rules() {
    let tmp = TempDir::new().expect("tempdir");
    let store = warren::startup(&test_config(&tmp)).expect("startup");

    for name in [
        "users",
        "_superusers",
        "organizations",
        "org_members",
        "settings",
        "properties",
    ] {
        assert!(
            store.find_collection(name).unwrap().is_some(),
            "collection {name} should exist after bootstrap"
        );
    }

    let orgs = store.find_collection("organizations").unwrap().unwrap();
    assert_eq!(
        orgs.rules.list.as_deref(),
        Some(
            "@request.auth.id != '' && @request.auth.id ?= @collection.org_members.user && id ?= @collection.org_members.organization"
        )
    );
    assert_eq!(
        orgs.rules.delete.as_deref(),
        Some(
            "@request.auth.id != '' && @request.auth.id ?= @collection.org_members.user && id ?= @collection.org_members.organization && @collection.org_members.role = 'owner'"
        )
    );

    let props = store.find_collection("properties").unwrap().unwrap();
    assert_eq!(
        props.rules.create.as_deref(),
        Some(
            "@request.auth.id != '' && organization.id ?= @collection.org_members.organization && @request.auth.id ?= @collection.org_members.user && (@collection.org_members.role = 'owner' || @collection.org_members.role = 'admin')"
        )
    );
}

#[test]
fn ensure_collection_twice_is_a_no_op() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Store::open(tmp.path()).expect("open");

    let first = store.ensure_collection(&organizations::spec()).unwrap();
    assert_eq!(first, EnsureOutcome::Created);

    let second = store.ensure_collection(&organizations::spec()).unwrap();
    assert_eq!(second, EnsureOutcome::AlreadyExists);

    let col = store.find_collection("organizations").unwrap().unwrap();
    assert_eq!(col.fields.len(), organizations::spec().fields.len());
    assert_eq!(col.indexes.len(), 1);
}

#[test]
fn startup_is_repeatable_on_a_migrated_store() {
    let tmp = TempDir::new().expect("tempdir");
    let cfg = test_config(&tmp);
    let first = warren::startup(&cfg).expect("first startup");
    let before = first.list_collections().unwrap();
    drop(first);

    let second = warren::startup(&cfg).expect("second startup");
    let after = second.list_collections().unwrap();

    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.fields, b.fields);
        assert_eq!(a.rules, b.rules);
        // No mutation happened on the second pass.
        assert_eq!(a.id, b.id);
    }
}

#[test]
fn join_collection_defers_until_its_targets_exist() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Store::open(tmp.path()).expect("open");

    // organizations does not exist yet: deferral, not a crash, and no
    // partial schema.
    let outcome = store.ensure_collection(&org_members::spec()).unwrap();
    assert_eq!(outcome, EnsureOutcome::Deferred);
    assert!(store.find_collection("org_members").unwrap().is_none());

    // The next pass, with the dependency in place, succeeds.
    store.ensure_collection(&organizations::spec()).unwrap();
    let outcome = store.ensure_collection(&org_members::spec()).unwrap();
    assert_eq!(outcome, EnsureOutcome::Created);
}

#[test]
fn rule_pass_defers_on_a_missing_collection() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Store::open(tmp.path()).expect("open");
    assert!(properties::apply_access_rules(&store).is_ok());
    assert!(store.find_collection("properties").unwrap().is_none());
}

#[test]
fn rule_pass_defers_while_a_referenced_collection_is_missing() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Store::open(tmp.path()).expect("open");
    store.ensure_collection(&organizations::spec()).unwrap();

    // The membership rules reference org_members, which does not exist
    // yet (its ensure step may have failed this startup). The rules
    // must stay unset so evaluation never hits a missing collection.
    assert!(organizations::apply_access_rules(&store).is_ok());
    let col = store.find_collection("organizations").unwrap().unwrap();
    assert_eq!(col.rules.list, None);

    // The next pass, with the join collection in place, applies them.
    store.ensure_collection(&org_members::spec()).unwrap();
    assert!(organizations::apply_access_rules(&store).is_ok());
    let col = store.find_collection("organizations").unwrap().unwrap();
    assert!(col.rules.list.is_some());
}

#[test]
fn apply_rules_never_overwrites_a_configured_list_rule() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Store::open(tmp.path()).expect("open");
    store.ensure_collection(&organizations::spec()).unwrap();
    store.ensure_collection(&org_members::spec()).unwrap();

    let custom = RuleSet {
        list: Some("@request.auth.id != ''".to_string()),
        view: Some("@request.auth.id != ''".to_string()),
        create: None,
        update: None,
        delete: None,
    };
    assert_eq!(
        store.apply_rules("org_members", &custom).unwrap(),
        ApplyOutcome::Applied
    );

    // The standard rule pass must not clobber the operator's choice,
    // no matter how many times it runs.
    for _ in 0..3 {
        assert!(org_members::apply_access_rules(&store).is_ok());
    }
    let col = store.find_collection("org_members").unwrap().unwrap();
    assert_eq!(col.rules.list.as_deref(), Some("@request.auth.id != ''"));
    assert_eq!(col.rules.create, None);
}

#[test]
fn field_extension_is_additive_and_idempotent() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Store::open(tmp.path()).expect("open");

    let changed = store
        .ensure_fields(USERS, &warren::collections::users::extra_fields())
        .unwrap();
    assert!(changed);
    let again = store
        .ensure_fields(USERS, &warren::collections::users::extra_fields())
        .unwrap();
    assert!(!again);

    let users = store.find_collection(USERS).unwrap().unwrap();
    assert!(users.field("phone").is_some());
    assert!(users.field("role").is_some());
    // The seeded field survives extension untouched.
    assert!(users.field("name").is_some());
}

#[test]
fn settings_rules_are_set_at_creation_and_guarded_afterward() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Store::open(tmp.path()).expect("open");
    store.ensure_collection(&settings::spec()).unwrap();

    let col = store.find_collection("settings").unwrap().unwrap();
    let owner_rule = "@request.auth.id = user || @request.auth.role = \"admin\"";
    assert_eq!(col.rules.list.as_deref(), Some(owner_rule));
    assert_eq!(col.rules.delete.as_deref(), Some(owner_rule));

    // Already configured: the guard refuses to reapply.
    let outcome = store
        .apply_rules("settings", &RuleSet::default())
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::AlreadyConfigured);
}
