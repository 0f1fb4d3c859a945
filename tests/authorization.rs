//! Rule-gated access: membership scoping, role gates, owner scoping,
//! the superuser bypass, and the locked (null-rule) slots.

use serde_json::{Map, Value, json};
use tempfile::TempDir;
use warren::collections::org_members::ORG_MEMBERS;
use warren::collections::organizations::ORGANIZATIONS;
use warren::collections::properties::PROPERTIES;
use warren::collections::settings::SETTINGS;
use warren::core::config::Config;
use warren::core::error::StoreError;
use warren::core::store::{Record, Store, SUPERUSERS, USERS};

fn startup(tmp: &TempDir) -> Store {
    let cfg = Config {
        data_dir: tmp.path().to_path_buf(),
        ..Config::default()
    };
    warren::startup(&cfg).expect("startup")
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("json object")
}

fn register_user(store: &Store, email: &str, phone: &str) -> Record {
    store
        .register(
            USERS,
            None,
            email,
            "pw",
            object(json!({ "phone": phone })),
        )
        .expect("register user")
}

fn superuser(store: &Store) -> Record {
    store
        .create_auth_record(SUPERUSERS, "root@example.com", "sup3r", Map::new())
        .expect("create superuser")
}

/// One org owned by alice, with bob as plain member and carol outside
/// it entirely, plus one property in the org.
struct Fixture {
    store: Store,
    alice: Record,
    bob: Record,
    carol: Record,
    org_id: String,
    property_id: String,
}

fn fixture(tmp: &TempDir) -> Fixture {
    let store = startup(tmp);
    let alice = register_user(&store, "alice@example.com", "+14155550100");
    let bob = register_user(&store, "bob@example.com", "+14155550101");
    let carol = register_user(&store, "carol@example.com", "+14155550102");

    let org = store
        .create_record(
            ORGANIZATIONS,
            Some(&alice),
            object(json!({ "name": "Acme", "slug": "acme" })),
        )
        .expect("create organization");
    store
        .save_record(
            ORG_MEMBERS,
            object(json!({ "user": bob.id.clone(), "organization": org.id.clone(), "role": "member" })),
        )
        .expect("add bob");

    let property = store
        .create_record(
            PROPERTIES,
            Some(&alice),
            object(json!({
                "organization": org.id.clone(),
                "property_name": "Main St Lofts",
                "address": "100 Main St",
                "city": "Springfield",
                "state": "IL",
                "zip_code": "62701",
            })),
        )
        .expect("owner creates property");

    Fixture {
        alice,
        bob,
        carol,
        org_id: org.id,
        property_id: property.id,
        store,
    }
}

#[test]
fn members_see_their_org_and_outsiders_do_not() {
    let tmp = TempDir::new().expect("tempdir");
    let f = fixture(&tmp);

    for member in [&f.alice, &f.bob] {
        let orgs = f
            .store
            .list_records(ORGANIZATIONS, Some(member))
            .expect("list");
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].id, f.org_id);
    }

    let orgs = f
        .store
        .list_records(ORGANIZATIONS, Some(&f.carol))
        .expect("list");
    assert!(orgs.is_empty());
    let err = f
        .store
        .get_record(ORGANIZATIONS, Some(&f.carol), &f.org_id)
        .expect_err("outsider view");
    assert!(matches!(err, StoreError::Unauthorized(_)), "got {err:?}");
}

#[test]
fn guests_see_nothing() {
    let tmp = TempDir::new().expect("tempdir");
    let f = fixture(&tmp);

    assert!(f.store.list_records(ORGANIZATIONS, None).expect("list").is_empty());
    assert!(f.store.list_records(PROPERTIES, None).expect("list").is_empty());
    let err = f
        .store
        .get_record(PROPERTIES, None, &f.property_id)
        .expect_err("guest view");
    assert!(matches!(err, StoreError::Unauthorized(_)));
    let err = f
        .store
        .create_record(
            ORGANIZATIONS,
            None,
            object(json!({ "name": "Ghost", "slug": "ghost" })),
        )
        .expect_err("guest create");
    assert!(matches!(err, StoreError::Unauthorized(_)));
}

#[test]
fn property_writes_require_an_org_admin_role() {
    let tmp = TempDir::new().expect("tempdir");
    let f = fixture(&tmp);

    // bob is a plain member: reads yes, writes no.
    let props = f
        .store
        .list_records(PROPERTIES, Some(&f.bob))
        .expect("member list");
    assert_eq!(props.len(), 1);
    f.store
        .get_record(PROPERTIES, Some(&f.bob), &f.property_id)
        .expect("member view");

    let err = f
        .store
        .create_record(
            PROPERTIES,
            Some(&f.bob),
            object(json!({
                "organization": f.org_id.clone(),
                "property_name": "Annex",
                "address": "2 Side St",
                "city": "Springfield",
            })),
        )
        .expect_err("member create");
    assert!(matches!(err, StoreError::Unauthorized(_)), "got {err:?}");

    let err = f
        .store
        .update_record(
            PROPERTIES,
            Some(&f.bob),
            &f.property_id,
            object(json!({ "city": "Shelbyville" })),
        )
        .expect_err("member update");
    assert!(matches!(err, StoreError::Unauthorized(_)));

    let err = f
        .store
        .delete_record(PROPERTIES, Some(&f.bob), &f.property_id)
        .expect_err("member delete");
    assert!(matches!(err, StoreError::Unauthorized(_)));

    // carol is not a member at all.
    assert!(
        f.store
            .list_records(PROPERTIES, Some(&f.carol))
            .expect("outsider list")
            .is_empty()
    );

    // alice owns the org: full write access.
    let updated = f
        .store
        .update_record(
            PROPERTIES,
            Some(&f.alice),
            &f.property_id,
            object(json!({ "number_of_units": 24 })),
        )
        .expect("owner update");
    assert_eq!(updated.get("number_of_units"), Some(&json!(24)));
    f.store
        .delete_record(PROPERTIES, Some(&f.alice), &f.property_id)
        .expect("owner delete");
}

#[test]
fn org_update_needs_admin_and_delete_needs_owner() {
    let tmp = TempDir::new().expect("tempdir");
    let f = fixture(&tmp);

    let err = f
        .store
        .update_record(
            ORGANIZATIONS,
            Some(&f.bob),
            &f.org_id,
            object(json!({ "phone": "+13125550199" })),
        )
        .expect_err("member updates org");
    assert!(matches!(err, StoreError::Unauthorized(_)));

    // Promote bob to admin through the back door and retry.
    let root = superuser(&f.store);
    let memberships = f.store.find_all_records(ORG_MEMBERS).expect("memberships");
    let bob_membership = memberships
        .iter()
        .find(|m| m.get_str("user") == f.bob.id)
        .expect("bob's membership");
    f.store
        .update_record(
            ORG_MEMBERS,
            Some(&root),
            &bob_membership.id,
            object(json!({ "role": "admin" })),
        )
        .expect("promote bob");

    f.store
        .update_record(
            ORGANIZATIONS,
            Some(&f.bob),
            &f.org_id,
            object(json!({ "phone": "+13125550199" })),
        )
        .expect("admin updates org");

    // Admins still cannot delete the org; only the owner can.
    let err = f
        .store
        .delete_record(ORGANIZATIONS, Some(&f.bob), &f.org_id)
        .expect_err("admin deletes org");
    assert!(matches!(err, StoreError::Unauthorized(_)));
    f.store
        .delete_record(ORGANIZATIONS, Some(&f.alice), &f.org_id)
        .expect("owner deletes org");
}

#[test]
fn settings_are_owner_scoped() {
    let tmp = TempDir::new().expect("tempdir");
    let f = fixture(&tmp);

    let mine = f
        .store
        .list_records(SETTINGS, Some(&f.alice))
        .expect("own settings");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].get_str("user"), f.alice.id);

    // bob cannot see or touch alice's settings row.
    let theirs = f
        .store
        .list_records(SETTINGS, Some(&f.bob))
        .expect("bob's settings");
    assert!(theirs.iter().all(|s| s.get_str("user") == f.bob.id));
    let err = f
        .store
        .update_record(
            SETTINGS,
            Some(&f.bob),
            &mine[0].id,
            object(json!({ "theme": "dark" })),
        )
        .expect_err("cross-user settings write");
    assert!(matches!(err, StoreError::Unauthorized(_)));

    let updated = f
        .store
        .update_record(
            SETTINGS,
            Some(&f.alice),
            &mine[0].id,
            object(json!({ "theme": "dark" })),
        )
        .expect("own settings write");
    assert_eq!(updated.get_str("theme"), "dark");
}

#[test]
fn users_are_visible_only_to_themselves() {
    let tmp = TempDir::new().expect("tempdir");
    let f = fixture(&tmp);

    let visible = f.store.list_records(USERS, Some(&f.alice)).expect("list");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, f.alice.id);

    let err = f
        .store
        .get_record(USERS, Some(&f.alice), &f.bob.id)
        .expect_err("peek at another user");
    assert!(matches!(err, StoreError::Unauthorized(_)));
}

#[test]
fn locked_collections_require_a_superuser() {
    let tmp = TempDir::new().expect("tempdir");
    let f = fixture(&tmp);

    let err = f
        .store
        .list_records(SUPERUSERS, Some(&f.alice))
        .expect_err("list superusers as a user");
    assert!(matches!(err, StoreError::Unauthorized(_)));

    // Users have no delete rule: even the record's owner cannot delete
    // their own account through the request path.
    let err = f
        .store
        .delete_record(USERS, Some(&f.alice), &f.alice.id)
        .expect_err("self-delete");
    assert!(matches!(err, StoreError::Unauthorized(_)));
}

#[test]
fn superusers_bypass_every_rule() {
    let tmp = TempDir::new().expect("tempdir");
    let f = fixture(&tmp);
    let root = superuser(&f.store);

    let users = f.store.list_records(USERS, Some(&root)).expect("list users");
    assert_eq!(users.len(), 3);

    let props = f
        .store
        .list_records(PROPERTIES, Some(&root))
        .expect("list properties");
    assert_eq!(props.len(), 1);

    f.store
        .delete_record(USERS, Some(&root), &f.carol.id)
        .expect("superuser deletes a user");
}

#[test]
fn authentication_checks_credentials() {
    let tmp = TempDir::new().expect("tempdir");
    let store = startup(&tmp);
    register_user(&store, "alice@example.com", "+14155550100");

    let alice = store
        .authenticate(USERS, "alice@example.com", "pw")
        .expect("valid credentials");
    assert_eq!(alice.get_str("email"), "alice@example.com");

    let err = store
        .authenticate(USERS, "alice@example.com", "wrong")
        .expect_err("bad password");
    assert!(matches!(err, StoreError::Unauthorized(_)));
    let err = store
        .authenticate(USERS, "nobody@example.com", "pw")
        .expect_err("unknown email");
    assert!(matches!(err, StoreError::Unauthorized(_)));
}
