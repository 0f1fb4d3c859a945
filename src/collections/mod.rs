//! Domain collections and their bootstrap wiring.
//!
//! `register_steps` is the dependency graph: collections with no
//! foreign dependency first, join/child collections after their
//! targets, rule passes after every collection they reference, then
//! the configuration steps. The orchestrator validates the declared
//! `depends_on` names against registration order at startup.

pub mod auth_providers;
pub mod org_members;
pub mod organizations;
pub mod properties;
pub mod roles;
pub mod settings;
pub mod users;

use crate::core::admin;
use crate::core::bootstrap::Orchestrator;
use crate::core::config::Config;
use crate::core::hooks::HookEvent;
use crate::core::store::{Store, USERS};

/// Build the lifecycle hook pipeline. Called once at startup, before
/// the store serves requests.
pub fn register_hooks(store: &mut Store) {
    let hooks = store.hooks_mut();
    hooks.register(
        HookEvent::PreCreate,
        USERS,
        "users.default-role",
        users::default_role,
    );
    hooks.register(
        HookEvent::PostCreate,
        USERS,
        "users.settings-cascade",
        users::settings_cascade,
    );
    hooks.register(
        HookEvent::PostCreate,
        organizations::ORGANIZATIONS,
        "organizations.owner-membership",
        organizations::owner_membership,
    );
}

/// Register all bootstrap steps in dependency order.
pub fn register_steps(orch: &mut Orchestrator, cfg: &Config) {
    orch.register("users-fields", &[], |s| users::ensure_fields(s));
    orch.register("organizations", &[], |s| organizations::ensure(s));
    orch.register("org-members", &["users-fields", "organizations"], |s| {
        org_members::ensure(s)
    });
    orch.register("settings", &["users-fields"], |s| settings::ensure(s));
    orch.register("properties", &["organizations"], |s| properties::ensure(s));

    orch.register(
        "organizations-rules",
        &["organizations", "org-members"],
        |s| organizations::apply_access_rules(s),
    );
    orch.register("org-members-rules", &["org-members"], |s| {
        org_members::apply_access_rules(s)
    });
    orch.register("properties-rules", &["properties", "org-members"], |s| {
        properties::apply_access_rules(s)
    });

    let oauth_cfg = cfg.clone();
    orch.register("auth-providers", &["users-fields"], move |s| {
        auth_providers::ensure(s, &oauth_cfg)
    });
    let admin_cfg = cfg.clone();
    orch.register("default-admin", &[], move |s| {
        admin::ensure_admin(s, &admin_cfg.admin_email, &admin_cfg.admin_pass)
    });
}
