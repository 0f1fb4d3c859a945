//! Administrative surface: the sync endpoint, admin UI redirects, and
//! first-run superuser seeding.
//!
//! The handlers are transport-agnostic; a host HTTP router mounts them
//! and maps [`ApiResponse`] onto its own response type.

use crate::core::error::StoreError;
use crate::core::store::{JsonMap, Record, SUPERUSERS, Store};
use crate::core::sync::ReplicaSync;
use crate::core::time;
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{info, warn};

/// Placeholder account created by store installers; not a real admin.
const INSTALLER_EMAIL: &str = "__installer@warren.invalid";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub status: u16,
    pub location: String,
}

/// `POST /api/admin/sync` — superuser-only on-demand reconciliation.
pub fn handle_sync(auth: Option<&Record>, syncer: &dyn ReplicaSync) -> ApiResponse {
    if !auth.is_some_and(Record::is_superuser) {
        return ApiResponse {
            status: 401,
            body: json!({ "error": "unauthorized" }),
        };
    }
    let start = Instant::now();
    if let Err(err) = syncer.sync() {
        warn!(error = %err, "manual sync failed");
        return ApiResponse {
            status: 500,
            body: json!({ "error": "sync failed", "message": err.to_string() }),
        };
    }
    let duration = time::format_duration(start.elapsed());
    info!(%duration, "manual sync completed");
    ApiResponse {
        status: 200,
        body: json!({
            "success": true,
            "message": "sync completed",
            "duration": duration,
        }),
    }
}

/// `GET /admin` and `GET /admin/{path...}` — temporary redirect to the
/// built-in admin UI under `/_/`.
pub fn admin_redirect(path: Option<&str>) -> Redirect {
    Redirect {
        status: 307,
        location: match path {
            Some(p) => format!("/_/{}", p),
            None => "/_/".to_string(),
        },
    }
}

/// Seed a default superuser on first run. Skipped when either
/// credential is unset or a real (non-installer) superuser already
/// exists. Failures are logged, never fatal.
pub fn ensure_admin(store: &Store, email: &str, password: &str) -> Result<(), StoreError> {
    if email.is_empty() || password.is_empty() {
        return Ok(());
    }
    let superusers = store.find_all_records(SUPERUSERS)?;
    let has_real_admin = superusers.iter().any(|su| {
        let e = su.get_str("email");
        !e.is_empty() && e != INSTALLER_EMAIL
    });
    if has_real_admin {
        return Ok(());
    }
    match store.create_auth_record(SUPERUSERS, email, password, JsonMap::new()) {
        Ok(_) => info!(email, "created default superuser"),
        Err(err) => warn!(error = %err, "failed to create default superuser"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirects_target_the_admin_ui() {
        assert_eq!(
            admin_redirect(None),
            Redirect {
                status: 307,
                location: "/_/".to_string()
            }
        );
        assert_eq!(
            admin_redirect(Some("settings/users")),
            Redirect {
                status: 307,
                location: "/_/settings/users".to_string()
            }
        );
    }
}
