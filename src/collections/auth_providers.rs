//! OAuth2 provider configuration on the users auth collection.
//!
//! Providers configured through other channels are preserved; each
//! env-configured provider is added at most once.

use crate::core::config::Config;
use crate::core::error::StoreError;
use crate::core::store::{Store, USERS};
use serde_json::{Value, json};
use tracing::{info, warn};

pub fn ensure(store: &Store, cfg: &Config) -> Result<(), StoreError> {
    let Some(users) = store.find_collection(USERS)? else {
        warn!("users collection not found; skipping OAuth2 configuration");
        return Ok(());
    };

    let mut providers: Vec<Value> = users
        .options
        .get("oauth2")
        .and_then(|o| o.get("providers"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let configured = [
        ("google", &cfg.google_client_id, &cfg.google_client_secret),
        ("github", &cfg.github_client_id, &cfg.github_client_secret),
    ];
    let mut added = 0;
    for (name, client_id, client_secret) in configured {
        if client_id.is_empty() {
            continue;
        }
        let exists = providers
            .iter()
            .any(|p| p.get("name").and_then(Value::as_str) == Some(name));
        if exists {
            continue;
        }
        providers.push(json!({
            "name": name,
            "client_id": client_id,
            "client_secret": client_secret,
        }));
        added += 1;
    }

    if providers.is_empty() {
        return Ok(());
    }

    let mut options = match &users.options {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    options.insert(
        "oauth2".to_string(),
        json!({ "enabled": true, "providers": providers }),
    );
    store.update_collection_options(USERS, Value::Object(options))?;
    if added > 0 {
        info!(added, "OAuth2 providers configured");
    }
    Ok(())
}
