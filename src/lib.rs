//! Warren: a local-first multi-tenant record store core.
//!
//! Warren bootstraps and governs the data schema and access-control
//! model of a record store backed by an embedded SQLite replica:
//!
//! - **Idempotent provisioning**: collections and fields are ensured
//!   exactly once; re-running the bootstrap on every process start is
//!   the normal mode of operation, not an error.
//! - **Row-level authorization**: boolean rule predicates over the
//!   authenticated principal and related records, composed from a
//!   fixed fragment set and evaluated by the store.
//! - **Lifecycle cascades**: record hooks default fields before create
//!   and cascade dependent records after (an owner membership when an
//!   organization is created, a settings row when a user is created).
//! - **Degraded-but-running startup**: missing dependencies and
//!   persistence failures during bootstrap are logged and deferred,
//!   never fatal; the host keeps serving whatever schema exists.
//!
//! The HTTP transport, outbound auth client, and embedded-replica
//! connector are external collaborators; the replica is consumed
//! through the single [`core::sync::ReplicaSync`] capability.

pub mod cli;
pub mod collections;
pub mod core;

use crate::core::bootstrap::Orchestrator;
use crate::core::config::Config;
use crate::core::error::StoreError;
use crate::core::store::Store;

/// Open the store, build the hook pipeline, and run the full bootstrap
/// sequence. Safe to call on every process start.
pub fn startup(cfg: &Config) -> Result<Store, StoreError> {
    let mut store = Store::open(&cfg.data_dir)?;
    collections::register_hooks(&mut store);
    let mut orch = Orchestrator::new();
    collections::register_steps(&mut orch, cfg);
    orch.run(&store);
    Ok(store)
}
