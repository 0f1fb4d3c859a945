//! Record lifecycle hook pipeline.
//!
//! One dispatcher owns an explicit ordered list of registrations built
//! at startup; there is no process-global handler state. Two hook
//! classes exist:
//!
//! - `PreCreate` runs before validation and persistence, so defaulted
//!   fields are visible to rule evaluation and uniqueness checks. A
//!   pre-create error aborts the triggering write.
//! - `PostCreate` runs after a successful persist and is best-effort:
//!   a cascade failure is logged and the primary record stands. The
//!   missing dependent record is a recoverable inconsistency, not a
//!   rollback trigger.

use crate::core::error::StoreError;
use crate::core::store::{Record, Store};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    PreCreate,
    PostCreate,
}

/// Mutable view of the record flowing through a hook, plus the
/// authenticated principal of the triggering request (absent for
/// internal saves).
pub struct RecordEvent<'a> {
    pub record: &'a mut Record,
    pub auth: Option<&'a Record>,
}

pub type HookFn = Box<dyn Fn(&Store, &mut RecordEvent) -> Result<(), StoreError> + Send + Sync>;

pub struct HookRegistration {
    pub event: HookEvent,
    pub collection: String,
    /// Diagnostic name, used in cascade-failure logs.
    pub name: &'static str,
    handler: HookFn,
}

#[derive(Default)]
pub struct HookDispatcher {
    registrations: Vec<HookRegistration>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, event: HookEvent, collection: &str, name: &'static str, handler: F)
    where
        F: Fn(&Store, &mut RecordEvent) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        self.registrations.push(HookRegistration {
            event,
            collection: collection.to_string(),
            name,
            handler: Box::new(handler),
        });
    }

    /// Run all matching hooks in registration order.
    ///
    /// Pre-create errors propagate to the caller; post-create errors
    /// are logged and swallowed.
    pub fn dispatch(
        &self,
        store: &Store,
        event: HookEvent,
        collection: &str,
        ev: &mut RecordEvent,
    ) -> Result<(), StoreError> {
        for reg in &self.registrations {
            if reg.event != event || reg.collection != collection {
                continue;
            }
            match (reg.handler)(store, ev) {
                Ok(()) => {}
                Err(err) if event == HookEvent::PostCreate => {
                    warn!(
                        hook = reg.name,
                        collection,
                        record = %ev.record.id,
                        error = %err,
                        "post-create hook failed; primary record stands"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
