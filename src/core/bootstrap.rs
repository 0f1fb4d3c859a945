//! Startup bootstrap orchestration.
//!
//! Schema provisioning runs on every process start against a store that
//! may already be partially or fully migrated. Each step is
//! independently idempotent, so ordering is achieved simply by running
//! steps in registration order on the single "store ready" path; the
//! registration order IS the dependency graph. Steps declare their
//! dependencies by name so a mis-ordered registration is caught at
//! startup in development builds instead of surfacing as a silent
//! deferral.
//!
//! A step failure is logged and the run continues: the host prefers
//! degraded-but-running over fail-fast during startup.

use crate::core::error::StoreError;
use crate::core::store::Store;
use tracing::{debug, error, warn};

pub type StepFn = Box<dyn Fn(&Store) -> Result<(), StoreError> + Send + Sync>;

pub struct BootstrapStep {
    pub name: &'static str,
    pub depends_on: &'static [&'static str],
    run: StepFn,
}

#[derive(Default)]
pub struct Orchestrator {
    steps: Vec<BootstrapStep>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. Every declared dependency must name an
    /// earlier-registered step; in debug builds a violation panics, in
    /// release builds it logs loudly and keeps the registration.
    pub fn register<F>(&mut self, name: &'static str, depends_on: &'static [&'static str], run: F)
    where
        F: Fn(&Store) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        for dep in depends_on {
            let satisfied = self.steps.iter().any(|s| s.name == *dep);
            debug_assert!(
                satisfied,
                "bootstrap step {:?} depends on {:?} which is not registered before it",
                name, dep
            );
            if !satisfied {
                error!(
                    step = name,
                    dependency = dep,
                    "bootstrap step registered before its dependency"
                );
            }
        }
        self.steps.push(BootstrapStep {
            name,
            depends_on,
            run: Box::new(run),
        });
    }

    pub fn steps(&self) -> impl Iterator<Item = &BootstrapStep> {
        self.steps.iter()
    }

    /// Run all steps in registration order. Step errors never
    /// propagate; the count of failed steps is returned for
    /// diagnostics.
    pub fn run(&self, store: &Store) -> usize {
        let mut failures = 0;
        for step in &self.steps {
            match (step.run)(store) {
                Ok(()) => debug!(step = step.name, "bootstrap step completed"),
                Err(err) => {
                    failures += 1;
                    warn!(step = step.name, error = %err, "bootstrap step failed; continuing");
                }
            }
        }
        failures
    }
}
