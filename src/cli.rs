//! CLI struct definitions for the warren command-line interface.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(
    name = "warren",
    version = env!("CARGO_PKG_VERSION"),
    about = "Warren is a local-first multi-tenant record store: idempotent schema bootstrap, row-level authorization rules, and lifecycle cascades over an embedded SQLite replica."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the store and run the idempotent schema bootstrap.
    Init,
    /// Trigger an on-demand replica sync.
    Sync,
    /// List provisioned collections and their rule state.
    Collections {
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
}
