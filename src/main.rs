use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use warren::cli::{Cli, Command};
use warren::core::config::Config;
use warren::core::sync::{NoopSync, ReplicaSync};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env().context("loading configuration")?;

    match cli.command {
        Command::Init => {
            let store = warren::startup(&cfg).context("store bootstrap")?;
            let collections = store.list_collections()?;
            println!(
                "{} store ready at {} ({} collections)",
                "✓".green(),
                store.db_path().display(),
                collections.len()
            );
        }
        Command::Sync => {
            if !cfg.replica_url.is_empty() {
                eprintln!(
                    "{} replica connector is provided by the host; running local no-op sync",
                    "!".yellow()
                );
            }
            let syncer = NoopSync;
            let start = Instant::now();
            syncer.sync().context("sync")?;
            println!("{} sync completed in {:?}", "✓".green(), start.elapsed());
        }
        Command::Collections { format } => {
            let store = warren::startup(&cfg).context("store bootstrap")?;
            let collections = store.list_collections()?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&collections)?);
            } else {
                for col in collections {
                    let rules = if col.rules.list.is_some() {
                        "rules applied".green()
                    } else {
                        "no rules".yellow()
                    };
                    println!("{:<20} {}", col.name, rules);
                }
            }
        }
    }
    Ok(())
}
