//! Command-line inspection tool for worklog stores.
//!
//! # Responsibility
//! - Open a store read-only, run the integrity walk and print a summary.
//! - Convert any store into an XML document.
//! - Keep output deterministic for scripted sanity checks.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use worklog_core::{
    core_version, default_log_level, init_logging, Store, StoreAddress, StoreOptions,
    FORMAT_VERSION,
};

#[derive(Parser)]
#[command(name = "worklog")]
#[command(about = "Inspect and convert worklog stores")]
struct Cli {
    /// Absolute directory for rolling log files; logging stays off without it.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a store, validate it and print object counts.
    Check { address: String },
    /// Write a store's contents to an XML document.
    Export { address: String, out: PathBuf },
    /// Print crate and format versions.
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir.to_string_lossy()).map_err(anyhow::Error::msg)?;
    }

    match cli.command {
        Command::Check { address } => check(&address),
        Command::Export { address, out } => export(&address, out),
        Command::Version => {
            println!("worklog_core version={}", core_version());
            println!("worklog format_version={FORMAT_VERSION}");
            Ok(())
        }
    }
}

fn open_read_only(address: &str) -> Result<Store> {
    let parsed = StoreAddress::parse(address)
        .with_context(|| format!("invalid store address `{address}`"))?;
    let options = StoreOptions {
        verify_after_mutation: true,
        ..StoreOptions::read_only()
    };
    Store::open(&parsed, &options).with_context(|| format!("failed to open `{parsed}`"))
}

fn check(address: &str) -> Result<()> {
    let store = open_read_only(address)?;
    store.validate().context("integrity check failed")?;

    println!("store={}", store.address());
    println!("objects={}", store.live_count());
    println!("next_oid={}", store.next_oid());
    for (kind, count) in store.count_by_kind() {
        println!("{}={count}", kind.tag());
    }
    store.close()?;
    info!("event=cli_check module=cli status=ok address={address}");
    Ok(())
}

fn export(address: &str, out: PathBuf) -> Result<()> {
    let store = open_read_only(address)?;
    store
        .export_to_file(&out)
        .with_context(|| format!("failed to export to `{}`", out.display()))?;
    println!("exported objects={} to={}", store.live_count(), out.display());
    store.close()?;
    info!(
        "event=cli_export module=cli status=ok address={address} out={}",
        out.display()
    );
    Ok(())
}
