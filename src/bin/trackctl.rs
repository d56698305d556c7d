//! `trackctl`: a thin ops CLI around `tracklink_core`'s configuration and
//! introspection surface. The core itself needs a live network/file
//! transport to do anything, and this crate does not ship one, so this
//! binary is limited to configuration management and diagnostics rather
//! than a long-running session.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tracklink_core::config::{self, Config};
use tracklink_core::model::AssetKind;

/// Track-asset coordination core, ops CLI.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration (loaded from disk, falling back to
    /// defaults) as TOML.
    ConfigShow,
    /// Write the default configuration to the standard config path if one
    /// does not already exist there.
    ConfigInit {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
    /// Print the path `config.toml` is read from and written to.
    ConfigPath,
    /// Print a short report of build-time invariants useful when wiring up
    /// a deployment: known asset kinds, slot mount paths, retry/backoff
    /// constants.
    Diagnose,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("trackctl=info".parse().unwrap()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ConfigShow => cmd_config_show(),
        Commands::ConfigInit { force } => cmd_config_init(force),
        Commands::ConfigPath => cmd_config_path(),
        Commands::Diagnose => cmd_diagnose(),
    }
}

fn cmd_config_show() -> anyhow::Result<()> {
    let config = config::load();
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
    if path.exists() && !force {
        println!("{} already exists; pass --force to overwrite", path.display());
        return Ok(());
    }
    config::save(&Config::default())?;
    println!("wrote default configuration to {}", path.display());
    Ok(())
}

fn cmd_config_path() -> anyhow::Result<()> {
    match config::config_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("(could not determine config directory)"),
    }
    Ok(())
}

fn cmd_diagnose() -> anyhow::Result<()> {
    println!("Asset kinds:");
    for kind in AssetKind::ALL {
        println!("  {kind}");
    }

    println!();
    println!("Slot mount paths:");
    for slot in [
        tracklink_core::model::Slot::Sd,
        tracklink_core::model::Slot::Usb,
        tracklink_core::model::Slot::Cd,
        tracklink_core::model::Slot::Collection,
    ] {
        match slot.mount_path() {
            Some(path) => println!("  {slot:?}: {path}"),
            None => println!("  {slot:?}: (not file-transfer mountable)"),
        }
    }

    println!();
    println!("Retry/backoff:");
    println!("  default retry limit: {}", config::DEFAULT_RETRY_LIMIT);
    println!("  backoff step: {}ms", config::RETRY_BACKOFF_MS);
    println!("  backoff cap: {}ms", config::MAX_RETRY_INTERVAL_MS);

    println!();
    println!("Cache defaults:");
    println!("  album art LRU capacity: {}", config::DEFAULT_LRU_CAPACITY);
    println!("  per-finder event queue capacity: {}", config::EVENT_QUEUE_CAPACITY);

    let config_path: Option<PathBuf> = config::config_path();
    println!();
    match config_path {
        Some(p) => println!("Config file: {} (exists: {})", p.display(), p.exists()),
        None => println!("Config file: (no config directory available on this platform)"),
    }

    Ok(())
}
