//! fleetd — the Fleetwatch daemon.
//!
//! Assembles the catalog store, the probes and the REST API into one
//! binary.
//!
//! # Usage
//!
//! ```text
//! fleetd serve --config fleet.toml --port 8080
//! fleetd check --catalog /etc/fleetwatch/devices.json
//! fleetd config --config fleet.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use fleet_catalog::CatalogStore;
use fleet_core::{FleetConfig, address_map, epoch_secs};
use fleet_probe::{BatchCoordinator, StatusChecker};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "fleetd", about = "Fleetwatch device status daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the status and catalog API.
    Serve {
        /// Configuration file; defaults apply when it does not exist.
        #[arg(long, default_value = "fleet.toml")]
        config: PathBuf,

        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,

        /// Catalog document (overrides the config file).
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Check every catalog device once and print the results as JSON.
    Check {
        #[arg(long, default_value = "fleet.toml")]
        config: PathBuf,

        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Print the effective configuration.
    Config {
        #[arg(long, default_value = "fleet.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fleetd=debug,fleet=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            catalog,
        } => {
            let mut cfg = load_config(&config)?;
            if let Some(port) = port {
                cfg.server.port = port;
            }
            if let Some(catalog) = catalog {
                cfg.catalog.path = catalog;
            }
            run_server(cfg).await
        }
        Command::Check { config, catalog } => {
            let mut cfg = load_config(&config)?;
            if let Some(catalog) = catalog {
                cfg.catalog.path = catalog;
            }
            run_check(cfg).await
        }
        Command::Config { config } => {
            print!("{}", load_config(&config)?.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<FleetConfig> {
    let config = FleetConfig::load_or_default(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    if !path.exists() {
        info!(path = %path.display(), "no config file, using defaults");
    }
    Ok(config)
}

fn open_catalog(config: &FleetConfig) -> CatalogStore {
    let store = CatalogStore::open(&config.catalog.path, config.catalog.backup);
    info!(path = %config.catalog.path.display(), backup = config.catalog.backup, "catalog store opened");
    store
}

async fn run_server(config: FleetConfig) -> anyhow::Result<()> {
    info!("Fleetwatch daemon starting");

    let catalog = open_catalog(&config);
    match catalog.entries() {
        Ok(entries) => info!(devices = entries.len(), "catalog loaded"),
        Err(e) => warn!(error = %e, "catalog unreadable, serving as empty until fixed"),
    }

    let checker = StatusChecker::from_config(&config.probe);
    info!(
        connect_timeout = ?config.probe.connect_timeout(),
        total_timeout = ?config.probe.total_timeout(),
        ping_timeout = ?config.probe.ping_timeout(),
        max_concurrent_pings = config.probe.max_concurrent_pings,
        "probes initialized"
    );

    let state = fleet_api::ApiState::new(catalog, checker)
        .with_ping_limit(config.probe.max_concurrent_pings);
    let router = fleet_api::build_router(state);
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;

    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Fleetwatch daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn run_check(config: FleetConfig) -> anyhow::Result<()> {
    let report = check_report(&config).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Same shape as a `check_all` response. An unreadable catalog is
/// reported as empty, as the API does.
async fn check_report(config: &FleetConfig) -> serde_json::Value {
    let entries = match open_catalog(config).entries() {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "catalog unavailable, treating as empty");
            Vec::new()
        }
    };
    if entries.is_empty() {
        return serde_json::json!({
            "success": true,
            "results": {},
            "timestamp": epoch_secs(),
        });
    }

    let batch = BatchCoordinator::new(StatusChecker::from_config(&config.probe))
        .with_ping_limit(config.probe.max_concurrent_pings);
    let results = batch.check_many(&address_map(&entries)).await;
    serde_json::json!({
        "success": true,
        "count": results.len(),
        "results": results,
        "timestamp": epoch_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(path: &Path) -> FleetConfig {
        let mut config = FleetConfig::default();
        config.catalog.path = path.to_path_buf();
        config
    }

    #[tokio::test]
    async fn check_on_corrupt_catalog_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(&path, "{ not json").unwrap();

        let report = check_report(&config_for(&path)).await;
        assert_eq!(report["success"], true);
        assert_eq!(report["results"], serde_json::json!({}));
        assert!(report.get("count").is_none());
        // The corrupt file is left alone.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn check_on_missing_catalog_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        let report = check_report(&config_for(&dir.path().join("absent.json"))).await;
        assert_eq!(report["results"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn check_reports_blank_address_offline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(&path, r#"{"categories":{"Kiosks":{"lobby":"  "}}}"#).unwrap();

        let report = check_report(&config_for(&path)).await;
        assert_eq!(report["count"], 1);
        assert_eq!(report["results"]["Kiosks:lobby"], "offline");
    }
}
