//! Tiani check-in service
//!
//! Verifies volunteer activity check-ins (QR secret, geofence, activity
//! window) for the web application's check-in procedure.
//!
//! Module structure:
//! - `domain/` - Check-in types (GeoPoint, GeoZone, Decision)
//! - `services/` - QR validation, geofence and eligibility decision
//! - `io/` - HTTP API and Prometheus formatting
//! - `infra/` - Config and metrics

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tiani_checkin::infra::{Config, Metrics};
use tiani_checkin::io::{start_api_server, ApiState};
use tiani_checkin::services::CheckInGate;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Tiani check-in verification service
#[derive(Parser, Debug)]
#[command(name = "tiani-checkin", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, level via RUST_LOG (default: info)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "tiani-checkin starting");

    let args = Args::parse();

    let config = Config::load_from_path(&args.config)
        .with_context(|| format!("Invalid configuration in {}", args.config))?;

    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        bind_address = %config.bind_address(),
        port = %config.port(),
        zones = ?config.zone_names(),
        metrics_interval_secs = %config.metrics_interval_secs(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());
    let state = Arc::new(ApiState {
        gate: CheckInGate::from_config(&config),
        metrics: metrics.clone(),
        site_id: config.site_id().to_string(),
    });

    // Periodic metrics summary in the log
    let metrics_interval = config.metrics_interval_secs();
    if metrics_interval > 0 {
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                metrics_clone.report().log();
            }
        });
    }

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let addr = format!("{}:{}", config.bind_address(), config.port());
    start_api_server(&addr, state, shutdown_rx)
        .await
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Check-in API failed on {addr}"))?;

    info!("tiani-checkin shutdown complete");
    Ok(())
}
