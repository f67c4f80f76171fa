//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! The QR secret may be left out of the file and provided through
//! `TIANI_CHECKIN_TOKEN` instead; the environment value wins when both are set.

use crate::domain::types::{GeoPoint, GeoZone, QrToken};
use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Environment variable holding the shared QR secret
pub const TOKEN_ENV_VAR: &str = "TIANI_CHECKIN_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Unique site identifier, used as the metrics label
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "tiani".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QrConfig {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Interval for logging the metrics summary (seconds, 0 to disable)
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub qr: QrConfig,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    bind_address: String,
    port: u16,
    qr_token: QrToken,
    zones: Vec<GeoZone>,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    /// Development configuration, not for deployment
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            bind_address: default_bind_address(),
            port: default_port(),
            qr_token: QrToken::new("dev-token"),
            zones: vec![GeoZone::new("dev_hall", GeoPoint::new(25.0330, 121.5654), 0.5)],
            metrics_interval_secs: default_metrics_interval(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let zones = toml_config
            .zones
            .into_iter()
            .map(|z| GeoZone::new(z.name, GeoPoint::new(z.latitude, z.longitude), z.radius_km))
            .collect();

        Ok(Self {
            site_id: toml_config.site.id,
            bind_address: toml_config.server.bind_address,
            port: toml_config.server.port,
            qr_token: QrToken::new(toml_config.qr.token.unwrap_or_default().trim()),
            zones,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: path.display().to_string(),
        })
    }

    /// Load, apply environment overrides and validate
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config = Self::from_file(path)?.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Replace the QR secret with `TIANI_CHECKIN_TOKEN` when it is set and non-empty
    pub fn with_env_overrides(self) -> Self {
        match env::var(TOKEN_ENV_VAR) {
            Ok(token) => self.with_token_override(Some(token)),
            Err(_) => self,
        }
    }

    fn with_token_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.qr_token = QrToken::new(token.trim());
        }
        self
    }

    /// Reject configurations that would make every check-in fail or accept a blank secret
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.qr_token.expose().trim().is_empty() {
            bail!("QR token is not configured (set [qr].token or {})", TOKEN_ENV_VAR);
        }

        if self.zones.is_empty() {
            bail!("At least one [[zones]] entry is required");
        }

        for zone in &self.zones {
            if !zone.center.is_valid() {
                bail!("Zone '{}' has an invalid center {}", zone.name, zone.center);
            }
            if !zone.radius_km.is_finite() || zone.radius_km <= 0.0 {
                bail!("Zone '{}' has an invalid radius {}", zone.name, zone.radius_km);
            }
        }

        Ok(())
    }

    // Getters for all config fields
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn qr_token(&self) -> &QrToken {
        &self.qr_token
    }

    pub fn zones(&self) -> &[GeoZone] {
        &self.zones
    }

    pub fn zone_names(&self) -> Vec<&str> {
        self.zones.iter().map(|z| z.name.as_str()).collect()
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Replace the zone list
    pub fn with_zones(mut self, zones: Vec<GeoZone>) -> Self {
        self.zones = zones;
        self
    }

    /// Replace the QR secret
    pub fn with_token(mut self, token: &str) -> Self {
        self.qr_token = QrToken::new(token);
        self
    }
}
