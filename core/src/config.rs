// Embarque configuration
//
// Defaults come from environment variables; an optional TOML file is
// overlaid on top.

use crate::dashboard::DashboardConfig;
use crate::lane::LaneId;
use crate::reader_control::ReaderControlConfig;
use crate::shipment::ShipmentConfig;
use crate::{EmbarqueError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Upstream transport settings (used by the bridge)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// host:port of the upstream event stream
    pub upstream_addr: String,
    /// Delay before reconnecting after the link drops
    pub reconnect_delay_ms: u64,
    /// Ingress queue capacity
    pub queue_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            upstream_addr: std::env::var("EMBARQUE_UPSTREAM_ADDR")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "127.0.0.1:3001".to_string()),
            reconnect_delay_ms: std::env::var("EMBARQUE_RECONNECT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2_000),
            queue_capacity: 1024,
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, PartialEq)]
pub struct EmbarqueConfig {
    pub lanes: Vec<LaneId>,
    pub reader_control: ReaderControlConfig,
    pub dashboard: DashboardConfig,
    pub transport: TransportConfig,
    /// Shipment whose loading progress is tracked, if any
    pub shipment: Option<ShipmentConfig>,
}

impl Default for EmbarqueConfig {
    fn default() -> Self {
        let lanes = std::env::var("EMBARQUE_LANES")
            .ok()
            .map(|v| parse_lanes(&v))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| parse_lanes("1,2,3"));

        Self {
            lanes,
            reader_control: ReaderControlConfig::default(),
            dashboard: DashboardConfig::from_env(),
            transport: TransportConfig::default(),
            shipment: None,
        }
    }
}

fn parse_lanes(raw: &str) -> Vec<LaneId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(LaneId::from)
        .collect()
}

impl EmbarqueConfig {
    /// Load configuration from a TOML file (path via EMBARQUE_CONFIG or ./embarque.toml),
    /// overlaying values onto env-driven defaults. Falls back to defaults on any problem.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("EMBARQUE_CONFIG").unwrap_or_else(|_| "embarque.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "config", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match Self::load_from(p) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "Failed to load TOML; using defaults");
                default
            }
        }
    }

    /// Load a specific TOML file over the env-driven defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw, Self::default())
    }

    /// Overlay a TOML document onto `base`
    pub fn from_toml_str(raw: &str, base: Self) -> Result<Self> {
        let parsed: EmbarqueToml =
            toml::from_str(raw).map_err(|e| EmbarqueError::Config(e.to_string()))?;
        let config = parsed.overlay(base);
        if config.lanes.is_empty() {
            return Err(EmbarqueError::Config("at least one lane is required".into()));
        }
        Ok(config)
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, Deserialize)]
struct EmbarqueToml {
    pub lanes: Option<Vec<String>>,
    pub reader_control: Option<ReaderControlToml>,
    pub dashboard: Option<DashboardToml>,
    pub transport: Option<TransportToml>,
    pub shipment: Option<ShipmentConfig>,
}

impl EmbarqueToml {
    fn overlay(self, mut base: EmbarqueConfig) -> EmbarqueConfig {
        if let Some(lanes) = self.lanes {
            base.lanes = lanes.into_iter().map(LaneId::from).collect();
        }
        if let Some(r) = self.reader_control {
            r.apply(&mut base.reader_control);
        }
        if let Some(d) = self.dashboard {
            d.apply(&mut base.dashboard);
        }
        if let Some(t) = self.transport {
            t.apply(&mut base.transport);
        }
        if let Some(s) = self.shipment {
            base.shipment = Some(s);
        }
        base
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ReaderControlToml {
    pub base_url: Option<String>,
    pub default_profile: Option<String>,
    pub timeout_ms: Option<u64>,
}
impl ReaderControlToml {
    fn apply(self, r: &mut ReaderControlConfig) {
        if let Some(v) = self.base_url {
            r.base_url = v;
        }
        if let Some(v) = self.default_profile {
            r.default_profile = v;
        }
        if let Some(v) = self.timeout_ms {
            r.timeout_ms = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DashboardToml {
    pub enabled: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
}
impl DashboardToml {
    fn apply(self, d: &mut DashboardConfig) {
        if let Some(v) = self.enabled {
            d.enabled = v;
        }
        if let Some(v) = self.host {
            d.host = v;
        }
        if let Some(v) = self.port {
            d.port = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TransportToml {
    pub upstream_addr: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
    pub queue_capacity: Option<usize>,
}
impl TransportToml {
    fn apply(self, t: &mut TransportConfig) {
        if let Some(v) = self.upstream_addr {
            t.upstream_addr = v;
        }
        if let Some(v) = self.reconnect_delay_ms {
            t.reconnect_delay_ms = v;
        }
        if let Some(v) = self.queue_capacity {
            t.queue_capacity = v.max(1);
        }
    }
}
