use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FleetError, FleetResult};

/// Top-level client configuration, loaded from `fleetdeck.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FleetConfig {
    pub backend: BackendConfig,
    pub polling: PollingConfig,
    pub notifications: NotificationConfig,
}

/// Where the fleet backend lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    /// Applied to every request, including coordination submits.
    pub request_timeout_ms: u64,
    pub status_path: String,
    pub metrics_path: String,
    pub coordinate_path: String,
    pub balance_load_path: String,
    /// `{id}` is replaced with the coordination id.
    pub coordination_status_path: String,
    pub metrics_time_range: MetricsTimeRange,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            api_token: None,
            request_timeout_ms: 10_000,
            status_path: "/api/ai-agents/multi-agent-status".to_string(),
            metrics_path: "/api/ai-agents/dashboard-metrics".to_string(),
            coordinate_path: "/api/ai-agents/coordinate-agents".to_string(),
            balance_load_path: "/api/ai-agents/balance-load".to_string(),
            coordination_status_path: "/api/ai-agents/coordination/{id}".to_string(),
            metrics_time_range: MetricsTimeRange::Day,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Aggregation window requested from the dashboard-metrics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricsTimeRange {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
}

impl MetricsTimeRange {
    pub fn as_query(&self) -> &'static str {
        match self {
            MetricsTimeRange::Hour => "1h",
            MetricsTimeRange::Day => "24h",
            MetricsTimeRange::Week => "7d",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Number of metrics samples retained for the time series.
    pub history_capacity: usize,
    pub auto_start: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            history_capacity: 20,
            auto_start: true,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub channel_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

impl FleetConfig {
    /// Default config file location: `<config_dir>/fleetdeck/fleetdeck.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fleetdeck").join("fleetdeck.toml"))
    }

    /// Load config from an explicit path, `FLEETDECK_CONFIG`, or the default
    /// location, then apply env var overrides. A missing file means defaults;
    /// a file that exists but does not parse is an error.
    pub fn load(path: Option<&Path>) -> FleetResult<Self> {
        let candidate = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FLEETDECK_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_path);

        let mut config = match candidate {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    FleetError::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                let cfg = Self::from_toml(&content)?;
                tracing::info!(path = %path.display(), "Loaded configuration");
                cfg
            }
            Some(path) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                FleetConfig::default()
            }
            None => FleetConfig::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> FleetResult<Self> {
        toml::from_str(content).map_err(|e| FleetError::Config(format!("Invalid TOML: {}", e)))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FLEETDECK_BASE_URL") {
            if !url.is_empty() {
                self.backend.base_url = url;
            }
        }
        if let Ok(token) = std::env::var("FLEETDECK_API_TOKEN") {
            if !token.is_empty() {
                self.backend.api_token = Some(token);
            }
        }
        if let Ok(val) = std::env::var("FLEETDECK_POLL_INTERVAL_MS") {
            match val.parse::<u64>() {
                Ok(ms) => self.polling.interval_ms = ms,
                Err(_) => tracing::warn!(value = %val, "Ignoring invalid FLEETDECK_POLL_INTERVAL_MS"),
            }
        }
    }

    pub fn validate(&self) -> FleetResult<()> {
        if !(self.backend.base_url.starts_with("http://") || self.backend.base_url.starts_with("https://")) {
            return Err(FleetError::Config(format!(
                "backend.base_url must be an http(s) URL, got {:?}",
                self.backend.base_url
            )));
        }
        if self.backend.request_timeout_ms == 0 {
            return Err(FleetError::Config("backend.request_timeout_ms must be > 0".to_string()));
        }
        if self.polling.interval_ms == 0 {
            return Err(FleetError::Config("polling.interval_ms must be > 0".to_string()));
        }
        if self.polling.history_capacity == 0 {
            return Err(FleetError::Config("polling.history_capacity must be > 0".to_string()));
        }
        if self.notifications.channel_capacity == 0 {
            return Err(FleetError::Config(
                "notifications.channel_capacity must be > 0".to_string(),
            ));
        }
        if self.backend.api_token.is_some() && self.backend.base_url.starts_with("http://") {
            tracing::warn!("API token configured for a plain http backend");
        }
        Ok(())
    }
}
