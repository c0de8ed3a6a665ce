use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Derive listener identity from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a reverse proxy that sets them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

/// Playlist source and playhead clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Used when ffprobe is missing or cannot read a file.
    #[serde(default = "default_fallback_duration_secs")]
    pub fallback_duration_secs: f64,
    /// Explicit ffprobe binary.  Searched beside the exe and on PATH when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Cadence of server-initiated WebSocket pings.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            trust_proxy_headers: false,
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            library_dir: default_library_dir(),
            tick_interval_ms: default_tick_interval_ms(),
            fallback_duration_secs: default_fallback_duration_secs(),
            ffprobe_path: None,
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

impl StationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl PresenceConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_library_dir() -> PathBuf {
    platform::data_dir().join("audio")
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_fallback_duration_secs() -> f64 {
    180.0
}

fn default_sweep_interval_secs() -> u64 {
    15
}

fn default_stale_after_secs() -> u64 {
    60
}

fn default_heartbeat_interval_secs() -> u64 {
    20
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            tracing::info!("Wrote default config to {:?}", config_path);
            config
        } else {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)
                .with_context(|| format!("invalid config file {}", config_path.display()))?
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// `PORT` wins over the file so the daemon can run under a process manager.
    fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            tracing::debug!("PORT override: {}", port);
            self.http.port = port;
        }
    }

    /// Non-fatal configuration smells, meant to be logged at startup.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let sweep = self.presence.sweep_interval();
        let stale = self.presence.stale_after();
        if sweep > stale / 2 {
            warnings.push(format!(
                "presence.sweep_interval_secs ({}) exceeds half of stale_after_secs ({}); \
                 dead listeners may be counted for up to {}s",
                sweep.as_secs(),
                stale.as_secs(),
                (sweep + stale).as_secs()
            ));
        }

        let heartbeat = self.presence.heartbeat_interval();
        if heartbeat >= stale {
            warnings.push(format!(
                "presence.heartbeat_interval_secs ({}) is not below stale_after_secs ({}); \
                 idle but live listeners will be swept",
                heartbeat.as_secs(),
                stale.as_secs()
            ));
        }

        let fallback = self.station.fallback_duration_secs;
        if fallback.is_nan() || fallback <= 0.0 {
            warnings.push("station.fallback_duration_secs must be positive".to_string());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.port, 8000);
        assert_eq!(config.http.bind_address, "127.0.0.1");
        assert!(!config.http.trust_proxy_headers);
        assert_eq!(config.station.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.presence.sweep_interval(), Duration::from_secs(15));
        assert_eq!(config.presence.stale_after(), Duration::from_secs(60));
        assert!(config.station.library_dir.ends_with("station/audio"));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [presence]
            stale_after_secs = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.presence.stale_after_secs, 90);
        assert_eq!(config.presence.sweep_interval_secs, 15);
        assert_eq!(config.http.port, 8000);
        assert_eq!(config.station.fallback_duration_secs, 180.0);
    }

    #[test]
    fn test_validate_flags_slow_sweep() {
        let mut config = Config::default();
        config.presence.sweep_interval_secs = 45;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("sweep_interval_secs"));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = Config::default();
        config.station.ffprobe_path = Some(PathBuf::from("/opt/ffprobe"));
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.station.ffprobe_path, Some(PathBuf::from("/opt/ffprobe")));
    }
}
