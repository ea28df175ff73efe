//! fleet.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub server: ServerConfig,
    pub probe: ProbeConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Deadline for the TCP connect phase of the HTTP probe.
    pub connect_timeout: String,
    /// Deadline for the whole HTTP probe, connect included.
    pub total_timeout: String,
    /// Deadline handed to the system ping.
    pub ping_timeout: String,
    pub user_agent: String,
    /// Host substrings that mark a public domain; such hosts are never pinged.
    pub external_domains: Vec<String>,
    /// Most `ping` processes alive at once.
    pub max_concurrent_pings: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: "2s".to_string(),
            total_timeout: "3s".to_string(),
            ping_timeout: "2s".to_string(),
            user_agent: concat!("fleetwatch/", env!("CARGO_PKG_VERSION")).to_string(),
            external_domains: vec![".com".to_string(), ".org".to_string(), ".net".to_string()],
            max_concurrent_pings: 64,
        }
    }
}

impl ProbeConfig {
    pub fn connect_timeout(&self) -> Duration {
        parse_duration(&self.connect_timeout).unwrap_or(Duration::from_secs(2))
    }

    pub fn total_timeout(&self) -> Duration {
        parse_duration(&self.total_timeout).unwrap_or(Duration::from_secs(3))
    }

    pub fn ping_timeout(&self) -> Duration {
        parse_duration(&self.ping_timeout).unwrap_or(Duration::from_secs(2))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,
    /// Copy the previous catalog to `<path>.bak` before every write.
    pub backup: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("devices.json"),
            backup: true,
        }
    }
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Parse a duration string like "5s", "500ms", "1m". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
