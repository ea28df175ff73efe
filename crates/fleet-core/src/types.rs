//! Shared types used across Fleetwatch crates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable `category:name` identifier for a device.
pub type DeviceKey = String;

/// Per-device check results, ordered by key.
pub type StatusMap = BTreeMap<DeviceKey, DeviceStatus>;

/// Build the correlation key for a device.
pub fn device_key(category: &str, name: &str) -> DeviceKey {
    format!("{category}:{name}")
}

/// A device flattened out of the catalog, ready to be checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub category: String,
    pub name: String,
    /// Raw address as stored (`host[:port][/path]`, optional scheme).
    pub address: String,
    pub key: DeviceKey,
}

impl DeviceEntry {
    pub fn new(category: &str, name: &str, address: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            address: address.to_string(),
            key: device_key(category, name),
        }
    }
}

/// Reachability of a device. Anything short of a positive probe signal
/// is `Offline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl DeviceStatus {
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            DeviceStatus::Online
        } else {
            DeviceStatus::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == DeviceStatus::Online
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapse a list of entries into `key → address`. Later entries win on
/// key collisions.
pub fn address_map(entries: &[DeviceEntry]) -> BTreeMap<DeviceKey, String> {
    entries
        .iter()
        .map(|e| (e.key.clone(), e.address.clone()))
        .collect()
}

/// Seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
