//! The catalog document and its in-memory mutations.

use std::collections::BTreeMap;

use fleet_core::DeviceEntry;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};
use crate::validate::{validate_address, validate_name};

/// Devices in one category: name → address.
pub type CategoryDevices = BTreeMap<String, String>;

/// Category → device → address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryDevices>,
}

impl Catalog {
    /// Flatten into device entries, categories and devices in name order.
    pub fn entries(&self) -> Vec<DeviceEntry> {
        self.categories
            .iter()
            .flat_map(|(category, devices)| {
                devices
                    .iter()
                    .map(move |(name, address)| DeviceEntry::new(category, name, address))
            })
            .collect()
    }

    pub fn device_count(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.device_count() == 0
    }

    pub fn add_category(&mut self, name: &str) -> CatalogResult<()> {
        validate_name("category", name)?;
        let name = name.trim();
        if self.categories.contains_key(name) {
            return Err(CatalogError::Conflict(format!("category '{name}'")));
        }
        self.categories.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    /// Remove a category with all of its devices. Returns how many devices went with it.
    pub fn remove_category(&mut self, name: &str) -> CatalogResult<usize> {
        self.categories
            .remove(name.trim())
            .map(|devices| devices.len())
            .ok_or_else(|| CatalogError::NotFound(format!("category '{}'", name.trim())))
    }

    /// Add a device, creating its category if needed.
    pub fn add_device(&mut self, category: &str, name: &str, address: &str) -> CatalogResult<DeviceEntry> {
        validate_name("category", category)?;
        validate_name("device", name)?;
        validate_address(address)?;
        let (category, name, address) = (category.trim(), name.trim(), address.trim());

        let devices = self.categories.entry(category.to_string()).or_default();
        if devices.contains_key(name) {
            return Err(CatalogError::Conflict(format!("device '{name}' in category '{category}'")));
        }
        devices.insert(name.to_string(), address.to_string());
        Ok(DeviceEntry::new(category, name, address))
    }

    pub fn remove_device(&mut self, category: &str, name: &str) -> CatalogResult<()> {
        let (category, name) = (category.trim(), name.trim());
        let devices = self
            .categories
            .get_mut(category)
            .ok_or_else(|| CatalogError::NotFound(format!("category '{category}'")))?;
        devices
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CatalogError::NotFound(format!("device '{name}' in category '{category}'")))
    }
}
