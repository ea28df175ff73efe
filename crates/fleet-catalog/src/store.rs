//! CatalogStore — persistence for the device catalog.
//!
//! Every operation works on a fresh snapshot: mutations load the current
//! document, apply the change, and write it back while holding a write
//! lock, so concurrent writers never lose each other's updates. Readers
//! never block on the lock.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fleet_core::DeviceEntry;
use tracing::{debug, info};

use crate::error::CatalogResult;
use crate::types::Catalog;

enum Backend {
    File {
        path: PathBuf,
        backup: bool,
        write_lock: Mutex<()>,
    },
    Memory(Mutex<Catalog>),
}

/// Thread-safe handle to the device catalog.
#[derive(Clone)]
pub struct CatalogStore {
    backend: Arc<Backend>,
}

impl CatalogStore {
    /// Open a JSON-backed catalog at `path`. The file does not need to
    /// exist yet; a missing file reads as an empty catalog.
    pub fn open(path: impl Into<PathBuf>, backup: bool) -> Self {
        let path = path.into();
        debug!(?path, backup, "catalog store opened");
        Self {
            backend: Arc::new(Backend::File {
                path,
                backup,
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Create an ephemeral in-memory catalog (for testing).
    pub fn open_in_memory() -> Self {
        Self::with_catalog(Catalog::default())
    }

    /// In-memory catalog seeded with `catalog`.
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            backend: Arc::new(Backend::Memory(Mutex::new(catalog))),
        }
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self.backend.as_ref() {
            Backend::File { path, .. } => Some(path),
            Backend::Memory(_) => None,
        }
    }

    /// Read the current catalog.
    pub fn load(&self) -> CatalogResult<Catalog> {
        match self.backend.as_ref() {
            Backend::File { path, .. } => read_file(path),
            Backend::Memory(catalog) => Ok(catalog.lock().unwrap_or_else(PoisonError::into_inner).clone()),
        }
    }

    /// Read the catalog flattened into device entries.
    pub fn entries(&self) -> CatalogResult<Vec<DeviceEntry>> {
        Ok(self.load()?.entries())
    }

    // ── Categories ─────────────────────────────────────────────────

    pub fn add_category(&self, name: &str) -> CatalogResult<()> {
        self.update(|catalog| catalog.add_category(name))?;
        info!(category = %name.trim(), "category added");
        Ok(())
    }

    /// Remove a category and its devices. Returns the number of devices removed.
    pub fn remove_category(&self, name: &str) -> CatalogResult<usize> {
        let removed = self.update(|catalog| catalog.remove_category(name))?;
        info!(category = %name.trim(), devices = removed, "category removed");
        Ok(removed)
    }

    // ── Devices ────────────────────────────────────────────────────

    pub fn add_device(&self, category: &str, name: &str, address: &str) -> CatalogResult<DeviceEntry> {
        let entry = self.update(|catalog| catalog.add_device(category, name, address))?;
        info!(key = %entry.key, address = %entry.address, "device added");
        Ok(entry)
    }

    pub fn remove_device(&self, category: &str, name: &str) -> CatalogResult<()> {
        self.update(|catalog| catalog.remove_device(category, name))?;
        info!(category = %category.trim(), device = %name.trim(), "device removed");
        Ok(())
    }

    /// Replace the whole catalog.
    pub fn save(&self, catalog: &Catalog) -> CatalogResult<()> {
        self.update(|current| {
            *current = catalog.clone();
            Ok(())
        })
    }

    /// Load, mutate, and persist under the write lock. Nothing is written
    /// if `apply` fails.
    fn update<T>(&self, apply: impl FnOnce(&mut Catalog) -> CatalogResult<T>) -> CatalogResult<T> {
        match self.backend.as_ref() {
            Backend::File {
                path,
                backup,
                write_lock,
            } => {
                let _guard = write_lock.lock().unwrap_or_else(PoisonError::into_inner);
                let mut catalog = read_file(path)?;
                let out = apply(&mut catalog)?;
                write_file(path, &catalog, *backup)?;
                Ok(out)
            }
            Backend::Memory(current) => {
                let mut guard = current.lock().unwrap_or_else(PoisonError::into_inner);
                let mut catalog = guard.clone();
                let out = apply(&mut catalog)?;
                *guard = catalog;
                Ok(out)
            }
        }
    }
}

fn read_file(path: &Path) -> CatalogResult<Catalog> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?path, "catalog file missing, using empty catalog");
            return Ok(Catalog::default());
        }
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Catalog::default());
    }
    Ok(serde_json::from_str(&content)?)
}

fn write_file(path: &Path, catalog: &Catalog, backup: bool) -> CatalogResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    if backup && path.exists() {
        let backup_path = sibling(path, ".bak");
        fs::copy(path, &backup_path)?;
        debug!(?backup_path, "catalog backup written");
    }

    let json = serde_json::to_string_pretty(catalog)?;
    let tmp_path = sibling(path, ".tmp");
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    debug!(?path, devices = catalog.device_count(), "catalog written");
    Ok(())
}

/// `devices.json` → `devices.json<suffix>`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
