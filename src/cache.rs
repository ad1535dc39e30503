//! Per-module cache files. One JSON document per bus address so a restart
//! can skip the slow name/memory load. Missing or corrupt files are treated
//! as a cache miss, a version mismatch forces a rescan of that address.

use crate::consts::CACHE_VERSION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedChannel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "Unit", skip_serializing_if = "Option::is_none", default)]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pulses_per_unit: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedModule {
    pub version: u32,
    pub module_type: u8,
    pub name: String,
    pub channels: BTreeMap<u8, CachedChannel>,
}

/// The platform cache directory, `~/.velbuscache` when none is available.
pub fn default_cache_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.cache_dir().join("velbus"))
        .unwrap_or_else(|| PathBuf::from(".velbuscache"))
}

fn cache_file(dir: &Path, address: u8) -> PathBuf {
    dir.join(format!("{address}.json"))
}

/// Read the cache entry for an address. `None` for anything unusable so the
/// caller falls back to a live scan.
pub fn load(dir: &Path, address: u8, module_type: u8) -> Option<CachedModule> {
    let path = cache_file(dir, address);
    let contents = std::fs::read_to_string(&path).ok()?;
    let cached: CachedModule = match serde_json::from_str(&contents) {
        Ok(cached) => cached,
        Err(err) => {
            warn!("ignoring corrupt cache file {}: {err}", path.display());
            return None;
        }
    };
    if cached.version != CACHE_VERSION {
        debug!(
            "cache file {} has version {}, expected {CACHE_VERSION}; rescanning",
            path.display(),
            cached.version
        );
        return None;
    }
    if cached.module_type != module_type {
        debug!(
            "cache file {} is for module type {:02X}, bus has {:02X}; rescanning",
            path.display(),
            cached.module_type,
            module_type
        );
        return None;
    }
    Some(cached)
}

pub fn store(dir: &Path, address: u8, cached: &CachedModule) {
    if let Err(err) = std::fs::create_dir_all(dir) {
        warn!("could not create cache directory {}: {err}", dir.display());
        return;
    }
    let path = cache_file(dir, address);
    match serde_json::to_string_pretty(cached) {
        Ok(contents) => {
            if let Err(err) = std::fs::write(&path, contents) {
                warn!("could not write cache file {}: {err}", path.display());
            }
        }
        Err(err) => warn!("could not serialize cache for address {address}: {err}"),
    }
}

pub fn clear(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if entry.path().extension().is_some_and(|ext| ext == "json") {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}
