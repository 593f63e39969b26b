//! Persisted key-value state
//!
//! A flat JSON object on disk. Holds state that must survive restarts but is
//! not user configuration, such as the gateway credential.

use crate::error::BhResult;
use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Key under which the gateway credential is stored
pub const CREDENTIAL_KEY: &str = "ticketDetail";

#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl StateStore {
    /// Open the store at the default location
    pub fn open_default() -> BhResult<Self> {
        Self::open(state_path())
    }

    /// Open (or lazily create) a store backed by `path`
    pub fn open(path: impl Into<PathBuf>) -> BhResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("⚠️ State file {:?} unreadable, starting empty: {}", path, e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> BhResult<()> {
        let mut entries = self.entries.lock()?;
        entries.insert(key.to_string(), value.into());
        self.flush(&entries)
    }

    pub fn remove(&self, key: &str) -> BhResult<()> {
        let mut entries = self.entries.lock()?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> BhResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Temp file + rename: readers never observe a partial write
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        // Holds the gateway ticket: user only, rw-------
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("💾 State saved to {:?}", self.path);
        Ok(())
    }
}

pub fn state_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bhelper")
        .join("state.json")
}
