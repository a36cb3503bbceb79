//! Registry of HTTP listeners.
//!
//! Listeners announce themselves on the bus as `name/ip`. The registry keeps
//! the latest address per name and persists it to a JSON file so listeners
//! survive a restart without re-announcing.

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Listener registry configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientsConfig {
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("clients.json")
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

/// Rejected listener announcements
#[derive(Debug, Clone, PartialEq)]
pub enum AnnounceError {
    MissingSeparator,
    EmptyName,
    InvalidAddress(String),
}

impl fmt::Display for AnnounceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnounceError::MissingSeparator => write!(f, "announcement must be 'name/ip'"),
            AnnounceError::EmptyName => write!(f, "listener name is empty"),
            AnnounceError::InvalidAddress(addr) => write!(f, "'{}' is not an IPv4 address", addr),
        }
    }
}

impl std::error::Error for AnnounceError {}

pub struct ClientRegistry {
    clients: DashMap<String, Ipv4Addr>,
    data_file: PathBuf,
}

impl ClientRegistry {
    /// Open the registry, loading previously saved listeners. A missing or
    /// unreadable file yields an empty registry.
    pub fn load(config: &ClientsConfig) -> Self {
        let registry = Self {
            clients: DashMap::new(),
            data_file: config.data_file.clone(),
        };

        match read_file(&registry.data_file) {
            Ok(saved) => {
                for (name, addr) in saved {
                    registry.clients.insert(name, addr);
                }
                info!(
                    count = registry.clients.len(),
                    path = %registry.data_file.display(),
                    "Loaded listeners"
                );
            }
            Err(e) => {
                warn!(error = %e, path = %registry.data_file.display(), "Starting with no listeners");
            }
        }

        registry
    }

    /// Apply a `name/ip` announcement. Returns true when the registry changed.
    pub fn announce(&self, payload: &str) -> Result<bool, AnnounceError> {
        let (name, addr) = payload
            .split_once('/')
            .ok_or(AnnounceError::MissingSeparator)?;
        let (name, addr) = (name.trim(), addr.trim());
        if name.is_empty() {
            return Err(AnnounceError::EmptyName);
        }
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| AnnounceError::InvalidAddress(addr.to_string()))?;

        if self.clients.get(name).map(|a| *a) == Some(addr) {
            return Ok(false);
        }

        self.clients.insert(name.to_string(), addr);
        info!(name = %name, addr = %addr, "Listener registered");

        if let Err(e) = self.save() {
            error!(error = %e, "Failed to persist listeners");
        }
        Ok(true)
    }

    /// Current listener addresses.
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        self.clients.iter().map(|entry| *entry.value()).collect()
    }

    /// All listeners, ordered by name.
    pub fn list(&self) -> BTreeMap<String, Ipv4Addr> {
        self.clients
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.list())
            .context("Failed to serialize listeners")?;
        std::fs::write(&self.data_file, json)
            .with_context(|| format!("Failed to write {}", self.data_file.display()))?;
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<BTreeMap<String, Ipv4Addr>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}
