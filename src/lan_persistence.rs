// Running-config files: network snapshots stored as pretty-printed JSON

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

use crate::lan_common::LanError;
use crate::lan_network::Network;
use crate::lan_snapshot::NetworkSnapshot;

pub const DEFAULT_CONFIG_FILE: &str = "running-config.json";

#[derive(Debug)]
pub enum PersistenceError {
    Io(io::Error),
    Json(serde_json::Error),
    /// File parsed but describes an impossible topology
    Topology(LanError),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "I/O error: {}", e),
            PersistenceError::Json(e) => write!(f, "invalid configuration file: {}", e),
            PersistenceError::Topology(e) => write!(f, "invalid topology: {}", e),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Io(e) => Some(e),
            PersistenceError::Json(e) => Some(e),
            PersistenceError::Topology(e) => Some(e),
        }
    }
}

impl From<io::Error> for PersistenceError {
    fn from(e: io::Error) -> Self {
        PersistenceError::Io(e)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Json(e)
    }
}

impl From<LanError> for PersistenceError {
    fn from(e: LanError) -> Self {
        PersistenceError::Topology(e)
    }
}

/// Write the network's snapshot; `None` means DEFAULT_CONFIG_FILE.
/// Returns the path written.
pub fn save_running_config(
    network: &Network,
    path: Option<&Path>,
) -> Result<PathBuf, PersistenceError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let json = serde_json::to_string_pretty(&network.snapshot())?;
    fs::write(&path, json)?;

    info!("saved configuration to {}", path.display());
    Ok(path)
}

pub fn read_config(path: &Path) -> Result<NetworkSnapshot, PersistenceError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Replace the network's topology with the file's. Returns the number of devices loaded.
pub fn load_config(network: &mut Network, path: &Path) -> Result<usize, PersistenceError> {
    let snapshot = read_config(path)?;
    network.apply_snapshot(&snapshot)?;

    info!(
        "loaded {} devices, {} connections from {}",
        snapshot.devices.len(),
        snapshot.connections.len(),
        path.display()
    );
    Ok(snapshot.devices.len())
}

/// `.json` files in `dir` whose name mentions "config", sorted
pub fn list_config_files(dir: &Path) -> Result<Vec<PathBuf>, PersistenceError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            let is_json = path.extension().and_then(|s| s.to_str()) == Some("json");
            let mentions_config = path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|name| name.to_ascii_lowercase().contains("config"))
                .unwrap_or(false);
            is_json && mentions_config
        })
        .collect();

    files.sort();
    Ok(files)
}
