//! Locating the SteelSeries Engine (GameSense) server
//!
//! The engine writes its current `host:port` to `coreProps.json` every time
//! it starts, so the address has to be looked up rather than configured.

use crate::config::DaemonConfig;
use crate::error::{KeywaveError, Result};
use log::debug;
use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CoreProps {
    address: String,
}

/// Where SteelSeries Engine 3 keeps coreProps.json on this platform
pub fn default_core_props_path() -> Option<PathBuf> {
    if cfg!(windows) {
        env::var_os("PROGRAMDATA").map(|data| {
            PathBuf::from(data)
                .join("SteelSeries")
                .join("SteelSeries Engine 3")
                .join("coreProps.json")
        })
    } else if cfg!(target_os = "macos") {
        Some(PathBuf::from(
            "/Library/Application Support/SteelSeries Engine 3/coreProps.json",
        ))
    } else {
        None
    }
}

/// Read the `address` field of a coreProps.json file.
pub fn read_address(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            KeywaveError::CorePropsMissing(path.to_path_buf())
        } else {
            KeywaveError::CorePropsRead {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let props: CoreProps =
        serde_json::from_str(&content).map_err(|source| KeywaveError::CorePropsParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(props.address)
}

/// Resolve the daemon's base URL, e.g. `http://127.0.0.1:51234`.
pub fn resolve_base_url(config: &DaemonConfig) -> Result<String> {
    if let Some(ref address) = config.address {
        debug!("using configured daemon address {}", address);
        return Ok(base_url(address));
    }

    let path = match config.core_props {
        Some(ref path) => path.clone(),
        None => default_core_props_path().ok_or(KeywaveError::NoCorePropsLocation)?,
    };
    let address = read_address(&path)?;
    debug!("daemon address {} from {}", address, path.display());
    Ok(base_url(&address))
}

fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}
