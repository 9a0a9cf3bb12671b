//! Configuration loading and management

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::executor::{OverlapPolicy, PlaybackTimings};

const DEFAULT_MACRO_FILE: &str = "macros.txt";
const DEFAULT_IPC_ADDR: &str = "127.0.0.1:47651";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Macro file loaded at startup and used by default for load/save requests
    pub macro_file: PathBuf,

    /// Loopback address of the control surface
    pub ipc_addr: SocketAddr,

    /// What to do when a macro is triggered while it is still playing
    pub overlap: OverlapPolicy,

    /// Fixed delays of the playback protocol
    pub playback: PlaybackTimings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            macro_file: PathBuf::from(DEFAULT_MACRO_FILE),
            ipc_addr: SocketAddr::from(([127, 0, 0, 1], 47651)),
            overlap: OverlapPolicy::default(),
            playback: PlaybackTimings::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("WINHOT_MACRO_FILE") {
            config.macro_file = PathBuf::from(path);
        }

        let addr = lookup("WINHOT_IPC_ADDR").unwrap_or_else(|| DEFAULT_IPC_ADDR.to_string());
        config.ipc_addr = addr
            .parse()
            .with_context(|| format!("invalid WINHOT_IPC_ADDR {:?}", addr))?;

        if let Some(policy) = lookup("WINHOT_OVERLAP") {
            config.overlap = policy
                .parse()
                .with_context(|| format!("invalid WINHOT_OVERLAP {:?}", policy))?;
        }

        if let Some(ms) = lookup("WINHOT_SETTLE_MS") {
            config.playback.settle = parse_millis(&ms).context("invalid WINHOT_SETTLE_MS")?;
        }

        if let Some(ms) = lookup("WINHOT_COMBO_HOLD_MS") {
            config.playback.combo_hold = parse_millis(&ms).context("invalid WINHOT_COMBO_HOLD_MS")?;
        }

        Ok(config)
    }
}

fn parse_millis(value: &str) -> Result<Duration> {
    let ms: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{:?} is not a number of milliseconds", value))?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.macro_file, PathBuf::from("macros.txt"));
        assert_eq!(config.ipc_addr.to_string(), "127.0.0.1:47651");
        assert_eq!(config.overlap, OverlapPolicy::Allow);
        assert_eq!(config.playback.settle, Duration::from_millis(10));
    }

    #[test]
    fn test_config_overrides() {
        let config = load_with(&[
            ("WINHOT_MACRO_FILE", "C:/macros/work.txt"),
            ("WINHOT_IPC_ADDR", "127.0.0.1:9000"),
            ("WINHOT_OVERLAP", "reject"),
            ("WINHOT_COMBO_HOLD_MS", "25"),
        ])
        .unwrap();
        assert_eq!(config.macro_file, PathBuf::from("C:/macros/work.txt"));
        assert_eq!(config.ipc_addr.port(), 9000);
        assert_eq!(config.overlap, OverlapPolicy::Reject);
        assert_eq!(config.playback.combo_hold, Duration::from_millis(25));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(load_with(&[("WINHOT_IPC_ADDR", "localhost")]).is_err());
        assert!(load_with(&[("WINHOT_OVERLAP", "sometimes")]).is_err());
        assert!(load_with(&[("WINHOT_SETTLE_MS", "-1")]).is_err());
    }
}
