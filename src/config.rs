// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Settings are read from an optional TOML file. Nothing is ever written
//! back; a missing file simply means defaults.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth adapter settings.
    pub bluetooth: BluetoothConfig,

    /// Connection and session tuning.
    pub link: LinkConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Adapter name such as "hci0". The default adapter when unset.
    pub adapter: Option<String>,

    /// Service name published in the SDP record.
    pub service_name: String,

    /// Power the adapter on instead of reporting it unavailable.
    pub auto_power_on: bool,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            service_name: "BTServer".to_string(),
            auto_power_on: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Size of the receive buffer; one read yields at most this many bytes.
    pub buffer_size: usize,

    /// Give up on an outbound connect after this many seconds.
    /// Timeouts are disabled by leaving them out; zero is rejected.
    pub connect_timeout_secs: Option<u64>,

    /// Give up waiting for an inbound connection after this many seconds.
    pub accept_timeout_secs: Option<u64>,

    /// Fail a send that has not completed after this many seconds.
    pub write_timeout_secs: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            connect_timeout_secs: Some(30),
            accept_timeout_secs: None,
            write_timeout_secs: Some(25),
        }
    }
}

impl LinkConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn accept_timeout(&self) -> Option<Duration> {
        self.accept_timeout_secs.map(Duration::from_secs)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            bail!("link.buffer_size must be greater than zero");
        }
        let timeouts = [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("accept_timeout_secs", self.accept_timeout_secs),
            ("write_timeout_secs", self.write_timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs == Some(0) {
                bail!("link.{} must be greater than zero; omit it to disable the timeout", name);
            }
        }
        Ok(())
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rfcomm-messenger").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.link.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.link.buffer_size, 1024);
        assert_eq!(config.bluetooth.service_name, "BTServer");
        assert!(!config.bluetooth.auto_power_on);
        assert_eq!(config.link.connect_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.link.accept_timeout(), None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [link]
            buffer_size = 256
            "#,
        )
        .unwrap();
        assert_eq!(config.link.buffer_size, 256);
        assert_eq!(config.link.write_timeout_secs, Some(25));
        assert_eq!(config.bluetooth, BluetoothConfig::default());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let err = Config::from_toml("[link]\nbuffer_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("buffer_size"));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        for key in ["connect_timeout_secs", "accept_timeout_secs", "write_timeout_secs"] {
            let err = Config::from_toml(&format!("[link]\n{} = 0\n", key)).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }

        let config = Config::from_toml("[link]\naccept_timeout_secs = 5\n").unwrap();
        assert_eq!(config.link.accept_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[bluetooth]\nadapter = \"hci1\"\nauto_power_on = true\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.bluetooth.adapter.as_deref(), Some("hci1"));
        assert!(config.bluetooth.auto_power_on);
        assert_eq!(config.link, LinkConfig::default());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
