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
//! Handles loading and saving link settings.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bluetooth::{Framing, PeerHandle, DEFAULT_RFCOMM_CHANNEL};

/// Default read buffer, one chunk per read call.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Peripheral to connect to.
    #[serde(default)]
    pub peer: PeerConfig,

    /// Link settings.
    #[serde(default)]
    pub link: LinkConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Display name used in logs until the adapter reports an alias.
    pub name: String,

    /// Bluetooth address, `XX:XX:XX:XX:XX:XX`.
    pub address: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            name: "ESP32".to_string(),
            address: "34:5F:45:AA:B2:0A".to_string(),
        }
    }
}

impl PeerConfig {
    pub fn to_handle(&self) -> PeerHandle {
        PeerHandle::new(&self.name, &self.address)
    }
}

/// What a failed write does to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Log the failure; only a read failure ends the connection.
    #[default]
    LogOnly,
    /// Treat the failure as a lost connection.
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// RFCOMM channel the peripheral's serial port service listens on.
    pub rfcomm_channel: u8,

    /// Maximum bytes taken from the stream per read call.
    pub read_buffer_size: usize,

    /// How inbound bytes are cut into messages.
    pub framing: Framing,

    pub write_failure: WriteFailurePolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            rfcomm_channel: DEFAULT_RFCOMM_CHANNEL,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            framing: Framing::default(),
            write_failure: WriteFailurePolicy::default(),
        }
    }
}

impl Config {
    /// Default location: `<config_dir>/rfcomm-link/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rfcomm-link")
            .join("config.toml")
    }

    /// Load configuration from the default file or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default file.
    #[allow(dead_code)]
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.link.read_buffer_size == 0 {
            bail!("link.read_buffer_size must be greater than zero");
        }
        if self.peer.address.trim().is_empty() {
            bail!("peer.address must not be empty");
        }
        Ok(())
    }
}
