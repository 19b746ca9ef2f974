// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration for a RamFS tree

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level tree configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RamFsConfig {
    pub root: RootConfig,
    pub security: SecurityPolicy,
    /// First identifier handed out by the default allocator; the root takes it
    pub first_id: u64,
}

impl Default for RamFsConfig {
    fn default() -> Self {
        Self {
            root: RootConfig::default(),
            security: SecurityPolicy::default(),
            first_id: 1,
        }
    }
}

/// Ownership and permissions of the root directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RootConfig {
    pub owner: String,
    pub group: String,
    /// Permission bits; the directory flag is implied
    pub mode: u32,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            owner: "root".to_string(),
            group: "root".to_string(),
            mode: 0o755,
        }
    }
}

/// Permission enforcement switches
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SecurityPolicy {
    /// When false every open, walk and structural change is allowed
    pub enforce_permissions: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            enforce_permissions: true,
        }
    }
}

impl RamFsConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing RamFS configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("in config file {:?}", path))
    }
}
