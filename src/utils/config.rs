// Copyright 2021 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Structures for the configuration file
use super::global_config::GlobalConfigBuilder;
use crate::provider::{
    SearchLimits, DEFAULT_MAX_CERTIFICATES_PER_SLOT, DEFAULT_MAX_OBJECTS_PER_SEARCH,
};
use anyhow::{Context, Result};
use derivative::Derivative;
use log::LevelFilter;
use serde::Deserialize;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Core settings
///
/// See the config.toml file for a description of each field.
#[derive(Copy, Clone, Deserialize, Debug, Default)]
#[allow(missing_docs)]
pub struct CoreSettings {
    pub log_level: Option<LevelFilter>,
    pub log_timestamp: Option<bool>,
    pub log_error_details: Option<bool>,
}

/// Object search bounds
#[derive(Copy, Clone, Deserialize, Debug, Default)]
#[allow(missing_docs)]
pub struct SearchSettings {
    pub max_objects_per_search: Option<usize>,
    pub max_certificates_per_slot: Option<usize>,
}

/// PIN settings
#[derive(Deserialize, Default, Derivative, Zeroize, ZeroizeOnDrop)]
#[derivative(Debug)]
pub struct PinSettings {
    /// User PIN handed to every token asking for one
    #[derivative(Debug = "ignore")]
    pub user_pin: Option<String>,
}

/// Configuration of the tool
///
/// Every section and field is optional.
#[derive(Deserialize, Debug, Default)]
#[allow(missing_docs)]
pub struct Config {
    #[serde(default)]
    pub core_settings: CoreSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub pin: PinSettings,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Config> {
        toml::from_str(text).context("Failed to parse the configuration")
    }

    /// Read the configuration file, falling back to the defaults if there is none.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Config::from_toml(&text)
    }

    /// Search bounds, defaults filled in
    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            max_objects_per_search: self
                .search
                .max_objects_per_search
                .unwrap_or(DEFAULT_MAX_OBJECTS_PER_SEARCH),
            max_certificates_per_slot: self
                .search
                .max_certificates_per_slot
                .unwrap_or(DEFAULT_MAX_CERTIFICATES_PER_SLOT),
        }
    }

    /// Apply the settings shared by every component of the crate
    pub fn apply_global_settings(&self) {
        GlobalConfigBuilder::new()
            .with_log_error_details(self.core_settings.log_error_details.unwrap_or(false))
            .build();
    }
}
