//! Configuration Management
//!
//! Handles persistent configuration storage for ta-limits.

use crate::advisor::poller::RowPolicy;
use crate::aws::auth;
use crate::aws::client::SessionOptions;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Region whose advisory rows are applied
    #[serde(default)]
    pub region: Option<String>,
    /// Named AWS profile
    #[serde(default)]
    pub profile: Option<String>,
    /// Support API endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Fail on malformed advisory rows instead of skipping them
    #[serde(default)]
    pub strict_rows: bool,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ta-limits").join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`; a missing or unreadable file gives defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective region (CLI > config > AWS env).
    /// `None` leaves the choice to the profile chain, then the client default.
    pub fn effective_region(&self) -> Option<String> {
        self.region.clone().or_else(auth::region_from_env)
    }

    /// Get effective profile (CLI > config > AWS_PROFILE)
    pub fn effective_profile(&self) -> Option<String> {
        self.profile.clone().or_else(auth::profile_from_env)
    }

    pub fn row_policy(&self) -> RowPolicy {
        if self.strict_rows {
            RowPolicy::Strict
        } else {
            RowPolicy::Skip
        }
    }

    /// Apply command line values on top of the stored ones
    pub fn merge_cli(
        mut self,
        region: Option<String>,
        profile: Option<String>,
        endpoint: Option<String>,
        strict: bool,
    ) -> Self {
        if region.is_some() {
            self.region = region;
        }
        if profile.is_some() {
            self.profile = profile;
        }
        if endpoint.is_some() {
            self.endpoint = endpoint;
        }
        self.strict_rows |= strict;
        self
    }

    /// Options for opening the Support API session
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            region: self.effective_region(),
            profile: self.effective_profile(),
            endpoint: self.endpoint.clone(),
            credentials: None,
        }
    }
}
