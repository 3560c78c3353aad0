//! Core configuration types for bx.

use crate::{
    bx_case::{BxCase, BxUserCase},
    bx_runtime::BxRuntime,
    prelude::*,
};
use std::{collections::HashSet, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};
use tracing::info;

fn default_timeout_secs() -> u64 {
    120
}

/// Global configuration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BxGlobalConfig {
    /// Configuration version.
    pub version: String,
    /// Root folder for generated artifacts.
    #[serde(default)]
    pub artifacts_path: Option<PathBuf>,
    /// Build and execute timeout, in seconds, for every partition.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directories searched for library references.
    #[serde(default)]
    pub library_paths: Vec<PathBuf>,
}

/// User-provided configuration from TOML files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BxUserConfig {
    /// Global settings.
    pub global: BxGlobalConfig,
    /// Runtime definitions.
    #[serde(default)]
    pub runtimes: Vec<BxRuntime>,
    /// Benchmark case definitions.
    #[serde(default)]
    pub cases: Vec<BxUserCase>,
}

/// Internal configuration with generated UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BxConfig {
    /// Global settings.
    pub global: BxGlobalConfig,
    /// Runtime definitions.
    pub runtimes: Vec<BxRuntime>,
    /// Benchmark cases with UUIDs.
    pub cases: Vec<BxCase>,
}

impl BxConfig {
    /// Convert user configuration to internal configuration.
    ///
    /// Assigns UUIDs to cases and checks that every runtime a case names is
    /// declared exactly once.
    pub fn from_user_config(config: BxUserConfig) -> Result<Self> {
        let mut names = HashSet::new();
        for runtime in config.runtimes.iter() {
            if !names.insert(runtime.name.as_str()) {
                return Err(Error::DuplicateRuntime(runtime.name.clone()));
            }
        }
        for case in config.cases.iter() {
            if let Some(runtime) = &case.runtime {
                if !names.contains(runtime.as_str()) {
                    return Err(Error::UnknownRuntime {
                        case: case.name.clone(),
                        runtime: runtime.clone(),
                    });
                }
            }
        }

        info!(
            "Loaded {} runtimes and {} cases",
            config.runtimes.len(),
            config.cases.len()
        );
        Ok(Self {
            global: config.global,
            runtimes: config.runtimes,
            cases: config
                .cases
                .into_iter()
                .map(BxCase::from_user_case)
                .collect(),
        })
    }

    /// Load and convert a configuration file.
    pub fn from_file(file_path: &Path) -> Result<Self> {
        Self::from_user_config(BxUserConfig::from_file(file_path)?)
    }

    /// Find a runtime by name.
    pub fn runtime(&self, name: &str) -> Option<&BxRuntime> {
        self.runtimes.iter().find(|runtime| runtime.name == name)
    }
}

impl BxUserConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(file_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(file_path)?;
        Self::from_toml(&contents)
    }
    /// Parse configuration from TOML string.
    pub fn from_toml(value: &str) -> Result<Self> {
        Ok(toml::from_str(value)?)
    }
    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}
