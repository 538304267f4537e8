//! Configuration
//!
//! YAML configuration file, CLI overrides and conversion into the
//! immutable [`RunContext`] used for a run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::adapters::PushoverConfig;
use crate::error::{Error, Result};
use crate::flusher::context::{Owner, RunContext};
use crate::flusher::policy::FlushPolicy;
use crate::flusher::units;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "cacheflush.yaml";

// =============================================================================
// Config File
// =============================================================================

/// Contents of the YAML configuration file. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FlushConfig {
    // Log settings
    pub log_file: String,
    pub debug_logging: bool,
    pub log_json: bool,

    // Permission settings
    #[serde(rename = "OwnerUID")]
    pub owner_uid: u32,
    #[serde(rename = "OwnerGID")]
    pub owner_gid: u32,

    // Path settings
    pub backing_pool: String,
    #[serde(deserialize_with = "nullable")]
    pub cache_drives: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub override_directories: Vec<String>,

    // Behavior settings
    pub force_free_space: String,
    pub minimum_age: String,
    pub current_access_threshold: String,
    pub flush_policy: String,
    pub clear_empty_dirs: bool,
    pub skip_move: bool,
    pub force: bool,

    // Pushover settings
    pub pushover_enabled: bool,
    pub pushover_app_key: String,
    pub pushover_user_key: String,

    /// Prometheus textfile written after the run
    pub metrics_file: Option<PathBuf>,
}

/// Treat an explicit YAML `null` (e.g. `OverrideDirectories:` with no
/// entries) like an absent key.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl FlushConfig {
    /// Load the config file at `path`, or `cacheflush.yaml` from the working
    /// directory when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(path)?;
        let data = fs::read_to_string(&path).map_err(|e| {
            Error::ConfigInvalid(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&data)
    }

    /// Parse a config document.
    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Apply CLI flags. A flag only ever turns an option on.
    pub fn apply_overrides(&mut self, skip_move: bool, force: bool) {
        self.skip_move |= skip_move;
        self.force |= force;
    }

    /// Check required keys and that every declared path exists.
    pub fn validate(&self) -> Result<()> {
        if self.log_file.is_empty() {
            return Err(invalid("LogFile not configured."));
        }

        if self.backing_pool.is_empty() {
            return Err(invalid("BackingPool not configured."));
        }
        if !Path::new(&self.backing_pool).exists() {
            return Err(Error::ConfigInvalid(format!(
                "Backing pool: {} does not exist",
                self.backing_pool
            )));
        }

        if self.cache_drives.is_empty() {
            return Err(invalid("CacheDrives not configured."));
        }
        for drive in &self.cache_drives {
            if !Path::new(drive).exists() {
                return Err(Error::ConfigInvalid(format!(
                    "Cache drive: {} does not exist or is inaccessible",
                    drive
                )));
            }
        }

        if self.flush_policy.is_empty() {
            return Err(invalid("FlushPolicy not configured."));
        }
        self.flush_policy.parse::<FlushPolicy>()?;

        Ok(())
    }

    /// Pushover settings, if enabled and complete.
    pub fn pushover(&self) -> Option<PushoverConfig> {
        if !self.pushover_enabled {
            return None;
        }
        if self.pushover_app_key.is_empty() {
            warn!("Pushover enabled but AppKey not provided, disabling pushover");
            return None;
        }
        if self.pushover_user_key.is_empty() {
            warn!("Pushover enabled but UserKey not provided, disabling pushover");
            return None;
        }
        Some(PushoverConfig::new(
            self.pushover_app_key.clone(),
            self.pushover_user_key.clone(),
        ))
    }

    /// Convert into the context passed through a run.
    pub fn to_run_context(&self) -> Result<RunContext> {
        let policy = self.flush_policy.parse::<FlushPolicy>()?;
        let drives = self.cache_drives.iter().map(PathBuf::from).collect();

        let mut ctx = RunContext::new(&self.backing_pool, drives, policy);
        ctx.override_directories = self.override_directories.clone();
        ctx.owner = Owner::new(self.owner_uid, self.owner_gid);
        ctx.required_free = units::bytes(&self.force_free_space);
        ctx.minimum_age = units::seconds(&self.minimum_age);
        ctx.current_access_threshold = units::seconds(&self.current_access_threshold);
        ctx.clear_empty_dirs = self.clear_empty_dirs;
        ctx.skip_move = self.skip_move;
        ctx.force = self.force;
        Ok(ctx)
    }
}

fn invalid(msg: &str) -> Error {
    Error::ConfigInvalid(msg.to_string())
}

fn resolve_config_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        Some(path) => Err(Error::ConfigInvalid(format!(
            "Config file: {} does not exist",
            path.display()
        ))),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Ok(PathBuf::from(DEFAULT_CONFIG_FILE)),
        None => Err(Error::ConfigInvalid(format!(
            "No config file provided and {} not found in execution directory.",
            DEFAULT_CONFIG_FILE
        ))),
    }
}
