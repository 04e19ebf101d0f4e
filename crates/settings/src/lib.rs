//! Stakeledger Settings
//!
//! Generic config file management. Each service defines its own config type
//! and wraps it in `Settings<T>`; the file is JSON and is written with
//! defaults on first load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Overrides the settings path for every service when set.
pub const CONFIG_ENV: &str = "STAKELEDGER_CONFIG";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },
    #[error("Failed to write settings {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },
    #[error("Failed to parse settings {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// A config value together with the file it lives in.
///
/// ```ignore
/// let settings: Settings<AppConfig> = Settings::load_or_default("stakeledger", None)?;
/// ```
pub struct Settings<T> {
    pub config: T,
    path: PathBuf,
}

impl<T: Serialize + DeserializeOwned + Default> Settings<T> {
    /// Load from `custom_path`, `$STAKELEDGER_CONFIG`, or the service's
    /// default path, in that order. A missing file is created with defaults.
    pub fn load_or_default(service: &str, custom_path: Option<&Path>) -> Result<Self> {
        let path = match custom_path {
            Some(p) => p.to_path_buf(),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| default_settings_path(service)),
        };

        if !path.exists() {
            info!("Writing default settings to {}", path.display());
            let settings = Self {
                config: T::default(),
                path,
            };
            settings.save()?;
            return Ok(settings);
        }

        debug!("Loading settings from {}", path.display());
        let content = fs::read_to_string(&path).map_err(|e| SettingsError::ReadError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let config = serde_json::from_str(&content).map_err(|e| SettingsError::ParseError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { config, path })
    }

    pub fn save(&self) -> Result<()> {
        let write_error = |reason: String| SettingsError::WriteError {
            path: self.path.clone(),
            reason,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        let content =
            serde_json::to_string_pretty(&self.config).map_err(|e| write_error(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| write_error(e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Default settings file for a service.
pub fn default_settings_path(service: &str) -> PathBuf {
    default_config_dir_for(service).join("settings.json")
}

/// Default data directory for a service (databases live here).
///
/// - Linux: `$XDG_DATA_HOME/{service}` or `~/.local/share/{service}`
/// - macOS: `~/Library/Application Support/{Service}`
/// - Windows: `%APPDATA%\{Service}`
pub fn default_data_dir_for(service: &str) -> PathBuf {
    platform_dir(service, "XDG_DATA_HOME", &[".local", "share"])
}

/// Default config directory for a service.
///
/// - Linux: `$XDG_CONFIG_HOME/{service}` or `~/.config/{service}`
/// - macOS: `~/Library/Application Support/{Service}`
/// - Windows: `%APPDATA%\{Service}`
pub fn default_config_dir_for(service: &str) -> PathBuf {
    platform_dir(service, "XDG_CONFIG_HOME", &[".config"])
}

#[allow(unused_variables)]
fn platform_dir(service: &str, xdg_var: &str, xdg_fallback: &[&str]) -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        home_dir()
            .join("Library")
            .join("Application Support")
            .join(capitalize(service))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join("AppData").join("Roaming"))
            .join(capitalize(service))
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let base = std::env::var(xdg_var).map(PathBuf::from).unwrap_or_else(|_| {
            xdg_fallback
                .iter()
                .fold(home_dir(), |dir, part| dir.join(part))
        });
        base.join(service.to_lowercase())
    }
}

fn home_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().to_string() + &chars.as_str().to_lowercase(),
    }
}
