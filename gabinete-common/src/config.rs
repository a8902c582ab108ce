//! Configuration loading and data root resolution
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal; it only logs a warning.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the data root
pub const ROOT_FOLDER_ENV: &str = "GABINETE_ROOT_FOLDER";
/// Environment variable overriding the admin key
pub const ADMIN_KEY_ENV: &str = "GABINETE_ADMIN_KEY";
/// Admin key used when nothing else is configured
pub const DEFAULT_ADMIN_KEY: &str = "regina-demo";
/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:5730";

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub admin_key: Option<String>,
    pub bind: Option<String>,
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Load the explicit path, or the per-user default path if it exists
    ///
    /// Falls back to an empty config when the file is absent or invalid.
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let path = match explicit.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => return Self::default(),
        };

        if !path.exists() {
            if explicit.is_some() {
                warn!("Config file not found: {} (using defaults)", path.display());
            }
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{} (using defaults)", e);
                Self::default()
            }
        }
    }
}

/// `~/.config/gabinete/config.toml` (platform equivalent elsewhere)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gabinete").join("config.toml"))
}

/// Platform data directory fallback for the data root
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("gabinete"))
        .unwrap_or_else(|| PathBuf::from("./gabinete_data"))
}

/// Resolves the data root following the priority order above
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml: TomlConfig,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml: TomlConfig) -> Self {
        Self { cli_arg, toml }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }
        if let Some(path) = std::env::var_os(ROOT_FOLDER_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.toml.root_folder {
            return path.clone();
        }
        default_root_folder()
    }
}

/// Where the admin key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    CommandLine,
    Environment,
    ConfigFile,
    Default,
}

/// Resolve the shared admin secret; blank values are skipped
pub fn resolve_admin_key(cli_arg: Option<&str>, toml: &TomlConfig) -> (String, KeySource) {
    let non_blank = |v: &str| {
        let v = v.trim();
        (!v.is_empty()).then(|| v.to_string())
    };

    if let Some(key) = cli_arg.and_then(non_blank) {
        return (key, KeySource::CommandLine);
    }
    if let Some(key) = std::env::var(ADMIN_KEY_ENV).ok().as_deref().and_then(non_blank) {
        return (key, KeySource::Environment);
    }
    if let Some(key) = toml.admin_key.as_deref().and_then(non_blank) {
        return (key, KeySource::ConfigFile);
    }
    (DEFAULT_ADMIN_KEY.to_string(), KeySource::Default)
}

/// Directory layout under the data root
///
/// Media paths recorded in entries are relative to the root, so the whole
/// folder can be moved without rewriting rows.
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("gabinete.db")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("uploads").join("images")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("uploads").join("audio")
    }

    /// Create the root and upload directories if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.images_dir())?;
        std::fs::create_dir_all(self.audio_dir())?;
        Ok(())
    }
}
