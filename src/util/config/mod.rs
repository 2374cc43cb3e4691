//! rowscope configuration
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. --config FILE, or the user-level file (~/.config/rowscope/config.toml)
//! 3. Default values
//! ```
//!
//! # Example
//!
//! ```toml
//! [repl]
//! prompt = "db > "
//! history_size = 500
//! vi_mode = true
//!
//! [functions]
//! welcome = "println('Hello!')"
//! adults = "rows.filter { it.age >= 18 }"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// REPL settings
    #[serde(default)]
    pub repl: ReplConfig,
    /// Functions registered at startup: name → body. A `[functions]`
    /// table replaces the defaults.
    #[serde(default = "default_functions")]
    pub functions: BTreeMap<String, String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            repl: ReplConfig::default(),
            functions: default_functions(),
        }
    }
}

fn default_functions() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "welcome".to_string(),
        "println('Welcome to rowscope!')".to_string(),
    )])
}

/// REPL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplConfig {
    /// History size
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// History file path, defaults to ~/.db_repl_history
    #[serde(default)]
    pub history_file: Option<PathBuf>,
    /// Prompt string
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Prompt while a block is open
    #[serde(default = "default_continuation_prompt")]
    pub continuation_prompt: String,
    /// Enable VI editing mode
    #[serde(default)]
    pub vi_mode: bool,
    /// Color success and error lines
    #[serde(default = "default_colors")]
    pub colors: bool,
    /// Start with debug mode on
    #[serde(default)]
    pub debug: bool,
}

fn default_history_size() -> usize {
    1000
}

fn default_prompt() -> String {
    "db > ".to_string()
}

fn default_continuation_prompt() -> String {
    "... ".to_string()
}

fn default_colors() -> bool {
    true
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            history_file: None,
            prompt: default_prompt(),
            continuation_prompt: default_continuation_prompt(),
            vi_mode: false,
            colors: default_colors(),
            debug: false,
        }
    }
}

impl ReplConfig {
    /// Configured history file, or the per-user default
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file.clone().or_else(default_history_path)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// ~/.db_repl_history
pub fn default_history_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".db_repl_history"))
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    // Try XDG config directory on Unix
    if let Some(xdg_config) = std::env::var_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("rowscope"));
    }

    // Fallback to ~/.config/rowscope
    if let Some(home) = std::env::var_os("HOME") {
        return Some(PathBuf::from(home).join(".config").join("rowscope"));
    }

    // On Windows, try %APPDATA%
    std::env::var_os("APPDATA").map(|appdata| PathBuf::from(appdata).join("rowscope"))
}

/// Get the user config file path (~/.config/rowscope/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load user-level configuration.
/// Returns the default config if the file doesn't exist.
pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    match get_config_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Ok(UserConfig::default()),
    }
}

/// Load configuration from an explicit file, which must exist
pub fn load_config_from(path: &Path) -> Result<UserConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&content)?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
