use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AsmInfoError, Result};
use crate::fields::{Field, OutputMode, DEFAULT_FIELDS};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "ASM_INFO_CONFIG";

/// Configuration file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "asminfo.toml";

/// Configuration file looked up in the user config directory
pub const USER_CONFIG_FILE: &str = ".asminfo.toml";

/// Represents the complete configuration for asm-info.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
}

/// Returns the default field flags, in display order.
fn default_fields() -> Vec<String> {
    vec![
        "--name".to_string(),
        "--fullVersion".to_string(),
        "--version".to_string(),
        "--major".to_string(),
        "--minor".to_string(),
        "--patch".to_string(),
        "--release".to_string(),
        "--build".to_string(),
        "--fileVersion".to_string(),
        "--configuration".to_string(),
        "--description".to_string(),
    ]
}

/// Output defaults applied when the command line does not say otherwise.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OutputConfig {
    /// Use tab-delimited output even without `-s`
    #[serde(default)]
    pub simple: bool,

    /// Field flags shown when no field flag is given
    #[serde(default = "default_fields")]
    pub default_fields: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            simple: false,
            default_fields: default_fields(),
        }
    }
}

impl OutputConfig {
    pub fn mode(&self) -> OutputMode {
        if self.simple {
            OutputMode::Simple
        } else {
            OutputMode::Labeled
        }
    }

    /// Configured default fields; unknown flags are skipped.
    pub fn fields(&self) -> Vec<Field> {
        let fields = crate::fields::select_fields(&self.default_fields);
        if fields.is_empty() && self.default_fields.is_empty() {
            DEFAULT_FIELDS.to_vec()
        } else {
            fields
        }
    }
}

/// Finds the configuration file to use, if any.
///
/// Looks in the following order:
/// 1. Path in the `ASM_INFO_CONFIG` environment variable
/// 2. `asminfo.toml` in the current directory
/// 3. `.asminfo.toml` in the user config directory
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }

    let local = Path::new(".").join(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(USER_CONFIG_FILE))
        .filter(|path| path.exists())
}

/// Loads configuration from file or returns defaults.
///
/// # Arguments
/// * `config_path` - Optional explicit configuration file; when `None` the
///   lookup order of [`config_path`] is used
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If a file was found but cannot be read or parsed
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => match self::config_path() {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };

    let config_str = fs::read_to_string(&path).map_err(|e| {
        AsmInfoError::config(format!("cannot read '{}': {}", path.display(), e))
    })?;
    let config: Config = toml::from_str(&config_str).map_err(|e| {
        AsmInfoError::config(format!("invalid TOML in '{}': {}", path.display(), e))
    })?;
    Ok(config)
}
