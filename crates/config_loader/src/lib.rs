//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Apply `section.key=value` overrides
//! - Validate configuration legality
//! - Generate `RunConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("Project: {}", config.main.project_name);
//! ```

mod overrides;
mod parser;
mod validator;

pub use contracts::RunConfig;
pub use overrides::Override;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    /// Relative locations inside the file are resolved against the file's
    /// directory.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RunConfig, ContractError> {
        Self::load_with_overrides(path, &[])
    }

    /// Load configuration from file path, applying overrides first
    pub fn load_with_overrides(
        path: &Path,
        overrides: &[Override],
    ) -> Result<RunConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let mut config = Self::parse_and_validate(&content, format, overrides)?;

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::resolve_relative_paths(&mut config, base);
        Ok(config)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<RunConfig, ContractError> {
        Self::parse_and_validate(content, format, &[])
    }

    /// Load configuration from string, applying overrides first
    pub fn load_from_str_with_overrides(
        content: &str,
        format: ConfigFormat,
        overrides: &[Override],
    ) -> Result<RunConfig, ContractError> {
        Self::parse_and_validate(content, format, overrides)
    }

    /// Serialize RunConfig to TOML string
    pub fn to_toml(config: &RunConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize RunConfig to JSON string
    pub fn to_json(config: &RunConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Resolve relative component locations and the tracking root against `base`
    ///
    /// Remote locations (`scheme://...`) are left untouched.
    pub fn resolve_relative_paths(config: &mut RunConfig, base: &Path) {
        config.main.components_repository =
            resolve_location(&config.main.components_repository, base);
        config.main.local_components = resolve_location(&config.main.local_components, base);
        if config.tracking.root.is_relative() {
            config.tracking.root = base.join(&config.tracking.root);
        }
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
        overrides: &[Override],
    ) -> Result<RunConfig, ContractError> {
        let config = parser::parse(content, format, overrides)?;
        validator::validate(&config)?;
        Ok(config)
    }
}

fn resolve_location(location: &str, base: &Path) -> String {
    if location.contains("://") {
        return location.to_string();
    }
    let path = PathBuf::from(location);
    if path.is_absolute() {
        location.to_string()
    } else {
        base.join(path).to_string_lossy().into_owned()
    }
}
