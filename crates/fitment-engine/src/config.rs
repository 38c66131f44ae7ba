//! Engine configuration loaded from TOML.
//!
//! ```toml
//! model_path = "models"     # one sub-directory of class files per catalog
//! save_path = "sessions"    # base directory for saved session inputs
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "fitment.toml";
pub const DEFAULT_MODEL_PATH: &str = "models";
pub const DEFAULT_SAVE_PATH: &str = "sessions";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    pub save_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            save_path: PathBuf::from(DEFAULT_SAVE_PATH),
        }
    }
}

impl EngineConfig {
    /// Parse configuration text. Paths are kept as written.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::ParseToml {
            path: "<inline>".to_string(),
            source,
        })
    }

    /// Load a config file; relative paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::ParseToml {
            path: path.display().to_string(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.relative_to(base))
    }

    /// Like [`EngineConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Resolve relative paths against `base`.
    pub fn relative_to(mut self, base: &Path) -> Self {
        if self.model_path.is_relative() {
            self.model_path = base.join(&self.model_path);
        }
        if self.save_path.is_relative() {
            self.save_path = base.join(&self.save_path);
        }
        self
    }

    /// Directory holding the class files of catalog `name`.
    pub fn catalog_dir(&self, name: &str) -> PathBuf {
        self.model_path.join(name)
    }

    /// Resolve a session file path against the save directory.
    pub fn session_file(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_relative() {
            self.save_path.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.catalog_dir("servers"), PathBuf::from("models/servers"));
    }

    #[test]
    fn partial_config_keeps_other_default() {
        let config =
            EngineConfig::from_toml_str("model_path = \"/srv/models\"").expect("should parse");
        assert_eq!(config.model_path, PathBuf::from("/srv/models"));
        assert_eq!(config.save_path, PathBuf::from(DEFAULT_SAVE_PATH));
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let config = EngineConfig::default().relative_to(Path::new("/etc/fitment"));
        assert_eq!(config.model_path, PathBuf::from("/etc/fitment/models"));
        assert_eq!(
            config.session_file("run.json"),
            PathBuf::from("/etc/fitment/sessions/run.json")
        );
        assert_eq!(
            config.session_file("/tmp/run.json"),
            PathBuf::from("/tmp/run.json")
        );
    }

    #[test]
    fn malformed_toml_is_reported() {
        let err = EngineConfig::from_toml_str("model_path = ").expect_err("must fail");
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }
}
