use loupe_style::{SerializeOptions, DEFAULT_PRECISION};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "loupe.config.json";
pub const DEFAULT_BIND: &str = "127.0.0.1:4747";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid bind address {0:?}")]
    InvalidBind(String),
}

/// Loupe configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Project root that locator paths are relative to
    #[serde(default = "default_root")]
    pub root: String,

    #[serde(default = "default_bind")]
    pub bind: String,

    /// Decimals written for numbers in style values
    #[serde(default = "default_precision")]
    pub precision: u8,

    /// Write `margin: 8px` rather than `margin: 8px 8px 8px 8px`
    #[serde(default = "default_true")]
    pub collapse_shorthand: bool,

    /// Invalidate cached files when they change on disk
    #[serde(default = "default_true")]
    pub watch: bool,
}

fn default_root() -> String {
    ".".to_string()
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_precision() -> u8 {
    DEFAULT_PRECISION
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            bind: default_bind(),
            precision: default_precision(),
            collapse_shorthand: true,
            watch: true,
        }
    }
}

impl Config {
    /// Load config from a directory, falling back to defaults when absent
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        let path = cwd.join(DEFAULT_CONFIG_NAME);
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Root resolved against the directory the config was loaded from
    pub fn root_dir(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.root)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))
    }

    pub fn serialize_options(&self) -> SerializeOptions {
        let options = SerializeOptions::default().with_precision(self.precision);
        if self.collapse_shorthand {
            options.with_shorthand_collapse()
        } else {
            options
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "root": "web",
            "bind": "0.0.0.0:9000",
            "precision": 2,
            "collapseShorthand": false
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.root, "web");
        assert_eq!(config.bind_addr().unwrap().port(), 9000);
        assert_eq!(config.precision, 2);
        assert!(!config.collapse_shorthand);
        assert!(config.watch);

        let options = config.serialize_options();
        assert_eq!(options.precision, 2);
        assert!(!options.collapse_shorthand);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind, "127.0.0.1:4747");
        assert_eq!(config.precision, 4);
        assert!(config.collapse_shorthand);
        assert!(config.serialize_options().collapse_shorthand);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{ root: }").unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_invalid_bind() {
        let config = Config {
            bind: "localhost".into(),
            ..Config::default()
        };
        assert!(matches!(config.bind_addr(), Err(ConfigError::InvalidBind(_))));
    }
}
