//! Layered loading of [`ClientConfig`].
//!
//! Sources, lowest priority first: built-in defaults, a TOML file, and
//! `CHINALAND_*` environment variables. Command-line flags are applied on
//! top by the caller.
//!
//! ```toml
//! base_url = "http://szb.iziran.net"
//! timeout = 20
//! delay_ms = 2000
//! ```

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use crate::client::ClientConfig;
use crate::{ChinaLandError, Result};

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "CHINALAND";

/// Default config file location: `<config dir>/chinaland/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chinaland").join("config.toml"))
}

/// Loads the client configuration.
///
/// An explicit `path` must exist. Without one, the default location is used
/// when present.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let mut builder = Config::builder();

    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ChinaLandError::ConfigError(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "loading config file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        None => {
            if let Some(default) = default_config_path() {
                debug!(path = %default.display(), "checking default config file");
                builder = builder.add_source(File::from(default).format(FileFormat::Toml).required(false));
            }
        }
    }

    builder
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?
        .try_deserialize::<ClientConfig>()
        .map_err(|e| ChinaLandError::ConfigError(format!("invalid configuration: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "base_url = \"http://localhost:8080\"\ntimeout = 5\ndelay_ms = 0\n").unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout, 5);
        assert_eq!(config.delay_ms, 0);
        assert_eq!(config.column_id, ClientConfig::default().column_id);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Some(Path::new("/nonexistent/chinaland.toml")));
        assert!(matches!(result, Err(ChinaLandError::ConfigError(_))));
    }

    #[test]
    fn test_load_config_invalid_value() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "timeout = \"soon\"\n").unwrap();

        assert!(matches!(load_config(Some(path.as_path())), Err(ChinaLandError::ConfigError(_))));
    }

    #[test]
    fn test_default_config_path_name() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("chinaland/config.toml"));
        }
    }
}
