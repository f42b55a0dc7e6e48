//! Configuration file resolution, loading and writing
//!
//! Configuration file lookup follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`<config dir>/floorfuse/config.toml`)
//! 4. Built-in defaults (no file)
//!
//! A missing configuration file is never fatal: the loader logs a warning and
//! falls back to defaults. A file that exists but fails to parse is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable holding an explicit configuration file path
pub const CONFIG_ENV_VAR: &str = "FLOORFUSE_CONFIG";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolves which configuration file (if any) should be loaded
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    app_name: String,
    env_var_name: String,
}

impl ConfigResolver {
    /// Create a resolver for `app_name` using the default environment variable
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            env_var_name: CONFIG_ENV_VAR.to_string(),
        }
    }

    /// Override the environment variable consulted in step 2
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var_name = name.into();
        self
    }

    /// Resolve the config file path
    ///
    /// Returns `None` when no candidate applies; callers then use defaults.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            debug!("Config path from command line: {}", path.display());
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.trim().is_empty() {
                debug!("Config path from {}: {}", self.env_var_name, path);
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config file, only if it exists
        let user_config = self.user_config_path()?;
        if user_config.exists() {
            debug!("Config path from user config dir: {}", user_config.display());
            return Some(user_config);
        }

        // Priority 4: defaults
        None
    }

    /// Per-user configuration path for this application
    pub fn user_config_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(&self.app_name).join("config.toml"))
    }
}

/// Load a TOML configuration file into `T`
///
/// - `None` path → `T::default()`
/// - path that does not exist → warning + `T::default()`
/// - unreadable or unparsable file → `Error::Config`
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No configuration file; using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Configuration file {} not found; using built-in defaults",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Write a configuration value as TOML using temp file + rename
///
/// On Unix the file is created with mode 0600.
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    std::fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    debug!("Configuration written to {}", path.display());
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "config.toml".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_default_level() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.level, "info");
        assert!(logging.file.is_none());
    }

    #[test]
    fn test_cli_argument_wins() {
        let resolver = ConfigResolver::new("floorfuse").with_env_var("FLOORFUSE_TEST_UNUSED_VAR");
        let resolved = resolver.resolve(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(resolved, Some(PathBuf::from("/tmp/explicit.toml")));
    }

    #[test]
    fn test_temp_path_suffix() {
        let tmp = temp_path_for(Path::new("/etc/floorfuse/config.toml"));
        assert_eq!(tmp, PathBuf::from("/etc/floorfuse/config.toml.tmp"));
    }

    #[test]
    fn test_load_none_uses_defaults() {
        let logging: LoggingConfig = load_toml_config(None).unwrap();
        assert_eq!(logging, LoggingConfig::default());
    }
}
