//! Relay configuration.
//!
//! Settings are layered, lowest precedence first:
//! 1. built-in defaults
//! 2. TOML file (`--config`, else `RELAY_CONFIG`, else the per-user default path if present)
//! 3. environment (`RELAY_HOST`, `PORT`)
//! 4. command-line flags
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 9000
//! peer_queue = 128
//! send_timeout_ms = 500
//! write_timeout_ms = 5000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port
pub const DEFAULT_PORT: u16 = 8765;

/// Default outbound queue capacity per connection
pub const DEFAULT_PEER_QUEUE: usize = 64;

/// Default wait for queue space during a broadcast (1 second)
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 1_000;

/// Default limit for a single socket write (10 seconds)
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Environment variable naming the config file
pub const ENV_CONFIG: &str = "RELAY_CONFIG";

/// Environment variable overriding the bind host
pub const ENV_HOST: &str = "RELAY_HOST";

/// Environment variable overriding the bind port
pub const ENV_PORT: &str = "PORT";

/// Relay daemon settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Host or IP address to bind
    pub host: String,

    /// TCP port to bind
    pub port: u16,

    /// Outbound queue capacity per connection
    pub peer_queue: usize,

    /// Max wait for queue space when broadcasting, in milliseconds
    pub send_timeout_ms: u64,

    /// Max duration of one socket write, in milliseconds
    pub write_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            peer_queue: DEFAULT_PEER_QUEUE,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

/// Per-connection settings derived from [`RelayConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub peer_queue: usize,
    pub send_timeout: Duration,
    pub write_timeout: Duration,
}

impl RelayConfig {
    /// Loads the full configuration stack.
    ///
    /// `explicit` is the `--config` flag; `env` looks up environment
    /// variables (pass `|k| std::env::var(k).ok()` in production).
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if a named file cannot be read
    /// - `ConfigError::Parse` if a file is not valid config TOML
    /// - `ConfigError::InvalidEnv` if an environment override does not parse
    /// - `ConfigError::Invalid` if the result fails validation
    pub fn load<F>(explicit: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from));

        let mut config = match named {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(env)?;
        Ok(config)
    }

    /// Reads a TOML config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Applies `RELAY_HOST` and `PORT` overrides.
    pub fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = env(ENV_HOST) {
            self.host = host;
        }

        if let Some(port) = env(ENV_PORT) {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_PORT,
                value: port.clone(),
            })?;
        }

        Ok(())
    }

    /// Applies command-line overrides.
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
    }

    /// Checks values that would make the daemon unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.peer_queue == 0 {
            return Err(ConfigError::Invalid("peer_queue must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Returns the `host:port` string to bind, bracketing IPv6 literals.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Per-connection settings for the server.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            peer_queue: self.peer_queue,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}

/// Per-user default config path, e.g. `~/.config/chat-relay/relayd.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chat-relay").join("relayd.toml"))
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config file {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8765");
        assert!(config.validate().is_ok());

        let settings = config.connection_settings();
        assert_eq!(settings.peer_queue, 64);
        assert_eq!(settings.send_timeout, Duration::from_secs(1));
        assert_eq!(settings.write_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config("port = 9000\n");
        let config = RelayConfig::from_file(file.path()).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.peer_queue, DEFAULT_PEER_QUEUE);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let file = write_config("prot = 9000\n");
        let result = RelayConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_named_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let result = RelayConfig::load(Some(&missing), env_from(&[]));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_precedence_file_then_env() {
        let file = write_config("host = \"0.0.0.0\"\nport = 9000\npeer_queue = 8\n");
        let path = file.path().to_string_lossy().to_string();

        let config = RelayConfig::load(
            None,
            env_from(&[(ENV_CONFIG, &path), (ENV_PORT, "9100")]),
        )
        .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9100);
        assert_eq!(config.peer_queue, 8);
    }

    #[test]
    fn test_explicit_path_beats_env_path() {
        let explicit = write_config("port = 1111\n");
        let from_env = write_config("port = 2222\n");
        let env_path = from_env.path().to_string_lossy().to_string();

        let config =
            RelayConfig::load(Some(explicit.path()), env_from(&[(ENV_CONFIG, &env_path)]))
                .unwrap();
        assert_eq!(config.port, 1111);
    }

    #[test]
    fn test_invalid_env_port() {
        let mut config = RelayConfig::default();
        let result = config.apply_env(env_from(&[(ENV_PORT, "eighty")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { var: "PORT", .. })
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = RelayConfig::default();
        config
            .apply_env(env_from(&[(ENV_HOST, "10.0.0.1"), (ENV_PORT, "1")]))
            .unwrap();
        config.apply_overrides(None, Some(4000));

        assert_eq!(config.bind_addr(), "10.0.0.1:4000");
    }

    #[test]
    fn test_ipv6_bind_addr() {
        let mut config = RelayConfig::default();
        config.apply_overrides(Some("::1".to_string()), Some(80));
        assert_eq!(config.bind_addr(), "[::1]:80");
    }

    #[test]
    fn test_validate() {
        let mut config = RelayConfig::default();
        config.peer_queue = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = RelayConfig::default();
        config.host = " ".to_string();
        assert!(config.validate().is_err());
    }
}
