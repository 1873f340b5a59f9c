//! Server configuration loaded from the environment.
use std::net::SocketAddr;
use std::path::PathBuf;

use backbone::config::{BackboneConfig, ConfigError, read_env};

/// Configuration for the `backbone-server` binary.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub backbone: BackboneConfig,
    /// Address the TCP listener binds to.
    pub bind_addr: SocketAddr,
    /// Longest request line accepted from a peer, excluding the terminator.
    pub max_line_len: usize,
    /// Directory the log file is written to.
    pub log_dir: PathBuf,
}

impl ServerConfig {
    pub const DEFAULT_BIND: &'static str = "127.0.0.1:7878";
    pub const DEFAULT_MAX_LINE: usize = 1024;
    /// Largest accepted `SERVER_MAX_LINE`; a request line is buffered whole.
    pub const MAX_LINE_LIMIT: usize = 1 << 20;

    /// Construct configuration from process environment variables.
    ///
    /// Environment variables (in addition to those read by
    /// [`BackboneConfig::from_env`]):
    /// - `SERVER_BIND` - Listen address (default: 127.0.0.1:7878)
    /// - `SERVER_MAX_LINE` - Maximum request line length (default: 1024)
    /// - `LOG_DIR` - Log directory (default: platform cache dir)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            backbone: BackboneConfig::from_env()?,
            ..Self::default()
        };

        if let Some(bind_addr) = read_env::<SocketAddr>("SERVER_BIND")? {
            config.bind_addr = bind_addr;
        }
        if let Some(max_line_len) = read_env::<usize>("SERVER_MAX_LINE")? {
            config.max_line_len = validate_max_line_len(max_line_len)?;
        }
        if let Some(log_dir) = read_env::<PathBuf>("LOG_DIR")? {
            config.log_dir = log_dir;
        }

        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            backbone: BackboneConfig::default(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7878)),
            max_line_len: Self::DEFAULT_MAX_LINE,
            log_dir: default_log_dir(),
        }
    }
}

/// Checks a configured line limit lies in `1..=MAX_LINE_LIMIT`.
pub fn validate_max_line_len(max_line_len: usize) -> Result<usize, ConfigError> {
    if (1..=ServerConfig::MAX_LINE_LIMIT).contains(&max_line_len) {
        Ok(max_line_len)
    } else {
        Err(ConfigError::InvalidValue {
            key: "SERVER_MAX_LINE",
            value: max_line_len.to_string(),
        })
    }
}

/// Platform-specific log directory.
///
/// - macOS: `~/Library/Caches/backbone/logs`
/// - Linux: `~/.cache/backbone/logs` (or `$XDG_CACHE_HOME/backbone/logs`)
/// - Windows: `%LOCALAPPDATA%\backbone\logs`
/// - Fallback: `/tmp/backbone/logs`
pub fn default_log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "backbone")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp/backbone"))
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(
            config.bind_addr,
            ServerConfig::DEFAULT_BIND.parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.max_line_len, 1024);
        assert!(config.log_dir.ends_with("logs"));
    }

    #[test]
    fn test_max_line_len_bounds() {
        assert_eq!(validate_max_line_len(1), Ok(1));
        assert_eq!(
            validate_max_line_len(ServerConfig::MAX_LINE_LIMIT),
            Ok(ServerConfig::MAX_LINE_LIMIT)
        );
        assert!(validate_max_line_len(0).is_err());
        assert_eq!(
            validate_max_line_len(usize::MAX),
            Err(ConfigError::InvalidValue {
                key: "SERVER_MAX_LINE",
                value: usize::MAX.to_string(),
            })
        );
    }
}
