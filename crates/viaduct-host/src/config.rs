//! Host configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Control API network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote proxy settings.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Local engine hosting settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the control API.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Remote proxy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Domain under which database ids become subdomains
    /// (`{id}.{domain}`).
    #[serde(default = "default_proxy_domain")]
    pub domain: String,

    /// Whether to connect over `wss` (true, default) or `ws` (development).
    #[serde(default = "default_proxy_secure")]
    pub secure: bool,

    /// Fixed endpoint URL that bypasses subdomain derivation. For
    /// self-hosted proxies without wildcard DNS.
    #[serde(default)]
    pub override_url: Option<String>,
}

/// Local engine hosting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Whether this environment hosts engines locally at all. When false,
    /// engine operations degrade to "unavailable" instead of failing hard.
    #[serde(default = "default_engine_enabled")]
    pub enabled: bool,

    /// Directory holding instance database files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Busy timeout for engine connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections per instance.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "viaduct_bridge=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    4810
}

fn default_proxy_domain() -> String {
    "db.viaduct.dev".to_string()
}

fn default_proxy_secure() -> bool {
    true
}

fn default_engine_enabled() -> bool {
    true
}

fn default_data_dir() -> String {
    "viaduct-data".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            domain: default_proxy_domain(),
            secure: default_proxy_secure(),
            override_url: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_engine_enabled(),
            data_dir: default_data_dir(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `VIADUCT_HOST` overrides `server.host`
/// - `VIADUCT_PORT` overrides `server.port`
/// - `VIADUCT_PROXY_DOMAIN` overrides `proxy.domain`
/// - `VIADUCT_PROXY_SECURE` overrides `proxy.secure` (set to "false"/"0" to disable)
/// - `VIADUCT_PROXY_OVERRIDE_URL` overrides `proxy.override_url`
/// - `VIADUCT_ENGINE_ENABLED` overrides `engine.enabled` (set to "false"/"0" to disable)
/// - `VIADUCT_DATA_DIR` overrides `engine.data_dir`
/// - `VIADUCT_LOG_LEVEL` overrides `logging.level`
/// - `VIADUCT_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("VIADUCT_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("VIADUCT_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(domain) = std::env::var("VIADUCT_PROXY_DOMAIN") {
        config.proxy.domain = domain;
    }
    if let Ok(secure) = std::env::var("VIADUCT_PROXY_SECURE") {
        config.proxy.secure = secure != "false" && secure != "0";
    }
    if let Ok(url) = std::env::var("VIADUCT_PROXY_OVERRIDE_URL") {
        config.proxy.override_url = Some(url);
    }
    if let Ok(enabled) = std::env::var("VIADUCT_ENGINE_ENABLED") {
        config.engine.enabled = enabled != "false" && enabled != "0";
    }
    if let Ok(data_dir) = std::env::var("VIADUCT_DATA_DIR") {
        config.engine.data_dir = data_dir;
    }
    if let Ok(level) = std::env::var("VIADUCT_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("VIADUCT_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}
