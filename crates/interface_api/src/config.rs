//! API configuration

use serde::Deserialize;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,
    pub log_format: LogFormat,
    /// Upper bound of the database pool
    pub max_connections: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/settlement".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            max_connections: 10,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `SETTLEMENT_`-prefixed environment variables
    ///
    /// Unset variables fall back to the defaults.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = ApiConfig::default();
        config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as i64)?
            .set_default("database_url", defaults.database_url)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", "pretty")?
            .set_default("max_connections", defaults.max_connections as i64)?
            .add_source(config::Environment::with_prefix("SETTLEMENT").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
