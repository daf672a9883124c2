//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::util::time::{BROADCAST_INTERVAL_MS, PHYSICS_TPS};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated, or `*`
    pub client_origin: String,

    /// Physics steps per second (fixed dt = 1 / physics_tps)
    pub physics_tps: u32,
    /// Milliseconds between snapshot broadcasts
    pub broadcast_interval_ms: u64,
    /// Seed for spawn placement
    pub world_seed: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let physics_tps: u32 = parse_or("PHYSICS_TPS", PHYSICS_TPS)?;
        if physics_tps == 0 {
            return Err(ConfigError::Invalid("PHYSICS_TPS"));
        }

        let broadcast_interval_ms: u64 = parse_or("BROADCAST_INTERVAL_MS", BROADCAST_INTERVAL_MS)?;
        if broadcast_interval_ms == 0 {
            return Err(ConfigError::Invalid("BROADCAST_INTERVAL_MS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            physics_tps,
            broadcast_interval_ms,
            world_seed: parse_or("WORLD_SEED", 0)?,
        })
    }
}

/// Read an optional variable, parsing it when present
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
