//! Process settings from the environment (a `.env` file is honoured).

use crate::error::ConfigError;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Default and upper bound for collection page sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paging {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Paging {
            default_limit: 100,
            max_limit: 1000,
        }
    }
}

impl Paging {
    /// Requested limit, defaulted and clamped.
    pub fn limit(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub api_prefix: String,
    pub entities_path: Option<PathBuf>,
    pub body_limit: usize,
    pub paging: Paging,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let paging = Paging {
            default_limit: parsed("PAGE_SIZE", 100)?,
            max_limit: parsed("MAX_PAGE_SIZE", 1000)?,
        };
        Ok(Settings {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            bind_addr: parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            max_connections: parsed("MAX_CONNECTIONS", 5)?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".into()),
            entities_path: env::var("ENTITIES_PATH").ok().map(PathBuf::from),
            body_limit: parsed("BODY_LIMIT", 1024 * 1024)?,
            paging,
        })
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Load(format!("{} has an invalid value '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}
