use std::{fmt, time::Duration};

use crate::error::Result;
pub use clap::Parser;
use greenlight_dal::PoolConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, clap::Parser)]
#[command(version, about = "JSON API for managing a movie catalogue")]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 4000,
        env = "GREENLIGHT_PORT",
        help = "API server port"
    )]
    pub port: u16,

    #[arg(
        short,
        long,
        default_value = "0.0.0.0",
        env = "GREENLIGHT_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[arg(
        long,
        value_enum,
        default_value_t = Environment::Development,
        env = "GREENLIGHT_ENV",
        help = "Environment name reported by the health check"
    )]
    pub env: Environment,

    #[arg(
        long,
        default_value = "sqlite://greenlight.db",
        env = "GREENLIGHT_DB_DSN",
        help = "Database URL, the database file is created when missing"
    )]
    pub db_dsn: String,

    #[arg(
        long,
        default_value_t = 25,
        env = "GREENLIGHT_DB_MAX_OPEN_CONNS",
        help = "Maximum number of open database connections"
    )]
    pub db_max_open_conns: u32,

    #[arg(
        long,
        default_value_t = 0,
        env = "GREENLIGHT_DB_MIN_IDLE_CONNS",
        help = "Number of database connections kept open when idle"
    )]
    pub db_min_idle_conns: u32,

    #[arg(
        long,
        default_value = "15m",
        env = "GREENLIGHT_DB_MAX_IDLE_TIME",
        help = "Maximum time a database connection may stay idle (e.g. 15m, 1h)",
        value_parser = humantime::parse_duration
    )]
    pub db_max_idle_time: Duration,

    #[arg(
        long,
        default_value = "30s",
        env = "GREENLIGHT_REQUEST_TIMEOUT",
        help = "Time limit for handling a single request",
        value_parser = humantime::parse_duration
    )]
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            database_url: self.db_dsn.clone(),
            max_open_conns: self.db_max_open_conns,
            min_idle_conns: self.db_min_idle_conns,
            max_idle_time: Some(self.db_max_idle_time),
        }
    }
}
