pub mod error;
pub mod mock;
pub mod movie;
pub mod runtime;

use std::{str::FromStr as _, sync::Arc, time::Duration};

pub use error::Error;
pub use movie::{Movie, MovieModel, MovieRepository, validate_movie};
pub use runtime::Runtime;
pub use sqlx::Error as SqlxError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type Pool = sqlx::Pool<ChosenDB>;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub database_url: String,
    pub max_open_conns: u32,
    pub min_idle_conns: u32,
    pub max_idle_time: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://greenlight.db".to_string(),
            max_open_conns: 25,
            min_idle_conns: 0,
            max_idle_time: Some(Duration::from_secs(15 * 60)),
        }
    }
}

impl PoolConfig {
    /// Single connection in-memory database, handy for tests.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_open_conns: 1,
            min_idle_conns: 1,
            max_idle_time: None,
        }
    }
}

/// Opens the pool, waits at most 5 seconds for the first connection
/// and applies the schema migration.
pub async fn new_pool(config: &PoolConfig) -> Result<Pool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_open_conns)
        .min_connections(config.min_idle_conns)
        .idle_timeout(config.max_idle_time)
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect_with(options)
        .await?;
    MIGRATOR.run(&pool).await?;
    debug!("Database pool ready for {}", config.database_url);
    Ok(pool)
}

/// All data models of the application.
#[derive(Clone)]
pub struct Models {
    pub movies: Arc<dyn MovieModel>,
}

impl Models {
    pub fn new(pool: Pool) -> Self {
        Self {
            movies: Arc::new(MovieRepository::new(pool)),
        }
    }

    pub fn mock() -> Self {
        Self {
            movies: Arc::new(mock::MockMovieModel),
        }
    }
}
