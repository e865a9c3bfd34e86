use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use strata_data::DataError;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::SqlxErrorExt;
use crate::session::SqlxSession;

/// Holder for the application's connection pool.
///
/// A `Database` starts uninitialized so it can live in a `static`; every
/// accessor fails with [`DataError::Uninitialized`] until [`init`](Self::init)
/// has connected the pool.
///
/// ```ignore
/// static DB: Database = Database::new();
///
/// DB.init(&DatabaseConfig::load("dev")?).await?;
/// let session = DB.session()?;
/// ```
#[derive(Debug)]
pub struct Database {
    pool: OnceLock<SqlitePool>,
    echo: AtomicBool,
}

impl Database {
    pub const fn new() -> Self {
        Self {
            pool: OnceLock::new(),
            echo: AtomicBool::new(false),
        }
    }

    /// Wrap an already connected pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        let db = Self::new();
        let _ = db.pool.set(pool);
        db
    }

    /// Connect the pool described by `config`.
    ///
    /// Fails if this database was already initialized.
    pub async fn init(&self, config: &DatabaseConfig) -> Result<(), DataError> {
        if self.pool.get().is_some() {
            return Err(DataError::Other("database already initialized".into()));
        }
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(SqlxErrorExt::into_data_error)?
            .create_if_missing(config.create_if_missing);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;

        self.echo.store(config.echo, Ordering::Relaxed);
        if self.pool.set(pool).is_err() {
            return Err(DataError::Other("database already initialized".into()));
        }
        info!(
            url = %config.url,
            max_connections = config.max_connections,
            echo = config.echo,
            "database initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.get().is_some()
    }

    pub fn pool(&self) -> Result<&SqlitePool, DataError> {
        self.pool.get().ok_or(DataError::Uninitialized)
    }

    /// Open a new session on the pool.
    pub fn session(&self) -> Result<SqlxSession, DataError> {
        let pool = self.pool()?.clone();
        Ok(SqlxSession::new(pool).with_echo(self.echo.load(Ordering::Relaxed)))
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
