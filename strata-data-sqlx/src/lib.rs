//! # strata-data-sqlx: SQLite backend for the Strata data layer
//!
//! This crate provides the [SQLx](https://github.com/launchbadge/sqlx)-backed
//! implementation of [`strata_data::Session`]. It depends on [`strata-data`]
//! for the builders, the model capability and `DataService`, and adds the
//! session, the connection holder, configuration loading and error bridging
//! needed to talk to a real database.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqlxSession`] | `Session` over an `SqlitePool` with one lazily begun transaction |
//! | [`Database`] | Connection holder, usable as a `static`, uninitialized until [`Database::init`] |
//! | [`DatabaseConfig`] | Connection settings from YAML, `.env` files and environment variables |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` → `DataError` (`.into_data_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, DataError>` |
//!
//! # Quick start
//!
//! ```ignore
//! use strata_data::prelude::*;
//! use strata_data_sqlx::{Database, DatabaseConfig};
//!
//! static DB: Database = Database::new();
//!
//! DB.init(&DatabaseConfig::load("dev")?).await?;
//! let session = DB.session()?;
//! let items = DataService::<Item, _>::new(&session);
//!
//! let lamp = items.create(json!({"name": "lamp", "price": 12})).await?;
//! let expensive = items
//!     .search(Some(&Filter::new([col("price").gt(10)])), None, None)
//!     .await?;
//! ```
//!
//! # Transactions
//!
//! A session begins its transaction on the first statement. `create`,
//! `update` and the bulk writers of `DataService` commit it; everything else
//! stays pending until [`Session::commit`](strata_data::Session::commit).
//! Dropping a session with a pending transaction rolls it back.
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Use the [`SqlxErrorExt`] trait instead:
//!
//! ```ignore
//! use strata_data_sqlx::SqlxErrorExt;
//!
//! sqlx::query("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)")
//!     .execute(db.pool()?)
//!     .await
//!     .map_err(|e| e.into_data_error())?;
//! ```

pub mod config;
pub mod database;
pub mod error;
mod row;
pub mod session;

pub use config::{ConfigError, DatabaseConfig};
pub use database::Database;
pub use error::{SqlxErrorExt, SqlxResult};
pub use session::SqlxSession;

/// Re-exports of the most commonly used types from both `strata-data` and this crate.
pub mod prelude {
    pub use crate::{Database, DatabaseConfig, SqlxErrorExt, SqlxSession};
    pub use strata_data::prelude::*;
}
