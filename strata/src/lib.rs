//! Strata: a generic async data-access layer.
//!
//! This facade crate re-exports the Strata sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use strata::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature     | Default | Crate                                   |
//! |-------------|---------|-----------------------------------------|
//! | `data-sqlx` | **yes** | `strata-data-sqlx` (SQLite backend)     |
//! | `sqlite`    | no      | alias of `data-sqlx`                    |
//!
//! `strata-data` (builders, `Model`, `Session`, `DataService`) is always
//! available, at the top level and as `strata::strata_data`.

pub extern crate strata_data;

pub use strata_data::*;

#[cfg(feature = "data-sqlx")]
pub use strata_data_sqlx;

/// Service bound to the SQLite session type.
///
/// Available when the `data-sqlx` feature is enabled.
#[cfg(feature = "data-sqlx")]
pub type SqliteService<'s, M> = strata_data::DataService<M, &'s strata_data_sqlx::SqlxSession>;

pub mod prelude {
    //! Re-exports of the most commonly used types.
    pub use strata_data::prelude::*;

    #[cfg(feature = "data-sqlx")]
    pub use strata_data_sqlx::prelude::*;

    #[cfg(feature = "data-sqlx")]
    pub use crate::SqliteService;
}
