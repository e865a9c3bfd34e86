//! # strata-data: query fragments and a generic record service
//!
//! Define a model once and get search, get, create, update, delete and
//! their bulk variants through [`DataService`].
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Filter`] | Immutable list of ANDed predicates, with `and` / `or` combinators |
//! | [`Sorting`] | Immutable list of `ORDER BY` keys |
//! | [`Pagination`] | Page window with the fetch-one-more lookahead |
//! | [`QueryBuilder`] | The composed query and its SQL rendering |
//! | [`Model`] | Capability set of a persisted type (see [`model!`]) |
//! | [`Session`] | Unit-of-work capability implemented by backends |
//! | [`DataService`] | CRUD and chunked bulk operations over a session |
//! | [`MemorySession`] | In-process session for tests and prototyping |
//!
//! Backends live in separate crates (`strata-data-sqlx`).

pub mod chunks;
pub mod error;
pub mod expr;
pub mod filter;
pub mod memory;
pub mod model;
pub mod page;
pub mod pagination;
pub mod query;
pub mod service;
pub mod session;
pub mod sorting;
pub mod value;

pub use chunks::ModelChunks;
pub use error::DataError;
pub use expr::{col, CmpOp, Column, Direction, Expr, OrderBy};
pub use filter::Filter;
pub use memory::MemorySession;
pub use model::Model;
pub use page::SearchPage;
pub use pagination::Pagination;
pub use query::{IdentifierPolicy, QueryBuilder, QueryError, MAX_ROW_COUNT};
pub use service::{DataService, DEFAULT_CHUNK_SIZE};
pub use session::Session;
pub use sorting::Sorting;
pub use value::{FromValue, IntoValues, Key, Partial, Value, ValueError, Values};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        col, model, DataError, DataService, Filter, IntoValues, Model, Pagination, Partial,
        SearchPage, Session, Sorting, Value, Values,
    };
}
