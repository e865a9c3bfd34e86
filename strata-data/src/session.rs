use std::future::Future;
use std::sync::Arc;

use crate::error::DataError;
use crate::model::Model;
use crate::query::QueryBuilder;
use crate::value::Value;

/// A unit of work against a database.
///
/// Writes go into an implicit transaction that a session begins on first
/// use. They are visible to later queries on the same session and become
/// durable only on [`commit`](Session::commit). Constraint violations and
/// storage faults are returned as errors, never swallowed.
///
/// Uses RPITIT (return-position `impl Trait` in traits), no `async-trait` needed.
pub trait Session: Send + Sync {
    /// Execute `query` and decode every matching row.
    fn fetch_all<M: Model>(
        &self,
        query: &QueryBuilder,
    ) -> impl Future<Output = Result<Vec<M>, DataError>> + Send;

    /// Execute `query` expecting zero or one row.
    ///
    /// Fails with [`DataError::MultipleResults`] when more than one row matches.
    fn fetch_one_or_none<M: Model>(
        &self,
        query: &QueryBuilder,
    ) -> impl Future<Output = Result<Option<M>, DataError>> + Send {
        let query = query.clone().limit(2);
        async move {
            let mut rows = self.fetch_all::<M>(&query).await?;
            if rows.len() > 1 {
                return Err(DataError::MultipleResults {
                    table: M::table_name(),
                });
            }
            Ok(rows.pop())
        }
    }

    /// Stage an insert and return the instance as stored, including
    /// engine-generated key values.
    fn insert<M: Model>(&self, instance: M) -> impl Future<Output = Result<M, DataError>> + Send;

    /// Stage a write of every field of the record currently stored under `key`.
    ///
    /// `key` is the primary key the record was loaded with; when `instance`
    /// carries a different key the stored row is re-keyed, and a clash with
    /// another row is a [`DataError::Constraint`].
    fn update<M: Model>(
        &self,
        key: &[Value],
        instance: &M,
    ) -> impl Future<Output = Result<(), DataError>> + Send;

    /// Stage the deletion of an existing record.
    fn delete<M: Model>(&self, instance: &M) -> impl Future<Output = Result<(), DataError>> + Send;

    /// Make every staged write durable and end the current transaction.
    fn commit(&self) -> impl Future<Output = Result<(), DataError>> + Send;

    /// Discard every staged write since the last commit.
    fn rollback(&self) -> impl Future<Output = Result<(), DataError>> + Send;
}

impl<S: Session> Session for &S {
    fn fetch_all<M: Model>(
        &self,
        query: &QueryBuilder,
    ) -> impl Future<Output = Result<Vec<M>, DataError>> + Send {
        (**self).fetch_all(query)
    }

    fn fetch_one_or_none<M: Model>(
        &self,
        query: &QueryBuilder,
    ) -> impl Future<Output = Result<Option<M>, DataError>> + Send {
        (**self).fetch_one_or_none(query)
    }

    fn insert<M: Model>(&self, instance: M) -> impl Future<Output = Result<M, DataError>> + Send {
        (**self).insert(instance)
    }

    fn update<M: Model>(
        &self,
        key: &[Value],
        instance: &M,
    ) -> impl Future<Output = Result<(), DataError>> + Send {
        (**self).update(key, instance)
    }

    fn delete<M: Model>(&self, instance: &M) -> impl Future<Output = Result<(), DataError>> + Send {
        (**self).delete(instance)
    }

    fn commit(&self) -> impl Future<Output = Result<(), DataError>> + Send {
        (**self).commit()
    }

    fn rollback(&self) -> impl Future<Output = Result<(), DataError>> + Send {
        (**self).rollback()
    }
}

impl<S: Session> Session for Arc<S> {
    fn fetch_all<M: Model>(
        &self,
        query: &QueryBuilder,
    ) -> impl Future<Output = Result<Vec<M>, DataError>> + Send {
        (**self).fetch_all(query)
    }

    fn fetch_one_or_none<M: Model>(
        &self,
        query: &QueryBuilder,
    ) -> impl Future<Output = Result<Option<M>, DataError>> + Send {
        (**self).fetch_one_or_none(query)
    }

    fn insert<M: Model>(&self, instance: M) -> impl Future<Output = Result<M, DataError>> + Send {
        (**self).insert(instance)
    }

    fn update<M: Model>(
        &self,
        key: &[Value],
        instance: &M,
    ) -> impl Future<Output = Result<(), DataError>> + Send {
        (**self).update(key, instance)
    }

    fn delete<M: Model>(&self, instance: &M) -> impl Future<Output = Result<(), DataError>> + Send {
        (**self).delete(instance)
    }

    fn commit(&self) -> impl Future<Output = Result<(), DataError>> + Send {
        (**self).commit()
    }

    fn rollback(&self) -> impl Future<Output = Result<(), DataError>> + Send {
        (**self).rollback()
    }
}
