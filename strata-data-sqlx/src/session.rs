use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::{Sqlite, Transaction};
use strata_data::{col, DataError, IdentifierPolicy, Model, QueryBuilder, Session, Value};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::SqlxErrorExt;
use crate::row::{bind_all, decode_row};

/// A [`Session`] over an SQLite pool.
///
/// The first statement begins a transaction on a pooled connection; every
/// later statement runs in it until [`commit`](Session::commit) or
/// [`rollback`](Session::rollback). Dropping the session with a transaction
/// still open rolls it back.
///
/// # Example
///
/// ```ignore
/// let session = SqlxSession::new(pool);
/// let items = DataService::<Item, _>::new(&session);
/// items.create(json!({"name": "lamp", "price": 12})).await?;
/// ```
pub struct SqlxSession {
    pool: SqlitePool,
    tx: Mutex<Option<Transaction<'static, Sqlite>>>,
    echo: bool,
}

impl SqlxSession {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
            echo: false,
        }
    }

    /// Log every statement at `info` level instead of `debug`.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether a transaction is currently open.
    pub async fn in_transaction(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    async fn transaction(
        &self,
    ) -> Result<MutexGuard<'_, Option<Transaction<'static, Sqlite>>>, DataError> {
        let mut guard = self.tx.lock().await;
        if guard.is_none() {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(SqlxErrorExt::into_data_error)?;
            debug!("began transaction");
            *guard = Some(tx);
        }
        Ok(guard)
    }

    fn connection<'a>(
        guard: &'a mut MutexGuard<'_, Option<Transaction<'static, Sqlite>>>,
    ) -> Result<&'a mut SqliteConnection, DataError> {
        guard
            .as_mut()
            .map(|tx| &mut **tx)
            .ok_or_else(|| DataError::Other("transaction unavailable".into()))
    }

    fn scoped(query: QueryBuilder) -> QueryBuilder {
        query.identifier_policy(IdentifierPolicy::Quote)
    }

    fn key_query<M: Model>(key: &[Value]) -> QueryBuilder {
        let key = M::primary_key()
            .iter()
            .zip(key)
            .map(|(column, value)| col(*column).eq(value.clone()));
        Self::scoped(QueryBuilder::for_model::<M>()).where_(key)
    }

    fn log_statement(&self, sql: &str, params: &[Value]) {
        if self.echo {
            info!(sql = %sql, params = ?params, "executing statement");
        } else {
            debug!(sql = %sql, params = ?params, "executing statement");
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        self.log_statement(sql, params);
        let mut tx = self.transaction().await?;
        let conn = Self::connection(&mut tx)?;
        let result = bind_all(sql, params)
            .execute(conn)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected())
    }
}

fn missing_key<M: Model>(key: &[Value]) -> DataError {
    let key: Vec<String> = key.iter().map(ToString::to_string).collect();
    DataError::NotFound(format!("{} ({})", M::table_name(), key.join(", ")))
}

impl Session for SqlxSession {
    async fn fetch_all<M: Model>(&self, query: &QueryBuilder) -> Result<Vec<M>, DataError> {
        let (sql, params) = Self::scoped(query.clone()).build_select(M::fields())?;
        self.log_statement(&sql, &params);
        let mut tx = self.transaction().await?;
        let conn = Self::connection(&mut tx)?;
        let rows = bind_all(&sql, &params)
            .fetch_all(conn)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        rows.iter()
            .map(|row| decode_row(row).and_then(|values| M::from_values(&values)))
            .collect()
    }

    async fn insert<M: Model>(&self, instance: M) -> Result<M, DataError> {
        let values = instance.to_values();
        let pk = M::primary_key();
        // NULL key columns are left to the engine (INTEGER PRIMARY KEY aliases rowid).
        let assignments: Vec<(&str, Value)> = values
            .iter()
            .filter(|(field, value)| !(value.is_null() && pk.contains(field)))
            .map(|(field, value)| (field, value.clone()))
            .collect();
        let (sql, params) = Self::scoped(QueryBuilder::for_model::<M>())
            .build_insert(&assignments, M::fields())?;

        self.log_statement(&sql, &params);
        let mut tx = self.transaction().await?;
        let conn = Self::connection(&mut tx)?;
        let row = bind_all(&sql, &params)
            .fetch_one(conn)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        M::from_values(&decode_row(&row)?)
    }

    async fn update<M: Model>(&self, key: &[Value], instance: &M) -> Result<(), DataError> {
        // Key columns are written too, so a changed key renames the row and
        // a clash surfaces as a constraint violation.
        let values = instance.to_values();
        let assignments: Vec<(&str, Value)> = values
            .iter()
            .map(|(field, value)| (field, value.clone()))
            .collect();
        let (sql, params) = Self::key_query::<M>(key).build_update(&assignments)?;
        match self.execute(&sql, &params).await? {
            0 => Err(missing_key::<M>(key)),
            _ => Ok(()),
        }
    }

    async fn delete<M: Model>(&self, instance: &M) -> Result<(), DataError> {
        let key = instance.primary_key_values();
        let (sql, params) = Self::key_query::<M>(&key).build_delete()?;
        match self.execute(&sql, &params).await? {
            0 => Err(missing_key::<M>(&key)),
            _ => Ok(()),
        }
    }

    async fn commit(&self) -> Result<(), DataError> {
        let tx = self.tx.lock().await.take();
        if let Some(tx) = tx {
            tx.commit().await.map_err(SqlxErrorExt::into_data_error)?;
            debug!("committed transaction");
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DataError> {
        let tx = self.tx.lock().await.take();
        if let Some(tx) = tx {
            tx.rollback().await.map_err(SqlxErrorExt::into_data_error)?;
            debug!("rolled back transaction");
        }
        Ok(())
    }
}

impl Drop for SqlxSession {
    fn drop(&mut self) {
        if self.tx.get_mut().is_some() {
            warn!("session dropped with an open transaction; uncommitted writes are discarded");
        }
    }
}

impl std::fmt::Debug for SqlxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxSession")
            .field("echo", &self.echo)
            .finish_non_exhaustive()
    }
}
