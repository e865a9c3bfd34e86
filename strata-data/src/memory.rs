//! In-process [`Session`] backed by plain collections.
//!
//! `MemorySession` follows the same transaction rules as a database-backed
//! session: the first operation after a commit copies the committed tables
//! into a working set, every read and write goes to the working set, and
//! `commit` publishes it. Useful for tests and prototyping.

use std::cmp::Ordering;
use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::DataError;
use crate::model::Model;
use crate::query::QueryBuilder;
use crate::session::Session;
use crate::value::{Value, Values};

type Tables = HashMap<String, Vec<Values>>;

#[derive(Debug, Default)]
struct MemoryState {
    committed: Tables,
    working: Option<Tables>,
    commits: usize,
    commit_attempts: usize,
    fail_commit_at: Option<usize>,
}

impl MemoryState {
    fn working(&mut self) -> &mut Tables {
        let committed = &self.committed;
        self.working.get_or_insert_with(|| committed.clone())
    }
}

#[derive(Debug, Default)]
pub struct MemorySession {
    state: Mutex<MemoryState>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits so far.
    pub async fn commit_count(&self) -> usize {
        self.state.lock().await.commits
    }

    /// Make the `n`-th commit attempt (1-based) fail; the working set is
    /// discarded, as a failed database commit would roll back.
    pub async fn fail_commit_at(&self, n: usize) {
        self.state.lock().await.fail_commit_at = Some(n);
    }

    /// Rows of `table` as last committed.
    pub async fn committed_rows(&self, table: &str) -> Vec<Values> {
        self.state
            .lock()
            .await
            .committed
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether writes are pending since the last commit.
    pub async fn in_transaction(&self) -> bool {
        self.state.lock().await.working.is_some()
    }
}

fn find_by_key(rows: &[Values], columns: &[&str], key: &[Value]) -> Option<usize> {
    rows.iter().position(|row| {
        columns.iter().zip(key).all(|(col, expected)| {
            row.get(col)
                .is_some_and(|v| v.sql_cmp(expected) == Some(Ordering::Equal))
        })
    })
}

fn missing_key<M: Model>(key: &[Value]) -> DataError {
    let key: Vec<String> = key.iter().map(ToString::to_string).collect();
    DataError::NotFound(format!("{} ({})", M::table_name(), key.join(", ")))
}

impl Session for MemorySession {
    async fn fetch_all<M: Model>(&self, query: &QueryBuilder) -> Result<Vec<M>, DataError> {
        let mut state = self.state.lock().await;
        let rows = state.working().entry(query.table().to_string()).or_default();

        let mut matched: Vec<&Values> = rows
            .iter()
            .filter(|row| query.predicates().iter().all(|p| p.matches(row)))
            .collect();

        if !query.order().is_empty() {
            matched.sort_by(|a, b| {
                for key in query.order() {
                    let lhs = a.get(&key.column).unwrap_or(&Value::Null);
                    let rhs = b.get(&key.column).unwrap_or(&Value::Null);
                    let ord = match key.direction {
                        crate::expr::Direction::Asc => lhs.sort_cmp(rhs),
                        crate::expr::Direction::Desc => rhs.sort_cmp(lhs),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = usize::try_from(query.offset_value().unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = query
            .limit_value()
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(M::from_values)
            .collect()
    }

    async fn insert<M: Model>(&self, instance: M) -> Result<M, DataError> {
        let mut state = self.state.lock().await;
        let rows = state.working().entry(M::table_name().to_string()).or_default();
        let mut values = instance.to_values();

        let pk = M::primary_key();
        if let [column] = pk {
            if values.get(column).map_or(true, Value::is_null) {
                let next = rows
                    .iter()
                    .filter_map(|row| match row.get(column) {
                        Some(Value::Int(i)) => Some(*i),
                        _ => None,
                    })
                    .max()
                    .unwrap_or(0)
                    + 1;
                values.insert(*column, next);
            }
        }

        let key: Vec<Value> = pk
            .iter()
            .map(|col| values.get(col).cloned().unwrap_or(Value::Null))
            .collect();
        if find_by_key(rows, pk, &key).is_some() {
            return Err(DataError::Constraint(format!(
                "duplicate primary key in '{}'",
                M::table_name()
            )));
        }

        let stored = M::from_values(&values)?;
        rows.push(values);
        Ok(stored)
    }

    async fn update<M: Model>(&self, key: &[Value], instance: &M) -> Result<(), DataError> {
        let mut state = self.state.lock().await;
        let rows = state.working().entry(M::table_name().to_string()).or_default();
        let pk = M::primary_key();
        let idx = find_by_key(rows, pk, key).ok_or_else(|| missing_key::<M>(key))?;
        let new_key = instance.primary_key_values();
        if let Some(other) = find_by_key(rows, pk, &new_key) {
            if other != idx {
                return Err(DataError::Constraint(format!(
                    "duplicate primary key in '{}'",
                    M::table_name()
                )));
            }
        }
        rows[idx] = instance.to_values();
        Ok(())
    }

    async fn delete<M: Model>(&self, instance: &M) -> Result<(), DataError> {
        let mut state = self.state.lock().await;
        let rows = state.working().entry(M::table_name().to_string()).or_default();
        let key = instance.primary_key_values();
        let idx = find_by_key(rows, M::primary_key(), &key).ok_or_else(|| missing_key::<M>(&key))?;
        rows.remove(idx);
        Ok(())
    }

    async fn commit(&self) -> Result<(), DataError> {
        let mut state = self.state.lock().await;
        state.commit_attempts += 1;
        if state.fail_commit_at == Some(state.commit_attempts) {
            state.working = None;
            return Err(DataError::Other(format!(
                "injected failure on commit #{}",
                state.commit_attempts
            )));
        }
        if let Some(working) = state.working.take() {
            state.committed = working;
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DataError> {
        self.state.lock().await.working = None;
        Ok(())
    }
}
