use std::ops::Index;

use crate::expr::OrderBy;
use crate::query::QueryBuilder;

/// An immutable, ordered list of `ORDER BY` keys.
///
/// The first key is the primary sort key. An empty sorting leaves result
/// order to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sorting {
    keys: Vec<OrderBy>,
}

impl Sorting {
    pub fn new(keys: impl IntoIterator<Item = impl Into<OrderBy>>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Append keys as given (columns default to ascending).
    pub fn asc(&self, keys: impl IntoIterator<Item = impl Into<OrderBy>>) -> Sorting {
        let mut combined = self.keys.clone();
        combined.extend(keys.into_iter().map(Into::into));
        Sorting { keys: combined }
    }

    /// Append keys wrapped as descending.
    pub fn desc(&self, keys: impl IntoIterator<Item = impl Into<OrderBy>>) -> Sorting {
        let mut combined = self.keys.clone();
        combined.extend(keys.into_iter().map(|k| k.into().descending()));
        Sorting { keys: combined }
    }

    pub fn apply(&self, query: QueryBuilder) -> QueryBuilder {
        if self.keys.is_empty() {
            return query;
        }
        query.order_by(self.keys.iter().cloned())
    }

    pub fn get(&self, index: usize) -> Option<&OrderBy> {
        self.keys.get(index)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderBy> {
        self.keys.iter()
    }
}

impl Index<usize> for Sorting {
    type Output = OrderBy;

    fn index(&self, index: usize) -> &OrderBy {
        &self.keys[index]
    }
}

impl std::fmt::Display for Sorting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.keys.iter().map(ToString::to_string).collect();
        write!(f, "Sorting({})", keys.join(", "))
    }
}
