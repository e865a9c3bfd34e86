use std::ops::Index;

use crate::expr::Expr;
use crate::query::QueryBuilder;

/// An immutable, ordered list of predicates, ANDed when applied.
///
/// Every combinator returns a new `Filter`; the receiver is never changed.
/// An empty filter matches everything.
///
/// ```ignore
/// let cheap = Filter::new([col("price").lt(10)]);
/// let cheap_lamps = cheap.and([col("name").like("%lamp%")]);
/// let cheap_or_free = cheap.or([col("price").eq(0)]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Expr>,
}

impl Filter {
    pub fn new(predicates: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            predicates: predicates.into_iter().collect(),
        }
    }

    /// The filter with no predicate.
    pub fn all() -> Self {
        Self::default()
    }

    /// This filter's predicates followed by `predicates`.
    pub fn and(&self, predicates: impl IntoIterator<Item = Expr>) -> Filter {
        let mut combined = self.predicates.clone();
        combined.extend(predicates);
        Filter {
            predicates: combined,
        }
    }

    /// `(all of self) OR (all of predicates)`.
    ///
    /// An empty side is left out of the disjunction rather than read as
    /// "matches nothing"; when both sides are empty the result is empty.
    pub fn or(&self, predicates: impl IntoIterator<Item = Expr>) -> Filter {
        let other: Vec<Expr> = predicates.into_iter().collect();
        match (self.predicates.is_empty(), other.is_empty()) {
            (true, true) => Filter::default(),
            (false, true) => self.clone(),
            (true, false) => Filter { predicates: other },
            (false, false) => Filter {
                predicates: vec![Expr::Or(vec![
                    Expr::all(self.predicates.iter().cloned()),
                    Expr::all(other),
                ])],
            },
        }
    }

    /// Combine with another filter; see [`Filter::or`].
    pub fn or_filter(&self, other: &Filter) -> Filter {
        self.or(other.predicates.iter().cloned())
    }

    /// Restrict `query` to rows matching every predicate.
    pub fn apply(&self, query: QueryBuilder) -> QueryBuilder {
        if self.predicates.is_empty() {
            return query;
        }
        query.where_(self.predicates.iter().cloned())
    }

    pub fn get(&self, index: usize) -> Option<&Expr> {
        self.predicates.get(index)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expr> {
        self.predicates.iter()
    }

    /// The predicates collapsed into a single expression, if any.
    pub fn to_expr(&self) -> Option<Expr> {
        if self.predicates.is_empty() {
            None
        } else {
            Some(Expr::all(self.predicates.iter().cloned()))
        }
    }
}

impl Index<usize> for Filter {
    type Output = Expr;

    fn index(&self, index: usize) -> &Expr {
        &self.predicates[index]
    }
}

impl From<Expr> for Filter {
    fn from(expr: Expr) -> Self {
        Filter::new([expr])
    }
}

impl<'a> IntoIterator for &'a Filter {
    type Item = &'a Expr;
    type IntoIter = std::slice::Iter<'a, Expr>;

    fn into_iter(self) -> Self::IntoIter {
        self.predicates.iter()
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_expr() {
            Some(expr) => write!(f, "Filter({expr})"),
            None => f.write_str("Filter()"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;

    #[test]
    fn test_and_keeps_receiver() {
        let base = Filter::new([col("a").eq(1)]);
        let both = base.and([col("b").eq(2)]);
        assert_eq!(base.len(), 1);
        assert_eq!(both.len(), 2);
        assert_eq!(both[1], col("b").eq(2));
    }

    #[test]
    fn test_and_nothing_is_identity() {
        let base = Filter::new([col("a").eq(1)]);
        assert_eq!(base.and(Vec::<Expr>::new()), base);
    }

    #[test]
    fn test_or_builds_single_disjunction() {
        let f = Filter::new([col("a").eq(1), col("b").eq(2)]).or([col("c").eq(3)]);
        assert_eq!(f.len(), 1);
        assert_eq!(
            f[0],
            Expr::Or(vec![
                Expr::And(vec![col("a").eq(1), col("b").eq(2)]),
                col("c").eq(3),
            ])
        );
    }

    #[test]
    fn test_or_with_empty_side() {
        let some = Filter::new([col("a").eq(1), col("b").eq(2)]);
        assert_eq!(some.or(Vec::<Expr>::new()), some);
        assert_eq!(Filter::all().or_filter(&some), some);
        assert!(Filter::all().or(Vec::<Expr>::new()).is_empty());
    }

    #[test]
    fn test_empty_apply_is_noop() {
        let q = Filter::all().apply(QueryBuilder::new("items"));
        assert!(q.predicates().is_empty());
        let q = Filter::new([col("a").eq(1)]).apply(q);
        assert_eq!(q.predicates().len(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(Filter::all().to_string(), "Filter()");
        assert_eq!(Filter::from(col("a").gt(1)).to_string(), "Filter(a > 1)");
    }
}
