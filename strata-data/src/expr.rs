//! Predicate and ordering expressions.
//!
//! Expressions are plain data: they are rendered to SQL by
//! [`QueryBuilder`](crate::QueryBuilder) and evaluated directly by the
//! in-memory session.
//!
//! ```ignore
//! use strata_data::col;
//!
//! let cheap = col("price").lt(10);
//! let named = col("name").like("%lamp%");
//! let either = cheap.or(named);
//! ```

use std::cmp::Ordering;

use crate::value::{Value, Values};

/// Comparison operator of a [`Expr::Compare`] predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
}

impl CmpOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::NotEq => "!=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::NotEq => ordering != Ordering::Equal,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::GtEq => ordering != Ordering::Less,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::LtEq => ordering != Ordering::Greater,
        }
    }
}

/// A boolean predicate over the fields of a model.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        column: String,
        op: CmpOp,
        value: Value,
    },
    Like {
        column: String,
        pattern: String,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    IsNull(String),
    IsNotNull(String),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Conjunction of `exprs`; a single expression is returned as is.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        let mut exprs: Vec<Expr> = exprs.into_iter().collect();
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::And(exprs)
        }
    }

    /// Disjunction of `exprs`; a single expression is returned as is.
    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        let mut exprs: Vec<Expr> = exprs.into_iter().collect();
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::Or(exprs)
        }
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::And(vec![self, other])
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(vec![self, other])
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    /// Columns referenced by this expression, in order of appearance.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Compare { column, .. }
            | Expr::Like { column, .. }
            | Expr::In { column, .. }
            | Expr::IsNull(column)
            | Expr::IsNotNull(column) => out.push(column),
            Expr::And(exprs) | Expr::Or(exprs) => {
                for expr in exprs {
                    expr.collect_columns(out);
                }
            }
            Expr::Not(expr) => expr.collect_columns(out),
        }
    }

    /// Evaluate against a row with SQL three-valued logic.
    ///
    /// `None` is SQL `UNKNOWN`: any comparison involving `NULL` or a
    /// missing column.
    pub fn evaluate(&self, row: &Values) -> Option<bool> {
        let field = |column: &str| row.get(column).cloned().unwrap_or(Value::Null);
        match self {
            Expr::Compare { column, op, value } => {
                field(column).sql_cmp(value).map(|ord| op.holds(ord))
            }
            Expr::Like { column, pattern } => match field(column) {
                Value::Text(text) => Some(like_match(&text, pattern)),
                Value::Null => None,
                other => Some(like_match(&other.to_string(), pattern)),
            },
            Expr::In { column, values } => {
                let lhs = field(column);
                if lhs.is_null() {
                    return None;
                }
                let mut unknown = false;
                for candidate in values {
                    match lhs.sql_cmp(candidate) {
                        Some(Ordering::Equal) => return Some(true),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Expr::IsNull(column) => Some(field(column).is_null()),
            Expr::IsNotNull(column) => Some(!field(column).is_null()),
            Expr::And(exprs) => {
                let mut result = Some(true);
                for expr in exprs {
                    match expr.evaluate(row) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Expr::Or(exprs) => {
                let mut result = Some(false);
                for expr in exprs {
                    match expr.evaluate(row) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Expr::Not(expr) => expr.evaluate(row).map(|b| !b),
        }
    }

    /// Whether the row satisfies the predicate (`UNKNOWN` does not).
    pub fn matches(&self, row: &Values) -> bool {
        self.evaluate(row) == Some(true)
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Compare { column, op, value } => write!(f, "{column} {} {value}", op.as_sql()),
            Expr::Like { column, pattern } => {
                write!(f, "{column} LIKE {}", Value::Text(pattern.clone()))
            }
            Expr::In { column, values } => {
                let items: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{column} IN ({})", items.join(", "))
            }
            Expr::IsNull(column) => write!(f, "{column} IS NULL"),
            Expr::IsNotNull(column) => write!(f, "{column} IS NOT NULL"),
            Expr::And(exprs) => write_joined(f, exprs, " AND ", "TRUE"),
            Expr::Or(exprs) => write_joined(f, exprs, " OR ", "FALSE"),
            Expr::Not(expr) => write!(f, "NOT ({expr})"),
        }
    }
}

fn write_joined(
    f: &mut std::fmt::Formatter<'_>,
    exprs: &[Expr],
    sep: &str,
    empty: &str,
) -> std::fmt::Result {
    if exprs.is_empty() {
        return f.write_str(empty);
    }
    let parts: Vec<String> = exprs.iter().map(|e| format!("({e})")).collect();
    f.write_str(&parts.join(sep))
}

/// SQL `LIKE` with `%` and `_` wildcards, ASCII case-insensitive.
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();

    // Iterative wildcard match with single backtrack point.
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}

/// Sort direction of an [`OrderBy`] key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }

    /// The same key with descending direction.
    pub fn descending(self) -> Self {
        Self {
            direction: Direction::Desc,
            ..self
        }
    }
}

impl From<&str> for OrderBy {
    fn from(column: &str) -> Self {
        OrderBy::asc(column)
    }
}

impl From<String> for OrderBy {
    fn from(column: String) -> Self {
        OrderBy::asc(column)
    }
}

impl From<Column> for OrderBy {
    fn from(column: Column) -> Self {
        OrderBy::asc(column.0)
    }
}

impl std::fmt::Display for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.direction {
            Direction::Asc => write!(f, "{} ASC", self.column),
            Direction::Desc => write!(f, "{} DESC", self.column),
        }
    }
}

/// Handle on a named column, used to build predicates and order keys.
#[derive(Debug, Clone)]
pub struct Column(pub String);

/// Shorthand for [`Column`].
pub fn col(name: impl Into<String>) -> Column {
    Column(name.into())
}

impl Column {
    fn compare(self, op: CmpOp, value: impl Into<Value>) -> Expr {
        Expr::Compare {
            column: self.0,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Expr {
        self.compare(CmpOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Expr {
        self.compare(CmpOp::NotEq, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Expr {
        self.compare(CmpOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Expr {
        self.compare(CmpOp::GtEq, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Expr {
        self.compare(CmpOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Expr {
        self.compare(CmpOp::LtEq, value)
    }

    pub fn like(self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            column: self.0,
            pattern: pattern.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::In {
            column: self.0,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull(self.0)
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNotNull(self.0)
    }

    pub fn asc(self) -> OrderBy {
        OrderBy::asc(self.0)
    }

    pub fn desc(self) -> OrderBy {
        OrderBy::desc(self.0)
    }
}
