use crate::expr::{Direction, Expr, OrderBy};
use crate::model::Model;
use crate::value::Value;

/// Largest `LIMIT` / `OFFSET` rendered; SQL engines read these as signed 64-bit integers.
pub const MAX_ROW_COUNT: u64 = i64::MAX as u64;

/// Statements use `?` placeholders and `"`-quoted identifiers, as SQLite reads them.
const PLACEHOLDER: &str = "?";
const QUOTE: char = '"';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierPolicy {
    /// Validate identifiers against a conservative pattern.
    Validate,
    /// Validate and double-quote identifiers.
    Quote,
}

/// A composable query scoped to one table.
///
/// `Filter`, `Sorting` and `Pagination` are applied to a `QueryBuilder`;
/// sessions render it with one of the `build_*` methods.
///
/// # Example
///
/// ```ignore
/// let q = QueryBuilder::new("users")
///     .where_([col("email").eq("a@b.com"), col("name").like("%alice%")])
///     .order_by([col("id").asc()])
///     .limit(10);
/// let (sql, params) = q.build_select(&["*"])?;
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    predicates: Vec<Expr>,
    order: Vec<OrderBy>,
    limit_val: Option<u64>,
    offset_val: Option<u64>,
    identifier_policy: IdentifierPolicy,
}

impl QueryBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            predicates: Vec::new(),
            order: Vec::new(),
            limit_val: None,
            offset_val: None,
            identifier_policy: IdentifierPolicy::Validate,
        }
    }

    /// The base query over all records of `M`.
    pub fn for_model<M: Model>() -> Self {
        Self::new(M::table_name())
    }

    /// Configure identifier quoting behavior.
    pub fn identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    /// Append predicates; all predicates are ANDed.
    pub fn where_(mut self, predicates: impl IntoIterator<Item = Expr>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    /// Append order keys after the existing ones.
    pub fn order_by(mut self, keys: impl IntoIterator<Item = OrderBy>) -> Self {
        self.order.extend(keys);
        self
    }

    /// Values above [`MAX_ROW_COUNT`] are capped.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_val = Some(limit.min(MAX_ROW_COUNT));
        self
    }

    /// Values above [`MAX_ROW_COUNT`] are capped.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset_val = Some(offset.min(MAX_ROW_COUNT));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn predicates(&self) -> &[Expr] {
        &self.predicates
    }

    pub fn order(&self) -> &[OrderBy] {
        &self.order
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit_val
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset_val
    }

    /// Build a SELECT query returning `(sql, bind_values)`.
    ///
    /// The `columns` parameter determines which columns to select (e.g., `["*"]`).
    pub fn build_select(&self, columns: &[&str]) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.format_identifier(&self.table, false, "table")?;
        let columns = self.format_column_list(columns, true)?;

        let mut sql = format!("SELECT {columns} FROM {table}");
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params)?;
        self.append_order(&mut sql)?;
        self.append_limit_offset(&mut sql);
        Ok((sql, params))
    }

    /// Build an INSERT of `assignments`, optionally with a `RETURNING` clause.
    ///
    /// Predicates, ordering and paging are ignored.
    pub fn build_insert(
        &self,
        assignments: &[(&str, Value)],
        returning: &[&str],
    ) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.format_identifier(&self.table, false, "table")?;
        let mut sql = if assignments.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES")
        } else {
            let columns: Vec<&str> = assignments.iter().map(|(c, _)| *c).collect();
            let columns = self.format_column_list(&columns, false)?;
            let placeholders = vec![PLACEHOLDER; assignments.len()];
            format!(
                "INSERT INTO {table} ({columns}) VALUES ({})",
                placeholders.join(", ")
            )
        };
        if !returning.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.format_column_list(returning, true)?);
        }
        let params = assignments.iter().map(|(_, v)| v.clone()).collect();
        Ok((sql, params))
    }

    /// Build an UPDATE setting `assignments` on every row matching the predicates.
    pub fn build_update(
        &self,
        assignments: &[(&str, Value)],
    ) -> Result<(String, Vec<Value>), QueryError> {
        if assignments.is_empty() {
            return Err(QueryError::EmptyAssignment);
        }
        let table = self.format_identifier(&self.table, false, "table")?;
        let mut params = Vec::with_capacity(assignments.len());
        let mut sets = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            let column = self.format_identifier(column, false, "column")?;
            params.push(value.clone());
            sets.push(format!("{column} = {PLACEHOLDER}"));
        }
        let mut sql = format!("UPDATE {table} SET {}", sets.join(", "));
        self.append_where(&mut sql, &mut params)?;
        Ok((sql, params))
    }

    /// Build a DELETE of every row matching the predicates.
    pub fn build_delete(&self) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.format_identifier(&self.table, false, "table")?;
        let mut sql = format!("DELETE FROM {table}");
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params)?;
        Ok((sql, params))
    }

    fn append_where(&self, sql: &mut String, params: &mut Vec<Value>) -> Result<(), QueryError> {
        if self.predicates.is_empty() {
            return Ok(());
        }
        sql.push_str(" WHERE ");
        let mut first = true;
        for expr in &self.predicates {
            if !first {
                sql.push_str(" AND ");
            }
            first = false;
            let nested = self.predicates.len() > 1;
            self.render_expr(expr, nested, sql, params)?;
        }
        Ok(())
    }

    fn render_expr(
        &self,
        expr: &Expr,
        nested: bool,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> Result<(), QueryError> {
        match expr {
            Expr::Compare { column, op, value } => {
                let col = self.format_identifier(column, false, "column")?;
                params.push(value.clone());
                sql.push_str(&format!("{col} {} {PLACEHOLDER}", op.as_sql()));
            }
            Expr::Like { column, pattern } => {
                let col = self.format_identifier(column, false, "column")?;
                params.push(Value::Text(pattern.clone()));
                sql.push_str(&format!("{col} LIKE {PLACEHOLDER}"));
            }
            Expr::In { column, values } => {
                let col = self.format_identifier(column, false, "column")?;
                if values.is_empty() {
                    sql.push_str("1 = 0");
                    return Ok(());
                }
                params.extend(values.iter().cloned());
                let placeholders = vec![PLACEHOLDER; values.len()];
                sql.push_str(&format!("{col} IN ({})", placeholders.join(", ")));
            }
            Expr::IsNull(column) => {
                let col = self.format_identifier(column, false, "column")?;
                sql.push_str(&format!("{col} IS NULL"));
            }
            Expr::IsNotNull(column) => {
                let col = self.format_identifier(column, false, "column")?;
                sql.push_str(&format!("{col} IS NOT NULL"));
            }
            Expr::And(exprs) => self.render_group(exprs, " AND ", "1 = 1", nested, sql, params)?,
            Expr::Or(exprs) => self.render_group(exprs, " OR ", "1 = 0", nested, sql, params)?,
            Expr::Not(inner) => {
                sql.push_str("NOT (");
                self.render_expr(inner, false, sql, params)?;
                sql.push(')');
            }
        }
        Ok(())
    }

    fn render_group(
        &self,
        exprs: &[Expr],
        sep: &str,
        empty: &str,
        nested: bool,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> Result<(), QueryError> {
        if exprs.is_empty() {
            sql.push_str(empty);
            return Ok(());
        }
        let wrap = nested && exprs.len() > 1;
        if wrap {
            sql.push('(');
        }
        for (idx, expr) in exprs.iter().enumerate() {
            if idx > 0 {
                sql.push_str(sep);
            }
            self.render_expr(expr, true, sql, params)?;
        }
        if wrap {
            sql.push(')');
        }
        Ok(())
    }

    fn append_order(&self, sql: &mut String) -> Result<(), QueryError> {
        if self.order.is_empty() {
            return Ok(());
        }
        sql.push_str(" ORDER BY ");
        let mut clauses = Vec::with_capacity(self.order.len());
        for key in &self.order {
            let col = self.format_identifier(&key.column, false, "column")?;
            match key.direction {
                Direction::Asc => clauses.push(format!("{col} ASC")),
                Direction::Desc => clauses.push(format!("{col} DESC")),
            }
        }
        sql.push_str(&clauses.join(", "));
        Ok(())
    }

    fn append_limit_offset(&self, sql: &mut String) {
        match (self.limit_val, self.offset_val) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite and MySQL reject OFFSET without LIMIT.
            (None, Some(_)) => sql.push_str(" LIMIT -1"),
            (None, None) => {}
        }
        if let Some(offset) = self.offset_val {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    fn format_column_list(&self, columns: &[&str], allow_star: bool) -> Result<String, QueryError> {
        let mut out = Vec::with_capacity(columns.len());
        for col in columns {
            out.push(self.format_identifier(col, allow_star, "column")?);
        }
        Ok(out.join(", "))
    }

    fn format_identifier(
        &self,
        ident: &str,
        allow_star: bool,
        kind: &'static str,
    ) -> Result<String, QueryError> {
        if !is_valid_identifier(ident, allow_star) {
            return Err(QueryError::InvalidIdentifier {
                kind,
                ident: ident.to_string(),
            });
        }
        match self.identifier_policy {
            IdentifierPolicy::Quote => Ok(quote_identifier(ident, allow_star)),
            IdentifierPolicy::Validate => Ok(ident.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidIdentifier { kind: &'static str, ident: String },
    EmptyAssignment,
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::InvalidIdentifier { kind, ident } => {
                write!(f, "Invalid {kind} identifier: {ident}")
            }
            QueryError::EmptyAssignment => write!(f, "UPDATE without any column to set"),
        }
    }
}

impl std::error::Error for QueryError {}

fn is_valid_identifier(ident: &str, allow_star: bool) -> bool {
    if ident.is_empty() {
        return false;
    }
    let parts: Vec<&str> = ident.split('.').collect();
    for (idx, part) in parts.iter().enumerate() {
        if allow_star && *part == "*" {
            return idx + 1 == parts.len();
        }
        if !is_valid_segment(part) {
            return false;
        }
    }
    true
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
    }
    true
}

fn quote_identifier(ident: &str, allow_star: bool) -> String {
    let parts: Vec<&str> = ident.split('.').collect();
    let last_idx = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .map(|(idx, part)| {
            if allow_star && part == "*" && idx == last_idx {
                part.to_string()
            } else {
                format!("{QUOTE}{part}{QUOTE}")
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
