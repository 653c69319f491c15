//! SQLite SELECT text generation with validated, quoted identifiers.

use repokit_data::{Direction, Value};

/// A builder for the SELECT and COUNT statements the SQLite source issues.
///
/// Identifiers always come from entity metadata or ordering rules, so every
/// one is validated and quoted. Values are bound positionally with `?`.
///
/// # Example
///
/// ```ignore
/// let (sql, params) = SelectBuilder::new("users")
///     .where_eq("id", Value::Integer(7))
///     .order_by("name", Direction::Asc)
///     .limit(10)
///     .build_select(&["id", "name"])?;
/// ```
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: String,
    conditions: Vec<(String, Value)>,
    order: Vec<(String, Direction)>,
    limit_val: Option<u64>,
    offset_val: Option<u64>,
}

impl SelectBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit_val: None,
            offset_val: None,
        }
    }

    /// `column = ?`, or `column IS NULL` for [`Value::Null`].
    pub fn where_eq(mut self, column: &str, value: Value) -> Self {
        self.conditions.push((column.to_string(), value));
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_val = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset_val = Some(offset);
        self
    }

    /// Build a SELECT returning `(sql, bind_values)`.
    pub fn build_select(&self, columns: &[&str]) -> Result<(String, Vec<Value>), QueryError> {
        let table = quote_checked(&self.table, "table")?;
        let columns = columns
            .iter()
            .map(|c| quote_checked(c, "column"))
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(QueryError::NoColumns);
        }

        let mut sql = format!("SELECT {} FROM {table}", columns.join(", "));
        let params = self.append_where(&mut sql)?;
        self.append_order(&mut sql)?;
        self.append_limit_offset(&mut sql);
        Ok((sql, params))
    }

    /// Build a COUNT query. Ordering and slicing are ignored.
    pub fn build_count(&self) -> Result<(String, Vec<Value>), QueryError> {
        let table = quote_checked(&self.table, "table")?;
        let mut sql = format!("SELECT COUNT(*) FROM {table}");
        let params = self.append_where(&mut sql)?;
        Ok((sql, params))
    }

    fn append_where(&self, sql: &mut String) -> Result<Vec<Value>, QueryError> {
        let mut params = Vec::new();
        if self.conditions.is_empty() {
            return Ok(params);
        }
        let mut clauses = Vec::with_capacity(self.conditions.len());
        for (col, value) in &self.conditions {
            let col = quote_checked(col, "column")?;
            if value.is_null() {
                clauses.push(format!("{col} IS NULL"));
            } else {
                clauses.push(format!("{col} = ?"));
                params.push(value.clone());
            }
        }
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
        Ok(params)
    }

    fn append_order(&self, sql: &mut String) -> Result<(), QueryError> {
        if self.order.is_empty() {
            return Ok(());
        }
        let mut clauses = Vec::with_capacity(self.order.len());
        for (col, direction) in &self.order {
            let col = quote_checked(col, "column")?;
            match direction {
                Direction::Asc => clauses.push(format!("{col} ASC")),
                Direction::Desc => clauses.push(format!("{col} DESC")),
            }
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&clauses.join(", "));
        Ok(())
    }

    fn append_limit_offset(&self, sql: &mut String) {
        // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
        match (self.limit_val, self.offset_val) {
            (None, None) => {}
            (limit, offset) => {
                let limit = limit.and_then(|l| i64::try_from(l).ok()).unwrap_or(-1);
                sql.push_str(&format!(" LIMIT {limit}"));
                if let Some(offset) = offset {
                    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
                    sql.push_str(&format!(" OFFSET {offset}"));
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum QueryError {
    InvalidIdentifier { kind: &'static str, ident: String },
    NoColumns,
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::InvalidIdentifier { kind, ident } => {
                write!(f, "Invalid {kind} identifier: {ident}")
            }
            QueryError::NoColumns => write!(f, "SELECT needs at least one column"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Whether `ident` is a plain (optionally dotted) SQL identifier.
pub fn is_valid_identifier(ident: &str) -> bool {
    !ident.is_empty() && ident.split('.').all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_checked(ident: &str, kind: &'static str) -> Result<String, QueryError> {
    if !is_valid_identifier(ident) {
        return Err(QueryError::InvalidIdentifier {
            kind,
            ident: ident.to_string(),
        });
    }
    Ok(ident
        .split('.')
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_select() {
        let (sql, params) = SelectBuilder::new("users")
            .build_select(&["id", "name"])
            .unwrap();
        assert_eq!(sql, "SELECT \"id\", \"name\" FROM \"users\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_key_lookup() {
        let (sql, params) = SelectBuilder::new("order_lines")
            .where_eq("order_id", Value::Integer(7))
            .where_eq("line", Value::Integer(2))
            .build_select(&["order_id", "line"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"order_id\", \"line\" FROM \"order_lines\" WHERE \"order_id\" = ? AND \"line\" = ?"
        );
        assert_eq!(params, vec![Value::Integer(7), Value::Integer(2)]);
    }

    #[test]
    fn test_null_condition_binds_nothing() {
        let (sql, params) = SelectBuilder::new("users")
            .where_eq("email", Value::Null)
            .build_count()
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM \"users\" WHERE \"email\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_order_limit_offset() {
        let (sql, _) = SelectBuilder::new("users")
            .order_by("age", Direction::Desc)
            .order_by("id", Direction::Asc)
            .limit(10)
            .offset(20)
            .build_select(&["id"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"id\" FROM \"users\" ORDER BY \"age\" DESC, \"id\" ASC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_offset_without_limit() {
        let (sql, _) = SelectBuilder::new("users")
            .offset(5)
            .build_select(&["id"])
            .unwrap();
        assert_eq!(sql, "SELECT \"id\" FROM \"users\" LIMIT -1 OFFSET 5");
    }

    #[test]
    fn test_count_ignores_slicing() {
        let (sql, _) = SelectBuilder::new("users")
            .order_by("id", Direction::Asc)
            .limit(3)
            .build_count()
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM \"users\"");
    }

    #[test]
    fn test_invalid_identifier() {
        let err = SelectBuilder::new("users;drop")
            .build_select(&["id"])
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier { kind: "table", .. }));

        let err = SelectBuilder::new("users")
            .order_by("name desc", Direction::Asc)
            .build_select(&["id"])
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier { kind: "column", .. }));
    }

    #[test]
    fn test_dotted_identifiers() {
        assert!(is_valid_identifier("main.users"));
        assert!(!is_valid_identifier("users."));
        assert!(!is_valid_identifier("1users"));
        assert!(matches!(
            SelectBuilder::new("users").build_select(&[]),
            Err(QueryError::NoColumns)
        ));
    }
}
