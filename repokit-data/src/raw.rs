//! Raw parameterized queries, bypassing spec composition.

use crate::entity::Entity;
use crate::error::DataError;
use crate::executor::QueryExecutor;
use crate::source::DataSource;
use crate::value::Value;

/// Runs raw query text against the data source after checking that the
/// positional parameters line up with the placeholders in the text.
///
/// Parameters are always handed to the source separately from the text;
/// nothing is ever interpolated.
pub struct RawQueryAdapter<'e, 'a, T, S> {
    executor: &'e QueryExecutor<'a, T, S>,
}

impl<'e, 'a, T: Entity, S: DataSource<T>> RawQueryAdapter<'e, 'a, T, S> {
    pub fn new(executor: &'e QueryExecutor<'a, T, S>) -> Self {
        Self { executor }
    }

    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<T>, DataError> {
        let expected = placeholder_count(sql)?;
        if expected != params.len() {
            return Err(DataError::invalid_argument(format!(
                "query expects {expected} parameter(s), got {}",
                params.len()
            )));
        }
        tracing::debug!(entity = T::table_name(), params = params.len(), "Executing raw query");
        self.executor.execute_raw(sql, params).await
    }
}

/// Number of positional parameters `sql` binds.
///
/// Understands anonymous `?` placeholders and numbered `?N` / `$N`
/// placeholders (the highest number wins). Placeholders inside quoted
/// literals, quoted identifiers and comments are ignored. Mixing anonymous
/// and numbered styles is rejected.
pub fn placeholder_count(sql: &str) -> Result<usize, DataError> {
    if sql.trim().is_empty() {
        return Err(DataError::invalid_argument("query text is empty"));
    }
    let bytes = sql.as_bytes();
    let mut anonymous = 0usize;
    let mut highest = 0usize;
    let mut numbered = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_past(bytes, i + 1, &[quote]);
                continue;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = skip_past(bytes, i + 2, b"\n");
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_past(bytes, i + 2, b"*/");
                continue;
            }
            b'?' | b'$' => {
                let marker = bytes[i];
                let digits_start = i + 1;
                let mut end = digits_start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                if end > digits_start {
                    let n: usize = sql[digits_start..end].parse().map_err(|_| {
                        DataError::invalid_argument("placeholder number is out of range")
                    })?;
                    if n == 0 {
                        return Err(DataError::invalid_argument(
                            "placeholder numbers start at 1",
                        ));
                    }
                    numbered = true;
                    highest = highest.max(n);
                } else if marker == b'?' {
                    anonymous += 1;
                }
                i = end;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    match (anonymous, numbered) {
        (0, true) => Ok(highest),
        (n, false) => Ok(n),
        _ => Err(DataError::invalid_argument(
            "query mixes anonymous and numbered placeholders",
        )),
    }
}

/// Index just past the next occurrence of `terminator` at or after `from`,
/// or the end of input.
fn skip_past(bytes: &[u8], from: usize, terminator: &[u8]) -> usize {
    bytes[from.min(bytes.len())..]
        .windows(terminator.len())
        .position(|w| w == terminator)
        .map_or(bytes.len(), |pos| from + pos + terminator.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_placeholders() {
        assert_eq!(placeholder_count("SELECT * FROM users").unwrap(), 0);
        assert_eq!(
            placeholder_count("SELECT * FROM users WHERE age > ? AND name = ?").unwrap(),
            2
        );
    }

    #[test]
    fn test_numbered_placeholders() {
        assert_eq!(
            placeholder_count("SELECT * FROM users WHERE a = $1 OR b = $1 OR c = $2").unwrap(),
            2
        );
        assert_eq!(placeholder_count("SELECT ?3, ?1").unwrap(), 3);
    }

    #[test]
    fn test_ignores_literals_and_comments() {
        let sql = "SELECT '?', \"a?b\" FROM t -- where x = ?\nWHERE y = ? /* and z = ? */";
        assert_eq!(placeholder_count(sql).unwrap(), 1);
        assert_eq!(placeholder_count("SELECT 'it''s ?' WHERE a = ?").unwrap(), 1);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            placeholder_count("   "),
            Err(DataError::InvalidArgument(_))
        ));
        assert!(matches!(
            placeholder_count("SELECT ? , $1"),
            Err(DataError::InvalidArgument(_))
        ));
        assert!(matches!(
            placeholder_count("SELECT $0"),
            Err(DataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unterminated_literal_is_consumed() {
        assert_eq!(placeholder_count("SELECT 'abc ?").unwrap(), 0);
    }
}
