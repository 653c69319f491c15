use crate::value::KeyValues;
use std::fmt::Debug;

/// Trait representing a stored entity with a table name, key columns, and column list.
///
/// The key doubles as the deterministic fallback order used when a page is
/// requested without an explicit ordering rule, so it must be totally ordered.
///
/// # Example
///
/// ```ignore
/// impl Entity for User {
///     type Key = i64;
///     fn table_name() -> &'static str { "users" }
///     fn key_columns() -> &'static [&'static str] { &["id"] }
///     fn columns() -> &'static [&'static str] { &["id", "name", "age"] }
///     fn key(&self) -> i64 { self.id }
/// }
/// ```
pub trait Entity: Send + Sync + Unpin + 'static {
    type Key: KeyValues + Ord + Clone + Debug + Send + Sync + 'static;

    fn table_name() -> &'static str;
    fn key_columns() -> &'static [&'static str];
    fn columns() -> &'static [&'static str];
    fn key(&self) -> Self::Key;
}
