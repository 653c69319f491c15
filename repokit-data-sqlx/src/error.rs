use repokit_data::DataError;

/// Extension trait for converting `sqlx::Error` into `DataError`.
///
/// Due to Rust's orphan rules, we can't implement `From<sqlx::Error> for DataError`
/// in this crate. Instead, use `.into_data_error()` or `map_err` with `SqlxResult`.
///
/// Every driver failure becomes [`DataError::DataSource`]; a missing row is
/// not special-cased because absence is reported as `None` by the read layer.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        tracing::debug!(error = %self, "SQLx call failed");
        DataError::data_source(self)
    }
}

/// Convenience alias for data-layer results using `DataError`.
pub type SqlxResult<T> = Result<T, DataError>;
