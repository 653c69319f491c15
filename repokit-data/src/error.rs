/// Errors that can occur in the data layer.
///
/// Absence (`find`, `single`) is never an error; those operations return `Option`.
#[derive(Debug)]
pub enum DataError {
    /// A page index/size, key arity, or raw-query parameter list was rejected
    /// before any data source call was issued.
    InvalidArgument(String),
    /// `sum`, `average`, `min` or `max` was requested without a projection.
    MissingSelector(&'static str),
    /// `average`, `min` or `max` was evaluated over zero matching records.
    EmptySequence(&'static str),
    /// The operation's cancellation token fired before it completed.
    Cancelled,
    /// Any failure surfaced by the data source, wrapped but not reinterpreted.
    DataSource(Box<dyn std::error::Error + Send + Sync>),
}

impl DataError {
    /// Construct a `DataSource` variant from any error type.
    ///
    /// Used by backend crates (e.g. `repokit-data-sqlx`) to wrap
    /// driver-specific errors.
    pub fn data_source(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::DataSource(Box::new(err))
    }

    /// Construct a `DataSource` variant from a plain message.
    pub fn data_source_msg(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        DataError::DataSource(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        DataError::InvalidArgument(msg.into())
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            DataError::MissingSelector(op) => write!(f, "{op} requires a projection selector"),
            DataError::EmptySequence(op) => write!(f, "{op} over an empty sequence"),
            DataError::Cancelled => write!(f, "Operation cancelled"),
            DataError::DataSource(err) => write!(f, "Data source error: {err}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::DataSource(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Convenience alias for data-layer results.
pub type DataResult<T> = Result<T, DataError>;
