//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// "Not found" is deliberately absent: lookups that find nothing return
/// `None` or an empty collection, so every variant here is a real failure.
#[derive(Error, Debug)]
pub enum Error {
    /// Timeout, refused connection, dropped socket. The only retryable kind.
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    #[error("Read-only backend: {0} does not accept writes")]
    ReadOnly(String),

    #[error("No local store available for {0}")]
    NoLocalStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a transient I/O error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientIo(msg.into())
    }

    /// Create a read-only violation for the named backend
    pub fn read_only(backend: impl Into<String>) -> Self {
        Self::ReadOnly(backend.into())
    }

    /// Create a missing-local-store error for the named operation
    pub fn no_local_store(operation: impl Into<String>) -> Self {
        Self::NoLocalStore(operation.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a malformed record error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIo(_))
    }
}

impl From<duckdb::Error> for Error {
    fn from(error: duckdb::Error) -> Self {
        Self::Database(error.to_string())
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(error: tokio_postgres::Error) -> Self {
        if error.is_closed() || has_io_source(&error) {
            return Self::TransientIo(format!("distributed store connection lost: {}", error));
        }
        // SQLSTATE class 08 is "connection exception", 57P0x are server shutdowns
        match error.code().map(|state| state.code()) {
            Some(code) if code.starts_with("08") || code.starts_with("57P0") => {
                Self::TransientIo(error.to_string())
            }
            _ => Self::Database(error.to_string()),
        }
    }
}

fn has_io_source(error: &tokio_postgres::Error) -> bool {
    std::error::Error::source(error)
        .map(|source| source.downcast_ref::<std::io::Error>().is_some())
        .unwrap_or(false)
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(Error::transient("timed out").is_transient());
        assert!(!Error::read_only("remote").is_transient());
        assert!(!Error::config("missing url").is_transient());
        assert!(!Error::malformed("bad row").is_transient());
        assert!(!Error::http("HTTP 500").is_transient());
    }

    #[test]
    fn test_no_local_store_message() {
        let err = Error::no_local_store("save_champion_scores");
        assert_eq!(
            err.to_string(),
            "No local store available for save_champion_scores"
        );
        assert!(err.to_string().to_lowercase().contains("no local store available"));
    }

    #[test]
    fn test_read_only_message_names_backend() {
        let err = Error::read_only("distributed store");
        assert!(err.to_string().contains("distributed store"));
        assert!(matches!(err, Error::ReadOnly(_)));
    }

    #[test]
    fn test_json_errors_convert() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
