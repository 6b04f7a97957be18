use thiserror::Error;

/// Failures raised by a persistence gateway.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Store is unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by mutating repository operations.
#[derive(Error, Debug)]
pub enum MarkerError {
    /// The write (or the reload that follows it) could not reach the store.
    /// In-memory lists are left as they were before the call.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(#[from] StoreError),
}

pub type MarkerResult<T> = std::result::Result<T, MarkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts_to_persistence_unavailable() {
        let err: MarkerError = StoreError::Unavailable("disk offline".to_string()).into();
        assert!(matches!(err, MarkerError::PersistenceUnavailable(_)));
        assert_eq!(
            err.to_string(),
            "Persistence unavailable: Store is unavailable: disk offline"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
