//! Error types for the reconciliation engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while deriving and maintaining proxy configuration
#[derive(Debug, Error)]
pub enum Error {
    /// Container has no network alias to proxy to
    #[error("container {container} has no network alias to use as upstream")]
    MissingAlias { container: String },

    /// Container disappeared before it could be inspected
    #[error("container {0} not found")]
    NotFound(String),

    /// Container runtime rejected or failed a request
    #[error("container runtime error: {0}")]
    Runtime(String),

    /// Proxy container could not be signaled
    #[error("failed to send {signal} to proxy container {container}: {reason}")]
    Signal {
        container: String,
        signal: String,
        reason: String,
    },

    /// Lifecycle event stream failed or ended
    #[error("event stream failed: {0}")]
    EventStream(String),

    /// Filesystem error in the managed config directory
    #[error("config store error at {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Store {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the container no longer exists
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::MissingAlias {
            container: "abc123".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "container abc123 has no network alias to use as upstream"
        );

        let err = Error::store(
            "/tmp/conf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "config store error at /tmp/conf: denied");
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("abc".to_string()).is_not_found());
        assert!(!Error::Runtime("boom".to_string()).is_not_found());
    }
}
