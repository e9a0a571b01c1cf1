use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// The engine name is used to tag logs and must be set.
    #[error("`name` cannot be empty")]
    EmptyEngineName,
    /// A resume position needs a log file name.
    #[error("Invalid start config: `file` cannot be empty")]
    EmptyLogFileName,
    /// The query used to read the current log position must be set.
    #[error("`position_query` cannot be empty")]
    EmptyPositionQuery,
}
