use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// A required string field is empty.
    #[error("`{0}` cannot be empty")]
    EmptyField(&'static str),
    /// The marker pattern is not a valid regular expression.
    #[error("Invalid marker pattern `{pattern}`: {reason}")]
    InvalidMarkerPattern { pattern: String, reason: String },
    /// A numeric field holds a value outside its accepted range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue {
        field: &'static str,
        constraint: &'static str,
    },
}
