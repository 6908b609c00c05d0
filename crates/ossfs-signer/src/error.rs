//! Error types for the ossfs-signer crate

use thiserror::Error;

/// Result type alias using `SigningError`
pub type Result<T> = std::result::Result<T, SigningError>;

/// Errors that can occur while signing
///
/// None of these are expected in normal operation; they indicate malformed
/// caller input.
#[derive(Error, Debug)]
pub enum SigningError {
    /// A POST policy condition could not be encoded as JSON
    #[error("failed to encode policy as JSON: {0}")]
    PolicyEncoding(#[from] serde_json::Error),

    /// Expiry timestamp outside the representable calendar range
    #[error("invalid expiry timestamp: {0}")]
    InvalidExpiry(i64),

    /// The secret was rejected as an HMAC key
    #[error("invalid signing key")]
    InvalidKey,
}
