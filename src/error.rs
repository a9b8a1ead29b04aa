//! use certmint::error::CertMintError;

use thiserror::Error;

/// Represents errors that can occur while issuing certificates.
///
/// Every variant carries the message of the underlying cause. None of them
/// are logged or retried inside the library; they are returned to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertMintError {
    /// The issuance request is logically invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Certificate or key material is missing, malformed or of the wrong type.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// The random source or the key generator failed.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// The signer rejected the certificate contents or key combination.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// A certificate signature or issuer name did not check out.
    #[error("Verification failed: {0}")]
    VerificationError(String),
}

pub type Result<T> = std::result::Result<T, CertMintError>;

impl From<der::Error> for CertMintError {
    /// Converts a `der::Error` into a `CertMintError`.
    fn from(err: der::Error) -> Self {
        CertMintError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CertMintError {
    fn from(err: rsa::Error) -> Self {
        CertMintError::KeyGenerationError(err.to_string())
    }
}

impl From<pem::PemError> for CertMintError {
    fn from(err: pem::PemError) -> Self {
        CertMintError::DecodingError(err.to_string())
    }
}

impl From<toml::de::Error> for CertMintError {
    fn from(err: toml::de::Error) -> Self {
        CertMintError::InvalidConfig(err.to_string())
    }
}
