//! Error taxonomy shared by the core and the service layer.
//!
//! Codes are stable strings and part of the external contract. Cryptographic
//! failures surface as [`Error::DecryptionFailed`] or [`Error::KeyMismatch`]
//! and are never recovered locally - silent recovery would mask tampering.
//! [`Error::AuthenticationFailed`] and [`Error::InsufficientPermissions`]
//! carry no payload so that their message shape reveals nothing about why
//! an operation was refused.

use keyfold_crypto::CryptoError;
use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("insufficient permissions")]
    InsufficientPermissions,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("email verification required")]
    VerificationRequired,

    #[error("invite expired or already used")]
    InviteExpired,

    /// The accessor has no entry in the container's accessor table.
    #[error("no access entry for accessor {0}")]
    MissingAccess(String),

    /// The accessor's current public key does not match the fingerprint
    /// recorded when its wrapped key was created.
    #[error("public key fingerprint mismatch for accessor {0}")]
    KeyMismatch(String),

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("rate limited")]
    RateLimited,

    #[error("server error: {0}")]
    ServerError(String),
}

impl Error {
    /// Stable error code for the external contract.
    pub fn code(&self) -> &'static str {
        match self {
            Error::AuthenticationFailed => "AuthenticationFailed",
            Error::InsufficientPermissions => "InsufficientPermissions",
            Error::NotFound(_) => "NotFound",
            Error::AlreadyExists(_) => "AlreadyExists",
            Error::InvalidRequest(_) => "InvalidRequest",
            Error::VerificationRequired => "VerificationRequired",
            Error::InviteExpired => "InviteExpired",
            Error::MissingAccess(_) => "MissingAccess",
            Error::KeyMismatch(_) => "KeyMismatch",
            Error::DecryptionFailed => "DecryptionFailed",
            Error::RateLimited => "RateLimited",
            Error::ServerError(_) => "ServerError",
        }
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        match err {
            // Failed unwrap and failed AEAD open both mean the caller holds
            // the wrong key or the data was tampered with.
            CryptoError::Decryption(_) | CryptoError::Unwrap(_) => Error::DecryptionFailed,
            other => Error::ServerError(other.to_string()),
        }
    }
}
