// ABOUTME: Operational error type for keychain-core using thiserror.
// ABOUTME: Validation failures are wrapped whole; everything else carries a specific diagnostic.

use crate::validation::ValidationErrors;
use keychain_ssh::SshError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by credential, pairing, and storage operations.
#[derive(Error, Debug)]
pub enum KeychainError {
    /// One or more fields failed validation. Nothing was persisted.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// No credential with this id.
    #[error("credential {0} does not exist")]
    NotFound(i64),

    /// Another credential already uses this name.
    #[error("a credential named '{0}' already exists")]
    NameTaken(String),

    /// The referenced credential is missing, not an SSH key pair, or has no private key.
    #[error("credential {0} is not an SSH key pair with a private key")]
    NoUsableKey(i64),

    /// The pairing URL could not be parsed or has no host.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The remote node rejected the authentication token.
    #[error("invalid token")]
    InvalidToken,

    /// The remote pairing call failed.
    #[error("semi-automatic SSH connection setup failed: {0}")]
    PairingFailed(String),

    /// The control channel could not be opened or used.
    #[error("control channel error: {0}")]
    Channel(String),

    /// The public key offered for pairing is blank or spans several lines.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Pairing target account is unknown.
    #[error("user {0} does not exist")]
    AccountNotFound(String),

    /// Pairing target account has no usable home directory.
    #[error("home directory {} does not exist", .0.display())]
    HomeDirectoryMissing(PathBuf),

    /// The SSH service could not be queried, enabled, or started.
    #[error("ssh service: {0}")]
    ServiceControl(String),

    /// A stored host public key is not valid base64 text.
    #[error("stored {key} host key could not be decoded")]
    HostKeyDecode { key: &'static str },

    /// Filesystem failure while preparing SSH files for an account.
    #[error("failed to update {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be read, parsed, or written.
    #[error("configuration error: {0}")]
    Config(String),

    /// An external SSH tool failed.
    #[error(transparent)]
    Ssh(#[from] SshError),

    /// The credential store failed.
    #[error("credential store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Attributes could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using KeychainError.
pub type Result<T> = std::result::Result<T, KeychainError>;
