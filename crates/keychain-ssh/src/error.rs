// ABOUTME: Error types for SSH tool operations using thiserror.
// ABOUTME: Tool failures carry the tool's own stderr so callers can surface it verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running OpenSSH tooling against key material.
#[derive(Error, Debug)]
pub enum SshError {
    /// The tool binary could not be started at all.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited non-zero. `stderr` is the tool's diagnostic text.
    #[error("{tool} failed: {stderr}")]
    ToolFailed { tool: String, stderr: String },

    /// A public key is malformed or was rejected by `ssh-keygen -l`.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A host key scan produced no usable key lines.
    #[error("no host keys found in scan output")]
    NoHostKeys,

    /// Failed to create or write a scratch file for key material.
    #[error("failed to prepare scratch file in {path}: {source}")]
    TempFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a key file produced by a tool.
    #[error("failed to read SSH key from {path}: {source}")]
    ReadKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse an OpenSSH public key line.
    #[error("failed to parse SSH key: {0}")]
    ParseKey(#[source] ssh_key::Error),

    /// Failed to encode a key.
    #[error("failed to serialize key: {0}")]
    SerializeKey(#[source] ssh_key::Error),
}

/// Result type alias using SshError.
pub type Result<T> = std::result::Result<T, SshError>;
