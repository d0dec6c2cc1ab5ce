// ABOUTME: Derives public keys from private keys and sanity-checks public keys.
// ABOUTME: Wraps `ssh-keygen -y` and `ssh-keygen -l` over owner-only scratch files.

use crate::error::{Result, SshError};
use crate::tool::{run_tool, write_scratch, SshTools};
use async_trait::async_trait;
use ssh_key::PublicKey;
use std::ffi::OsStr;

/// Key inspection primitives used by credential validation.
#[async_trait]
pub trait KeyIntrospect: Send + Sync {
    /// Derive the `"<algorithm> <base64>"` public key for a private key.
    ///
    /// # Errors
    /// Returns the tool's diagnostic text when the private key is unusable.
    async fn derive_public(&self, private_key: &str) -> Result<String>;

    /// Check that a public key line is well-formed.
    ///
    /// # Errors
    /// Returns `SshError::InvalidPublicKey` when the key is rejected.
    async fn check_public(&self, public_key: &str) -> Result<()>;
}

/// `ssh-keygen` backed introspection.
#[derive(Debug, Clone, Default)]
pub struct KeyIntrospector {
    tools: SshTools,
}

impl KeyIntrospector {
    pub fn new(tools: SshTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl KeyIntrospect for KeyIntrospector {
    async fn derive_public(&self, private_key: &str) -> Result<String> {
        let scratch = write_scratch(&self.tools.scratch_dir(), private_key)?;

        // Empty passphrase keeps ssh-keygen from prompting on a tty for encrypted keys.
        let output = run_tool(
            &self.tools.ssh_keygen,
            [
                OsStr::new("-y"),
                OsStr::new("-P"),
                OsStr::new(""),
                OsStr::new("-f"),
                scratch.path().as_os_str(),
            ],
        )
        .await?;

        Ok(output.into_stdout()?.trim().to_string())
    }

    async fn check_public(&self, public_key: &str) -> Result<()> {
        parse_public_key_line(public_key)?;

        let scratch = write_scratch(&self.tools.scratch_dir(), public_key)?;

        let output = run_tool(
            &self.tools.ssh_keygen,
            [OsStr::new("-l"), OsStr::new("-f"), scratch.path().as_os_str()],
        )
        .await?;

        if output.success {
            Ok(())
        } else {
            Err(SshError::InvalidPublicKey(output.diagnostic()))
        }
    }
}

/// Parse exactly one OpenSSH public key line.
///
/// `ssh-keygen -l` also fingerprints private key files and files holding
/// several keys, so both are rejected here first.
///
/// # Errors
/// Returns `SshError::InvalidPublicKey` for blank, multi-line, or unparsable input.
pub fn parse_public_key_line(public_key: &str) -> Result<PublicKey> {
    let line = public_key.trim();
    if line.is_empty() {
        return Err(SshError::InvalidPublicKey("public key is empty".to_string()));
    }
    if line.contains(|c| c == '\n' || c == '\r') {
        return Err(SshError::InvalidPublicKey(
            "expected a single public key line".to_string(),
        ));
    }
    PublicKey::from_openssh(line).map_err(|e| SshError::InvalidPublicKey(e.to_string()))
}

/// The algorithm and key-material tokens of a public key line, comment dropped.
pub fn key_tokens(public_key: &str) -> String {
    public_key
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}
