// ABOUTME: Interfaces to the host's account database and SSH service management.
// ABOUTME: The remote pairing handler reaches the operating system only through these.

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// A local login account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub home: PathBuf,
    pub uid: u32,
    pub gid: u32,
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Look up an account by name; `None` if it does not exist.
    async fn lookup(&self, username: &str) -> Result<Option<Account>>;
}

/// SSH daemon settings relevant to pairing.
///
/// Host public keys are stored base64-encoded and may be absent until the
/// service has run at least once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshServiceConfig {
    pub port: u16,
    pub host_rsa_key_pub: Option<String>,
    pub host_ecdsa_key_pub: Option<String>,
    pub host_ed25519_key_pub: Option<String>,
}

impl SshServiceConfig {
    /// Whether all three host public keys are present.
    pub fn has_host_keys(&self) -> bool {
        [
            &self.host_rsa_key_pub,
            &self.host_ecdsa_key_pub,
            &self.host_ed25519_key_pub,
        ]
        .iter()
        .all(|key| key.as_deref().is_some_and(|k| !k.trim().is_empty()))
    }
}

#[async_trait]
pub trait SshServiceControl: Send + Sync {
    async fn is_enabled(&self) -> Result<bool>;

    /// Mark the service enabled and (re)start it.
    async fn enable_and_start(&self) -> Result<()>;

    async fn config(&self) -> Result<SshServiceConfig>;
}
