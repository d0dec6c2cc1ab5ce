// ABOUTME: Initiating side of pairing: trade our public key for a remote node's SSH access.
// ABOUTME: Drives one control-channel session and stores the resulting SSH credentials.

use super::channel::{ControlChannel, ControlSession};
use super::{PairRequest, PairResponse};
use crate::config::PairingConfig;
use crate::credential::{
    to_attributes, Cipher, CredentialCreate, KeychainCredential, SshCredentialsAttributes,
};
use crate::error::{KeychainError, Result};
use crate::service::KeychainService;
use crate::types::SSH_CREDENTIALS;
use keychain_ssh::parse_keyscan_output;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::{Host, Url};

/// Parameters of a semi-automatic setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemiautomaticSetup {
    /// Name of the SSH credentials record to create.
    pub name: String,
    /// Base URL of the remote node, e.g. `https://nas-b.local`.
    pub url: String,
    pub token: String,
    #[serde(default = "default_username")]
    pub username: String,
    /// Id of a local `SSH_KEY_PAIR` credential that has a private key.
    pub private_key: i64,
    #[serde(default)]
    pub cipher: Cipher,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

fn default_username() -> String {
    "root".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl SemiautomaticSetup {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        token: impl Into<String>,
        private_key: i64,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            token: token.into(),
            username: default_username(),
            private_key,
            cipher: Cipher::default(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Control channel endpoint for a node URL: `http` becomes `ws` and the
/// channel path is appended.
pub fn channel_url(url: &str, channel_path: &str) -> Result<Url> {
    let rewritten = match url.strip_prefix("http") {
        Some(rest) => format!("ws{rest}"),
        None => url.to_string(),
    };
    let joined = if rewritten.ends_with('/') {
        format!("{rewritten}{channel_path}")
    } else {
        format!("{rewritten}/{channel_path}")
    };
    Url::parse(&joined).map_err(|e| KeychainError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Bare hostname of a node URL (IPv6 addresses without brackets).
pub fn url_hostname(url: &str) -> Result<String> {
    let invalid = |reason: String| KeychainError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.host() {
        Some(Host::Domain(domain)) => Ok(domain.to_string()),
        Some(Host::Ipv4(addr)) => Ok(addr.to_string()),
        Some(Host::Ipv6(addr)) => Ok(addr.to_string()),
        None => Err(invalid("no host".to_string())),
    }
}

pub struct PairingOrchestrator {
    service: Arc<KeychainService>,
    channel: Arc<dyn ControlChannel>,
    config: PairingConfig,
}

impl PairingOrchestrator {
    pub fn new(
        service: Arc<KeychainService>,
        channel: Arc<dyn ControlChannel>,
        config: PairingConfig,
    ) -> Self {
        Self {
            service,
            channel,
            config,
        }
    }

    /// Pair with the node at `setup.url` and store SSH credentials for it.
    ///
    /// The key pair is resolved before anything is contacted. The control
    /// session is closed whatever the outcome.
    pub async fn semiautomatic_setup(&self, setup: SemiautomaticSetup) -> Result<KeychainCredential> {
        let key = self
            .service
            .ssh_key_pair_with_private_key(setup.private_key)
            .await?;
        let public_key = key
            .str_attribute("public_key")
            .ok_or(KeychainError::NoUsableKey(key.id))?
            .to_string();

        let host = url_hostname(&setup.url)?;
        let endpoint = channel_url(&setup.url, &self.config.channel_path)?;

        info!(host = %host, key_id = key.id, "starting semi-automatic ssh setup");
        let mut session = self.channel.connect(&endpoint).await?;
        let outcome = self.exchange(&mut *session, &setup, public_key).await;
        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close control session");
        }
        debug!(host = %host, "control session closed");
        let response = outcome?;

        let remote_host_key = parse_keyscan_output(&response.ssh_hostkey)?;
        let attributes = to_attributes(&SshCredentialsAttributes {
            host,
            port: response.ssh_port,
            username: setup.username,
            private_key: key.id,
            remote_host_key,
            cipher: setup.cipher,
            connect_timeout: setup.connect_timeout,
        })?;

        let credential = self
            .service
            .create(CredentialCreate {
                name: setup.name,
                credential_type: SSH_CREDENTIALS.to_string(),
                attributes,
            })
            .await?;
        info!(id = credential.id, "stored ssh credentials from pairing");
        Ok(credential)
    }

    async fn exchange(
        &self,
        session: &mut dyn ControlSession,
        setup: &SemiautomaticSetup,
        public_key: String,
    ) -> Result<PairResponse> {
        if !session.authenticate(&setup.token).await? {
            warn!("remote rejected pairing token");
            return Err(KeychainError::InvalidToken);
        }

        let request = PairRequest {
            hostname: self.config.placeholder_hostname.clone(),
            public_key,
            user: setup.username.clone(),
        };
        let reply = session
            .invoke(&self.config.pair_operation, serde_json::to_value(&request)?)
            .await
            .map_err(|e| KeychainError::PairingFailed(e.to_string()))?;

        serde_json::from_value(reply)
            .map_err(|e| KeychainError::PairingFailed(format!("unexpected response: {e}")))
    }
}
