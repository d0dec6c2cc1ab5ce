// ABOUTME: Remote side of pairing: trusts the caller's public key for a local account.
// ABOUTME: Ensures SSH is running and returns the port and host keys the caller should pin.

use super::system::{Account, AccountDirectory, SshServiceConfig, SshServiceControl};
use super::{PairRequest, PairResponse};
use crate::config::PairingConfig;
use crate::error::{KeychainError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use keychain_ssh::compute_fingerprint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// A request to trust `public_key` for `username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshPairRequest {
    pub remote_hostname: String,
    #[serde(default = "default_username")]
    pub username: String,
    pub public_key: String,
}

fn default_username() -> String {
    "root".to_string()
}

impl From<PairRequest> for SshPairRequest {
    fn from(request: PairRequest) -> Self {
        Self {
            remote_hostname: request.hostname,
            username: request.user,
            public_key: request.public_key,
        }
    }
}

/// What the caller needs to connect back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshPairResult {
    pub port: u16,
    pub host_key: String,
}

pub struct RemotePairingHandler {
    accounts: Arc<dyn AccountDirectory>,
    ssh: Arc<dyn SshServiceControl>,
    config: PairingConfig,
    authorized_keys_lock: Mutex<()>,
}

impl RemotePairingHandler {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        ssh: Arc<dyn SshServiceControl>,
        config: PairingConfig,
    ) -> Self {
        Self {
            accounts,
            ssh,
            config,
            authorized_keys_lock: Mutex::new(()),
        }
    }

    /// Wire entry point for the pairing operation.
    pub async fn handle(&self, payload: Value) -> Result<Value> {
        let request: PairRequest = serde_json::from_value(payload)?;
        let result = self.ssh_pair(request.into()).await?;
        Ok(serde_json::to_value(PairResponse::from(result))?)
    }

    pub async fn ssh_pair(&self, request: SshPairRequest) -> Result<SshPairResult> {
        let public_key = request.public_key.trim();
        if public_key.is_empty() {
            return Err(KeychainError::InvalidPublicKey("public key is empty".into()));
        }
        if public_key.contains(|c| c == '\n' || c == '\r') {
            return Err(KeychainError::InvalidPublicKey(
                "expected a single public key line".into(),
            ));
        }

        let mut ssh_config = self.ssh.config().await?;

        let account = self
            .accounts
            .lookup(&request.username)
            .await?
            .ok_or_else(|| KeychainError::AccountNotFound(request.username.clone()))?;

        if account.home.to_string_lossy().starts_with("/nonexistent")
            || !tokio::fs::try_exists(&account.home).await.unwrap_or(false)
        {
            return Err(KeychainError::HomeDirectoryMissing(account.home));
        }

        if !self.ssh.is_enabled().await? {
            info!("enabling ssh service for pairing");
            self.ssh.enable_and_start().await?;
            ssh_config = self.wait_for_host_keys().await?;
        }

        let ssh_dir = ensure_ssh_dir(&account).await?;
        self.append_authorized_key(&account, &ssh_dir, public_key)
            .await?;

        let host_key = format_host_keys(&request.remote_hostname, &ssh_config)?;
        Ok(SshPairResult {
            port: ssh_config.port,
            host_key,
        })
    }

    async fn wait_for_host_keys(&self) -> Result<SshServiceConfig> {
        let attempts = self.config.host_key_poll_attempts.max(1);
        for attempt in 1..=attempts {
            let config = self.ssh.config().await?;
            if config.has_host_keys() {
                return Ok(config);
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.host_key_poll_interval()).await;
            }
        }
        Err(KeychainError::ServiceControl(format!(
            "host keys not available after {attempts} attempts"
        )))
    }

    async fn append_authorized_key(
        &self,
        account: &Account,
        ssh_dir: &Path,
        public_key: &str,
    ) -> Result<()> {
        let path = ssh_dir.join("authorized_keys");
        let fingerprint = compute_fingerprint(public_key).unwrap_or_else(|_| "unparsed".into());

        let _guard = self.authorized_keys_lock.lock().await;

        let (existing, created) = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => (contents, false),
            Err(e) if e.kind() == ErrorKind::NotFound => (String::new(), true),
            Err(e) => return Err(io_error(&path, e)),
        };

        if existing.contains(public_key) {
            info!(user = %account.username, fingerprint = %fingerprint, "key already authorized");
            return Ok(());
        }

        let mut line = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(public_key);
        line.push('\n');

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&path).await.map_err(|e| io_error(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| io_error(&path, e))?;
        file.flush().await.map_err(|e| io_error(&path, e))?;

        if created {
            set_owner(&path, account)?;
        }

        info!(user = %account.username, fingerprint = %fingerprint, "authorized key appended");
        Ok(())
    }
}

async fn ensure_ssh_dir(account: &Account) -> Result<PathBuf> {
    let dir = account.home.join(".ssh");
    if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        return Ok(dir);
    }

    match tokio::fs::create_dir(&dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(dir),
        Err(e) => return Err(io_error(&dir, e)),
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
            .await
            .map_err(|e| io_error(&dir, e))?;
    }
    set_owner(&dir, account)?;
    Ok(dir)
}

#[cfg(unix)]
fn set_owner(path: &Path, account: &Account) -> Result<()> {
    std::os::unix::fs::chown(path, Some(account.uid), Some(account.gid))
        .map_err(|e| io_error(path, e))
}

#[cfg(not(unix))]
fn set_owner(path: &Path, _account: &Account) -> Result<()> {
    warn!(path = %path.display(), "ownership not changed on this platform");
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> KeychainError {
    warn!(path = %path.display(), error = %source, "ssh file update failed");
    KeychainError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn decode_host_key(key: &'static str, encoded: Option<&str>) -> Result<String> {
    let encoded = encoded
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| KeychainError::ServiceControl(format!("{key} host key is not available")))?;
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| KeychainError::HostKeyDecode { key })?;
    let text = String::from_utf8(bytes).map_err(|_| KeychainError::HostKeyDecode { key })?;
    Ok(text.trim().to_string())
}

fn format_host_keys(hostname: &str, config: &SshServiceConfig) -> Result<String> {
    let keys = [
        decode_host_key("rsa", config.host_rsa_key_pub.as_deref())?,
        decode_host_key("ecdsa", config.host_ecdsa_key_pub.as_deref())?,
        decode_host_key("ed25519", config.host_ed25519_key_pub.as_deref())?,
    ];
    Ok(keys
        .iter()
        .map(|key| format!("{hostname} {key}\n"))
        .collect())
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    pub(crate) const RSA: &str = "ssh-rsa AAAAB3NzaC1yc2E";
    pub(crate) const ECDSA: &str = "ecdsa-sha2-nistp256 AAAAE2VjZHNh";
    pub(crate) const ED25519: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5";

    pub(crate) struct FakeAccounts {
        pub account: Account,
    }

    #[async_trait::async_trait]
    impl AccountDirectory for FakeAccounts {
        async fn lookup(&self, username: &str) -> Result<Option<Account>> {
            Ok((username == self.account.username).then(|| self.account.clone()))
        }
    }

    /// SSH service whose host keys only appear once it has been started.
    pub(crate) struct FakeSsh {
        pub enabled: AtomicBool,
        pub starts: AtomicUsize,
        pub keys_after_start: bool,
    }

    impl FakeSsh {
        pub(crate) fn new(enabled: bool) -> Self {
            Self {
                enabled: AtomicBool::new(enabled),
                starts: AtomicUsize::new(0),
                keys_after_start: true,
            }
        }
    }

    #[async_trait::async_trait]
    impl SshServiceControl for FakeSsh {
        async fn is_enabled(&self) -> Result<bool> {
            Ok(self.enabled.load(Ordering::SeqCst))
        }

        async fn enable_and_start(&self) -> Result<()> {
            self.enabled.store(true, Ordering::SeqCst);
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn config(&self) -> Result<SshServiceConfig> {
            let running = self.enabled.load(Ordering::SeqCst)
                && (self.keys_after_start || self.starts.load(Ordering::SeqCst) == 0);
            let key = |k: &str| running.then(|| STANDARD.encode(format!("{k}\n")));
            Ok(SshServiceConfig {
                port: 2222,
                host_rsa_key_pub: key(RSA),
                host_ecdsa_key_pub: key(ECDSA),
                host_ed25519_key_pub: key(ED25519),
            })
        }
    }

    pub(crate) fn local_account(home: &Path) -> Account {
        let meta = std::fs::metadata(home).expect("home should exist");
        Account {
            username: "replicator".to_string(),
            home: home.to_path_buf(),
            uid: meta.uid(),
            gid: meta.gid(),
        }
    }

    fn fast_config() -> PairingConfig {
        PairingConfig {
            host_key_poll_attempts: 3,
            host_key_poll_interval_ms: 1,
            ..PairingConfig::default()
        }
    }

    fn handler(home: &Path, ssh: Arc<FakeSsh>) -> RemotePairingHandler {
        RemotePairingHandler::new(
            Arc::new(FakeAccounts {
                account: local_account(home),
            }),
            ssh,
            fast_config(),
        )
    }

    fn request(public_key: &str) -> SshPairRequest {
        SshPairRequest {
            remote_hostname: "any-host".to_string(),
            username: "replicator".to_string(),
            public_key: public_key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_pair_returns_port_and_host_keys() {
        let home = TempDir::new().unwrap();
        let handler = handler(home.path(), Arc::new(FakeSsh::new(true)));

        let result = handler.ssh_pair(request("ssh-rsa AAAA caller")).await.unwrap();

        assert_eq!(result.port, 2222);
        assert_eq!(
            result.host_key,
            format!("any-host {RSA}\nany-host {ECDSA}\nany-host {ED25519}\n")
        );
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let home = TempDir::new().unwrap();
        let handler = handler(home.path(), Arc::new(FakeSsh::new(true)));

        handler.ssh_pair(request("ssh-rsa AAAA caller")).await.unwrap();
        handler.ssh_pair(request("ssh-rsa AAAA caller")).await.unwrap();

        let contents =
            std::fs::read_to_string(home.path().join(".ssh/authorized_keys")).unwrap();
        assert_eq!(contents.matches("ssh-rsa AAAA caller").count(), 1);
    }

    #[tokio::test]
    async fn test_appends_on_new_line_after_existing_keys() {
        let home = TempDir::new().unwrap();
        std::fs::create_dir(home.path().join(".ssh")).unwrap();
        std::fs::write(home.path().join(".ssh/authorized_keys"), "ssh-ed25519 OLD admin").unwrap();
        let handler = handler(home.path(), Arc::new(FakeSsh::new(true)));

        handler.ssh_pair(request("ssh-rsa NEW caller")).await.unwrap();

        let contents =
            std::fs::read_to_string(home.path().join(".ssh/authorized_keys")).unwrap();
        assert_eq!(contents, "ssh-ed25519 OLD admin\nssh-rsa NEW caller\n");
    }

    #[tokio::test]
    async fn test_creates_private_ssh_dir() {
        use std::os::unix::fs::PermissionsExt;

        let home = TempDir::new().unwrap();
        let handler = handler(home.path(), Arc::new(FakeSsh::new(true)));

        handler.ssh_pair(request("ssh-rsa AAAA caller")).await.unwrap();

        let dir = std::fs::metadata(home.path().join(".ssh")).unwrap();
        assert_eq!(dir.permissions().mode() & 0o777, 0o700);
        let file = std::fs::metadata(home.path().join(".ssh/authorized_keys")).unwrap();
        assert_eq!(file.permissions().mode() & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_concurrent_pairs_append_once() {
        let home = TempDir::new().unwrap();
        let handler = Arc::new(handler(home.path(), Arc::new(FakeSsh::new(true))));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.ssh_pair(request("ssh-rsa SAME caller")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let contents =
            std::fs::read_to_string(home.path().join(".ssh/authorized_keys")).unwrap();
        assert_eq!(contents.matches("ssh-rsa SAME caller").count(), 1);
    }

    #[tokio::test]
    async fn test_blank_public_key_is_rejected() {
        let home = TempDir::new().unwrap();
        let handler = handler(home.path(), Arc::new(FakeSsh::new(true)));

        for key in ["", "   ", "\n\t"] {
            let err = handler.ssh_pair(request(key)).await.unwrap_err();
            assert!(matches!(err, KeychainError::InvalidPublicKey(_)), "{key:?}");
        }
        assert!(!home.path().join(".ssh").exists(), "nothing is written");
    }

    #[tokio::test]
    async fn test_multi_line_public_key_is_rejected() {
        let home = TempDir::new().unwrap();
        let handler = handler(home.path(), Arc::new(FakeSsh::new(true)));

        let err = handler
            .ssh_pair(request("ssh-rsa AAAA one\nssh-rsa BBBB two"))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "invalid public key: expected a single public key line"
        );
        assert!(!home.path().join(".ssh/authorized_keys").exists());
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let home = TempDir::new().unwrap();
        let handler = handler(home.path(), Arc::new(FakeSsh::new(true)));

        let mut req = request("ssh-rsa AAAA");
        req.username = "nobody-here".to_string();
        let err = handler.ssh_pair(req).await.unwrap_err();
        assert_eq!(err.to_string(), "user nobody-here does not exist");
    }

    #[tokio::test]
    async fn test_nologin_home_is_rejected() {
        let mut account = local_account(&std::env::temp_dir());
        account.home = PathBuf::from("/nonexistent");
        let handler = RemotePairingHandler::new(
            Arc::new(FakeAccounts { account }),
            Arc::new(FakeSsh::new(true)),
            fast_config(),
        );

        let err = handler.ssh_pair(request("ssh-rsa AAAA")).await.unwrap_err();
        assert!(matches!(err, KeychainError::HomeDirectoryMissing(p) if p == Path::new("/nonexistent")));
    }

    #[tokio::test]
    async fn test_missing_home_is_rejected() {
        let home = TempDir::new().unwrap();
        let mut account = local_account(home.path());
        account.home = home.path().join("gone");
        let handler = RemotePairingHandler::new(
            Arc::new(FakeAccounts { account }),
            Arc::new(FakeSsh::new(true)),
            fast_config(),
        );

        let err = handler.ssh_pair(request("ssh-rsa AAAA")).await.unwrap_err();
        assert!(matches!(err, KeychainError::HomeDirectoryMissing(_)));
    }

    #[tokio::test]
    async fn test_disabled_service_is_enabled_and_reread() {
        let home = TempDir::new().unwrap();
        let ssh = Arc::new(FakeSsh::new(false));
        let handler = handler(home.path(), Arc::clone(&ssh));

        let result = handler.ssh_pair(request("ssh-rsa AAAA")).await.unwrap();

        assert_eq!(ssh.starts.load(Ordering::SeqCst), 1);
        assert!(result.host_key.contains(ED25519), "keys read after start");
    }

    #[tokio::test]
    async fn test_host_keys_never_appearing_is_service_error() {
        let home = TempDir::new().unwrap();
        let ssh = Arc::new(FakeSsh {
            keys_after_start: false,
            ..FakeSsh::new(false)
        });
        let handler = handler(home.path(), ssh);

        let err = handler.ssh_pair(request("ssh-rsa AAAA")).await.unwrap_err();
        assert!(matches!(err, KeychainError::ServiceControl(_)));
    }

    #[tokio::test]
    async fn test_handle_speaks_wire_format() {
        let home = TempDir::new().unwrap();
        let handler = handler(home.path(), Arc::new(FakeSsh::new(true)));

        let reply = handler
            .handle(serde_json::json!({
                "hostname": "any-host",
                "public-key": "ssh-rsa AAAA caller",
                "user": "replicator",
            }))
            .await
            .unwrap();

        let response: PairResponse = serde_json::from_value(reply).unwrap();
        assert_eq!(response.ssh_port, 2222);
        assert_eq!(response.ssh_hostkey.lines().count(), 3);
    }

    #[test]
    fn test_undecodable_host_key() {
        let config = SshServiceConfig {
            port: 22,
            host_rsa_key_pub: Some("!!not base64!!".to_string()),
            host_ecdsa_key_pub: Some(STANDARD.encode(ECDSA)),
            host_ed25519_key_pub: Some(STANDARD.encode(ED25519)),
        };
        assert!(matches!(
            format_host_keys("h", &config),
            Err(KeychainError::HostKeyDecode { key: "rsa" })
        ));
    }
}
