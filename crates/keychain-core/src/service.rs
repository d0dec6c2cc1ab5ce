// ABOUTME: Keychain credential service: validated CRUD plus key generation and host key scans.
// ABOUTME: Every write goes through the type registry before reaching the store.

use crate::credential::{CredentialCreate, CredentialUpdate, KeychainCredential};
use crate::error::{KeychainError, Result};
use crate::registry::CredentialTypeRegistry;
use crate::schema::Attributes;
use crate::store::CredentialStore;
use crate::types::SSH_KEY_PAIR;
use crate::validation::ValidationErrors;
use keychain_ssh::{
    compute_fingerprint, GeneratedKeyPair, HostKeyScanner, KeyGenerator, KeyIntrospector, SshTools,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const CREATE_SCHEMA: &str = "keychain_credential_create";
const UPDATE_SCHEMA: &str = "keychain_credential_update";

/// Parameters for scanning a remote host's SSH keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostKeyScanRequest {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

impl HostKeyScanRequest {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Credential operations backed by a store and the OpenSSH tools.
pub struct KeychainService {
    registry: Arc<CredentialTypeRegistry>,
    store: Arc<dyn CredentialStore>,
    generator: KeyGenerator,
    scanner: HostKeyScanner,
}

impl KeychainService {
    /// Service whose key checks run through `ssh-keygen`.
    pub fn new(tools: SshTools, store: Arc<dyn CredentialStore>) -> Self {
        let registry = CredentialTypeRegistry::new(Arc::new(KeyIntrospector::new(tools.clone())));
        Self::with_registry(Arc::new(registry), store, tools)
    }

    pub fn with_registry(
        registry: Arc<CredentialTypeRegistry>,
        store: Arc<dyn CredentialStore>,
        tools: SshTools,
    ) -> Self {
        Self {
            registry,
            store,
            generator: KeyGenerator::new(tools.clone()),
            scanner: HostKeyScanner::new(tools),
        }
    }

    pub fn registry(&self) -> &CredentialTypeRegistry {
        &self.registry
    }

    /// Validate and store a new credential.
    pub async fn create(&self, mut data: CredentialCreate) -> Result<KeychainCredential> {
        self.validate(
            CREATE_SCHEMA,
            &data.name,
            &data.credential_type,
            &mut data.attributes,
            None,
        )
        .await?;

        let id = self.store.insert(&data).await?;
        info!(id, credential_type = %data.credential_type, "created credential");
        self.log_fingerprint(id, &data.credential_type, &data.attributes);

        Ok(KeychainCredential {
            id,
            name: data.name,
            credential_type: data.credential_type,
            attributes: data.attributes,
        })
    }

    /// Overlay `patch` on the stored record, revalidate, and persist.
    pub async fn update(&self, id: i64, patch: CredentialUpdate) -> Result<KeychainCredential> {
        let mut record = self.get(id).await?;

        if let Some(name) = patch.name {
            record.name = name;
        }
        if let Some(credential_type) = patch.credential_type {
            record.credential_type = credential_type;
        }
        if let Some(attributes) = patch.attributes {
            record.attributes = attributes;
        }

        self.validate(
            UPDATE_SCHEMA,
            &record.name,
            &record.credential_type,
            &mut record.attributes,
            Some(id),
        )
        .await?;

        self.store.update(&record).await?;
        info!(id, credential_type = %record.credential_type, "updated credential");
        self.log_fingerprint(id, &record.credential_type, &record.attributes);

        Ok(record)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(KeychainError::NotFound(id));
        }
        info!(id, "deleted credential");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<KeychainCredential> {
        self.store.get(id).await?.ok_or(KeychainError::NotFound(id))
    }

    /// All credentials ordered by id.
    pub async fn query(&self) -> Result<Vec<KeychainCredential>> {
        self.store.list().await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<KeychainCredential>> {
        self.store.find_by_name(name).await
    }

    /// Generate a fresh RSA key pair without storing it.
    pub async fn generate_ssh_key_pair(&self) -> Result<GeneratedKeyPair> {
        Ok(self.generator.generate().await?)
    }

    /// Scan a remote host and return its last reported key line.
    pub async fn remote_ssh_host_key_scan(&self, request: HostKeyScanRequest) -> Result<String> {
        Ok(self
            .scanner
            .scan(&request.host, request.port, request.connect_timeout)
            .await?)
    }

    /// The key pair with this id, provided it holds private key material.
    pub async fn ssh_key_pair_with_private_key(&self, id: i64) -> Result<KeychainCredential> {
        match self.store.get(id).await? {
            Some(credential)
                if credential.credential_type == SSH_KEY_PAIR
                    && credential.str_attribute("private_key").is_some() =>
            {
                Ok(credential)
            }
            _ => Err(KeychainError::NoUsableKey(id)),
        }
    }

    async fn validate(
        &self,
        schema_name: &str,
        name: &str,
        credential_type: &str,
        attributes: &mut Attributes,
        id: Option<i64>,
    ) -> Result<()> {
        let mut errors = ValidationErrors::new();

        if let Some(existing) = self.store.find_by_name(name).await? {
            if Some(existing.id) != id {
                errors.add(
                    format!("{schema_name}.name"),
                    "A credential with this name already exists",
                );
            }
        }

        errors.extend(
            self.registry
                .validate(credential_type, attributes, schema_name)
                .await,
        );

        if !errors.is_empty() {
            debug!(schema = schema_name, errors = errors.len(), "credential rejected");
        }
        Ok(errors.into_result()?)
    }

    fn log_fingerprint(&self, id: i64, credential_type: &str, attributes: &Attributes) {
        if credential_type != SSH_KEY_PAIR {
            return;
        }
        let Some(public_key) = attributes.get("public_key").and_then(|v| v.as_str()) else {
            return;
        };
        if let Ok(fingerprint) = compute_fingerprint(public_key) {
            debug!(id, fingerprint = %fingerprint, "stored key pair");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::tests::{test_key_pair, NativeIntrospector};
    use crate::types::SSH_CREDENTIALS;
    use keychain_ssh::{key_tokens, SshError};
    use serde_json::{json, Value};
    use std::path::PathBuf;

    fn service() -> KeychainService {
        let registry = CredentialTypeRegistry::new(Arc::new(NativeIntrospector));
        KeychainService::with_registry(
            Arc::new(registry),
            Arc::new(MemoryStore::new()),
            SshTools::default(),
        )
    }

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn key_pair(name: &str, private: Option<&str>, public: Option<&str>) -> CredentialCreate {
        CredentialCreate {
            name: name.to_string(),
            credential_type: SSH_KEY_PAIR.to_string(),
            attributes: attrs(json!({"private_key": private, "public_key": public})),
        }
    }

    fn validation(err: KeychainError) -> ValidationErrors {
        match err {
            KeychainError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_create_with_private_key_fills_public_key() {
        let service = service();
        let (private, public) = test_key_pair();

        let created = service
            .create(key_pair("replication", Some(&private), None))
            .await
            .unwrap();

        let stored = service.get(created.id).await.unwrap();
        assert_eq!(
            key_tokens(stored.str_attribute("public_key").unwrap()),
            key_tokens(&public)
        );
    }

    #[tokio::test]
    async fn test_create_unknown_type_persists_nothing() {
        let service = service();
        let data = CredentialCreate {
            name: "mystery".to_string(),
            credential_type: "PGP_KEY".to_string(),
            attributes: Attributes::new(),
        };

        let errors = validation(service.create(data).await.unwrap_err());

        assert_eq!(
            errors.messages_for("keychain_credential_create.type"),
            vec!["Invalid type"]
        );
        assert!(service.query().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_name_accumulates_with_type_error() {
        let service = service();
        let (_, public) = test_key_pair();
        service
            .create(key_pair("taken", None, Some(&public)))
            .await
            .unwrap();

        let data = CredentialCreate {
            name: "taken".to_string(),
            credential_type: "PGP_KEY".to_string(),
            attributes: Attributes::new(),
        };
        let errors = validation(service.create(data).await.unwrap_err());

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.messages_for("keychain_credential_create.name"),
            vec!["A credential with this name already exists"]
        );
    }

    #[tokio::test]
    async fn test_hook_errors_are_raised() {
        let service = service();
        let (private, _) = test_key_pair();
        let (_, other_public) = test_key_pair();

        let errors = validation(
            service
                .create(key_pair("bad", Some(&private), Some(&other_public)))
                .await
                .unwrap_err(),
        );

        assert_eq!(
            errors.messages_for("keychain_credential_create.attributes.public_key"),
            vec!["Private key and public key do not match"]
        );
        assert!(service.find_by_name("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_own_name_and_replaces_attributes() {
        let service = service();
        let (_, public) = test_key_pair();
        let (_, replacement) = test_key_pair();
        let created = service
            .create(key_pair("rotating", None, Some(&public)))
            .await
            .unwrap();

        let updated = service
            .update(
                created.id,
                CredentialUpdate {
                    attributes: Some(attrs(json!({"public_key": replacement}))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "rotating");
        assert_eq!(updated.str_attribute("public_key"), Some(replacement.as_str()));
        assert_eq!(updated.attributes["private_key"], Value::Null, "default applied");
    }

    #[tokio::test]
    async fn test_update_uses_update_schema_name() {
        let service = service();
        let (_, public) = test_key_pair();
        service.create(key_pair("a", None, Some(&public))).await.unwrap();
        let b = service.create(key_pair("b", None, Some(&public))).await.unwrap();

        let errors = validation(
            service
                .update(
                    b.id,
                    CredentialUpdate {
                        name: Some("a".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap_err(),
        );

        assert_eq!(
            errors.messages_for("keychain_credential_update.name"),
            vec!["A credential with this name already exists"]
        );
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_are_not_found() {
        let service = service();
        assert!(matches!(
            service.update(7, CredentialUpdate::default()).await,
            Err(KeychainError::NotFound(7))
        ));
        assert!(matches!(service.delete(7).await, Err(KeychainError::NotFound(7))));
    }

    #[tokio::test]
    async fn test_ssh_credentials_reference_key_pair() {
        let service = service();
        let (private, _) = test_key_pair();
        let key = service
            .create(key_pair("key", Some(&private), None))
            .await
            .unwrap();

        let created = service
            .create(CredentialCreate {
                name: "nas-b".to_string(),
                credential_type: SSH_CREDENTIALS.to_string(),
                attributes: attrs(json!({
                    "host": "nas-b.local",
                    "private_key": key.id,
                    "remote_host_key": "ssh-ed25519 AAAA",
                })),
            })
            .await
            .unwrap();

        assert_eq!(created.attributes["port"], json!(22));
        assert_eq!(created.attributes["cipher"], json!("STANDARD"));
    }

    #[tokio::test]
    async fn test_key_pair_without_private_key_is_not_usable() {
        let service = service();
        let (private, public) = test_key_pair();
        let public_only = service
            .create(key_pair("pub", None, Some(&public)))
            .await
            .unwrap();
        let full = service
            .create(key_pair("full", Some(&private), None))
            .await
            .unwrap();

        assert!(matches!(
            service.ssh_key_pair_with_private_key(public_only.id).await,
            Err(KeychainError::NoUsableKey(_))
        ));
        assert!(matches!(
            service.ssh_key_pair_with_private_key(404).await,
            Err(KeychainError::NoUsableKey(404))
        ));
        assert_eq!(
            service.ssh_key_pair_with_private_key(full.id).await.unwrap().id,
            full.id
        );
    }

    #[tokio::test]
    async fn test_scan_surfaces_tool_errors() {
        let tools = SshTools {
            ssh_keyscan: PathBuf::from("/nonexistent/ssh-keyscan"),
            ..SshTools::default()
        };
        let registry = CredentialTypeRegistry::new(Arc::new(NativeIntrospector));
        let service =
            KeychainService::with_registry(Arc::new(registry), Arc::new(MemoryStore::new()), tools);

        let err = service
            .remote_ssh_host_key_scan(HostKeyScanRequest::new("nas-b.local"))
            .await
            .unwrap_err();
        assert!(matches!(err, KeychainError::Ssh(SshError::Spawn { .. })));
    }

    #[test]
    fn test_scan_request_defaults() {
        let request: HostKeyScanRequest =
            serde_json::from_value(json!({"host": "nas-b.local"})).unwrap();
        assert_eq!(request, HostKeyScanRequest::new("nas-b.local"));
        assert_eq!(request.port, 22);
        assert_eq!(request.connect_timeout, 10);
    }
}
