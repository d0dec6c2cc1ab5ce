// ABOUTME: The fixed set of credential types: SSH key pairs and SSH connection credentials.
// ABOUTME: Each variant supplies a schema and an optional semantic pre-save hook.

use crate::credential::{non_empty_str, Cipher};
use crate::schema::{Attributes, CredentialSchema, Field};
use crate::validation::ValidationErrors;
use keychain_ssh::{key_tokens, parse_public_key_line, KeyIntrospect, SshError};
use serde_json::Value;

pub const SSH_KEY_PAIR: &str = "SSH_KEY_PAIR";
pub const SSH_CREDENTIALS: &str = "SSH_CREDENTIALS";

/// A registered credential variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    SshKeyPair,
    SshCredentials,
}

impl CredentialKind {
    pub const ALL: [CredentialKind; 2] = [CredentialKind::SshKeyPair, CredentialKind::SshCredentials];

    pub fn name(&self) -> &'static str {
        match self {
            CredentialKind::SshKeyPair => SSH_KEY_PAIR,
            CredentialKind::SshCredentials => SSH_CREDENTIALS,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            CredentialKind::SshKeyPair => "SSH Key Pair",
            CredentialKind::SshCredentials => "SSH credentials",
        }
    }

    pub fn schema(&self) -> CredentialSchema {
        match self {
            CredentialKind::SshKeyPair => CredentialSchema::new(vec![
                Field::str("private_key").nullable(),
                Field::str("public_key").nullable(),
            ]),
            CredentialKind::SshCredentials => CredentialSchema::new(vec![
                Field::str("host").required(),
                Field::int("port").default_int(22).range(1, 65535),
                Field::str("username").default_str("root"),
                Field::int("private_key").required(),
                Field::str("remote_host_key").required(),
                Field::str("cipher")
                    .choices(Cipher::NAMES)
                    .default_str(Cipher::Standard.as_str()),
                Field::int("connect_timeout").default_int(10).range(1, i64::MAX),
            ]),
        }
    }

    /// Semantic validation run only on structurally valid attributes.
    ///
    /// May fill derived fields in `attributes`. Errors are recorded as
    /// `"{prefix}.{field}"`.
    pub async fn validate_and_pre_save(
        &self,
        introspector: &dyn KeyIntrospect,
        errors: &mut ValidationErrors,
        prefix: &str,
        attributes: &mut Attributes,
    ) {
        match self {
            CredentialKind::SshKeyPair => {
                validate_key_pair(introspector, errors, prefix, attributes).await
            }
            CredentialKind::SshCredentials => {}
        }
    }
}

fn tool_diagnostic(err: SshError) -> String {
    match err {
        SshError::ToolFailed { stderr, .. } => stderr,
        SshError::InvalidPublicKey(stderr) => stderr,
        other => other.to_string(),
    }
}

async fn validate_key_pair(
    introspector: &dyn KeyIntrospect,
    errors: &mut ValidationErrors,
    prefix: &str,
    attributes: &mut Attributes,
) {
    let private_key = non_empty_str(attributes, "private_key").map(str::to_owned);
    let mut public_key = non_empty_str(attributes, "public_key").map(str::to_owned);

    if let Some(private_key) = private_key {
        let derived = match introspector.derive_public(&private_key).await {
            Ok(derived) => derived,
            Err(e) => {
                errors.add(format!("{prefix}.private_key"), tool_diagnostic(e));
                return;
            }
        };

        match &public_key {
            Some(supplied) => {
                if key_tokens(supplied) != key_tokens(&derived) {
                    errors.add(
                        format!("{prefix}.public_key"),
                        "Private key and public key do not match",
                    );
                }
            }
            None => {
                attributes.insert("public_key".to_string(), Value::String(derived.clone()));
                public_key = Some(derived);
            }
        }
    }

    let Some(public_key) = public_key else {
        errors.add(
            format!("{prefix}.public_key"),
            "You must specify at least public key",
        );
        return;
    };

    if let Err(e) = parse_public_key_line(&public_key) {
        errors.add(
            format!("{prefix}.public_key"),
            format!("Invalid public key: {}", tool_diagnostic(e)),
        );
        return;
    }

    if let Err(e) = introspector.check_public(&public_key).await {
        errors.add(
            format!("{prefix}.public_key"),
            format!("Invalid public key: {}", tool_diagnostic(e)),
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use ssh_key::{Algorithm, LineEnding, PrivateKey, PublicKey};

    /// In-process stand-in for ssh-keygen built on the ssh-key crate.
    pub(crate) struct NativeIntrospector;

    #[async_trait]
    impl KeyIntrospect for NativeIntrospector {
        async fn derive_public(&self, private_key: &str) -> keychain_ssh::Result<String> {
            let key = PrivateKey::from_openssh(private_key).map_err(|e| SshError::ToolFailed {
                tool: "ssh-keygen".to_string(),
                stderr: format!("Load key: {e}"),
            })?;
            let public = key.public_key().to_openssh().map_err(SshError::SerializeKey)?;
            Ok(key_tokens(&public))
        }

        async fn check_public(&self, public_key: &str) -> keychain_ssh::Result<()> {
            PublicKey::from_openssh(public_key.trim())
                .map(|_| ())
                .map_err(|e| SshError::InvalidPublicKey(format!("{e}")))
        }
    }

    pub(crate) fn test_key_pair() -> (String, String) {
        let key = PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519)
            .expect("should generate ed25519 key");
        let private = key.to_openssh(LineEnding::LF).unwrap().to_string();
        let public = key.public_key().to_openssh().unwrap();
        (private, public)
    }

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn run(attributes: &mut Attributes) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        CredentialKind::SshKeyPair
            .validate_and_pre_save(&NativeIntrospector, &mut errors, "s.attributes", attributes)
            .await;
        errors
    }

    #[tokio::test]
    async fn test_fills_public_key_from_private_key() {
        let (private, public) = test_key_pair();
        let mut a = attrs(json!({"private_key": private, "public_key": null}));

        let errors = run(&mut a).await;

        assert!(errors.is_empty(), "{errors}");
        assert_eq!(
            key_tokens(a["public_key"].as_str().unwrap()),
            key_tokens(&public)
        );
    }

    #[tokio::test]
    async fn test_accepts_matching_public_key_with_comment() {
        let (private, public) = test_key_pair();
        let commented = format!("{} backup@nas", key_tokens(&public));
        let mut a = attrs(json!({"private_key": private, "public_key": commented}));

        let errors = run(&mut a).await;

        assert!(errors.is_empty(), "{errors}");
        assert_eq!(a["public_key"], json!(commented), "supplied key is kept");
    }

    #[tokio::test]
    async fn test_rejects_mismatched_public_key() {
        let (private, _) = test_key_pair();
        let (_, other_public) = test_key_pair();
        let mut a = attrs(json!({"private_key": private, "public_key": other_public}));

        let errors = run(&mut a).await;

        assert_eq!(
            errors.messages_for("s.attributes.public_key"),
            vec!["Private key and public key do not match"]
        );
    }

    #[tokio::test]
    async fn test_both_empty_is_single_public_key_error() {
        let mut a = attrs(json!({"private_key": null, "public_key": null}));

        let errors = run(&mut a).await;

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.messages_for("s.attributes.public_key"),
            vec!["You must specify at least public key"]
        );
    }

    #[tokio::test]
    async fn test_bad_private_key_faults_only_private_key() {
        let mut a = attrs(json!({"private_key": "garbage", "public_key": null}));

        let errors = run(&mut a).await;

        assert_eq!(errors.len(), 1);
        let messages = errors.messages_for("s.attributes.private_key");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Load key"), "tool text is surfaced");
    }

    #[tokio::test]
    async fn test_public_key_only_is_checked() {
        let (_, public) = test_key_pair();
        let mut ok = attrs(json!({"private_key": null, "public_key": public}));
        assert!(run(&mut ok).await.is_empty());

        let mut bad = attrs(json!({"private_key": null, "public_key": "ssh-ed25519 %%%"}));
        let errors = run(&mut bad).await;
        let messages = errors.messages_for("s.attributes.public_key");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Invalid public key"));
    }

    #[tokio::test]
    async fn test_private_key_material_as_public_key_is_rejected() {
        let (private, _) = test_key_pair();
        let mut a = attrs(json!({"private_key": null, "public_key": private}));

        let errors = run(&mut a).await;

        let messages = errors.messages_for("s.attributes.public_key");
        assert_eq!(errors.len(), 1);
        assert!(messages[0].starts_with("Invalid public key"));
    }

    #[tokio::test]
    async fn test_several_public_keys_are_rejected() {
        let (_, first) = test_key_pair();
        let (_, second) = test_key_pair();
        let mut a = attrs(json!({"private_key": null, "public_key": format!("{first}\n{second}")}));

        let errors = run(&mut a).await;

        assert_eq!(
            errors.messages_for("s.attributes.public_key"),
            vec!["Invalid public key: expected a single public key line"]
        );
    }

    #[tokio::test]
    async fn test_ssh_credentials_has_no_semantic_checks() {
        let mut a = attrs(json!({"host": "nas"}));
        let mut errors = ValidationErrors::new();
        CredentialKind::SshCredentials
            .validate_and_pre_save(&NativeIntrospector, &mut errors, "s", &mut a)
            .await;
        assert!(errors.is_empty());
    }

    #[test]
    fn test_names_and_titles() {
        assert_eq!(CredentialKind::SshKeyPair.name(), "SSH_KEY_PAIR");
        assert_eq!(CredentialKind::SshCredentials.name(), "SSH_CREDENTIALS");
        assert_eq!(CredentialKind::SshKeyPair.title(), "SSH Key Pair");
    }

    #[test]
    fn test_ssh_credentials_schema_defaults() {
        let mut a = attrs(json!({
            "host": "nas",
            "private_key": 3,
            "remote_host_key": "ssh-ed25519 AAAA",
        }));
        let errors = CredentialKind::SshCredentials.schema().validate(&mut a);
        assert!(errors.is_empty(), "{errors}");
        assert_eq!(a["port"], json!(22));
        assert_eq!(a["username"], json!("root"));
        assert_eq!(a["cipher"], json!("STANDARD"));
        assert_eq!(a["connect_timeout"], json!(10));
    }

    #[test]
    fn test_zero_connect_timeout_is_rejected() {
        let mut a = attrs(json!({
            "host": "nas",
            "private_key": 3,
            "remote_host_key": "ssh-ed25519 AAAA",
            "connect_timeout": 0,
        }));
        let errors = CredentialKind::SshCredentials.schema().validate(&mut a);
        assert_eq!(
            errors.messages_for("connect_timeout"),
            vec![format!("Should be between 1 and {}", i64::MAX)]
        );
    }
}
