// ABOUTME: Implementation of key generation and host key scan commands
// ABOUTME: Thin wrappers over the service's OpenSSH-backed operations

use anyhow::Result;
use colored::Colorize;
use keychain_core::{CredentialCreate, HostKeyScanRequest, KeychainService, SSH_KEY_PAIR};
use keychain_ssh::compute_fingerprint;
use serde_json::{Map, Value};

pub async fn generate(service: &KeychainService, save: Option<String>) -> Result<()> {
    let pair = service.generate_ssh_key_pair().await?;
    let fingerprint = compute_fingerprint(&pair.public_key)?;

    let Some(name) = save else {
        print!("{}", pair.private_key);
        println!("{}", pair.public_key.trim_end());
        eprintln!("{}: {}", "Fingerprint".dimmed(), fingerprint);
        return Ok(());
    };

    let mut attributes = Map::new();
    attributes.insert("private_key".to_string(), Value::String(pair.private_key));
    attributes.insert("public_key".to_string(), Value::String(pair.public_key.clone()));

    let credential = service
        .create(CredentialCreate {
            name,
            credential_type: SSH_KEY_PAIR.to_string(),
            attributes,
        })
        .await?;

    println!(
        "{} {} {}",
        "Saved".green(),
        credential.name.bold(),
        format!("(id {})", credential.id).dimmed()
    );
    println!("    {}: {}", "Public key".dimmed(), pair.public_key.trim_end());
    println!("    {}: {}", "Fingerprint".dimmed(), fingerprint);
    Ok(())
}

pub async fn scan(service: &KeychainService, host: String, port: u16, timeout: u64) -> Result<()> {
    let key = service
        .remote_ssh_host_key_scan(HostKeyScanRequest {
            host,
            port,
            connect_timeout: timeout,
        })
        .await?;
    println!("{}", key);
    Ok(())
}
