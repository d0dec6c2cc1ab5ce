// ABOUTME: Implementation of credential CRUD commands
// ABOUTME: Prints validation failures field by field

use anyhow::{bail, Context, Result};
use colored::Colorize;
use keychain_core::{
    Attributes, CredentialCreate, CredentialUpdate, KeychainCredential, KeychainError,
    KeychainService, SSH_CREDENTIALS, SSH_KEY_PAIR,
};
use keychain_ssh::compute_fingerprint;
use serde_json::Value;
use std::path::PathBuf;

pub async fn create(
    service: &KeychainService,
    name: String,
    credential_type: String,
    attributes: &str,
    private_key_file: Option<PathBuf>,
    public_key_file: Option<PathBuf>,
) -> Result<()> {
    let mut attributes = parse_attributes(attributes)?;
    for (key, path) in [
        ("private_key", private_key_file),
        ("public_key", public_key_file),
    ] {
        if let Some(path) = path {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            attributes.insert(key.to_string(), Value::String(contents));
        }
    }

    let credential = service
        .create(CredentialCreate {
            name,
            credential_type,
            attributes,
        })
        .await
        .map_err(explain)?;

    println!(
        "{} {} {}",
        "Created".green(),
        credential.name.bold(),
        format!("(id {})", credential.id).dimmed()
    );
    Ok(())
}

pub async fn update(
    service: &KeychainService,
    id: i64,
    name: Option<String>,
    credential_type: Option<String>,
    attributes: Option<String>,
) -> Result<()> {
    let attributes = attributes.as_deref().map(parse_attributes).transpose()?;
    let credential = service
        .update(
            id,
            CredentialUpdate {
                name,
                credential_type,
                attributes,
            },
        )
        .await
        .map_err(explain)?;

    println!(
        "{} {} {}",
        "Updated".green(),
        credential.name.bold(),
        format!("(id {})", credential.id).dimmed()
    );
    Ok(())
}

pub async fn list(service: &KeychainService, json: bool) -> Result<()> {
    let credentials = service.query().await?;

    if json {
        let redacted: Vec<_> = credentials.iter().map(redacted).collect();
        println!("{}", serde_json::to_string_pretty(&redacted)?);
        return Ok(());
    }

    if credentials.is_empty() {
        println!("{}", "No credentials stored".dimmed());
        return Ok(());
    }

    println!("{}", format!("Credentials ({})", credentials.len()).bold());
    println!();
    for credential in &credentials {
        println!(
            "{:>4}  {}  {}",
            credential.id,
            credential.name.bold(),
            credential.credential_type.dimmed()
        );
        if let Some(detail) = summary(credential) {
            println!("      {}", detail);
        }
    }
    Ok(())
}

pub async fn show(service: &KeychainService, id: i64, json: bool, reveal: bool) -> Result<()> {
    let credential = service.get(id).await?;
    let credential = if reveal {
        credential
    } else {
        redacted(&credential)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&credential)?);
        return Ok(());
    }

    println!("{} {}", credential.name.bold(), format!("(id {})", credential.id).dimmed());
    println!("    {}: {}", "Type".dimmed(), credential.credential_type);
    for (key, value) in &credential.attributes {
        let value = match value {
            Value::String(s) => s.trim_end().to_string(),
            Value::Null => "-".to_string(),
            other => other.to_string(),
        };
        println!("    {}: {}", key.dimmed(), value);
    }
    if let Some(fingerprint) = fingerprint(&credential) {
        println!("    {}: {}", "Fingerprint".dimmed(), fingerprint);
    }
    Ok(())
}

pub async fn delete(service: &KeychainService, id: i64) -> Result<()> {
    service.delete(id).await?;
    println!("{} credential {}", "Deleted".green(), id);
    Ok(())
}

/// Parse a JSON object given on the command line.
pub fn parse_attributes(raw: &str) -> Result<Attributes> {
    match serde_json::from_str::<Value>(raw).context("Attributes must be valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("Attributes must be a JSON object"),
    }
}

/// Copy of the credential with private key material masked.
pub fn redacted(credential: &KeychainCredential) -> KeychainCredential {
    let mut credential = credential.clone();
    if credential.credential_type == SSH_KEY_PAIR && credential.str_attribute("private_key").is_some()
    {
        credential.attributes.insert(
            "private_key".to_string(),
            Value::String("<redacted>".to_string()),
        );
    }
    credential
}

fn fingerprint(credential: &KeychainCredential) -> Option<String> {
    if credential.credential_type != SSH_KEY_PAIR {
        return None;
    }
    credential
        .str_attribute("public_key")
        .and_then(|key| compute_fingerprint(key).ok())
}

fn summary(credential: &KeychainCredential) -> Option<String> {
    match credential.credential_type.as_str() {
        SSH_KEY_PAIR => fingerprint(credential).map(|f| format!("sha256 {}", &f[..16])),
        SSH_CREDENTIALS => Some(format!(
            "{}@{}:{}",
            credential.str_attribute("username").unwrap_or("root"),
            credential.str_attribute("host").unwrap_or("?"),
            credential
                .attributes
                .get("port")
                .and_then(Value::as_i64)
                .unwrap_or(22)
        )),
        _ => None,
    }
}

/// Print field errors before handing the error back to anyhow.
fn explain(err: KeychainError) -> anyhow::Error {
    if let KeychainError::Validation(errors) = &err {
        for error in errors {
            eprintln!("  {} {}", format!("{}:", error.path).red(), error.message);
        }
    }
    err.into()
}
