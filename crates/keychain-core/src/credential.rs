// ABOUTME: Keychain credential records and typed views of their attributes.
// ABOUTME: Records are owned by the store; this crate only shapes and validates them.

use crate::error::{KeychainError, Result};
use crate::schema::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A stored credential of one registered type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeychainCredential {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub attributes: Attributes,
}

impl KeychainCredential {
    /// String attribute, treating `null` and `""` as absent.
    pub fn str_attribute(&self, key: &str) -> Option<&str> {
        non_empty_str(&self.attributes, key)
    }
}

/// Input for creating a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub attributes: Attributes,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub credential_type: Option<String>,
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

pub(crate) fn non_empty_str<'a>(attributes: &'a Attributes, key: &str) -> Option<&'a str> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Transport cipher for an SSH connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cipher {
    #[default]
    Standard,
    Fast,
    Disabled,
}

impl Cipher {
    pub const NAMES: &'static [&'static str] = &["STANDARD", "FAST", "DISABLED"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cipher::Standard => "STANDARD",
            Cipher::Fast => "FAST",
            Cipher::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cipher {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STANDARD" => Ok(Cipher::Standard),
            "FAST" => Ok(Cipher::Fast),
            "DISABLED" => Ok(Cipher::Disabled),
            other => Err(format!("unknown cipher: {other}")),
        }
    }
}

/// Attributes of an `SSH_KEY_PAIR` credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyPairAttributes {
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
}

/// Attributes of an `SSH_CREDENTIALS` credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshCredentialsAttributes {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Id of the `SSH_KEY_PAIR` credential holding the private key.
    pub private_key: i64,
    pub remote_host_key: String,
    pub cipher: Cipher,
    pub connect_timeout: u64,
}

/// Encode a typed attribute view into the generic map.
pub fn to_attributes<T: Serialize>(value: &T) -> Result<Attributes> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(KeychainError::Serialization(
            <serde_json::Error as serde::ser::Error>::custom(format!(
                "attributes must encode as an object, got {other}"
            )),
        )),
    }
}

/// Decode the generic map into a typed attribute view.
pub fn from_attributes<T: for<'de> Deserialize<'de>>(attributes: &Attributes) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(attributes.clone()))?)
}
