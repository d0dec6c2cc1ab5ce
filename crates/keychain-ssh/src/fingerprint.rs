// ABOUTME: SSH public key fingerprint computation.
// ABOUTME: SHA256 over the key's SSH wire encoding, lowercase hex, for any algorithm.

use crate::error::{Result, SshError};
use sha2::{Digest, Sha256};
use ssh_key::PublicKey;

/// Compute the SHA256 fingerprint of an OpenSSH public key line (hex, lowercase).
///
/// The comment field is ignored; two lines differing only in comment share a fingerprint.
///
/// # Errors
/// Returns `SshError::ParseKey` if the line is not a valid OpenSSH public key.
pub fn compute_fingerprint(public_key: &str) -> Result<String> {
    let key = PublicKey::from_openssh(public_key.trim()).map_err(SshError::ParseKey)?;
    let wire = key.to_bytes().map_err(SshError::SerializeKey)?;

    let mut hasher = Sha256::new();
    hasher.update(&wire);
    Ok(hex::encode(hasher.finalize()))
}
