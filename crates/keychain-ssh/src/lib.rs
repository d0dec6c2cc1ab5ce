// ABOUTME: OpenSSH tooling shared by keychain services.
// ABOUTME: Key introspection, RSA key generation, host key scanning, and fingerprints.

//! # keychain-ssh
//!
//! Thin, typed wrappers over the OpenSSH command-line tools used to validate
//! and produce SSH trust material.
//!
//! - **Introspection**: derive a public key from a private key, check a public key
//! - **Generation**: produce a fresh RSA key pair in a scratch directory
//! - **Host keys**: scan a remote endpoint and reduce the output to one key line
//! - **Fingerprints**: SHA256 of a public key's wire encoding
//!
//! Key material is only ever written to owner-only scratch files that are
//! removed on every exit path.
//!
//! ## Example
//!
//! ```no_run
//! use keychain_ssh::{KeyGenerator, KeyIntrospect, KeyIntrospector, SshTools};
//!
//! # async fn demo() -> keychain_ssh::Result<()> {
//! let tools = SshTools::default();
//! let pair = KeyGenerator::new(tools.clone()).generate().await?;
//! let derived = KeyIntrospector::new(tools).derive_public(&pair.private_key).await?;
//! assert!(pair.public_key.starts_with(&derived));
//! # Ok(())
//! # }
//! ```

mod error;
mod fingerprint;
mod introspect;
mod keygen;
mod keyscan;
mod tool;

pub use error::{Result, SshError};
pub use fingerprint::compute_fingerprint;
pub use introspect::{key_tokens, parse_public_key_line, KeyIntrospect, KeyIntrospector};
pub use keygen::{GeneratedKeyPair, KeyGenerator};
pub use keyscan::{parse_keyscan_output, HostKeyScanner};
pub use tool::SshTools;
