// ABOUTME: Core library for keychain - credential types, validation, storage, pairing
// ABOUTME: Shared between the keychain CLI and anything embedding the credential service

//! # keychain-core
//!
//! Stored SSH trust material and the handshake that establishes it.
//!
//! - [`CredentialTypeRegistry`] validates attributes per credential type
//! - [`KeychainService`] is the validated CRUD surface over a [`CredentialStore`]
//! - [`PairingOrchestrator`] and [`RemotePairingHandler`] are the two ends of
//!   semi-automatic SSH pairing

pub mod config;
pub mod credential;
pub mod error;
pub mod pairing;
pub mod registry;
pub mod schema;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

pub use config::{Config, PairingConfig, StoreConfig};
pub use credential::{
    from_attributes, to_attributes, Cipher, CredentialCreate, CredentialUpdate,
    KeychainCredential, SshCredentialsAttributes, SshKeyPairAttributes,
};
pub use error::{KeychainError, Result};
pub use pairing::{
    Account, AccountDirectory, ControlChannel, ControlSession, LoopbackChannel, PairRequest,
    PairResponse, PairingOrchestrator, RemotePairingHandler, SemiautomaticSetup, SshPairRequest,
    SshPairResult, SshServiceConfig, SshServiceControl,
};
pub use registry::{CredentialType, CredentialTypeRegistry};
pub use schema::Attributes;
pub use service::{HostKeyScanRequest, KeychainService};
pub use store::{CredentialStore, MemoryStore, SqliteStore};
pub use types::{CredentialKind, SSH_CREDENTIALS, SSH_KEY_PAIR};
pub use validation::{ValidationError, ValidationErrors};
