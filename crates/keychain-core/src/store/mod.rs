// ABOUTME: Credential persistence interface plus in-memory and SQLite backends.
// ABOUTME: Stores only ever receive records that already passed validation.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::credential::{CredentialCreate, KeychainCredential};
use crate::error::Result;
use async_trait::async_trait;

/// Create/update/delete/query over credential records keyed by integer id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new record and return its id.
    ///
    /// # Errors
    /// `KeychainError::NameTaken` if the name is already in use.
    async fn insert(&self, credential: &CredentialCreate) -> Result<i64>;

    /// Replace the record with `credential.id`.
    ///
    /// # Errors
    /// `KeychainError::NotFound` if no such record exists.
    async fn update(&self, credential: &KeychainCredential) -> Result<()>;

    /// Delete a record, returning whether it existed.
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn get(&self, id: i64) -> Result<Option<KeychainCredential>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<KeychainCredential>>;

    /// All records ordered by id.
    async fn list(&self) -> Result<Vec<KeychainCredential>>;
}
