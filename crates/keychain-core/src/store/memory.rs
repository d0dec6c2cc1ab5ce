// ABOUTME: In-memory credential store for tests and embedding.
// ABOUTME: Ids are assigned sequentially starting at 1.

use super::CredentialStore;
use crate::credential::{CredentialCreate, KeychainCredential};
use crate::error::{KeychainError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: BTreeMap<i64, KeychainCredential>,
}

/// Credential store held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert(&self, credential: &CredentialCreate) -> Result<i64> {
        let mut inner = self.inner.write().await;
        if inner.records.values().any(|r| r.name == credential.name) {
            return Err(KeychainError::NameTaken(credential.name.clone()));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.records.insert(
            id,
            KeychainCredential {
                id,
                name: credential.name.clone(),
                credential_type: credential.credential_type.clone(),
                attributes: credential.attributes.clone(),
            },
        );
        Ok(id)
    }

    async fn update(&self, credential: &KeychainCredential) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner
            .records
            .values()
            .any(|r| r.id != credential.id && r.name == credential.name)
        {
            return Err(KeychainError::NameTaken(credential.name.clone()));
        }

        match inner.records.get_mut(&credential.id) {
            Some(existing) => {
                *existing = credential.clone();
                Ok(())
            }
            None => Err(KeychainError::NotFound(credential.id)),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.inner.write().await.records.remove(&id).is_some())
    }

    async fn get(&self, id: i64) -> Result<Option<KeychainCredential>> {
        Ok(self.inner.read().await.records.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<KeychainCredential>> {
        Ok(self
            .inner
            .read()
            .await
            .records
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<KeychainCredential>> {
        Ok(self.inner.read().await.records.values().cloned().collect())
    }
}
