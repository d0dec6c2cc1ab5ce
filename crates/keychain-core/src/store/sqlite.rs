// ABOUTME: SQLite-backed credential store.
// ABOUTME: Attributes are kept as a JSON document alongside the name and type columns.

use super::CredentialStore;
use crate::credential::{CredentialCreate, KeychainCredential};
use crate::error::{KeychainError, Result};
use crate::schema::Attributes;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Persistent credential store in a single SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the store at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| KeychainError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS keychain_credentials (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                type TEXT NOT NULL,
                attributes TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn name_conflict(err: sqlx::Error, name: &str) -> KeychainError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            KeychainError::NameTaken(name.to_string())
        }
        _ => KeychainError::Store(err),
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn insert(&self, credential: &CredentialCreate) -> Result<i64> {
        let attributes = serde_json::to_string(&credential.attributes)?;
        let result =
            sqlx::query("INSERT INTO keychain_credentials (name, type, attributes) VALUES (?, ?, ?)")
                .bind(&credential.name)
                .bind(&credential.credential_type)
                .bind(attributes)
                .execute(&self.pool)
                .await
                .map_err(|e| name_conflict(e, &credential.name))?;

        Ok(result.last_insert_rowid())
    }

    async fn update(&self, credential: &KeychainCredential) -> Result<()> {
        let attributes = serde_json::to_string(&credential.attributes)?;
        let result = sqlx::query(
            "UPDATE keychain_credentials SET name = ?, type = ?, attributes = ? WHERE id = ?",
        )
        .bind(&credential.name)
        .bind(&credential.credential_type)
        .bind(attributes)
        .bind(credential.id)
        .execute(&self.pool)
        .await
        .map_err(|e| name_conflict(e, &credential.name))?;

        if result.rows_affected() == 0 {
            return Err(KeychainError::NotFound(credential.id));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM keychain_credentials WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: i64) -> Result<Option<KeychainCredential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, name, type AS credential_type, attributes FROM keychain_credentials WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(KeychainCredential::try_from).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<KeychainCredential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, name, type AS credential_type, attributes FROM keychain_credentials WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(KeychainCredential::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<KeychainCredential>> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, name, type AS credential_type, attributes FROM keychain_credentials ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(KeychainCredential::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    name: String,
    credential_type: String,
    attributes: String,
}

impl TryFrom<CredentialRow> for KeychainCredential {
    type Error = KeychainError;

    fn try_from(row: CredentialRow) -> Result<Self> {
        let attributes: Attributes = serde_json::from_str(&row.attributes)?;
        Ok(KeychainCredential {
            id: row.id,
            name: row.name,
            credential_type: row.credential_type,
            attributes,
        })
    }
}
