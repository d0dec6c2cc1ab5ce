// ABOUTME: Library side of the keychain CLI
// ABOUTME: Resolves config and store, then runs the selected command

use anyhow::{Context, Result};
use keychain_core::{Config, KeychainService, SqliteStore};
use std::sync::Arc;
use tracing::debug;

pub mod commands;

pub use commands::{Cli, Command};

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db = match cli.db {
        Some(path) => path,
        None => config.store_path()?,
    };
    debug!(db = %db.display(), "opening credential store");
    let store = SqliteStore::open(&db)
        .await
        .with_context(|| format!("Failed to open credential store {}", db.display()))?;
    let service = KeychainService::new(config.tools.clone(), Arc::new(store));

    match cli.command {
        Command::Generate { save } => commands::keys::generate(&service, save).await,
        Command::Create {
            name,
            credential_type,
            attributes,
            private_key_file,
            public_key_file,
        } => {
            commands::credentials::create(
                &service,
                name,
                credential_type,
                &attributes,
                private_key_file,
                public_key_file,
            )
            .await
        }
        Command::Update {
            id,
            name,
            credential_type,
            attributes,
        } => {
            commands::credentials::update(&service, id, name, credential_type, attributes).await
        }
        Command::List { json } => commands::credentials::list(&service, json).await,
        Command::Show { id, json, reveal } => {
            commands::credentials::show(&service, id, json, reveal).await
        }
        Command::Delete { id } => commands::credentials::delete(&service, id).await,
        Command::Scan {
            host,
            port,
            timeout,
        } => commands::keys::scan(&service, host, port, timeout).await,
    }
}
