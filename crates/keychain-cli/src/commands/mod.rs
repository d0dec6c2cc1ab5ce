// ABOUTME: CLI command definitions using clap
// ABOUTME: Defines subcommands for credential management and key tooling

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod credentials;
pub mod keys;

#[derive(Parser)]
#[command(name = "keychain", about = "Manage stored SSH keys and connection credentials")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (defaults to ~/.config/keychain/config.toml)
    #[arg(long, global = true, env = "KEYCHAIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Credential database, overriding the config file
    #[arg(long, global = true, env = "KEYCHAIN_DB")]
    pub db: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a new RSA key pair
    Generate {
        /// Store the pair as an SSH_KEY_PAIR credential with this name
        #[arg(long)]
        save: Option<String>,
    },

    /// Create a credential
    Create {
        /// Unique credential name
        #[arg(long)]
        name: String,

        /// Credential type (SSH_KEY_PAIR or SSH_CREDENTIALS)
        #[arg(long = "type", value_name = "TYPE")]
        credential_type: String,

        /// Attributes as a JSON object
        #[arg(long, default_value = "{}")]
        attributes: String,

        /// Read `private_key` from a file
        #[arg(long)]
        private_key_file: Option<PathBuf>,

        /// Read `public_key` from a file
        #[arg(long)]
        public_key_file: Option<PathBuf>,
    },

    /// Update a credential; omitted fields keep their stored value
    Update {
        /// Credential id
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "type", value_name = "TYPE")]
        credential_type: Option<String>,

        /// Replacement attributes as a JSON object
        #[arg(long)]
        attributes: Option<String>,
    },

    /// List credentials
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one credential
    Show {
        /// Credential id
        id: i64,

        /// Print JSON
        #[arg(long)]
        json: bool,

        /// Include private key material
        #[arg(long)]
        reveal: bool,
    },

    /// Delete a credential
    Delete {
        /// Credential id
        id: i64,
    },

    /// Scan a remote host for its SSH host key
    Scan {
        host: String,

        #[arg(long, short, default_value_t = 22)]
        port: u16,

        /// Connect timeout in seconds
        #[arg(long, short, default_value_t = 10)]
        timeout: u64,
    },
}
