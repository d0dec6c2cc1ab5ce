// ABOUTME: Fresh RSA key pair generation through ssh-keygen.
// ABOUTME: Key files live under a random scratch name and are removed on every exit path.

use crate::error::{Result, SshError};
use crate::tool::{run_tool, SshTools};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Length of the random scratch file name.
const SCRATCH_NAME_LEN: usize = 32;

/// A generated key pair in OpenSSH text form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedKeyPair {
    pub private_key: String,
    pub public_key: String,
}

/// Private key path and its `.pub` sibling, deleted when dropped.
struct ScratchKeyFiles {
    private: PathBuf,
    public: PathBuf,
}

impl ScratchKeyFiles {
    fn allocate(dir: &Path) -> Self {
        let name: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SCRATCH_NAME_LEN)
            .map(char::from)
            .collect();

        let private = dir.join(&name);
        let public = dir.join(format!("{name}.pub"));
        let files = Self { private, public };
        // ssh-keygen prompts before overwriting; a fresh random name should never exist.
        files.remove();
        files
    }

    fn remove(&self) {
        for path in [&self.private, &self.public] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch key file");
                }
            }
        }
    }
}

impl Drop for ScratchKeyFiles {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Generates RSA key pairs with an empty passphrase.
#[derive(Debug, Clone, Default)]
pub struct KeyGenerator {
    tools: SshTools,
}

impl KeyGenerator {
    pub fn new(tools: SshTools) -> Self {
        Self { tools }
    }

    /// Generate a new RSA key pair.
    ///
    /// # Errors
    /// Returns the tool's diagnostic text if `ssh-keygen` fails, or an IO error
    /// if the produced files cannot be read back.
    pub async fn generate(&self) -> Result<GeneratedKeyPair> {
        let files = ScratchKeyFiles::allocate(&self.tools.scratch_dir());

        run_tool(
            &self.tools.ssh_keygen,
            [
                OsStr::new("-t"),
                OsStr::new("rsa"),
                OsStr::new("-f"),
                files.private.as_os_str(),
                OsStr::new("-N"),
                OsStr::new(""),
                OsStr::new("-q"),
            ],
        )
        .await?
        .into_stdout()?;

        let private_key = read_key(&files.private).await?;
        let public_key = read_key(&files.public).await?;

        tracing::debug!("generated rsa key pair");

        Ok(GeneratedKeyPair {
            private_key,
            public_key,
        })
    }
}

async fn read_key(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SshError::ReadKey {
            path: path.to_path_buf(),
            source: e,
        })
}
