// ABOUTME: Locations of the OpenSSH binaries and a runner for invoking them.
// ABOUTME: Also owns the owner-only scratch files that key material is staged in.

use crate::error::{Result, SshError};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::process::Command;

/// Paths to the external tools plus the directory key material is staged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshTools {
    /// `ssh-keygen` binary (derivation, inspection, generation)
    pub ssh_keygen: PathBuf,
    /// `ssh-keyscan` binary (host key scanning)
    pub ssh_keyscan: PathBuf,
    /// Scratch directory; the system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
}

impl Default for SshTools {
    fn default() -> Self {
        Self {
            ssh_keygen: PathBuf::from("ssh-keygen"),
            ssh_keyscan: PathBuf::from("ssh-keyscan"),
            scratch_dir: None,
        }
    }
}

impl SshTools {
    /// Directory used for temporary key files.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Captured result of a finished tool process.
#[derive(Debug)]
pub(crate) struct ToolOutput {
    pub tool: String,
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Tool diagnostic text, falling back to the exit status when stderr is empty.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            match self.code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            stderr.to_string()
        }
    }

    /// Stdout of a successful run, or `ToolFailed` carrying the diagnostic.
    pub fn into_stdout(self) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(SshError::ToolFailed {
                stderr: self.diagnostic(),
                tool: self.tool,
            })
        }
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Run a tool to completion with stdin closed and output captured.
///
/// A non-zero exit is not an error here; callers decide how to report it.
pub(crate) async fn run_tool<I, S>(program: &Path, args: I) -> Result<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = tool_name(program);
    let args: Vec<S> = args.into_iter().collect();

    tracing::debug!(
        tool = %tool,
        args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
        "running ssh tool"
    );

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| SshError::Spawn {
            tool: tool.clone(),
            source: e,
        })?;

    let result = ToolOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        tool,
    };

    if !result.success {
        tracing::warn!(tool = %result.tool, stderr = %result.diagnostic(), "ssh tool failed");
    }

    Ok(result)
}

/// Stage `contents` in an owner-only (0600) file inside `dir`.
///
/// The file is removed when the returned handle drops, on every exit path.
/// A trailing newline is added because `ssh-keygen` rejects private keys without one.
pub(crate) fn write_scratch(dir: &Path, contents: &str) -> Result<NamedTempFile> {
    let temp_err = |source| SshError::TempFile {
        path: dir.to_path_buf(),
        source,
    };

    let mut file = tempfile::Builder::new()
        .prefix("keychain-")
        .tempfile_in(dir)
        .map_err(temp_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(temp_err)?;
    }

    file.write_all(contents.as_bytes()).map_err(temp_err)?;
    if !contents.ends_with('\n') {
        file.write_all(b"\n").map_err(temp_err)?;
    }
    file.flush().map_err(temp_err)?;

    Ok(file)
}
