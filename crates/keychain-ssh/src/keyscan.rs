// ABOUTME: Remote host key scanning via ssh-keyscan.
// ABOUTME: Reduces multi-line scan output to the last reported "<type> <key>" entry.

use crate::error::{Result, SshError};
use crate::tool::{run_tool, SshTools};
use std::ffi::OsString;

/// Scans remote SSH endpoints for their host keys.
#[derive(Debug, Clone, Default)]
pub struct HostKeyScanner {
    tools: SshTools,
}

impl HostKeyScanner {
    pub fn new(tools: SshTools) -> Self {
        Self { tools }
    }

    /// Scan `host:port`, giving up after `timeout_secs` (enforced by ssh-keyscan).
    ///
    /// # Errors
    /// Returns `SshError::ToolFailed` with ssh-keyscan's stderr on a non-zero exit,
    /// or `SshError::NoHostKeys` when nothing was reported.
    pub async fn scan(&self, host: &str, port: u16, timeout_secs: u64) -> Result<String> {
        let args: [OsString; 5] = [
            "-p".into(),
            port.to_string().into(),
            "-T".into(),
            timeout_secs.to_string().into(),
            host.into(),
        ];

        let stdout = run_tool(&self.tools.ssh_keyscan, args)
            .await?
            .into_stdout()?;

        let key = parse_keyscan_output(&stdout)?;
        tracing::debug!(host = %host, port, key_type = key.split(' ').next().unwrap_or(""), "scanned host key");
        Ok(key)
    }

    /// See [`parse_keyscan_output`].
    pub fn parse(&self, raw: &str) -> Result<String> {
        parse_keyscan_output(raw)
    }
}

/// Reduce scan-style text to one canonical key line.
///
/// Empty lines and `"# "` commentary are dropped; the last remaining line is
/// returned without its leading hostname token.
///
/// # Errors
/// Returns `SshError::NoHostKeys` when no key line remains, or when the last
/// remaining line carries nothing after the hostname (a bare hostname or a
/// whitespace-only line). An empty key is never returned.
pub fn parse_keyscan_output(raw: &str) -> Result<String> {
    let last = raw
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with("# "))
        .last()
        .ok_or(SshError::NoHostKeys)?;

    let key = last.split_whitespace().skip(1).collect::<Vec<_>>().join(" ");
    if key.is_empty() {
        return Err(SshError::NoHostKeys);
    }
    Ok(key)
}
