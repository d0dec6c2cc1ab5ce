// ABOUTME: Semi-automatic SSH pairing between two nodes.
// ABOUTME: Wire types shared by the initiating orchestrator and the remote handler.

mod channel;
mod handler;
mod orchestrator;
mod system;

pub use channel::{ControlChannel, ControlSession, LoopbackChannel};
pub use handler::{RemotePairingHandler, SshPairRequest, SshPairResult};
pub use orchestrator::{channel_url, url_hostname, PairingOrchestrator, SemiautomaticSetup};
pub use system::{Account, AccountDirectory, SshServiceConfig, SshServiceControl};

use serde::{Deserialize, Serialize};

/// Payload of the remote pairing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRequest {
    /// Label the remote puts in front of each returned host key.
    pub hostname: String,
    #[serde(rename = "public-key")]
    pub public_key: String,
    pub user: String,
}

/// Reply of the remote pairing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairResponse {
    pub ssh_port: u16,
    /// One `"<hostname> <key>"` line per host key type.
    pub ssh_hostkey: String,
}

impl From<SshPairResult> for PairResponse {
    fn from(result: SshPairResult) -> Self {
        Self {
            ssh_port: result.port,
            ssh_hostkey: result.host_key,
        }
    }
}
