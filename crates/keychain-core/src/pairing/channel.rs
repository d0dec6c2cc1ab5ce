// ABOUTME: Authenticated control channel used to reach a remote node.
// ABOUTME: Includes an in-process loopback that dispatches straight to a pairing handler.

use super::handler::RemotePairingHandler;
use crate::error::{KeychainError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Opens sessions to a remote node's control endpoint.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn ControlSession>>;
}

/// One open connection. Callers must `close` it on every path.
#[async_trait]
pub trait ControlSession: Send {
    /// Authenticate with a token; `false` means the remote rejected it.
    async fn authenticate(&mut self, token: &str) -> Result<bool>;

    async fn invoke(&mut self, operation: &str, payload: Value) -> Result<Value>;

    async fn close(&mut self) -> Result<()>;
}

/// Channel whose sessions call a local `RemotePairingHandler` directly.
pub struct LoopbackChannel {
    handler: Arc<RemotePairingHandler>,
    token: String,
    operation: String,
}

impl LoopbackChannel {
    pub fn new(
        handler: Arc<RemotePairingHandler>,
        token: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            token: token.into(),
            operation: operation.into(),
        }
    }
}

#[async_trait]
impl ControlChannel for LoopbackChannel {
    async fn connect(&self, url: &Url) -> Result<Box<dyn ControlSession>> {
        debug!(url = %url, "opening loopback session");
        Ok(Box::new(LoopbackSession {
            handler: Arc::clone(&self.handler),
            token: self.token.clone(),
            operation: self.operation.clone(),
            authenticated: false,
            closed: false,
        }))
    }
}

struct LoopbackSession {
    handler: Arc<RemotePairingHandler>,
    token: String,
    operation: String,
    authenticated: bool,
    closed: bool,
}

impl LoopbackSession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(KeychainError::Channel("session is closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlSession for LoopbackSession {
    async fn authenticate(&mut self, token: &str) -> Result<bool> {
        self.ensure_open()?;
        self.authenticated = token == self.token;
        Ok(self.authenticated)
    }

    async fn invoke(&mut self, operation: &str, payload: Value) -> Result<Value> {
        self.ensure_open()?;
        if !self.authenticated {
            return Err(KeychainError::Channel("not authenticated".into()));
        }
        if operation != self.operation {
            return Err(KeychainError::Channel(format!("method {operation} not found")));
        }
        self.handler.handle(payload).await
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
