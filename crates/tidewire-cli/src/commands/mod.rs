//! CLI subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;

use tidewire::{DispatcherConfig, HttpTransport, Transport, Web3};
#[cfg(unix)]
use tidewire_ipc::IpcTransport;

pub mod batch;
pub mod block_number;
pub mod call;

/// Where and how to reach the node.
pub struct Endpoint {
    pub url: Option<String>,
    pub ipc: Option<PathBuf>,
    pub auth_token: Option<String>,
    pub config: Option<PathBuf>,
}

impl Endpoint {
    fn transport(&self) -> Result<Arc<dyn Transport>, Box<dyn std::error::Error>> {
        #[cfg(unix)]
        if let Some(path) = &self.ipc {
            return Ok(Arc::new(IpcTransport::new(path)));
        }
        #[cfg(not(unix))]
        if self.ipc.is_some() {
            return Err("IPC sockets are only supported on Unix".into());
        }
        let url = self
            .url
            .as_deref()
            .ok_or("no endpoint given: pass --url, --ipc or set TIDEWIRE_RPC_URL")?;
        let mut transport = HttpTransport::new(url)?;
        if let Some(token) = &self.auth_token {
            transport = transport.with_token(token.as_str());
        }
        Ok(Arc::new(transport))
    }

    fn dispatcher_config(&self) -> Result<DispatcherConfig, Box<dyn std::error::Error>> {
        match &self.config {
            Some(path) => Ok(DispatcherConfig::from_file(path)?),
            None => Ok(DispatcherConfig::default()),
        }
    }

    /// Build a client for this endpoint.
    pub fn connect(&self) -> Result<Web3, Box<dyn std::error::Error>> {
        Ok(Web3::new(self.transport()?, self.dispatcher_config()?)?)
    }
}
