//! Unix domain socket transport for local nodes.
//!
//! Each envelope is written as one line of JSON and the reply is read back as
//! one line. The connection is opened lazily, held across exchanges, and
//! dropped after any failure so the next exchange reconnects.
//!
//! # Protocol
//!
//! ```text
//! -> {"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":1}\n
//! <- {"jsonrpc":"2.0","result":"0x10","id":1}\n
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, warn};

use tidewire_rpc::{Transport, TransportError};

/// Default time allowed for one request/reply exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport that talks to a node over its IPC socket.
#[derive(Debug)]
pub struct IpcTransport {
    path: PathBuf,
    timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

#[derive(Debug)]
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(path: &Path) -> Result<Self, TransportError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| TransportError::Connection(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "ipc connection opened");
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    async fn exchange(&mut self, line: &[u8]) -> Result<Value, TransportError> {
        self.writer.write_all(line).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        let mut reply = String::new();
        loop {
            reply.clear();
            if self.reader.read_line(&mut reply).await? == 0 {
                return Err(TransportError::Closed);
            }
            if !reply.trim().is_empty() {
                break;
            }
        }
        Ok(serde_json::from_str(reply.trim())?)
    }
}

impl IpcTransport {
    /// Create a transport for the socket at `path`. No connection is made
    /// until the first exchange.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
            connection: Mutex::new(None),
        }
    }

    /// Set the time allowed for each exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for IpcTransport {
    async fn send(&self, envelope: Value) -> Result<Value, TransportError> {
        let line = serde_json::to_vec(&envelope)?;
        let mut slot = self.connection.lock().await;
        // Taken out for the exchange; only a connection that completed one
        // goes back, so a cancelled send never leaves an unread reply behind.
        let idle = slot.take();

        let result = time::timeout(self.timeout, async {
            let mut connection = match idle {
                Some(connection) => connection,
                None => Connection::open(&self.path).await?,
            };
            let reply = connection.exchange(&line).await?;
            Ok::<_, TransportError>((connection, reply))
        })
        .await
        .unwrap_or(Err(TransportError::Timeout));

        match result {
            Ok((connection, reply)) => {
                *slot = Some(connection);
                Ok(reply)
            }
            Err(e) => {
                warn!(path = %self.path.display(), "ipc exchange failed: {e}");
                Err(e)
            }
        }
    }
}
