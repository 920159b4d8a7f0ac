//! Issue a file of calls concurrently through the batching dispatcher.
//!
//! Input file:
//! ```json
//! [
//!   {"method": "eth_blockNumber"},
//!   {"method": "eth_getBalance", "params": ["0x...", "latest"]}
//! ]
//! ```
//!
//! Output is one JSON line per call, in file order.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use tidewire::Request;

use super::Endpoint;

/// One call from the batch file.
#[derive(Debug, Deserialize, PartialEq)]
pub(crate) struct BatchEntry {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

pub(crate) fn load_entries(path: &Path) -> Result<Vec<BatchEntry>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

pub async fn run(endpoint: &Endpoint, file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let entries = load_entries(&file)?;
    let web3 = endpoint.connect()?;
    info!(calls = entries.len(), "dispatching batch file");

    let handles: Vec<_> = entries
        .into_iter()
        .map(|entry| web3.dispatch(Request::new(entry.method, entry.params)))
        .collect();
    web3.flush();

    for handle in handles {
        let id = handle.id().cloned();
        let line = match handle.await {
            Ok(response) => match response.payload {
                Ok(result) => json!({"id": response.id, "result": result}),
                Err(error) => json!({"id": response.id, "error": error}),
            },
            Err(e) => json!({"id": id, "error": {"message": e.to_string()}}),
        };
        println!("{line}");
    }

    web3.close().await;
    Ok(())
}
