//! In-memory node used by the facade unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{BatchPolicy, DispatcherConfig, Transport, TransportError, Web3};

/// Answers each method with a canned result and records what it was asked.
#[derive(Default)]
pub(crate) struct MockNode {
    results: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<Value>>,
    envelope_sizes: Mutex<Vec<usize>>,
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(self: Arc<Self>, method: &str, result: Value) -> Arc<Self> {
        self.results.lock().unwrap().insert(method.to_string(), result);
        self
    }

    /// A client that sends every call on its own.
    pub fn web3(self: Arc<Self>) -> Web3 {
        let config = DispatcherConfig::default().with_batching(BatchPolicy::NoBatching);
        Web3::new(self, config).unwrap()
    }

    /// Params of the most recent call to `method`.
    pub fn params_of(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|call| call["method"] == method)
            .map(|call| call["params"].clone())
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| call["method"].as_str().map(str::to_string))
            .collect()
    }

    pub fn envelope_sizes(&self) -> Vec<usize> {
        self.envelope_sizes.lock().unwrap().clone()
    }

    fn answer(&self, request: &Value) -> Value {
        self.calls.lock().unwrap().push(request.clone());
        let method = request["method"].as_str().unwrap_or_default();
        match self.results.lock().unwrap().get(method) {
            Some(result) => json!({"jsonrpc": "2.0", "id": request["id"], "result": result}),
            None => json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": -32601, "message": format!("method {method} not found")}
            }),
        }
    }
}

#[async_trait]
impl Transport for MockNode {
    async fn send(&self, envelope: Value) -> Result<Value, TransportError> {
        match envelope {
            Value::Array(requests) => {
                self.envelope_sizes.lock().unwrap().push(requests.len());
                Ok(Value::Array(requests.iter().map(|r| self.answer(r)).collect()))
            }
            single => {
                self.envelope_sizes.lock().unwrap().push(1);
                Ok(self.answer(&single))
            }
        }
    }
}
