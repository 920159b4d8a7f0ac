//! # tidewire
//!
//! A Web3 client whose calls all flow through one batching JSON-RPC
//! [`RequestDispatcher`]. Calls issued from many tasks are coalesced into
//! batches, sent over a shared [`Transport`], and answered per caller.
//!
//! ## Namespaces
//!
//! - [`Eth`]: chain-state queries (`eth_*`)
//! - [`Personal`]: node-managed accounts (`personal_*`)
//! - [`Wallet`]: account selection
//! - [`BrowserFunctions`]: browser-style helpers that fill in [`Web3Options`]

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod browser;
pub mod eth;
pub mod options;
pub mod personal;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use browser::BrowserFunctions;
pub use eth::Eth;
pub use options::{BlockTag, TransactionRequest, Web3Options};
pub use personal::Personal;
pub use wallet::Wallet;

pub use alloy_primitives::{address, Address, Bytes, B256, U256};
pub use tidewire_core::config::{BatchPolicy, ConfigError, DispatcherConfig, IdStrategy};
pub use tidewire_core::types::{Request, RequestId, Response, RpcError};
pub use tidewire_rpc::{
    DispatchError, HttpTransport, RequestDispatcher, ResponseHandle, Transport, TransportError,
};

/// Linger applied by [`Web3::new`] when a batching policy has none.
pub const DEFAULT_LINGER: Duration = Duration::from_millis(10);

/// Errors from the namespace facades.
#[derive(Debug, Error)]
pub enum Web3Error {
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("no account available to send from")]
    NoAccount,
}

/// A client bound to one dispatcher and one set of default options.
pub struct Web3 {
    dispatcher: RequestDispatcher,
    options: Web3Options,
}

impl Web3 {
    /// Create a client with its own dispatcher over `transport`.
    ///
    /// Under a batching policy a missing `linger` is set to [`DEFAULT_LINGER`]
    /// so that an awaited call is sent even when its batch never fills.
    pub fn new(transport: Arc<dyn Transport>, config: DispatcherConfig) -> Result<Self, ConfigError> {
        let config = match config.linger {
            None if config.batching.is_batching() => config.with_linger(DEFAULT_LINGER),
            _ => config,
        };
        Ok(Self::with_dispatcher(RequestDispatcher::new(transport, config)?))
    }

    /// Create a client over an existing dispatcher, possibly shared with
    /// other clients.
    pub fn with_dispatcher(dispatcher: RequestDispatcher) -> Self {
        Self {
            dispatcher,
            options: Web3Options::default(),
        }
    }

    /// Replace the default options.
    pub fn with_options(mut self, options: Web3Options) -> Self {
        self.options = options;
        self
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn options(&self) -> &Web3Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Web3Options {
        &mut self.options
    }

    /// Add a raw request to the dispatch queue.
    pub fn dispatch(&self, request: Request) -> ResponseHandle {
        self.dispatcher.dispatch(request)
    }

    /// Issue `method` and decode its result as `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, Web3Error> {
        let response = self.dispatch(Request::new(method, params)).await?;
        debug!(%method, id = %response.id, "call answered");
        let result = response.into_result()?;
        serde_json::from_value(result).map_err(|e| Web3Error::Decode(format!("{method}: {e}")))
    }

    /// Send the open batch now.
    pub fn flush(&self) {
        self.dispatcher.flush();
    }

    /// Shut the underlying dispatcher down.
    pub async fn close(&self) {
        self.dispatcher.close().await;
    }

    pub fn eth(&self) -> Eth<'_> {
        Eth::new(self)
    }

    pub fn personal(&self) -> Personal<'_> {
        Personal::new(self)
    }

    pub fn wallet(&self) -> Wallet<'_> {
        Wallet::new(self)
    }

    pub fn browser_functions(&self) -> BrowserFunctions<'_> {
        BrowserFunctions::new(self)
    }
}
