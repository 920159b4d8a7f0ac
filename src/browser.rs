//! Browser-style helpers in the shape injected providers expose.
//!
//! Transactions passed here are completed from the client's [`Web3Options`]
//! before they are sent.
//!
//! [`Web3Options`]: crate::Web3Options

use alloy_primitives::{Address, Bytes, B256, U256};
use serde_json::json;
use tracing::debug;

use crate::options::TransactionRequest;
use crate::{Web3, Web3Error};

/// The `browser_functions` namespace of a [`Web3`] client.
#[derive(Clone, Copy)]
pub struct BrowserFunctions<'a> {
    web3: &'a Web3,
}

impl<'a> BrowserFunctions<'a> {
    pub(crate) fn new(web3: &'a Web3) -> Self {
        Self { web3 }
    }

    pub async fn get_accounts(&self) -> Result<Vec<Address>, Web3Error> {
        self.web3.eth().accounts().await
    }

    /// First account of the node, if any.
    pub async fn get_coinbase(&self) -> Result<Option<Address>, Web3Error> {
        Ok(self.get_accounts().await?.into_iter().next())
    }

    pub async fn personal_sign(
        &self,
        message: &[u8],
        address: Address,
        password: &str,
    ) -> Result<Bytes, Web3Error> {
        self.web3.personal().sign(message, address, password).await
    }

    /// Estimate gas for `tx` after filling it from the client options.
    pub async fn estimate_gas(&self, tx: TransactionRequest) -> Result<U256, Web3Error> {
        let tx = tx.with_defaults(self.web3.options());
        self.web3.eth().estimate_gas(&tx).await
    }

    /// Send `tx` from a node-held account and return the transaction hash.
    ///
    /// Missing fields come from the client options; a missing sender falls
    /// back to the default wallet account.
    pub async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, Web3Error> {
        let mut tx = tx.with_defaults(self.web3.options());
        if tx.from.is_none() {
            tx.from = Some(
                self.web3
                    .wallet()
                    .default_account()
                    .await?
                    .ok_or(Web3Error::NoAccount)?,
            );
        }
        debug!(from = ?tx.from, to = ?tx.to, "sending transaction");
        self.web3
            .call("eth_sendTransaction", vec![json!(tx)])
            .await
    }
}
