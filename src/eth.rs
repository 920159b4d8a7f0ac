//! `eth_*` chain-state queries.

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde_json::json;

use crate::options::{BlockTag, TransactionRequest};
use crate::{Web3, Web3Error};

/// The `eth` namespace of a [`Web3`] client.
#[derive(Clone, Copy)]
pub struct Eth<'a> {
    web3: &'a Web3,
}

impl<'a> Eth<'a> {
    pub(crate) fn new(web3: &'a Web3) -> Self {
        Self { web3 }
    }

    fn block_or_default(&self, block: Option<BlockTag>) -> BlockTag {
        block.unwrap_or(self.web3.options().default_block)
    }

    /// Number of the most recent block.
    pub async fn block_number(&self) -> Result<u64, Web3Error> {
        let number: U64 = self.web3.call("eth_blockNumber", vec![]).await?;
        Ok(number.to())
    }

    pub async fn chain_id(&self) -> Result<u64, Web3Error> {
        let id: U64 = self.web3.call("eth_chainId", vec![]).await?;
        Ok(id.to())
    }

    /// Current gas price in wei.
    pub async fn gas_price(&self) -> Result<U256, Web3Error> {
        self.web3.call("eth_gasPrice", vec![]).await
    }

    /// Balance of `address` in wei at `block` (the default block when `None`).
    pub async fn get_balance(
        &self,
        address: Address,
        block: Option<BlockTag>,
    ) -> Result<U256, Web3Error> {
        let block = self.block_or_default(block);
        self.web3
            .call("eth_getBalance", vec![json!(address), json!(block)])
            .await
    }

    pub async fn get_transaction_count(
        &self,
        address: Address,
        block: Option<BlockTag>,
    ) -> Result<u64, Web3Error> {
        let block = self.block_or_default(block);
        let count: U64 = self
            .web3
            .call("eth_getTransactionCount", vec![json!(address), json!(block)])
            .await?;
        Ok(count.to())
    }

    pub async fn get_code(
        &self,
        address: Address,
        block: Option<BlockTag>,
    ) -> Result<Bytes, Web3Error> {
        let block = self.block_or_default(block);
        self.web3
            .call("eth_getCode", vec![json!(address), json!(block)])
            .await
    }

    /// Accounts managed by the node.
    pub async fn accounts(&self) -> Result<Vec<Address>, Web3Error> {
        self.web3.call("eth_accounts", vec![]).await
    }

    /// Broadcast a signed transaction and return its hash.
    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, Web3Error> {
        self.web3
            .call("eth_sendRawTransaction", vec![json!(raw)])
            .await
    }

    /// Execute `tx` against `block` without creating a transaction.
    pub async fn call(
        &self,
        tx: &TransactionRequest,
        block: Option<BlockTag>,
    ) -> Result<Bytes, Web3Error> {
        let block = self.block_or_default(block);
        self.web3.call("eth_call", vec![json!(tx), json!(block)]).await
    }

    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, Web3Error> {
        self.web3.call("eth_estimateGas", vec![json!(tx)]).await
    }
}
