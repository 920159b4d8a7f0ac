//! Client-wide defaults and the transaction object shared by the namespaces.

use std::fmt;

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize, Serializer};

/// Block selector passed to state queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockTag {
    #[default]
    Latest,
    Earliest,
    Pending,
    Number(u64),
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => f.write_str("latest"),
            BlockTag::Earliest => f.write_str("earliest"),
            BlockTag::Pending => f.write_str("pending"),
            BlockTag::Number(n) => write!(f, "0x{n:x}"),
        }
    }
}

impl Serialize for BlockTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Defaults applied by the namespaces when a call leaves them out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Web3Options {
    /// Sender for transactions that name none.
    pub from: Option<Address>,
    /// Gas limit for transactions that name none.
    pub gas_limit: Option<U256>,
    /// Gas price for transactions that name none.
    pub gas_price: Option<U256>,
    /// Value for transactions that name none.
    pub value: Option<U256>,
    /// Block used by state queries that name none.
    pub default_block: BlockTag,
}

impl Web3Options {
    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_default_block(mut self, block: BlockTag) -> Self {
        self.default_block = block;
        self
    }
}

/// Transaction object as sent to `eth_call`, `eth_estimateGas` and
/// `eth_sendTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
}

impl TransactionRequest {
    pub fn with_to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Fill every field left unset from `options`.
    pub fn with_defaults(mut self, options: &Web3Options) -> Self {
        self.from = self.from.or(options.from);
        self.gas = self.gas.or(options.gas_limit);
        self.gas_price = self.gas_price.or(options.gas_price);
        self.value = self.value.or(options.value);
        self
    }
}
