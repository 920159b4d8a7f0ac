//! `personal_*` calls for accounts held by the node.

use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use serde_json::{json, Value};

use crate::{Web3, Web3Error};

/// The `personal` namespace of a [`Web3`] client.
#[derive(Clone, Copy)]
pub struct Personal<'a> {
    web3: &'a Web3,
}

impl<'a> Personal<'a> {
    pub(crate) fn new(web3: &'a Web3) -> Self {
        Self { web3 }
    }

    pub async fn list_accounts(&self) -> Result<Vec<Address>, Web3Error> {
        self.web3.call("personal_listAccounts", vec![]).await
    }

    /// Create a node-held account protected by `password`.
    pub async fn new_account(&self, password: &str) -> Result<Address, Web3Error> {
        self.web3
            .call("personal_newAccount", vec![json!(password)])
            .await
    }

    /// Unlock `address` for `duration`, or the node's default when `None`.
    pub async fn unlock_account(
        &self,
        address: Address,
        password: &str,
        duration: Option<Duration>,
    ) -> Result<bool, Web3Error> {
        let seconds = duration.map_or(Value::Null, |d| json!(d.as_secs()));
        self.web3
            .call(
                "personal_unlockAccount",
                vec![json!(address), json!(password), seconds],
            )
            .await
    }

    /// Sign `message` with the key of `address`.
    pub async fn sign(
        &self,
        message: &[u8],
        address: Address,
        password: &str,
    ) -> Result<Bytes, Web3Error> {
        let data = Bytes::copy_from_slice(message);
        self.web3
            .call(
                "personal_sign",
                vec![json!(data), json!(address), json!(password)],
            )
            .await
    }
}
