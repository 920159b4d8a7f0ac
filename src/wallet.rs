//! Account selection for outgoing transactions.

use alloy_primitives::Address;

use crate::{Web3, Web3Error};

/// The `wallet` namespace of a [`Web3`] client.
#[derive(Clone, Copy)]
pub struct Wallet<'a> {
    web3: &'a Web3,
}

impl<'a> Wallet<'a> {
    pub(crate) fn new(web3: &'a Web3) -> Self {
        Self { web3 }
    }

    /// Accounts the node can send from.
    pub async fn accounts(&self) -> Result<Vec<Address>, Web3Error> {
        self.web3.eth().accounts().await
    }

    /// The configured sender, else the node's first account.
    pub async fn default_account(&self) -> Result<Option<Address>, Web3Error> {
        if let Some(from) = self.web3.options().from {
            return Ok(Some(from));
        }
        Ok(self.accounts().await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockNode;
    use alloy_primitives::address;
    use serde_json::json;

    #[tokio::test]
    async fn default_account_prefers_options() {
        let configured = address!("0x0000000000000000000000000000000000000042");
        let node = MockNode::new().with("eth_accounts", json!([]));
        let mut web3 = node.clone().web3();
        web3.options_mut().from = Some(configured);

        assert_eq!(web3.wallet().default_account().await.unwrap(), Some(configured));
        assert!(node.methods().is_empty());
    }

    #[tokio::test]
    async fn default_account_falls_back_to_node() {
        let web3 = MockNode::new()
            .with(
                "eth_accounts",
                json!([
                    "0x0000000000000000000000000000000000000001",
                    "0x0000000000000000000000000000000000000002"
                ]),
            )
            .web3();
        assert_eq!(
            web3.wallet().default_account().await.unwrap(),
            Some(address!("0x0000000000000000000000000000000000000001"))
        );
        assert_eq!(web3.wallet().accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_accounts_anywhere() {
        let web3 = MockNode::new().with("eth_accounts", json!([])).web3();
        assert_eq!(web3.wallet().default_account().await.unwrap(), None);
    }
}
