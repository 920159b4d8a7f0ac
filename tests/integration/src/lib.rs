//! Integration tests for tidewire.
//!
//! Every test starts an in-process axum JSON-RPC node on an ephemeral port and
//! drives it through the full stack: `Web3` facade, batching dispatcher and
//! HTTP transport.
//!
//! ```bash
//! cargo test -p tidewire-integration-tests
//! ```

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use tidewire::{
        address, Address, BatchPolicy, DispatchError, DispatcherConfig, HttpTransport,
        TransactionRequest, Web3, Web3Error, Web3Options, B256, U256,
    };

    const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    /// A toy chain: balances, nonces and a block counter.
    #[derive(Default)]
    struct Chain {
        balances: HashMap<String, u64>,
        nonces: HashMap<String, u64>,
        block: u64,
    }

    struct Node {
        chain: Mutex<Chain>,
        envelope_sizes: Mutex<Vec<usize>>,
        failing: bool,
    }

    impl Node {
        fn new(failing: bool) -> Arc<Self> {
            let mut chain = Chain {
                block: 100,
                ..Default::default()
            };
            chain.balances.insert(key(&json!(ALICE)), 1_000);
            chain.balances.insert(key(&json!(BOB)), 5);
            Arc::new(Self {
                chain: Mutex::new(chain),
                envelope_sizes: Mutex::new(Vec::new()),
                failing,
            })
        }

        fn http_requests(&self) -> usize {
            self.envelope_sizes.lock().unwrap().len()
        }

        fn total_calls(&self) -> usize {
            self.envelope_sizes.lock().unwrap().iter().sum()
        }

        fn execute(&self, method: &str, params: &Value) -> Result<Value, (i64, String)> {
            let mut chain = self.chain.lock().unwrap();
            match method {
                "eth_chainId" => Ok(json!("0x7a69")),
                "eth_blockNumber" => Ok(json!(format!("0x{:x}", chain.block))),
                "eth_accounts" => Ok(json!([ALICE, BOB])),
                "eth_getBalance" => {
                    let balance = chain.balances.get(&key(&params[0])).copied().unwrap_or(0);
                    Ok(json!(format!("0x{balance:x}")))
                }
                "eth_getTransactionCount" => {
                    let nonce = chain.nonces.get(&key(&params[0])).copied().unwrap_or(0);
                    Ok(json!(format!("0x{nonce:x}")))
                }
                "eth_sendTransaction" => {
                    let tx = &params[0];
                    let from = key(&tx["from"]);
                    let to = key(&tx["to"]);
                    let value = tx["value"]
                        .as_str()
                        .and_then(|v| u64::from_str_radix(v.trim_start_matches("0x"), 16).ok())
                        .unwrap_or(0);
                    let available = chain.balances.get(&from).copied().unwrap_or(0);
                    if available < value {
                        return Err((-32000, "insufficient funds".into()));
                    }
                    chain.balances.insert(from.clone(), available - value);
                    *chain.balances.entry(to).or_default() += value;
                    let nonce = chain.nonces.entry(from).or_default();
                    *nonce += 1;
                    chain.block += 1;
                    Ok(json!(format!("0x{:064x}", chain.block)))
                }
                other => Err((-32601, format!("method {other} not found"))),
            }
        }

        fn answer(&self, request: &Value) -> Value {
            let method = request["method"].as_str().unwrap_or_default();
            match self.execute(method, &request["params"]) {
                Ok(result) => json!({"jsonrpc": "2.0", "id": request["id"], "result": result}),
                Err((code, message)) => json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "error": {"code": code, "message": message}
                }),
            }
        }
    }

    fn key(address: &Value) -> String {
        address.as_str().unwrap_or_default().to_lowercase()
    }

    async fn handle_rpc(State(node): State<Arc<Node>>, Json(body): Json<Value>) -> Response {
        let size = body.as_array().map_or(1, Vec::len);
        node.envelope_sizes.lock().unwrap().push(size);
        if node.failing {
            return StatusCode::BAD_GATEWAY.into_response();
        }

        let slow = match &body {
            Value::Array(requests) => requests.iter().any(|r| r["method"] == "debug_slow"),
            single => single["method"] == "debug_slow",
        };
        if slow {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        let reply = match body {
            // Answer batches in reverse order.
            Value::Array(requests) => Value::Array(requests.iter().rev().map(|r| node.answer(r)).collect()),
            single => node.answer(&single),
        };
        Json(reply).into_response()
    }

    async fn start_node(failing: bool) -> (Arc<Node>, String) {
        let node = Node::new(failing);
        let router = Router::new()
            .route("/", post(handle_rpc))
            .with_state(node.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (node, format!("http://{addr}"))
    }

    fn connect(url: &str, config: DispatcherConfig) -> Web3 {
        let transport = Arc::new(HttpTransport::new(url).unwrap());
        Web3::new(transport, config).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_calls_are_batched_over_http() {
        let (node, url) = start_node(false).await;
        let config = DispatcherConfig::default()
            .with_batching(BatchPolicy::Batch { max_size: 8 })
            .with_linger(Duration::from_millis(20));
        let web3 = Arc::new(connect(&url, config));

        let mut tasks = Vec::new();
        for i in 0..20 {
            let web3 = web3.clone();
            tasks.push(tokio::spawn(async move {
                let who = if i % 2 == 0 { ALICE } else { BOB };
                let balance = web3.eth().get_balance(who, None).await.unwrap();
                (who, balance)
            }));
        }
        for task in tasks {
            let (who, balance) = task.await.unwrap();
            let expected = if who == ALICE { 1_000u64 } else { 5 };
            assert_eq!(balance, U256::from(expected));
        }

        assert_eq!(node.total_calls(), 20);
        assert!(
            node.http_requests() < 20,
            "expected batching, saw {} HTTP requests",
            node.http_requests()
        );
        web3.close().await;
    }

    #[tokio::test]
    async fn unbatched_calls_travel_alone() {
        let (node, url) = start_node(false).await;
        let web3 = connect(
            &url,
            DispatcherConfig::default().with_batching(BatchPolicy::NoBatching),
        );

        assert_eq!(web3.eth().chain_id().await.unwrap(), 31337);
        assert_eq!(web3.eth().block_number().await.unwrap(), 100);
        assert_eq!(*node.envelope_sizes.lock().unwrap(), vec![1, 1]);
    }

    #[tokio::test]
    async fn send_transaction_updates_chain_state() {
        let (_node, url) = start_node(false).await;
        let web3 = connect(&url, DispatcherConfig::default())
            .with_options(Web3Options::default().with_gas_limit(U256::from(21_000)));

        let tx = TransactionRequest::default()
            .with_to(BOB)
            .with_value(U256::from(250));
        // No sender configured: the first node account (ALICE) is used.
        let hash = web3.browser_functions().send_transaction(tx).await.unwrap();
        assert_ne!(hash, B256::ZERO);

        let eth = web3.eth();
        let (alice, bob, nonce, block) = tokio::join!(
            eth.get_balance(ALICE, None),
            eth.get_balance(BOB, None),
            eth.get_transaction_count(ALICE, None),
            eth.block_number(),
        );
        assert_eq!(alice.unwrap(), U256::from(750));
        assert_eq!(bob.unwrap(), U256::from(255));
        assert_eq!(nonce.unwrap(), 1);
        assert_eq!(block.unwrap(), 101);
    }

    #[tokio::test]
    async fn rpc_errors_reach_only_their_caller() {
        let (_node, url) = start_node(false).await;
        let web3 = connect(
            &url,
            DispatcherConfig::default().with_batching(BatchPolicy::Batch { max_size: 3 }),
        );

        let tx = TransactionRequest::default()
            .with_from(BOB)
            .with_to(ALICE)
            .with_value(U256::from(1_000_000));
        let browser = web3.browser_functions();
        let eth = web3.eth();
        let (sent, chain, unknown) = tokio::join!(
            browser.send_transaction(tx),
            eth.chain_id(),
            web3.call::<Value>("eth_unknown", vec![]),
        );

        match sent.unwrap_err() {
            Web3Error::Rpc(e) => assert_eq!(e.message, "insufficient funds"),
            other => panic!("expected rpc error, got {other:?}"),
        }
        assert_eq!(chain.unwrap(), 31337);
        match unknown.unwrap_err() {
            Web3Error::Rpc(e) => assert_eq!(e.code, -32601),
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_failure_fails_every_batch_member() {
        let (_node, url) = start_node(true).await;
        let web3 = connect(
            &url,
            DispatcherConfig::default().with_batching(BatchPolicy::Batch { max_size: 2 }),
        );

        let eth = web3.eth();
        let (block, chain) = tokio::join!(eth.block_number(), eth.chain_id());
        for result in [block, chain] {
            match result.unwrap_err() {
                Web3Error::Dispatch(DispatchError::TransportFailure(reason)) => {
                    assert!(reason.contains("502"), "{reason}")
                }
                other => panic!("expected transport failure, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn slow_call_times_out_without_blocking_others() {
        let (_node, url) = start_node(false).await;
        let config = DispatcherConfig::default()
            .with_batching(BatchPolicy::NoBatching)
            .with_request_timeout(Duration::from_millis(100));
        let web3 = connect(&url, config);

        let eth = web3.eth();
        let (slow, fast) = tokio::join!(
            web3.call::<Value>("debug_slow", vec![]),
            eth.chain_id(),
        );
        assert!(matches!(
            slow.unwrap_err(),
            Web3Error::Dispatch(DispatchError::Timeout(_))
        ));
        assert_eq!(fast.unwrap(), 31337);
    }

    #[tokio::test]
    async fn close_rejects_later_calls() {
        let (_node, url) = start_node(false).await;
        let web3 = connect(&url, DispatcherConfig::default());

        assert_eq!(web3.eth().accounts().await.unwrap(), vec![ALICE, BOB]);
        web3.close().await;
        assert!(matches!(
            web3.eth().accounts().await.unwrap_err(),
            Web3Error::Dispatch(DispatchError::DispatcherClosed)
        ));
    }

    #[tokio::test]
    async fn shared_dispatcher_across_clients() {
        let (node, url) = start_node(false).await;
        let primary = connect(
            &url,
            DispatcherConfig::default().with_batching(BatchPolicy::Batch { max_size: 2 }),
        );
        let secondary = Web3::with_dispatcher(primary.dispatcher().clone());

        let (primary_eth, secondary_eth) = (primary.eth(), secondary.eth());
        let (a, b) = tokio::join!(primary_eth.chain_id(), secondary_eth.block_number());
        assert_eq!(a.unwrap(), 31337);
        assert_eq!(b.unwrap(), 100);
        assert_eq!(*node.envelope_sizes.lock().unwrap(), vec![2]);
    }
}
