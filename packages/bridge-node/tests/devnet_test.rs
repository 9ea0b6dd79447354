//! End-to-end tests for the devnet node
//!
//! Most tests spawn a full node (chains, attester workers, relayer) and its
//! HTTP API on an ephemeral port, then drive it only through HTTP and the
//! public `Network` handle.

use std::sync::Arc;
use std::time::Duration;

use bridge_core::{parse_account, AttestationSigner, DomainId};
use bridge_node::config::{Config, LogFormat};
use bridge_node::metrics::Metrics;
use bridge_node::network::Network;
use bridge_node::node::Node;
use bridge_node::relayer::RelayerStats;
use bridge_node::server::{self, AppState};
use bridge_node::store::AttestationStore;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const ALICE: &str = "0x00000000000000000000000000000000000a11ce";
const BOB: &str = "0x0000000000000000000000000000000000000b0b";

fn attester_keys(n: u8) -> Vec<String> {
    (1..=n).map(|i| format!("0x{}", hex::encode([i; 32]))).collect()
}

fn test_config() -> Config {
    let attester_keys = attester_keys(5);
    let governance_signers = attester_keys
        .iter()
        .map(|k| {
            let signer = AttestationSigner::from_private_key(k).unwrap();
            format!("0x{}", hex::encode(signer.address()))
        })
        .collect();

    Config {
        attester_keys,
        domains: vec![
            (DomainId::from_u32(1), "ethereum".to_string()),
            (DomainId::from_u32(2), "terra-classic".to_string()),
        ],
        oracle_domains: vec![DomainId::from_u32(2)],
        quorum_min_signatures: 3,
        quorum_total: 5,
        governance_signers,
        governance_threshold: 3,
        governance_hrp: "terra".to_string(),
        max_message_body_size: 8 * 1024,
        poll_interval_ms: 20,
        retry_initial_backoff_ms: 20,
        retry_max_backoff_ms: 100,
        settled_cache_size: 1000,
        settled_cache_ttl_secs: 3600,
        api_bind_address: "127.0.0.1".to_string(),
        api_port: 0,
        log_format: LogFormat::Text,
    }
}

struct TestNode {
    node: Node,
    base: String,
    client: reqwest::Client,
    api: tokio::task::JoinHandle<()>,
}

impl TestNode {
    async fn start() -> Self {
        let config = test_config();
        config.validate().unwrap();

        let node = Node::spawn(&config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = node.app_state();
        let api = tokio::spawn(async move {
            server::serve(listener, state).await.unwrap();
        });

        Self {
            node,
            base,
            client: reqwest::Client::new(),
            api,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base, path))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .unwrap()
    }

    async fn get_json(&self, path: &str) -> Value {
        let resp = self.get(path).await;
        assert!(resp.status().is_success(), "GET {} -> {}", path, resp.status());
        resp.json().await.unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .unwrap()
    }

    async fn balance(&self, domain: u32, account: &str) -> String {
        let body = self
            .get_json(&format!("/domains/{}/balances/{}", domain, account))
            .await;
        body["balance"].as_str().unwrap().to_string()
    }

    /// Poll the message status until it matches or the deadline passes.
    async fn wait_for_status(&self, source: u32, nonce: u64, status: &str) -> Value {
        let mut last = Value::Null;
        for _ in 0..200 {
            last = self
                .get_json(&format!("/messages/{}/{}", source, nonce))
                .await;
            if last["status"] == status {
                return last;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("message {}/{} never reached {}: {}", source, nonce, status, last);
    }

    async fn stop(self) {
        self.api.abort();
        self.node.shutdown().await;
    }
}

#[tokio::test]
async fn test_health_and_readiness() {
    let t = TestNode::start().await;

    assert_eq!(t.get("/healthz").await.text().await.unwrap(), "OK");

    let mut ready = String::new();
    for _ in 0..100 {
        ready = t.get("/readyz").await.text().await.unwrap();
        if ready == "OK" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(ready, "OK");

    let health = t.get_json("/health").await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["domains"], 2);
    assert_eq!(health["conservation_ok"], true);
    assert_eq!(health["governance"], t.node.network.governance().to_string());

    let domains = t.get_json("/domains").await;
    let domains = domains.as_array().unwrap();
    assert_eq!(domains.len(), 2);
    assert_eq!(domains[0]["name"], "ethereum");
    assert_eq!(domains[1]["policy"], "3-of-5");
    assert_eq!(domains[1]["attester_count"], 5);

    t.stop().await;
}

#[tokio::test]
async fn test_burn_attest_relay_mint() {
    let t = TestNode::start().await;

    let resp = t
        .post("/domains/1/faucet", json!({ "account": ALICE, "amount": "1000" }))
        .await;
    assert!(resp.status().is_success());

    let resp = t
        .post(
            "/domains/1/deposits",
            json!({ "caller": ALICE, "amount": "400", "dest_domain": 2, "recipient": BOB }),
        )
        .await;
    assert!(resp.status().is_success());
    let deposit: Value = resp.json().await.unwrap();
    assert_eq!(deposit["nonce"], 0);

    let status = t.wait_for_status(1, 0, "processed").await;
    assert!(status["valid_attestations"].as_u64().unwrap() >= 3);
    assert_eq!(status["required"], 3);
    assert!(status["processed_at"].is_string());
    assert_eq!(status["hash"], deposit["hash"]);

    assert_eq!(t.balance(1, ALICE).await, "600");
    assert_eq!(t.balance(2, BOB).await, "400");

    let ledger = t.get_json("/ledger").await;
    assert_eq!(ledger["total_locked"], "0");
    assert_eq!(ledger["settled"], 1);
    assert_eq!(ledger["conservation_ok"], true);
    assert!(ledger["in_transit"].as_array().unwrap().is_empty());

    let metrics = t.get("/metrics").await.text().await.unwrap();
    assert!(metrics.contains("bridge_messages_delivered_total 1"));

    t.stop().await;
}

#[tokio::test]
async fn test_message_waits_for_quorum_then_delivers() {
    let t = TestNode::start().await;
    let network = t.node.network.clone();
    let dest = DomainId::from_u32(2);

    // Leave the destination with two active attesters: below 3-of-5.
    let attesters: Vec<_> = network
        .registry(dest)
        .unwrap()
        .attesters()
        .into_iter()
        .map(|a| a.address)
        .collect();
    for addr in &attesters[..3] {
        network.remove_attester(dest, *addr).await.unwrap();
    }
    assert_eq!(t.get("/readyz").await.text().await.unwrap(), "NOT_READY");

    t.post("/domains/1/faucet", json!({ "account": ALICE, "amount": "50" }))
        .await;
    let resp = t
        .post(
            "/domains/1/deposits",
            json!({ "caller": ALICE, "amount": "50", "dest_domain": 2, "recipient": BOB }),
        )
        .await;
    assert!(resp.status().is_success());

    // All five workers sign, but only two signatures count on the destination.
    let mut status = Value::Null;
    for _ in 0..100 {
        status = t.get_json("/messages/1/0").await;
        if status["attestations"] == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status["attestations"], 5);
    assert_eq!(status["valid_attestations"], 2);
    assert_eq!(status["status"], "sent");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(t.balance(2, BOB).await, "0");

    let ledger = t.get_json("/ledger/1").await;
    assert_eq!(ledger["total_locked"], "50");

    // Restoring one attester makes the already-published signatures count again.
    network.register_attester(dest, attesters[0]).await.unwrap();
    t.wait_for_status(1, 0, "processed").await;
    assert_eq!(t.balance(2, BOB).await, "50");

    t.stop().await;
}

#[tokio::test]
async fn test_paused_destination_defers_delivery() {
    let t = TestNode::start().await;
    let network = t.node.network.clone();
    network.pause(DomainId::from_u32(2)).await.unwrap();

    t.post("/domains/1/faucet", json!({ "account": ALICE, "amount": "10" }))
        .await;
    t.post(
        "/domains/1/deposits",
        json!({ "caller": ALICE, "amount": "10", "dest_domain": 2, "recipient": BOB }),
    )
    .await;

    t.wait_for_status(1, 0, "attested").await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(t.balance(2, BOB).await, "0");

    network.unpause(DomainId::from_u32(2)).await.unwrap();
    t.wait_for_status(1, 0, "processed").await;
    assert_eq!(t.balance(2, BOB).await, "10");

    t.stop().await;
}

#[tokio::test]
async fn test_api_errors() {
    let t = TestNode::start().await;

    // Unknown domain
    let resp = t.get("/domains/99/attesters").await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "unknown_domain");

    // Unknown message
    assert_eq!(t.get("/messages/1/7").await.status(), 404);

    // Malformed address and amount
    assert_eq!(t.get("/domains/1/balances/not-an-address").await.status(), 400);
    let resp = t
        .post("/domains/1/faucet", json!({ "account": ALICE, "amount": "-5" }))
        .await;
    assert_eq!(resp.status(), 400);

    // Burn without funds changes nothing
    let resp = t
        .post(
            "/domains/1/deposits",
            json!({ "caller": ALICE, "amount": "1", "dest_domain": 2, "recipient": BOB }),
        )
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "insufficient_balance");
    assert_eq!(t.get_json("/ledger").await["total_locked"], "0");

    // Deposit toward a domain the devnet does not host
    t.post("/domains/1/faucet", json!({ "account": ALICE, "amount": "5" }))
        .await;
    let resp = t
        .post(
            "/domains/1/deposits",
            json!({ "caller": ALICE, "amount": "5", "dest_domain": 42, "recipient": BOB }),
        )
        .await;
    assert_eq!(resp.status(), 404);
    assert_eq!(t.balance(1, ALICE).await, "5");

    // Attester lookup
    let attesters = t.get_json("/domains/2/attesters").await;
    let first = attesters[0]["address"].as_str().unwrap().to_string();
    let status = t
        .get_json(&format!("/domains/2/attesters/{}", first))
        .await;
    assert_eq!(status["is_attester"], true);
    let status = t.get_json(&format!("/domains/2/attesters/{}", BOB)).await;
    assert_eq!(status["is_attester"], false);

    t.stop().await;
}

#[tokio::test]
async fn test_oracle_read_surface() {
    let t = TestNode::start().await;

    let oracles = t.get_json("/domains/2/oracles").await;
    assert_eq!(oracles["policy"], "3-of-5");
    assert_eq!(oracles["oracle_count"], 5);
    let first = oracles["oracles"][0].as_str().unwrap().to_string();

    let status = t.get_json(&format!("/domains/2/oracles/{}", first)).await;
    assert_eq!(status["is_oracle"], true);
    let status = t.get_json(&format!("/domains/2/oracles/{}", BOB)).await;
    assert_eq!(status["is_oracle"], false);

    t.stop().await;
}

/// Relay submission against a network with no relayer of its own
#[tokio::test]
async fn test_submit_message_with_attestations() {
    let config = test_config();
    let network = Arc::new(Network::from_config(&config).unwrap());
    let state = AppState {
        network: network.clone(),
        store: Arc::new(AttestationStore::new()),
        stats: Arc::new(tokio::sync::RwLock::new(RelayerStats::default())),
        metrics: Arc::new(Metrics::new()),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let api = tokio::spawn(async move {
        server::serve(listener, state).await.unwrap();
    });
    let client = reqwest::Client::new();

    let source = DomainId::from_u32(1);
    let dest = DomainId::from_u32(2);
    let alice = parse_account(ALICE).unwrap();
    let bob = parse_account(BOB).unwrap();
    network.fund(source, alice, 30).await.unwrap();
    let first = network
        .deposit_for_burn(source, alice, 20, dest, bob)
        .await
        .unwrap();
    let second = network
        .deposit_for_burn(source, alice, 10, dest, bob)
        .await
        .unwrap();

    let signers = config.attester_signers().unwrap();
    let sign = |message: &bridge_core::Message, n: usize| -> Vec<bridge_core::Attestation> {
        signers[..n].iter().map(|s| s.attest(message).unwrap()).collect()
    };

    let submit = |message: bridge_core::Message, attestations: Vec<bridge_core::Attestation>| {
        let client = client.clone();
        let url = format!("{}/messages", base);
        async move {
            client
                .post(url)
                .json(&json!({ "message": message, "attestations": attestations }))
                .send()
                .await
                .unwrap()
        }
    };

    let resp = submit(first.clone(), sign(&first, 3)).await;
    assert!(resp.status().is_success());
    let record: Value = resp.json().await.unwrap();
    assert_eq!(record["nonce"], 0);
    assert_eq!(network.balance_of(dest, bob).await.unwrap(), 20);

    let resp = submit(first.clone(), sign(&first, 4)).await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "duplicate_nonce");

    let resp = submit(second.clone(), sign(&second, 2)).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "insufficient_attestations");
    assert_eq!(network.ledger().locked_for_chain(source), 10);

    api.abort();
}
