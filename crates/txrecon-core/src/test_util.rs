//! Shared test helpers for `txrecon-core` unit tests.
//!
//! Consolidates fixture builders for both providers' native shapes and the
//! fake provider implementations used by the orchestrator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Barrier;

use crate::error::CoreError;
use crate::providers::{ExplorerSource, IndexerSource};
use crate::types::{ExplorerPage, TxFilter};

// ==============================================================================
// Fixture Builders
// ==============================================================================

/// A deterministic 96-character hex hash distinguished by one byte.
pub fn hash_hex(b: u8) -> String {
    format!("{b:02x}").repeat(48)
}

/// The filter triple the reconciliation scenarios use.
pub fn scenario_filter() -> TxFilter {
    TxFilter::new(26027, "kpay.live", 657983)
}

/// A minimal decodable indexer row. `hash` is stored with the binary
/// escape prefix, as the indexer returns it.
pub fn indexer_row(hash: &str, valid_start_ns: &str) -> Value {
    json!({
        "consensus_timestamp": valid_start_ns,
        "valid_start_ns": valid_start_ns,
        "payer_account_id": 26027,
        "node_account_id": 3,
        "charged_tx_fee": 100_000,
        "result": 22,
        "decoded_memo": "kpay.live",
        "transaction_hash": format!("\\x{hash}"),
        "crypto_transfer": [
            { "entity_id": 26027, "amount": -1_100_000 },
            { "entity_id": 657983, "amount": 1_000_000 },
            { "entity_id": 3, "amount": 5_000 },
            { "entity_id": 98, "amount": 95_000 }
        ],
        "token_transfer": []
    })
}

/// An indexer `data` payload holding one row per hash.
pub fn indexer_payload(hashes: &[String]) -> Value {
    let rows: Vec<Value> = hashes
        .iter()
        .enumerate()
        .map(|(i, hash)| indexer_row(hash, &format!("1700000000{:09}", i)))
        .collect();
    json!({ "transaction": rows })
}

/// An explorer page holding one reference-format record per hash.
pub fn explorer_page(hashes: &[String]) -> ExplorerPage {
    let data: Vec<Value> = hashes
        .iter()
        .map(|hash| {
            json!({
                "transactionHash": hash,
                "payerID": "0.0.26027",
                "memo": "kpay.live",
                "status": "SUCCESS"
            })
        })
        .collect();
    ExplorerPage {
        size: data.len() as u64,
        total_count: data.len() as u64,
        data,
        ..ExplorerPage::default()
    }
}

// ==============================================================================
// Fake Providers
// ==============================================================================

pub enum FakeBehavior<T> {
    Respond(T),
    Fail,
    Hang,
    /// Respond only after the other provider has also been called.
    RespondAfter(Arc<Barrier>, T),
}

pub struct FakeExplorer {
    pub behavior: FakeBehavior<ExplorerPage>,
    pub calls: AtomicUsize,
}

pub struct FakeIndexer {
    pub behavior: FakeBehavior<Value>,
    pub calls: AtomicUsize,
}

impl FakeExplorer {
    pub fn new(behavior: FakeBehavior<ExplorerPage>) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeIndexer {
    pub fn new(behavior: FakeBehavior<Value>) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }
}

async fn play<T: Clone>(behavior: &FakeBehavior<T>) -> Result<T, CoreError> {
    match behavior {
        FakeBehavior::Respond(value) => Ok(value.clone()),
        FakeBehavior::Fail => Err(CoreError::InvalidResponse(
            "simulated upstream outage".to_owned(),
        )),
        FakeBehavior::Hang => std::future::pending().await,
        FakeBehavior::RespondAfter(barrier, value) => {
            barrier.wait().await;
            Ok(value.clone())
        }
    }
}

#[async_trait]
impl ExplorerSource for FakeExplorer {
    async fn fetch_transactions(&self, _filter: &TxFilter) -> Result<ExplorerPage, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        play(&self.behavior).await
    }
}

#[async_trait]
impl IndexerSource for FakeIndexer {
    async fn fetch_transactions(&self, _filter: &TxFilter) -> Result<Value, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        play(&self.behavior).await
    }
}
