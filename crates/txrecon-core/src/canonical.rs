//! Indexer-native transactions and their mapping into the reference format.
//!
//! The explorer's record shape is the reference; indexer rows are converted
//! field by field so both sources can be listed side by side.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::hashes::clean_hash;
use crate::types::{NanoTimestamp, ReferencePage, Source};

/// Indexer result code for a successful transaction.
pub const SUCCESS_RESULT_CODE: i32 = 22;

const CRYPTO_TRANSFER_TYPE: &str = "CRYPTO_TRANSFER";
const CRYPTO_TRANSFER_LABEL: &str = "Crypto Transfer";
const CRYPTO_SERVICE: &str = "CRYPTO";

// ==============================================================================
// Indexer-Native Shape
// ==============================================================================

/// One row of the indexer's `transaction` collection.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerTransaction {
    pub consensus_timestamp: NanoTimestamp,
    pub valid_start_ns: NanoTimestamp,
    pub payer_account_id: u64,
    #[serde(default)]
    pub node_account_id: Option<u64>,
    #[serde(default)]
    pub charged_tx_fee: i64,
    pub result: i32,
    #[serde(default)]
    pub decoded_memo: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub crypto_transfer: Vec<CryptoTransfer>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub token_transfer: Vec<TokenTransfer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CryptoTransfer {
    pub entity_id: u64,
    pub amount: i64,
}

/// Decoded for completeness; not used by the canonical mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenTransfer {
    pub token_id: u64,
    pub account_id: u64,
    pub amount: i64,
}

pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ==============================================================================
// Reference Format
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Success,
    Failed,
}

impl TxStatus {
    pub fn from_result_code(code: i32) -> Self {
        if code == SUCCESS_RESULT_CODE {
            Self::Success
        } else {
            Self::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalTransfer {
    #[serde(rename = "accountID")]
    pub account_id: String,
    pub amount: i64,
}

/// A transaction in the explorer's reference format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTransaction {
    #[serde(rename = "transactionID")]
    pub transaction_id: String,
    #[serde(rename = "readableTransactionID")]
    pub readable_transaction_id: String,
    pub transaction_hash: String,
    #[serde(rename = "payerID")]
    pub payer_id: String,
    pub start_time: String,
    pub consensus_time: String,
    #[serde(rename = "nodeID")]
    pub node_id: Option<String>,
    pub transaction_fee: i64,
    pub node_fees: i64,
    pub network_fees: i64,
    pub transfers: Vec<CanonicalTransfer>,
    pub status: TxStatus,
    /// Mirrors `transaction_fee`, not the sum of transfers.
    pub amount: i64,
    pub memo: String,
    pub transaction_type: &'static str,
    pub transaction_type_label: &'static str,
    pub service_type: &'static str,
    pub source: Source,
}

/// Aggregate counts published next to a canonical listing.
///
/// Every record is bucketed as a crypto transfer; the indexer query only
/// selects transfer-bearing transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalFacets {
    #[serde(rename = "payerID", skip_serializing_if = "BTreeMap::is_empty")]
    pub payer_id: BTreeMap<String, u64>,
    #[serde(rename = "transactionType", skip_serializing_if = "BTreeMap::is_empty")]
    pub transaction_type: BTreeMap<String, u64>,
    #[serde(rename = "serviceType", skip_serializing_if = "BTreeMap::is_empty")]
    pub service_type: BTreeMap<String, u64>,
}

pub type CanonicalPage = ReferencePage<CanonicalTransaction, CanonicalFacets>;

// ==============================================================================
// Conversion
// ==============================================================================

fn account_ref(id: u64) -> String {
    format!("0.0.{id}")
}

/// Fee paid to the submitting node: the first strictly positive transfer
/// credited to the node account, or zero.
fn node_fee(tx: &IndexerTransaction) -> i64 {
    let Some(node) = tx.node_account_id else {
        return 0;
    };
    tx.crypto_transfer
        .iter()
        .find(|transfer| transfer.entity_id == node && transfer.amount > 0)
        .map_or(0, |transfer| transfer.amount)
}

/// Convert one indexer row into the reference format.
pub fn canonicalize_transaction(
    tx: &IndexerTransaction,
) -> Result<CanonicalTransaction, CoreError> {
    let valid_start = tx.valid_start_ns;
    let node_fees = node_fee(tx);

    Ok(CanonicalTransaction {
        transaction_id: format!("{:08}{}", tx.payer_account_id, valid_start),
        readable_transaction_id: format!(
            "0.0.{}@{}.{:09}",
            tx.payer_account_id,
            valid_start.seconds(),
            valid_start.nanos()
        ),
        transaction_hash: tx
            .transaction_hash
            .as_deref()
            .map(clean_hash)
            .unwrap_or_default(),
        payer_id: account_ref(tx.payer_account_id),
        start_time: valid_start.to_iso8601()?,
        consensus_time: tx.consensus_timestamp.to_iso8601()?,
        node_id: tx.node_account_id.map(account_ref),
        transaction_fee: tx.charged_tx_fee,
        node_fees,
        network_fees: tx.charged_tx_fee - node_fees,
        transfers: tx
            .crypto_transfer
            .iter()
            .map(|transfer| CanonicalTransfer {
                account_id: account_ref(transfer.entity_id),
                amount: transfer.amount,
            })
            .collect(),
        status: TxStatus::from_result_code(tx.result),
        amount: tx.charged_tx_fee,
        memo: tx.decoded_memo.clone().unwrap_or_default(),
        transaction_type: CRYPTO_TRANSFER_TYPE,
        transaction_type_label: CRYPTO_TRANSFER_LABEL,
        service_type: CRYPTO_SERVICE,
        source: Source::Hgraph,
    })
}

/// Convert an indexer `data` payload (`{transaction: [...]}`) into a
/// reference-format page.
///
/// Returns the zero page when `transaction` is absent or not a list. Rows
/// that fail to decode are logged and skipped.
pub fn canonicalize(payload: &Value) -> CanonicalPage {
    let Some(rows) = payload.get("transaction").and_then(Value::as_array) else {
        return CanonicalPage::default();
    };

    let data: Vec<CanonicalTransaction> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let converted = IndexerTransaction::deserialize(row)
                .map_err(|e| CoreError::InvalidResponse(e.to_string()))
                .and_then(|tx| canonicalize_transaction(&tx));
            match converted {
                Ok(tx) => Some(tx),
                Err(err) => {
                    tracing::warn!(index, error = %err, "skipping undecodable indexer transaction");
                    None
                }
            }
        })
        .collect();

    let facets = build_facets(&data);
    let count = data.len() as u64;

    CanonicalPage {
        size: count,
        total_count: count,
        data,
        facets,
        mapping: None,
    }
}

fn build_facets(data: &[CanonicalTransaction]) -> CanonicalFacets {
    let mut facets = CanonicalFacets::default();
    for tx in data {
        *facets.payer_id.entry(tx.payer_id.clone()).or_default() += 1;
    }
    if !data.is_empty() {
        let total = data.len() as u64;
        facets
            .transaction_type
            .insert(CRYPTO_TRANSFER_TYPE.to_owned(), total);
        facets.service_type.insert(CRYPTO_SERVICE.to_owned(), total);
    }
    facets
}
