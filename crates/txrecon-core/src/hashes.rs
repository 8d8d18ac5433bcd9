//! Transaction-hash extraction for comparison.

use serde_json::Value;

use crate::types::{ExplorerPage, Source};

/// Literal two-character marker the indexer prefixes binary columns with.
pub const BINARY_ESCAPE_PREFIX: &str = "\\x";

const HEX_PREFIX: &str = "0x";

/// Normalize a transaction hash for comparison: lowercase, trim, drop any
/// leading `\x` or `0x` markers. Idempotent.
pub fn clean_hash(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    let mut hash = lowered.as_str();
    while let Some(rest) = hash
        .strip_prefix(BINARY_ESCAPE_PREFIX)
        .or_else(|| hash.strip_prefix(HEX_PREFIX))
    {
        hash = rest.trim_start();
    }
    hash.to_owned()
}

/// Sorted, cleaned hashes from a source's native payload.
///
/// The explorer lists records under `data[].transactionHash`, the indexer
/// under `transaction[].transaction_hash`. A missing list yields an empty
/// result; records without a string hash are skipped.
pub fn extract_hashes(source: Source, payload: &Value) -> Vec<String> {
    let (list_field, hash_field) = match source {
        Source::Dragonglass => ("data", "transactionHash"),
        Source::Hgraph => ("transaction", "transaction_hash"),
    };

    match payload.get(list_field).and_then(Value::as_array) {
        Some(records) => sorted_hashes(records, hash_field),
        None => Vec::new(),
    }
}

/// Same as [`extract_hashes`] for an already-decoded explorer page.
pub fn explorer_page_hashes(page: &ExplorerPage) -> Vec<String> {
    sorted_hashes(&page.data, "transactionHash")
}

fn sorted_hashes(records: &[Value], hash_field: &str) -> Vec<String> {
    let mut hashes: Vec<String> = records
        .iter()
        .filter_map(|record| record.get(hash_field).and_then(Value::as_str))
        .map(clean_hash)
        .collect();
    hashes.sort();
    hashes
}
