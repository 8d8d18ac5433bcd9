use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::canonical::null_as_empty;
use crate::error::CoreError;
use crate::types::TxFilter;

use super::{build_http_client, checked_body, parse_endpoint, IndexerSource};

/// Fixed transaction listing query. Caller input is bound through
/// variables only.
pub const TRANSACTIONS_QUERY: &str = r#"query ReconcileTransactions($payer: bigint!, $memo: String!, $account: bigint!, $limit: Int) {
  transaction(
    where: {
      payer_account_id: { _eq: $payer }
      decoded_memo: { _ilike: $memo }
      crypto_transfer: { entity_id: { _eq: $account } }
    }
    order_by: { consensus_timestamp: desc }
    limit: $limit
  ) {
    consensus_timestamp
    valid_start_ns
    payer_account_id
    node_account_id
    charged_tx_fee
    result
    decoded_memo
    transaction_hash
    crypto_transfer {
      entity_id
      amount
    }
    token_transfer {
      token_id
      account_id
      amount
    }
  }
}"#;

#[derive(Serialize)]
struct GraphQlRequest {
    query: &'static str,
    variables: TransactionVariables,
}

#[derive(Serialize)]
struct TransactionVariables {
    payer: u64,
    memo: String,
    account: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

/// Case-insensitive substring pattern for `_ilike`. LIKE metacharacters in
/// the caller's text match literally.
pub fn memo_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// GraphQL indexer client. Issues one POST per call.
pub struct HgraphClient {
    client: reqwest::Client,
    url: Url,
    limit: Option<u32>,
}

impl HgraphClient {
    /// `limit` caps the number of rows returned; `None` leaves it unbounded.
    pub fn new(endpoint: &str, timeout: Duration, limit: Option<u32>) -> Result<Self, CoreError> {
        if limit == Some(0) {
            return Err(CoreError::InvalidConfig(
                "indexer limit must be at least 1".to_owned(),
            ));
        }
        Ok(Self {
            client: build_http_client(timeout)?,
            url: parse_endpoint(endpoint)?,
            limit,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn request_body(&self, filter: &TxFilter) -> GraphQlRequest {
        GraphQlRequest {
            query: TRANSACTIONS_QUERY,
            variables: TransactionVariables {
                payer: filter.payer_id,
                memo: memo_pattern(&filter.query),
                account: filter.account_from,
                limit: self.limit,
            },
        }
    }
}

#[async_trait]
impl IndexerSource for HgraphClient {
    async fn fetch_transactions(&self, filter: &TxFilter) -> Result<Value, CoreError> {
        debug!(
            payer_id = filter.payer_id,
            account_from = filter.account_from,
            query = %filter.query,
            limit = ?self.limit,
            "indexer request"
        );

        let response = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&self.request_body(filter))
            .send()
            .await?;

        let body = checked_body(response).await?;
        trace!(body_len = body.len(), body = %body, "indexer response body");

        decode_response(&body)
    }
}

/// Extracts the `data` object. Errors alongside data are logged and the
/// partial data returned; errors without data fail the call.
fn decode_response(body: &str) -> Result<Value, CoreError> {
    let decoded: GraphQlResponse = serde_json::from_str(body)
        .map_err(|e| CoreError::InvalidResponse(format!("decode GraphQL response: {e}")))?;

    let messages: Vec<String> = decoded.errors.into_iter().map(|e| e.message).collect();
    match decoded.data {
        Some(data @ Value::Object(_)) => {
            if !messages.is_empty() {
                warn!(errors = %messages.join("; "), "indexer returned partial data with errors");
            }
            Ok(data)
        }
        _ if !messages.is_empty() => Err(CoreError::GraphQl(messages.join("; "))),
        _ => Err(CoreError::InvalidResponse(
            "GraphQL response carries no data object".to_owned(),
        )),
    }
}
