//! Upstream transaction providers.
//!
//! Defines the [`ExplorerSource`] and [`IndexerSource`] traits, their HTTP
//! implementations ([`DragonglassClient`], [`HgraphClient`]) and the
//! [`Envelope`] every call is reported through. The envelope helpers are the
//! error boundary: whatever a provider does, callers get an envelope back.

mod dragonglass;
mod hgraph;

pub use dragonglass::DragonglassClient;
pub use hgraph::{memo_pattern, HgraphClient, TRANSACTIONS_QUERY};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::CoreError;
use crate::precision::fix_precision;
use crate::types::{ExplorerPage, Source, TxFilter};

/// Default bound on a single outbound provider call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on how much of an error body is kept in messages.
const ERROR_BODY_LIMIT: usize = 512;

// ==============================================================================
// Provider Traits
// ==============================================================================

/// The REST explorer, whose native listing is already in reference format.
#[async_trait]
pub trait ExplorerSource: Send + Sync {
    async fn fetch_transactions(&self, filter: &TxFilter) -> Result<ExplorerPage, CoreError>;
}

/// The GraphQL indexer.
#[async_trait]
pub trait IndexerSource: Send + Sync {
    /// Returns the GraphQL `data` object (`{transaction: [...]}`) exactly as
    /// decoded, before the precision fix.
    async fn fetch_transactions(&self, filter: &TxFilter) -> Result<Value, CoreError>;
}

// ==============================================================================
// Envelope
// ==============================================================================

/// Outcome of one provider call. On failure `data` holds the source's empty
/// shape, so consumers never branch on shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub source: Source,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(source: Source, data: T) -> Self {
        Self {
            success: true,
            source,
            data,
            error: None,
        }
    }

    pub fn failed(source: Source, error: &CoreError, empty: T) -> Self {
        Self {
            success: false,
            source,
            data: empty,
            error: Some(error.to_string()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            success: self.success,
            source: self.source,
            data: f(self.data),
            error: self.error,
        }
    }
}

/// The indexer's empty shape.
pub fn empty_indexer_payload() -> Value {
    serde_json::json!({ "transaction": [] })
}

async fn settle<T>(
    source: Source,
    timeout: Duration,
    call: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CoreError> {
    let result = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::Timeout(timeout)),
    };
    if let Err(err) = &result {
        warn!(source = %source, error = %err, "provider call failed");
    }
    result
}

/// Call the explorer once, bounded by `timeout`.
pub async fn fetch_explorer_envelope(
    provider: &dyn ExplorerSource,
    filter: &TxFilter,
    timeout: Duration,
) -> Envelope<ExplorerPage> {
    let source = Source::Dragonglass;
    match settle(source, timeout, provider.fetch_transactions(filter)).await {
        Ok(page) => Envelope::ok(source, page),
        Err(err) => Envelope::failed(source, &err, ExplorerPage::default()),
    }
}

/// Call the indexer once, bounded by `timeout`, and apply the precision fix
/// to a successful payload.
pub async fn fetch_indexer_envelope(
    provider: &dyn IndexerSource,
    filter: &TxFilter,
    timeout: Duration,
) -> Envelope<Value> {
    let source = Source::Hgraph;
    match settle(source, timeout, provider.fetch_transactions(filter)).await {
        Ok(payload) => Envelope::ok(source, fix_precision(payload)),
        Err(err) => Envelope::failed(source, &err, empty_indexer_payload()),
    }
}

// ==============================================================================
// HTTP Helpers
// ==============================================================================

pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url, CoreError> {
    let parsed = Url::parse(endpoint).map_err(|e| {
        CoreError::InvalidConfig(format!(
            "invalid endpoint `{endpoint}`: expected HTTP(S) URL ({e})"
        ))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(CoreError::InvalidConfig(format!(
            "unsupported endpoint scheme `{other}`; expected http or https"
        ))),
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, CoreError> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .pool_max_idle_per_host(8)
        .build()
        .map_err(|e| CoreError::InvalidConfig(format!("build HTTP client: {e}")))
}

/// Read a response body, turning non-2xx statuses into
/// [`CoreError::HttpStatus`].
pub(crate) async fn checked_body(response: reqwest::Response) -> Result<String, CoreError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(CoreError::HttpStatus {
            status: status.as_u16(),
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        });
    }
    Ok(body)
}
