//! Transaction endpoints: the cross-source comparison and the two views of
//! the indexer's listing.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use txrecon_core::canonical::CanonicalPage;
use txrecon_core::providers::Envelope;
use txrecon_core::reconcile::ComparisonSummary;
use txrecon_core::types::ExplorerPage;
use txrecon_core::{Source, TxFilter};

use super::error::AppError;
use super::{timestamp, SharedState};

// ==============================================================================
// Query Parameters
// ==============================================================================

/// Raw query string. Every field is optional here so absence is reported
/// with the service's own 400 body rather than the extractor's.
#[derive(Debug, Deserialize)]
pub(super) struct FilterParams {
    #[serde(rename = "payerID")]
    payer_id: Option<String>,
    query: Option<String>,
    #[serde(rename = "accountFrom")]
    account_from: Option<String>,
}

impl FilterParams {
    pub(super) fn into_filter(self) -> Result<TxFilter, AppError> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let (Some(payer_id), Some(query), Some(account_from)) = (
            present(self.payer_id),
            present(self.query),
            present(self.account_from),
        ) else {
            return Err(AppError::MissingParameters);
        };

        Ok(TxFilter::new(
            parse_account("payerID", &payer_id)?,
            query,
            parse_account("accountFrom", &account_from)?,
        ))
    }
}

/// Maps an undecodable query string, such as a repeated parameter, to the
/// service's 400 body.
fn filter_from(params: Result<Query<FilterParams>, QueryRejection>) -> Result<TxFilter, AppError> {
    let Query(params) = params.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    params.into_filter()
}

fn parse_account(name: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim().parse().map_err(|_| {
        AppError::BadRequest(format!(
            "{name} must be a non-negative integer account number, got `{raw}`"
        ))
    })
}

// ==============================================================================
// Response Bodies
// ==============================================================================

#[derive(Serialize)]
pub(super) struct CompareResponse {
    #[serde(flatten)]
    page: ExplorerPage,
    metadata: CompareMetadata,
}

#[derive(Serialize)]
pub(super) struct CompareMetadata {
    comparison: ComparisonSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_hgraph_data: Option<CanonicalPage>,
    query: TxFilter,
    timestamp: String,
}

/// A view of the indexer's listing plus the provenance of the call.
#[derive(Serialize)]
pub(super) struct IndexerResponse<T> {
    #[serde(flatten)]
    payload: T,
    metadata: IndexerMetadata,
}

#[derive(Serialize)]
pub(super) struct IndexerMetadata {
    source: Source,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    count: usize,
    query: TxFilter,
    timestamp: String,
}

impl IndexerMetadata {
    fn new<T>(envelope: &Envelope<T>, count: usize, query: TxFilter, timestamp: String) -> Self {
        Self {
            source: envelope.source,
            success: envelope.success,
            error: envelope.error.clone(),
            count,
            query,
            timestamp,
        }
    }
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn compare(
    State(state): State<SharedState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<CompareResponse>, AppError> {
    let filter = filter_from(params)?;
    let report = state.reconciler.reconcile(&filter).await;

    Ok(Json(CompareResponse {
        page: report.page,
        metadata: CompareMetadata {
            comparison: report.comparison,
            additional_hgraph_data: report.additional_hgraph_data,
            query: filter,
            timestamp: timestamp(&state)?,
        },
    }))
}

/// The indexer's native payload with large timestamps rendered as strings.
pub(super) async fn hgraph_native(
    State(state): State<SharedState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<IndexerResponse<Value>>, AppError> {
    let filter = filter_from(params)?;
    let envelope = state.reconciler.indexer_native(&filter).await;

    let count = envelope
        .data
        .get("transaction")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let metadata = IndexerMetadata::new(&envelope, count, filter, timestamp(&state)?);

    Ok(Json(IndexerResponse {
        payload: envelope.data,
        metadata,
    }))
}

/// The indexer's listing converted to the explorer's reference format.
pub(super) async fn hgraph_reference(
    State(state): State<SharedState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<IndexerResponse<CanonicalPage>>, AppError> {
    let filter = filter_from(params)?;
    let envelope = state.reconciler.indexer_reference(&filter).await;

    let count = envelope.data.data.len();
    let metadata = IndexerMetadata::new(&envelope, count, filter, timestamp(&state)?);

    Ok(Json(IndexerResponse {
        payload: envelope.data,
        metadata,
    }))
}
