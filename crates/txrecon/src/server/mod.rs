mod dashboard;
mod error;
mod transactions;

use std::any::Any;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Uri};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};

use txrecon_core::{Reconciler, TxFilter};

use error::{now_rfc3339, AppError};

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    /// Filter reconciled by the dashboard endpoint.
    pub dashboard_filter: TxFilter,
    pub expose_error_details: bool,
}

type SharedState = Arc<AppState>;

/// Routes advertised by the health endpoint.
const ENDPOINTS: [&str; 5] = [
    "GET /api/health",
    "GET /api/transactions/compare?payerID&query&accountFrom",
    "GET /api/hgraph/transactions?payerID&query&accountFrom",
    "GET /api/hgraph/transactions/dg-format?payerID&query&accountFrom",
    "GET /api/dashboard/status",
];

// ==============================================================================
// Router
// ==============================================================================

/// Builds the API router. An empty `allowed_origins` allows any origin.
pub fn build_router(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
    let allow_origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins)
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let expose_error_details = state.expose_error_details;
    let shared = Arc::new(state);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/transactions/compare", get(transactions::compare))
        .route("/api/hgraph/transactions", get(transactions::hgraph_native))
        .route(
            "/api/hgraph/transactions/dg-format",
            get(transactions::hgraph_reference),
        )
        .route("/api/dashboard/status", get(dashboard::status))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            error::panic_response(panic, expose_error_details)
        }))
        .layer(cors)
        .with_state(shared)
}

fn timestamp(state: &AppState) -> Result<String, AppError> {
    now_rfc3339().map_err(|e| {
        AppError::internal(
            state.expose_error_details,
            format!("format response timestamp: {e}"),
        )
    })
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    endpoints: [&'static str; 5],
}

async fn health(State(state): State<SharedState>) -> Result<Json<Health>, AppError> {
    Ok(Json(Health {
        status: "healthy",
        timestamp: timestamp(&state)?,
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS,
    }))
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("route {} not found", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use txrecon_core::providers::{ExplorerSource, IndexerSource};
    use txrecon_core::types::ExplorerPage;
    use txrecon_core::CoreError;

    #[derive(Clone)]
    enum FakeMode<T> {
        Respond(T),
        Fail,
        Panic,
    }

    struct FakeExplorer {
        mode: FakeMode<ExplorerPage>,
        calls: Arc<AtomicUsize>,
    }

    struct FakeIndexer {
        mode: FakeMode<Value>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExplorerSource for FakeExplorer {
        async fn fetch_transactions(&self, _filter: &TxFilter) -> Result<ExplorerPage, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.mode {
                FakeMode::Respond(page) => Ok(page.clone()),
                FakeMode::Fail => Err(CoreError::InvalidResponse("connection reset".to_string())),
                FakeMode::Panic => panic!("explorer fixture exploded"),
            }
        }
    }

    #[async_trait]
    impl IndexerSource for FakeIndexer {
        async fn fetch_transactions(&self, _filter: &TxFilter) -> Result<Value, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.mode {
                FakeMode::Respond(payload) => Ok(payload.clone()),
                FakeMode::Fail => Err(CoreError::GraphQl("field not found".to_string())),
                FakeMode::Panic => panic!("indexer fixture exploded"),
            }
        }
    }

    struct Harness {
        router: Router,
        explorer_calls: Arc<AtomicUsize>,
        indexer_calls: Arc<AtomicUsize>,
    }

    fn harness(
        explorer: FakeMode<ExplorerPage>,
        indexer: FakeMode<Value>,
        expose_error_details: bool,
        allowed_origins: Vec<HeaderValue>,
    ) -> Harness {
        let explorer_calls = Arc::new(AtomicUsize::new(0));
        let indexer_calls = Arc::new(AtomicUsize::new(0));
        let reconciler = Reconciler::new(
            Arc::new(FakeExplorer {
                mode: explorer,
                calls: explorer_calls.clone(),
            }),
            Arc::new(FakeIndexer {
                mode: indexer,
                calls: indexer_calls.clone(),
            }),
            Duration::from_secs(2),
        );
        let state = AppState {
            reconciler: Arc::new(reconciler),
            dashboard_filter: TxFilter::new(26027, "kpay.live", 657983),
            expose_error_details,
        };
        Harness {
            router: build_router(state, allowed_origins),
            explorer_calls,
            indexer_calls,
        }
    }

    fn test_router(explorer: FakeMode<ExplorerPage>, indexer: FakeMode<Value>) -> Harness {
        harness(explorer, indexer, false, Vec::new())
    }

    fn hash_hex(byte: u8) -> String {
        format!("{byte:02x}").repeat(48)
    }

    fn hashes(range: std::ops::Range<u8>) -> Vec<String> {
        range.map(hash_hex).collect()
    }

    fn explorer_page(hashes: &[String]) -> ExplorerPage {
        let data: Vec<Value> = hashes
            .iter()
            .map(|hash| json!({ "transactionHash": hash, "payerID": "0.0.26027" }))
            .collect();
        serde_json::from_value(json!({
            "size": data.len(),
            "totalCount": data.len(),
            "data": data,
            "facets": {}
        }))
        .expect("explorer fixture must decode")
    }

    fn indexer_payload(hashes: &[String]) -> Value {
        let rows: Vec<Value> = hashes
            .iter()
            .enumerate()
            .map(|(i, hash)| {
                json!({
                    "consensus_timestamp": 1_700_000_000_123_456_789_u64 + i as u64,
                    "valid_start_ns": 1_700_000_000_000_000_000_u64 + i as u64,
                    "payer_account_id": 26027,
                    "node_account_id": 3,
                    "charged_tx_fee": 100_000,
                    "result": 22,
                    "decoded_memo": "kpay.live",
                    "transaction_hash": format!("\\x{hash}"),
                    "crypto_transfer": [
                        { "entity_id": 26027, "amount": -1_100_000 },
                        { "entity_id": 657983, "amount": 1_000_000 },
                        { "entity_id": 3, "amount": 100_000 }
                    ]
                })
            })
            .collect();
        json!({ "transaction": rows })
    }

    /// Indexer lists 10 transactions, the explorer the first 8 of them.
    fn scenario() -> Harness {
        test_router(
            FakeMode::Respond(explorer_page(&hashes(1..9))),
            FakeMode::Respond(indexer_payload(&hashes(1..11))),
        )
    }

    const SCENARIO_QUERY: &str = "payerID=26027&query=kpay.live&accountFrom=657983";

    async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request must build"),
            )
            .await
            .expect("router should serve request");
        let status = response.status();
        (status, response_body_json(response).await)
    }

    async fn response_body_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), 4 * 1024 * 1024)
            .await
            .expect("response body must be readable");
        serde_json::from_slice(&bytes).expect("response body must be valid JSON")
    }

    #[tokio::test]
    async fn unknown_route_returns_json_404() {
        let harness = scenario();
        let (status, json) = get(harness.router, "/api/does-not-exist").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Not found");
        assert!(json["message"]
            .as_str()
            .is_some_and(|m| m.contains("/api/does-not-exist")));
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn health_reports_version_and_endpoints() {
        let harness = scenario();
        let (status, json) = get(harness.router, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        let endpoints = json["endpoints"].as_array().expect("endpoints must be a list");
        assert_eq!(endpoints.len(), ENDPOINTS.len());
        assert_eq!(harness.explorer_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_params_return_400_without_outbound_calls() {
        for path in [
            "/api/transactions/compare",
            "/api/hgraph/transactions",
            "/api/hgraph/transactions/dg-format",
        ] {
            let harness = scenario();
            let uri = format!("{path}?query=kpay.live&accountFrom=657983");
            let (status, json) = get(harness.router, &uri).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
            assert_eq!(json["success"], false);
            assert_eq!(json["error"], "Missing required parameters");
            assert_eq!(json["message"], "payerID, query, and accountFrom are required");
            assert_eq!(harness.explorer_calls.load(Ordering::SeqCst), 0);
            assert_eq!(harness.indexer_calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn non_integer_account_returns_400() {
        let harness = scenario();
        let (status, json) = get(
            harness.router,
            "/api/transactions/compare?payerID=abc&query=kpay.live&accountFrom=657983",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().is_some_and(|m| m.contains("payerID")));
        assert_eq!(harness.indexer_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_param_returns_json_400() {
        let harness = scenario();
        let (status, json) = get(
            harness.router,
            "/api/transactions/compare?payerID=1&payerID=2&query=kpay.live&accountFrom=657983",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Invalid parameters");
        assert!(json["message"].as_str().is_some_and(|m| m.contains("payerID")));
        assert!(json["timestamp"].is_string());
        assert_eq!(harness.explorer_calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.indexer_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn compare_reports_transactions_missing_from_explorer() {
        let harness = scenario();
        let (status, json) = get(
            harness.router,
            &format!("/api/transactions/compare?{SCENARIO_QUERY}"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["size"], 8);
        assert!(json["data"]
            .as_array()
            .expect("data must be a list")
            .iter()
            .all(|record| record["source"] == "dragonglass"));

        let comparison = &json["metadata"]["comparison"];
        assert_eq!(comparison["status"], "discrepancy_detected");
        assert_eq!(comparison["dragonglass_success"], true);
        assert_eq!(comparison["hgraph_success"], true);
        assert_eq!(
            comparison["discrepancies"]["missing_in_dragonglass"],
            json!(hashes(9..11))
        );
        assert_eq!(comparison["discrepancies"]["missing_in_hgraph"], json!([]));
        assert_eq!(json["metadata"]["additional_hgraph_data"]["size"], 10);
        assert_eq!(
            json["metadata"]["query"],
            json!({ "payerID": 26027, "query": "kpay.live", "accountFrom": 657983 })
        );
        assert_eq!(harness.explorer_calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.indexer_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn compare_match_has_null_discrepancies_and_no_extra_data() {
        let shared = hashes(1..6);
        let harness = test_router(
            FakeMode::Respond(explorer_page(&shared)),
            FakeMode::Respond(indexer_payload(&shared)),
        );
        let (status, json) = get(
            harness.router,
            &format!("/api/transactions/compare?{SCENARIO_QUERY}"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["metadata"]["comparison"]["status"], "match");
        assert_eq!(json["metadata"]["comparison"]["discrepancies"], Value::Null);
        assert!(json["metadata"].get("additional_hgraph_data").is_none());
    }

    #[tokio::test]
    async fn explorer_failure_still_returns_200_with_indexer_hashes() {
        let harness = test_router(
            FakeMode::Fail,
            FakeMode::Respond(indexer_payload(&hashes(1..4))),
        );
        let (status, json) = get(
            harness.router,
            &format!("/api/transactions/compare?{SCENARIO_QUERY}"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], json!([]));
        let comparison = &json["metadata"]["comparison"];
        assert_eq!(comparison["dragonglass_success"], false);
        assert!(comparison["dragonglass_error"].is_string());
        assert_eq!(comparison["hgraph_hashes"], json!(hashes(1..4)));
    }

    #[tokio::test]
    async fn hgraph_native_renders_large_timestamps_as_strings() {
        let harness = scenario();
        let (status, json) = get(
            harness.router,
            &format!("/api/hgraph/transactions?{SCENARIO_QUERY}"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let first = &json["transaction"][0];
        assert_eq!(first["consensus_timestamp"], "1700000000123456789");
        assert_eq!(first["valid_start_ns"], "1700000000000000000");
        assert_eq!(first["payer_account_id"], 26027);

        let metadata = &json["metadata"];
        assert_eq!(metadata["source"], "hgraphio");
        assert_eq!(metadata["success"], true);
        assert_eq!(metadata["count"], 10);
        assert!(metadata.get("error").is_none());
        assert_eq!(harness.explorer_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hgraph_native_failure_reports_empty_listing() {
        let harness = test_router(FakeMode::Fail, FakeMode::Fail);
        let (status, json) = get(
            harness.router,
            &format!("/api/hgraph/transactions?{SCENARIO_QUERY}"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["transaction"], json!([]));
        assert_eq!(json["metadata"]["success"], false);
        assert_eq!(json["metadata"]["count"], 0);
        assert!(json["metadata"]["error"].is_string());
    }

    #[tokio::test]
    async fn dg_format_returns_reference_shaped_records() {
        let harness = scenario();
        let (status, json) = get(
            harness.router,
            &format!("/api/hgraph/transactions/dg-format?{SCENARIO_QUERY}"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["size"], 10);
        assert_eq!(json["totalCount"], 10);
        let first = &json["data"][0];
        assert_eq!(first["transactionHash"], hash_hex(1));
        assert_eq!(first["payerID"], "0.0.26027");
        assert_eq!(first["status"], "SUCCESS");
        assert_eq!(first["source"], "hgraphio");
        assert_eq!(json["metadata"]["count"], 10);
    }

    #[tokio::test]
    async fn dashboard_flags_explorer_bug() {
        let harness = scenario();
        let (status, json) = get(harness.router, "/api/dashboard/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["filter"]["payerID"], 26027);
        assert_eq!(json["sources"]["dragonglass"]["status"], "online");
        assert_eq!(json["sources"]["dragonglass"]["count"], 8);
        assert_eq!(json["sources"]["hgraph"]["count"], 10);
        assert_eq!(json["comparison"]["status"], "discrepancy_detected");
        assert_eq!(json["comparison"]["missing_in_dragonglass"], 2);
        assert_eq!(json["comparison"]["missing_in_hgraph"], 0);
        assert_eq!(json["bug_detected"], true);
    }

    #[tokio::test]
    async fn dashboard_marks_failed_source_offline() {
        let harness = test_router(
            FakeMode::Respond(explorer_page(&hashes(1..3))),
            FakeMode::Fail,
        );
        let (status, json) = get(harness.router, "/api/dashboard/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["sources"]["hgraph"]["status"], "offline");
        assert!(json["sources"]["hgraph"]["error"].is_string());
        assert!(json["sources"]["dragonglass"].get("error").is_none());
        assert_eq!(json["bug_detected"], false);
    }

    #[tokio::test]
    async fn handler_panic_returns_generic_500() {
        let harness = test_router(FakeMode::Panic, FakeMode::Respond(json!({})));
        let (status, json) = get(
            harness.router,
            &format!("/api/transactions/compare?{SCENARIO_QUERY}"),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Internal server error");
        assert!(!json["message"]
            .as_str()
            .expect("message must be a string")
            .contains("exploded"));
    }

    #[tokio::test]
    async fn handler_panic_detail_is_exposed_when_enabled() {
        let harness = harness(
            FakeMode::Panic,
            FakeMode::Respond(json!({})),
            true,
            Vec::new(),
        );
        let (status, json) = get(
            harness.router,
            &format!("/api/transactions/compare?{SCENARIO_QUERY}"),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["message"]
            .as_str()
            .is_some_and(|m| m.contains("explorer fixture exploded")));
    }

    async fn cors_origin_header(harness: Harness, origin: &str) -> Option<HeaderValue> {
        let response = harness
            .router
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("origin", origin)
                    .body(Body::empty())
                    .expect("request must build"),
            )
            .await
            .expect("router should serve request");
        response
            .headers()
            .get("access-control-allow-origin")
            .cloned()
    }

    #[tokio::test]
    async fn cors_allows_any_origin_by_default() {
        let header = cors_origin_header(scenario(), "http://anywhere.example").await;
        assert_eq!(header.as_ref().and_then(|h| h.to_str().ok()), Some("*"));
    }

    #[tokio::test]
    async fn cors_reflects_only_configured_origins() {
        let allowed = HeaderValue::from_static("http://dashboard.example");
        let make = || {
            harness(
                FakeMode::Fail,
                FakeMode::Fail,
                false,
                vec![allowed.clone()],
            )
        };

        let header = cors_origin_header(make(), "http://dashboard.example").await;
        assert_eq!(header, Some(allowed.clone()));

        let header = cors_origin_header(make(), "http://other.example").await;
        assert_eq!(header, None);
    }
}
