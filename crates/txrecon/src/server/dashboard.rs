use axum::extract::State;
use axum::Json;
use serde::Serialize;

use txrecon_core::compare::ComparisonStatus;
use txrecon_core::TxFilter;

use super::error::AppError;
use super::{timestamp, SharedState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum SourceState {
    Online,
    Offline,
}

#[derive(Serialize)]
pub(super) struct SourceStatus {
    status: SourceState,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SourceStatus {
    fn new(success: bool, count: usize, error: Option<String>) -> Self {
        let status = if success {
            SourceState::Online
        } else {
            SourceState::Offline
        };
        Self {
            status,
            count,
            error,
        }
    }
}

#[derive(Serialize)]
pub(super) struct DashboardSources {
    dragonglass: SourceStatus,
    hgraph: SourceStatus,
}

#[derive(Serialize)]
pub(super) struct DashboardComparison {
    status: ComparisonStatus,
    missing_in_dragonglass: usize,
    missing_in_hgraph: usize,
}

#[derive(Serialize)]
pub(super) struct DashboardStatus {
    success: bool,
    timestamp: String,
    filter: TxFilter,
    sources: DashboardSources,
    comparison: DashboardComparison,
    bug_detected: bool,
}

/// Reconciles the configured dashboard filter and summarizes source health.
pub(super) async fn status(
    State(state): State<SharedState>,
) -> Result<Json<DashboardStatus>, AppError> {
    let filter = state.dashboard_filter.clone();
    let report = state.reconciler.reconcile(&filter).await;
    let bug_detected = report.bug_detected();
    let summary = report.comparison;

    let (missing_in_dragonglass, missing_in_hgraph) =
        summary.discrepancies.as_ref().map_or((0, 0), |d| {
            (d.missing_in_dragonglass.len(), d.missing_in_hgraph.len())
        });

    Ok(Json(DashboardStatus {
        success: true,
        timestamp: timestamp(&state)?,
        filter,
        sources: DashboardSources {
            dragonglass: SourceStatus::new(
                summary.dragonglass_success,
                summary.dragonglass_hashes.len(),
                summary.dragonglass_error,
            ),
            hgraph: SourceStatus::new(
                summary.hgraph_success,
                summary.hgraph_hashes.len(),
                summary.hgraph_error,
            ),
        },
        comparison: DashboardComparison {
            status: summary.status,
            missing_in_dragonglass,
            missing_in_hgraph,
        },
        bug_detected,
    }))
}
