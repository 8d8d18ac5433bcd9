//! Cross-source reconciliation.
//!
//! [`Reconciler`] fans out to both providers at once, normalizes the
//! indexer's rows, and compares the two hash sets. Provider failures are
//! absorbed into their envelopes, so a reconciliation always produces a
//! report.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::canonical::{canonicalize, CanonicalPage};
use crate::compare::{compare_hashes, ComparisonStatus, Discrepancies};
use crate::hashes::{explorer_page_hashes, extract_hashes};
use crate::providers::{
    fetch_explorer_envelope, fetch_indexer_envelope, Envelope, ExplorerSource, IndexerSource,
};
use crate::types::{ExplorerPage, Source, TxFilter};

// ==============================================================================
// Report
// ==============================================================================

/// Per-source success flags, the comparison verdict, and both hash lists
/// for auditing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub status: ComparisonStatus,
    pub dragonglass_success: bool,
    pub hgraph_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dragonglass_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hgraph_error: Option<String>,
    pub discrepancies: Option<Discrepancies>,
    pub dragonglass_hashes: Vec<String>,
    pub hgraph_hashes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    /// The explorer's page, each record tagged with its source.
    pub page: ExplorerPage,
    pub comparison: ComparisonSummary,
    /// The canonicalized indexer listing, attached only when the sources
    /// disagree.
    pub additional_hgraph_data: Option<CanonicalPage>,
}

impl ReconciliationReport {
    /// True when the explorer is missing transactions the indexer reports.
    pub fn bug_detected(&self) -> bool {
        self.comparison
            .discrepancies
            .as_ref()
            .is_some_and(|d| !d.missing_in_dragonglass.is_empty())
    }
}

fn tag_source(mut page: ExplorerPage, source: Source) -> ExplorerPage {
    for record in &mut page.data {
        if let Value::Object(fields) = record {
            fields.insert("source".to_owned(), Value::String(source.as_str().to_owned()));
        }
    }
    page
}

// ==============================================================================
// Reconciler
// ==============================================================================

pub struct Reconciler {
    explorer: Arc<dyn ExplorerSource>,
    indexer: Arc<dyn IndexerSource>,
    timeout: Duration,
}

impl Reconciler {
    /// `timeout` bounds each provider call independently.
    pub fn new(
        explorer: Arc<dyn ExplorerSource>,
        indexer: Arc<dyn IndexerSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            explorer,
            indexer,
            timeout,
        }
    }

    pub async fn fetch_explorer(&self, filter: &TxFilter) -> Envelope<ExplorerPage> {
        fetch_explorer_envelope(self.explorer.as_ref(), filter, self.timeout).await
    }

    /// The indexer's native payload, precision-fixed.
    pub async fn indexer_native(&self, filter: &TxFilter) -> Envelope<Value> {
        fetch_indexer_envelope(self.indexer.as_ref(), filter, self.timeout).await
    }

    /// The indexer's payload converted to the reference format.
    pub async fn indexer_reference(&self, filter: &TxFilter) -> Envelope<CanonicalPage> {
        self.indexer_native(filter)
            .await
            .map(|payload| canonicalize(&payload))
    }

    /// Query both providers concurrently and compare what they return.
    pub async fn reconcile(&self, filter: &TxFilter) -> ReconciliationReport {
        let (explorer, indexer) =
            tokio::join!(self.fetch_explorer(filter), self.indexer_native(filter));

        let canonical = canonicalize(&indexer.data);
        let dragonglass_hashes = explorer_page_hashes(&explorer.data);
        let hgraph_hashes = extract_hashes(Source::Hgraph, &indexer.data);
        let outcome = compare_hashes(&dragonglass_hashes, &hgraph_hashes);

        info!(
            payer_id = filter.payer_id,
            account_from = filter.account_from,
            dragonglass_success = explorer.success,
            hgraph_success = indexer.success,
            dragonglass_count = dragonglass_hashes.len(),
            hgraph_count = hgraph_hashes.len(),
            status = ?outcome.status,
            "reconciliation finished"
        );

        let additional_hgraph_data = (!outcome.is_match()).then_some(canonical);

        ReconciliationReport {
            page: tag_source(explorer.data, Source::Dragonglass),
            comparison: ComparisonSummary {
                status: outcome.status,
                dragonglass_success: explorer.success,
                hgraph_success: indexer.success,
                dragonglass_error: explorer.error,
                hgraph_error: indexer.error,
                discrepancies: outcome.discrepancies,
                dragonglass_hashes,
                hgraph_hashes,
            },
            additional_hgraph_data,
        }
    }
}
