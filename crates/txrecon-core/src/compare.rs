//! Set comparison of two hash lists.

use std::collections::BTreeSet;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Match,
    DiscrepancyDetected,
}

/// Hashes one source reports and the other does not.
///
/// Counts are raw list lengths rather than set sizes, so duplicate hashes
/// inside one source remain visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancies {
    /// Reported by the indexer, absent from the explorer.
    pub missing_in_dragonglass: Vec<String>,
    /// Reported by the explorer, absent from the indexer.
    pub missing_in_hgraph: Vec<String>,
    pub dragonglass_count: usize,
    pub hgraph_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonOutcome {
    pub status: ComparisonStatus,
    pub discrepancies: Option<Discrepancies>,
}

impl ComparisonOutcome {
    pub fn is_match(&self) -> bool {
        self.status == ComparisonStatus::Match
    }

    /// Hashes the explorer omitted; empty on a match.
    pub fn missing_in_dragonglass(&self) -> &[String] {
        self.discrepancies
            .as_ref()
            .map(|d| d.missing_in_dragonglass.as_slice())
            .unwrap_or_default()
    }

    /// Hashes the indexer omitted; empty on a match.
    pub fn missing_in_hgraph(&self) -> &[String] {
        self.discrepancies
            .as_ref()
            .map(|d| d.missing_in_hgraph.as_slice())
            .unwrap_or_default()
    }
}

/// Compare explorer hashes against indexer hashes.
///
/// Both difference lists come back sorted and deduplicated.
pub fn compare_hashes(dragonglass: &[String], hgraph: &[String]) -> ComparisonOutcome {
    let dragonglass_set: BTreeSet<&str> = dragonglass.iter().map(String::as_str).collect();
    let hgraph_set: BTreeSet<&str> = hgraph.iter().map(String::as_str).collect();

    let missing_in_dragonglass: Vec<String> = hgraph_set
        .difference(&dragonglass_set)
        .map(|h| (*h).to_owned())
        .collect();
    let missing_in_hgraph: Vec<String> = dragonglass_set
        .difference(&hgraph_set)
        .map(|h| (*h).to_owned())
        .collect();

    if missing_in_dragonglass.is_empty() && missing_in_hgraph.is_empty() {
        return ComparisonOutcome {
            status: ComparisonStatus::Match,
            discrepancies: None,
        };
    }

    ComparisonOutcome {
        status: ComparisonStatus::DiscrepancyDetected,
        discrepancies: Some(Discrepancies {
            missing_in_dragonglass,
            missing_in_hgraph,
            dragonglass_count: dragonglass.len(),
            hgraph_count: hgraph.len(),
        }),
    }
}
