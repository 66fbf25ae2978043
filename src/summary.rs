//! Aggregate statistics over a finished grouping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::ClusterAssignment;

/// Marker appended to truncated previews.
pub const TRUNCATION_MARKER: &str = "...";

/// Statistics for a whole grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Sum of all group sizes.
    pub total_records: usize,
    /// Number of groups.
    pub num_clusters: usize,
    /// Whether the group count was chosen by the engine.
    pub auto_determined_k: bool,
    /// Per-group statistics, keyed by group index.
    pub clusters: BTreeMap<usize, GroupSummary>,
}

/// Statistics for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Number of records.
    pub size: usize,
    /// Previews of the first few records' text, in group order.
    pub sample_texts: Vec<String>,
    /// Identifiers of every record in the group, in group order.
    pub record_ids: Vec<String>,
}

/// Summarize with the standard preview shape (3 samples of 100 characters).
pub fn summarize(assignment: &ClusterAssignment) -> ClusterSummary {
    summarize_with(assignment, 3, 100)
}

/// Summarize with `samples` previews per group, each cut at `max_chars` characters.
pub fn summarize_with(
    assignment: &ClusterAssignment,
    samples: usize,
    max_chars: usize,
) -> ClusterSummary {
    let clusters = assignment
        .iter()
        .map(|(index, records)| {
            let group = GroupSummary {
                size: records.len(),
                sample_texts: records
                    .iter()
                    .take(samples)
                    .map(|r| preview(&r.text, max_chars))
                    .collect(),
                record_ids: records.iter().map(|r| r.id.clone()).collect(),
            };
            (index, group)
        })
        .collect();

    ClusterSummary {
        total_records: assignment.total_records(),
        num_clusters: assignment.len(),
        auto_determined_k: false,
        clusters,
    }
}

/// First `max_chars` characters of `text`, with [`TRUNCATION_MARKER`] when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EmbeddingRecord;

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview(&"a".repeat(100), 100), "a".repeat(100));
        assert_eq!(preview(&"a".repeat(101), 100), format!("{}...", "a".repeat(100)));
        // Cuts on character boundaries.
        assert_eq!(preview("héllo wörld", 4), "héll...");
        assert_eq!(preview("", 0), "");
        assert_eq!(preview("x", 0), "...");
    }

    #[test]
    fn test_summarize_counts_and_samples() {
        let long = "z".repeat(150);
        let records: Vec<EmbeddingRecord> = (0..5)
            .map(|i| {
                let text = if i == 0 { long.clone() } else { format!("note {i}") };
                EmbeddingRecord::new(format!("id{i}"), text, vec![i as f32])
            })
            .collect();
        let assignment = ClusterAssignment::from_labels(records, &[0, 0, 0, 0, 1]).unwrap();

        let summary = summarize(&assignment);
        assert_eq!(summary.total_records, 5);
        assert_eq!(summary.num_clusters, 2);
        assert!(!summary.auto_determined_k);

        let g0 = &summary.clusters[&0];
        assert_eq!(g0.size, 4);
        assert_eq!(g0.sample_texts.len(), 3);
        assert_eq!(g0.sample_texts[0], format!("{}...", "z".repeat(100)));
        assert_eq!(g0.sample_texts[1], "note 1");
        assert_eq!(g0.record_ids, vec!["id0", "id1", "id2", "id3"]);

        let g1 = &summary.clusters[&1];
        assert_eq!(g1.size, 1);
        assert_eq!(g1.sample_texts, vec!["note 4"]);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&ClusterAssignment::empty());
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.num_clusters, 0);
        assert!(summary.clusters.is_empty());
    }
}
