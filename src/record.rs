//! Records and groupings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One note with its embedding.
///
/// `metadata` (timestamps, source type, file names, ...) is carried through
/// clustering untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Opaque identifier.
    pub id: String,
    /// Original note text. Only read when building summaries.
    #[serde(default)]
    pub text: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Passthrough fields.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl EmbeddingRecord {
    /// Create a record with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            embedding,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach a passthrough field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Check that every record shares one non-zero dimensionality and holds only
/// finite values. Returns the dimensionality (0 for an empty batch).
pub fn validate_batch(records: &[EmbeddingRecord]) -> Result<usize> {
    let Some(first) = records.first() else {
        return Ok(0);
    };
    let d = first.embedding.len();
    if d == 0 {
        return Err(Error::InvalidParameter {
            name: "dimension",
            message: "must be at least 1",
        });
    }
    for (row, record) in records.iter().enumerate() {
        if record.embedding.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: record.embedding.len(),
            });
        }
        if let Some(column) = record.embedding.iter().position(|x| !x.is_finite()) {
            return Err(Error::NonFinite { row, column });
        }
    }
    Ok(d)
}

/// Records grouped by cluster index.
///
/// Every input record lands in exactly one group and, within a group, records
/// keep their input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterAssignment {
    groups: BTreeMap<usize, Vec<EmbeddingRecord>>,
}

impl ClusterAssignment {
    /// An assignment with no groups.
    pub fn empty() -> Self {
        Self::default()
    }

    /// All records in group 0. An empty batch gives an empty assignment.
    pub fn single(records: Vec<EmbeddingRecord>) -> Self {
        let mut groups = BTreeMap::new();
        if !records.is_empty() {
            groups.insert(0, records);
        }
        Self { groups }
    }

    /// Group `records` by `labels`, in input order, creating groups as labels
    /// are first seen.
    pub fn from_labels(records: Vec<EmbeddingRecord>, labels: &[usize]) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(Error::InvalidParameter {
                name: "labels",
                message: "must have one label per record",
            });
        }
        Ok(Self::group_by_labels(records, labels))
    }

    /// [`Self::from_labels`] for callers that already checked the lengths.
    pub(crate) fn group_by_labels(records: Vec<EmbeddingRecord>, labels: &[usize]) -> Self {
        debug_assert_eq!(records.len(), labels.len());
        let mut groups: BTreeMap<usize, Vec<EmbeddingRecord>> = BTreeMap::new();
        for (record, &label) in records.into_iter().zip(labels) {
            groups.entry(label).or_default().push(record);
        }
        Self { groups }
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True when there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of all group sizes.
    pub fn total_records(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Records of one group.
    pub fn get(&self, index: usize) -> Option<&[EmbeddingRecord]> {
        self.groups.get(&index).map(Vec::as_slice)
    }

    /// Groups in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[EmbeddingRecord])> {
        self.groups.iter().map(|(&k, v)| (k, v.as_slice()))
    }

    /// Group indices in order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.keys().copied()
    }

    /// Unwrap into the underlying map.
    pub fn into_inner(self) -> BTreeMap<usize, Vec<EmbeddingRecord>> {
        self.groups
    }
}

impl IntoIterator for ClusterAssignment {
    type Item = (usize, Vec<EmbeddingRecord>);
    type IntoIter = std::collections::btree_map::IntoIter<usize, Vec<EmbeddingRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}
