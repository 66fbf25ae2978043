//! Automatic grouping of note embeddings.
//!
//! `cortex-cluster` takes a batch of embedded notes and splits it into
//! semantically coherent groups without being told how many groups to make:
//!
//! - [`normalize`]: per-dimension standardization, refit on every batch
//! - [`cluster`]: seeded k-means (k-means++ seeding, Lloyd iterations, restarts)
//! - [`quality`]: silhouette scoring of a labeling
//! - [`engine`]: group-count search, clustering, and the fallback chain that
//!   keeps clustering best-effort
//! - [`summary`]: per-group sizes and text previews
//!
//! Embedding models and record stores stay outside the crate, behind the
//! traits in [`source`].
//!
//! ```rust
//! use cortex_cluster::{ClusterEngine, ClusterRequest, EmbeddingRecord};
//!
//! let records = vec![
//!     EmbeddingRecord::new("a", "buy milk", vec![0.0, 0.1]),
//!     EmbeddingRecord::new("b", "buy eggs", vec![0.1, 0.0]),
//!     EmbeddingRecord::new("c", "rust traits", vec![9.0, 9.1]),
//!     EmbeddingRecord::new("d", "rust lifetimes", vec![9.1, 9.0]),
//! ];
//!
//! let groups = ClusterEngine::default().cluster(records, &ClusterRequest::default());
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups.total_records(), 4);
//! ```

#![forbid(unsafe_code)]

pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod quality;
pub mod record;
pub mod source;
pub mod summary;

pub use cluster::{Clustering, Kmeans, KmeansFit};
pub use config::{ClusterRequest, EngineConfig};
pub use engine::{
    CandidateOutcome, ClusterEngine, FallbackChain, KSelection, KmeansPartitioner, Partitioner,
    Recovery,
};
pub use error::{BoxError, Error, Result};
pub use normalize::{standardize, Standardizer};
pub use quality::{silhouette_score, QualityScorer, Silhouette};
pub use record::{validate_batch, ClusterAssignment, EmbeddingRecord};
pub use source::{embed_record, Embedder, RecordSource};
pub use summary::{summarize, ClusterSummary, GroupSummary};
