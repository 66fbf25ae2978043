//! Partitioning of dense vectors into a fixed number of groups.
//!
//! ## K-means
//!
//! Assign each point to the nearest centroid, then move each centroid to the
//! mean of its points. Repeat.
//!
//! **Objective**: minimize the within-cluster sum of squares:
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} ||x - μ_k||²
//! ```
//!
//! **Assumptions**:
//! - Clusters are roughly spherical
//! - Clusters have similar sizes
//! - k is given
//!
//! The last assumption is what [`crate::engine`] removes: it runs k-means for a
//! range of k and keeps the one with the best silhouette.
//!
//! ## Usage
//!
//! ```rust
//! use cortex_cluster::cluster::{Clustering, Kmeans};
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ];
//!
//! let labels = Kmeans::new(2).with_seed(42).fit_predict(&data).unwrap();
//! assert_eq!(labels[0], labels[1]);  // First two together
//! assert_ne!(labels[0], labels[2]);  // Separate from last two
//! ```

mod kmeans;
mod traits;
pub(crate) mod util;

pub use kmeans::{Kmeans, KmeansFit};
pub use traits::Clustering;
