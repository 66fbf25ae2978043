use thiserror::Error;

/// Boxed error from an external collaborator (embedding model, record store).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the clustering core.
#[derive(Debug, Error)]
pub enum Error {
    /// Input slice is empty.
    #[error("empty input")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Requested cluster count is incompatible with the dataset.
    #[error("invalid cluster count: requested {requested}, but dataset has {n_items} items")]
    InvalidClusterCount {
        /// Requested number of clusters.
        requested: usize,
        /// Number of items in the dataset.
        n_items: usize,
    },

    /// Records in a batch have inconsistent dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// A value that must be non-empty was empty or whitespace.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// An embedding contains NaN or an infinite value.
    #[error("non-finite value at row {row}, column {column}")]
    NonFinite {
        /// Record index within the batch.
        row: usize,
        /// Dimension index.
        column: usize,
    },

    /// A quality score was requested for a labeling with fewer than two groups.
    #[error("quality score undefined: labeling has {distinct} distinct label(s)")]
    ScoringUndefined {
        /// Number of distinct labels found.
        distinct: usize,
    },

    /// The partitioning algorithm failed for a given group count.
    #[error("partitioning failed for k={k}: {source}")]
    Partitioning {
        /// Group count being fitted.
        k: usize,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// An external collaborator (embedding model) failed.
    #[error("upstream failure: {0}")]
    Upstream(#[source] BoxError),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
