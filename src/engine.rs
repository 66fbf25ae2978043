//! Group-count selection and clustering of embedding records.
//!
//! [`ClusterEngine`] ties the pieces together:
//!
//! 1. validate the batch and standardize its embeddings ([`crate::normalize`]),
//! 2. resolve the group count: search `2..=max_k` for the best silhouette,
//!    fall back to a default, or honor a fixed request (clamped to the batch size),
//! 3. partition with the resolved count,
//! 4. group records by label, in input order.
//!
//! Clustering is best-effort. If anything in steps 1-4 fails, the engine walks a
//! [`FallbackChain`] and returns a degraded grouping instead of an error.
//!
//! The engine holds no state between calls beyond its configuration; every
//! call refits the standardizer and reruns k-means with the configured seed.

use std::fmt;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cluster::{Clustering, Kmeans};
use crate::config::{ClusterRequest, EngineConfig};
use crate::error::{BoxError, Error, Result};
use crate::normalize;
use crate::quality::{distinct_labels, QualityScorer, Silhouette};
use crate::record::{validate_batch, ClusterAssignment, EmbeddingRecord};
use crate::source::RecordSource;
use crate::summary::{summarize_with, ClusterSummary};

/// Assigns one label per row for a requested group count.
pub trait Partitioner {
    /// Partition `data` into (at most) `k` groups.
    fn partition(&self, data: &[Vec<f32>], k: usize) -> Result<Vec<usize>>;
}

/// Seeded k-means with restarts.
#[derive(Debug, Clone)]
pub struct KmeansPartitioner {
    seed: u64,
    n_init: usize,
    max_iter: usize,
    tol: f32,
}

impl KmeansPartitioner {
    /// Take seed and iteration limits from `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            seed: config.seed,
            n_init: config.n_init,
            max_iter: config.max_iter,
            tol: config.tol,
        }
    }
}

impl Default for KmeansPartitioner {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Partitioner for KmeansPartitioner {
    fn partition(&self, data: &[Vec<f32>], k: usize) -> Result<Vec<usize>> {
        Kmeans::new(k)
            .with_seed(self.seed)
            .with_n_init(self.n_init)
            .with_max_iter(self.max_iter)
            .with_tol(self.tol)
            .fit_predict(data)
    }
}

/// Outcome of the group-count search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KSelection {
    /// Fewer than two points, or a search range below 2: one group, score 0.
    Trivial,
    /// Best-scoring candidate.
    Scored {
        /// Chosen group count.
        k: usize,
        /// Its quality score.
        score: f32,
    },
    /// No candidate produced a scorable labeling.
    Undetermined,
}

impl KSelection {
    /// Group count used when the search is undetermined.
    pub const UNDETERMINED_K: usize = 2;

    /// Group count to cluster with.
    pub fn k(&self) -> usize {
        match *self {
            KSelection::Trivial => 1,
            KSelection::Scored { k, .. } => k,
            KSelection::Undetermined => Self::UNDETERMINED_K,
        }
    }

    /// Quality score backing the choice; `None` when undetermined.
    pub fn score(&self) -> Option<f32> {
        match *self {
            KSelection::Trivial => Some(0.0),
            KSelection::Scored { score, .. } => Some(score),
            KSelection::Undetermined => None,
        }
    }

    /// `(k, score)` with `(2, -1.0)` standing in for "undetermined".
    pub fn as_pair(&self) -> (usize, f32) {
        (self.k(), self.score().unwrap_or(-1.0))
    }

    /// False only for [`KSelection::Undetermined`].
    pub fn is_determined(&self) -> bool {
        !matches!(self, KSelection::Undetermined)
    }
}

/// Result of trying one candidate group count.
#[derive(Debug)]
pub enum CandidateOutcome {
    /// The labeling could be scored.
    Scored {
        /// Candidate group count.
        k: usize,
        /// Quality score.
        score: f32,
    },
    /// The candidate was skipped.
    Unscorable {
        /// Candidate group count.
        k: usize,
        /// Why it was skipped.
        reason: Error,
    },
}

impl CandidateOutcome {
    /// Candidate group count.
    pub fn k(&self) -> usize {
        match self {
            CandidateOutcome::Scored { k, .. } | CandidateOutcome::Unscorable { k, .. } => *k,
        }
    }
}

/// Re-reads the record batch for [`Recovery::Refetch`].
pub type RefetchFn<'a> = dyn Fn() -> std::result::Result<Vec<EmbeddingRecord>, BoxError> + 'a;

/// One way of producing a degraded grouping.
pub enum Recovery<'a> {
    /// Fetch the batch again and return it as a single group.
    Refetch(&'a RefetchFn<'a>),
    /// Return the batch that failed as a single group.
    SingleGroup,
    /// Return no groups.
    Empty,
}

impl fmt::Debug for Recovery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recovery::Refetch(_) => "Refetch",
            Recovery::SingleGroup => "SingleGroup",
            Recovery::Empty => "Empty",
        })
    }
}

/// Recovery steps tried in order after clustering fails.
#[derive(Debug)]
pub struct FallbackChain<'a> {
    steps: Vec<Recovery<'a>>,
}

impl<'a> FallbackChain<'a> {
    /// A chain of explicit steps.
    pub fn new(steps: Vec<Recovery<'a>>) -> Self {
        Self { steps }
    }

    /// Single group of the failed batch, then nothing.
    pub fn in_memory() -> Self {
        Self::new(vec![Recovery::SingleGroup, Recovery::Empty])
    }

    /// Steps in the order they are tried.
    pub fn steps(&self) -> &[Recovery<'a>] {
        &self.steps
    }

    /// Run the steps until one yields a grouping. Never fails: an exhausted
    /// chain gives an empty grouping.
    pub fn recover(&self, records: Vec<EmbeddingRecord>) -> ClusterAssignment {
        let mut batch = Some(records);
        for step in &self.steps {
            match step {
                Recovery::Refetch(fetch) => match fetch() {
                    Ok(fresh) => {
                        info!(records = fresh.len(), "returning re-fetched batch as a single group");
                        return ClusterAssignment::single(fresh);
                    }
                    Err(e) => error!(error = %e, "fallback re-fetch failed"),
                },
                Recovery::SingleGroup => {
                    if let Some(records) = batch.take() {
                        info!(records = records.len(), "returning fallback single group");
                        return ClusterAssignment::single(records);
                    }
                }
                Recovery::Empty => {
                    warn!("fallback exhausted, returning no groups");
                    return ClusterAssignment::empty();
                }
            }
        }
        ClusterAssignment::empty()
    }
}

/// Chooses a group count and clusters embedding records.
#[derive(Debug, Clone)]
pub struct ClusterEngine<P = KmeansPartitioner, S = Silhouette> {
    config: EngineConfig,
    partitioner: P,
    scorer: S,
}

impl ClusterEngine {
    /// k-means and silhouette, configured from `config`.
    pub fn new(config: EngineConfig) -> Self {
        let partitioner = KmeansPartitioner::from_config(&config);
        Self {
            config,
            partitioner,
            scorer: Silhouette,
        }
    }
}

impl Default for ClusterEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<P: Partitioner, S: QualityScorer> ClusterEngine<P, S> {
    /// Custom partitioning and scoring strategies.
    pub fn with_strategies(config: EngineConfig, partitioner: P, scorer: S) -> Self {
        Self {
            config,
            partitioner,
            scorer,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Partitioning strategy.
    pub fn partitioner(&self) -> &P {
        &self.partitioner
    }

    /// Scoring strategy.
    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Partition `data` into `k` groups and score the result.
    pub fn evaluate_candidate(&self, data: &[Vec<f32>], k: usize) -> CandidateOutcome {
        let labels = match self.partitioner.partition(data, k) {
            Ok(labels) => labels,
            Err(e) => {
                return CandidateOutcome::Unscorable {
                    k,
                    reason: Error::Partitioning {
                        k,
                        source: Box::new(e),
                    },
                }
            }
        };

        let distinct = distinct_labels(&labels);
        if distinct < 2 {
            return CandidateOutcome::Unscorable {
                k,
                reason: Error::ScoringUndefined { distinct },
            };
        }

        match self.scorer.score(data, &labels) {
            Ok(score) if score.is_finite() => CandidateOutcome::Scored { k, score },
            Ok(_) => CandidateOutcome::Unscorable {
                k,
                reason: Error::InvalidParameter {
                    name: "score",
                    message: "must be finite",
                },
            },
            Err(reason) => CandidateOutcome::Unscorable { k, reason },
        }
    }

    /// Search `2..=min(max_k, n - 1)` for the best-scoring group count.
    ///
    /// Candidates are tried in increasing order and only a strictly better
    /// score replaces the current best, so the lowest k wins ties. Candidates
    /// that fail or yield a single label are skipped.
    pub fn determine_optimal_group_count(&self, data: &[Vec<f32>], max_k: usize) -> KSelection {
        if data.len() < 2 {
            return KSelection::Trivial;
        }
        let upper = max_k.min(data.len() - 1);
        if upper < 2 {
            return KSelection::Trivial;
        }

        let best = (2..=upper)
            .map(|k| self.evaluate_candidate(data, k))
            .fold(None::<(usize, f32)>, |best, outcome| match outcome {
                CandidateOutcome::Scored { k, score } => {
                    debug!(k, score, "candidate scored");
                    match best {
                        Some((_, best_score)) if score <= best_score => best,
                        _ => Some((k, score)),
                    }
                }
                CandidateOutcome::Unscorable { k, reason } => {
                    warn!(k, error = %reason, "skipping candidate");
                    best
                }
            });

        match best {
            Some((k, score)) => {
                info!(k, score, "optimal group count");
                KSelection::Scored { k, score }
            }
            None => {
                warn!(upper, "no candidate group count could be scored");
                KSelection::Undetermined
            }
        }
    }

    /// Group count for a batch of `data.len()` standardized vectors.
    pub fn resolve_group_count(&self, data: &[Vec<f32>], request: &ClusterRequest) -> usize {
        let n = data.len();
        let k = match request.k {
            None if request.auto_k => {
                if n < self.config.min_records_for_search {
                    info!(records = n, "too few records to search, using one group");
                    1
                } else {
                    let max_k = request.max_k.unwrap_or(self.config.max_k);
                    self.determine_optimal_group_count(data, max_k).k()
                }
            }
            None => self.config.default_k.min(n),
            Some(k) => k,
        };

        if k > n {
            warn!(requested = k, records = n, "fewer records than groups, clamping");
            n
        } else {
            k
        }
    }

    /// Cluster `records`. Never fails: on error the batch comes back as one group.
    pub fn cluster(&self, records: Vec<EmbeddingRecord>, request: &ClusterRequest) -> ClusterAssignment {
        self.cluster_with_fallback(records, request, &FallbackChain::in_memory())
    }

    /// Fetch records from `source` and cluster them.
    ///
    /// A failed fetch is returned unchanged. After a clustering failure the
    /// source is queried again and its batch returned as one group.
    pub fn cluster_source<R: RecordSource + ?Sized>(
        &self,
        source: &R,
        request: &ClusterRequest,
    ) -> std::result::Result<ClusterAssignment, R::Error> {
        let records = source.fetch_all()?;
        let refetch = || source.fetch_all().map_err(|e| Box::new(e) as BoxError);
        let chain = FallbackChain::new(vec![
            Recovery::Refetch(&refetch),
            Recovery::SingleGroup,
            Recovery::Empty,
        ]);
        Ok(self.cluster_with_fallback(records, request, &chain))
    }

    /// Cluster `records` and summarize the groups.
    pub fn cluster_summary(
        &self,
        records: Vec<EmbeddingRecord>,
        request: &ClusterRequest,
    ) -> ClusterSummary {
        let assignment = self.cluster(records, request);
        let mut summary = summarize_with(
            &assignment,
            self.config.preview_samples,
            self.config.preview_chars,
        );
        summary.auto_determined_k = request.is_auto();
        summary
    }

    /// Cluster, walking `chain` if any step fails.
    pub fn cluster_with_fallback(
        &self,
        records: Vec<EmbeddingRecord>,
        request: &ClusterRequest,
        chain: &FallbackChain<'_>,
    ) -> ClusterAssignment {
        match records.len() {
            0 => {
                warn!("no records to cluster");
                return ClusterAssignment::empty();
            }
            1 => {
                info!("only one record, returning single group");
                return ClusterAssignment::single(records);
            }
            _ => {}
        }

        let labels = match self.label(&records, request) {
            Ok(labels) => labels,
            Err(e) => {
                error!(error = %e, "clustering failed");
                return chain.recover(records);
            }
        };

        let n = records.len();
        let assignment = ClusterAssignment::group_by_labels(records, &labels);
        info!(records = n, groups = assignment.len(), "clustered records");
        assignment
    }

    /// One label per record. Labels come straight from the partitioner, and
    /// there are always exactly `records.len()` of them.
    fn label(&self, records: &[EmbeddingRecord], request: &ClusterRequest) -> Result<Vec<usize>> {
        let d = validate_batch(records)?;
        let raw: Vec<Vec<f32>> = records.iter().map(|r| r.embedding.clone()).collect();
        let data = normalize::standardize_validated(&raw, d);
        let n = data.len();

        let k = self.resolve_group_count(&data, request);
        if k == 1 {
            info!("k=1, returning single group");
            return Ok(vec![0; n]);
        }

        let labels = self
            .partitioner
            .partition(&data, k)
            .map_err(|e| Error::Partitioning {
                k,
                source: Box::new(e),
            })?;
        if labels.len() != n {
            return Err(Error::Partitioning {
                k,
                source: Box::new(Error::InvalidParameter {
                    name: "labels",
                    message: "must have one label per record",
                }),
            });
        }

        if distinct_labels(&labels) > 1 {
            match self.scorer.score(&data, &labels) {
                Ok(score) => info!(k, score, "final clustering"),
                Err(e) => warn!(k, error = %e, "could not score final clustering"),
            }
        } else {
            info!(k, "final clustering formed a single group");
        }

        Ok(labels)
    }
}
