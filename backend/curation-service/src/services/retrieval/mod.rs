mod pg_repository;
mod redis_source;

use crate::config::RetrievalConfig;
use crate::error::{CurationError, Result};
use crate::models::{Candidate, CandidateQuery, ScoredCandidate, SourceTag};
use crate::services::scoring::ScoreCalculator;
use crate::utils::with_timeout_result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use pg_repository::{PgAssetLookup, PgCandidateRepository};
pub use redis_source::RedisPrecomputedSource;

/// Read-only source of raw candidate rows. `None` category means all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn fetch_candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>>;
}

/// Offline ranking produced outside this process. May be slow, fail or be empty.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrecomputedRankingSource: Send + Sync {
    async fn fetch_precomputed(&self, query: &CandidateQuery) -> Result<Vec<Candidate>>;
}

/// Terminal state of one retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    Success {
        candidates: Vec<ScoredCandidate>,
        source: SourceTag,
    },
    EmptyResult {
        source: SourceTag,
    },
}

impl RetrievalOutcome {
    pub fn source(&self) -> SourceTag {
        match self {
            Self::Success { source, .. } | Self::EmptyResult { source } => *source,
        }
    }

    pub fn into_candidates(self) -> Vec<ScoredCandidate> {
        match self {
            Self::Success { candidates, .. } => candidates,
            Self::EmptyResult { .. } => Vec::new(),
        }
    }
}

/// Why the precomputed path was abandoned.
#[derive(Debug)]
enum FallbackReason {
    Failed(CurationError),
    Empty,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(e) => write!(f, "{}", e),
            Self::Empty => f.write_str("no rows"),
        }
    }
}

/// Retrieval Strategy - precomputed ranking first, local scoring as fallback
///
/// One precomputed attempt bounded by a timeout, then at most one fallback
/// hop to the candidate repository. The precomputed source is never retried
/// within a request. Repository failures propagate to the caller.
pub struct RetrievalStrategy {
    precomputed: Arc<dyn PrecomputedRankingSource>,
    repository: Arc<dyn CandidateRepository>,
    calculator: ScoreCalculator,
    config: RetrievalConfig,
}

impl RetrievalStrategy {
    pub fn new(
        precomputed: Arc<dyn PrecomputedRankingSource>,
        repository: Arc<dyn CandidateRepository>,
        calculator: ScoreCalculator,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            precomputed,
            repository,
            calculator,
            config,
        }
    }

    /// Retrieve a scored candidate pool for `query`, tagged with its source.
    pub async fn retrieve(&self, query: &CandidateQuery) -> Result<RetrievalOutcome> {
        let pool_query = CandidateQuery {
            limit: self.config.fallback_pool_size(query.limit),
            ..query.clone()
        };

        match self.try_precomputed(&pool_query).await {
            Ok(candidates) => {
                info!(
                    source = SourceTag::Precomputed.as_str(),
                    category = pool_query.category.as_deref().unwrap_or("all"),
                    count = candidates.len(),
                    "Served candidates from precomputed ranking"
                );
                Ok(RetrievalOutcome::Success {
                    candidates: self.score_precomputed(candidates),
                    source: SourceTag::Precomputed,
                })
            }
            Err(reason) => {
                warn!(
                    source = SourceTag::Precomputed.as_str(),
                    category = pool_query.category.as_deref().unwrap_or("all"),
                    reason = %reason,
                    "Precomputed ranking unavailable, falling back to local scoring"
                );
                self.try_fallback(&pool_query).await
            }
        }
    }

    async fn try_precomputed(
        &self,
        query: &CandidateQuery,
    ) -> std::result::Result<Vec<Candidate>, FallbackReason> {
        let fetched = with_timeout_result(
            self.config.precomputed_timeout(),
            self.precomputed.fetch_precomputed(query),
        )
        .await
        .map_err(FallbackReason::Failed)?;

        let candidates = dedupe_by_id(fetched);
        if candidates.is_empty() {
            return Err(FallbackReason::Empty);
        }
        Ok(candidates)
    }

    async fn try_fallback(&self, query: &CandidateQuery) -> Result<RetrievalOutcome> {
        let fetched = self
            .repository
            .fetch_candidates(query)
            .await
            .map_err(|e| match e {
                CurationError::Repository(_) => e,
                other => CurationError::Repository(other.to_string()),
            })?;

        let candidates = dedupe_by_id(fetched);
        if candidates.is_empty() {
            info!(
                source = SourceTag::Fallback.as_str(),
                category = query.category.as_deref().unwrap_or("all"),
                "Candidate pool is empty"
            );
            return Ok(RetrievalOutcome::EmptyResult {
                source: SourceTag::Fallback,
            });
        }

        info!(
            source = SourceTag::Fallback.as_str(),
            category = query.category.as_deref().unwrap_or("all"),
            pool_size = query.limit,
            count = candidates.len(),
            "Scored candidates locally"
        );

        Ok(RetrievalOutcome::Success {
            candidates: self.calculator.score_all(candidates),
            source: SourceTag::Fallback,
        })
    }

    /// Offline scores are kept only when every row carries one. A partly
    /// scored batch is ranked by snapshot position instead, since local scores
    /// live on a different scale and would reorder the offline ranking.
    fn score_precomputed(&self, candidates: Vec<Candidate>) -> Vec<ScoredCandidate> {
        let fully_scored = candidates
            .iter()
            .all(|c| c.precomputed_score.is_some_and(f64::is_finite));

        if !fully_scored {
            debug!(
                count = candidates.len(),
                "Precomputed batch partly unscored, ranking by snapshot position"
            );
        }

        let len = candidates.len();
        candidates
            .into_iter()
            .enumerate()
            .map(|(position, candidate)| {
                let score = match candidate.precomputed_score {
                    Some(s) if fully_scored => s,
                    _ => (len - position) as f64,
                };
                ScoredCandidate { candidate, score }
            })
            .collect()
    }
}

/// Collapse duplicate ids to their first occurrence.
fn dedupe_by_id(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let before = candidates.len();
    let mut seen: HashSet<String> = HashSet::new();
    let unique: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect();

    if unique.len() < before {
        debug!(dropped = before - unique.len(), "Dropped duplicate candidates");
    }
    unique
}
