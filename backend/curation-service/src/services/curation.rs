//! Curation facade
//!
//! Entry points for the curated (leaders + followers) and featured
//! (single tier) discovery surfaces. Both run the same pipeline:
//!
//! 1. Validate the limit and normalize the category filter and location
//! 2. Look up the bucketed cache key
//! 3. On miss: retrieve (precomputed, else fallback), select, cache
//! 4. Map the ranking to view models
//!
//! The source tag is stored with each cached ranking so a hit still reports
//! which path originally served it.

use crate::config::{Config, SelectionConfig};
use crate::error::{CurationError, Result};
use crate::metrics::CurationMetrics;
use crate::models::{CachedRanking, CandidateQuery, GeoPoint, RankedResult, SourceTag};
use crate::services::cache::{CacheKey, CurationCache};
use crate::services::presentation::{AssetLookup, CuratedBusinessView, PresentationMapper};
use crate::services::retrieval::{
    CandidateRepository, PrecomputedRankingSource, RetrievalStrategy,
};
use crate::services::scoring::ScoreCalculator;
use crate::services::selection::RankingSelector;
use crate::utils::normalize_filter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const CURATED_SURFACE: &str = "curated";
const FEATURED_SURFACE: &str = "featured";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedSelection {
    pub leaders: Vec<CuratedBusinessView>,
    pub followers: Vec<CuratedBusinessView>,
    pub source_tag: SourceTag,
    pub total_count: usize,
}

pub struct CurationService {
    retrieval: RetrievalStrategy,
    selector: RankingSelector,
    cache: CurationCache<CachedRanking>,
    presenter: PresentationMapper,
    selection: SelectionConfig,
    geo_precision: u32,
}

impl CurationService {
    pub fn new(
        config: &Config,
        precomputed: Arc<dyn PrecomputedRankingSource>,
        repository: Arc<dyn CandidateRepository>,
        assets: Arc<dyn AssetLookup>,
    ) -> Self {
        let retrieval = RetrievalStrategy::new(
            precomputed,
            repository,
            ScoreCalculator::new(config.scoring.clone()),
            config.retrieval.clone(),
        );

        Self::from_parts(
            retrieval,
            RankingSelector::new(&config.selection),
            CurationCache::new(&config.cache),
            PresentationMapper::from_config(assets, &config.presentation),
            config,
        )
    }

    /// Assemble from prebuilt layers, e.g. a cache with an injected clock.
    pub fn from_parts(
        retrieval: RetrievalStrategy,
        selector: RankingSelector,
        cache: CurationCache<CachedRanking>,
        presenter: PresentationMapper,
        config: &Config,
    ) -> Self {
        Self {
            retrieval,
            selector,
            cache,
            presenter,
            selection: config.selection.clone(),
            geo_precision: config.cache.geo_precision,
        }
    }

    pub fn cache(&self) -> &CurationCache<CachedRanking> {
        &self.cache
    }

    /// Drop cached rankings for a category after its businesses change.
    pub fn invalidate_category(&self, category: Option<&str>) -> usize {
        self.cache
            .invalidate_category(normalize_filter(category).as_deref())
    }

    /// Leaders + followers for the curated surface.
    ///
    /// `limit` is the total size; 0 means the configured default. Negative
    /// limits are rejected.
    pub async fn get_curated_selection(
        &self,
        category: Option<&str>,
        geo: Option<GeoPoint>,
        limit: i64,
    ) -> Result<CuratedSelection> {
        let total_size = self.resolve_limit(limit)?;
        let leader_size = self.selection.leader_size.min(total_size);
        let category = normalize_filter(category);
        let geo = sanitize_geo(geo);

        let key = CacheKey::new(
            CURATED_SURFACE,
            category.as_deref(),
            geo,
            total_size,
            self.geo_precision,
        );
        let query = CandidateQuery {
            category,
            geo,
            limit: total_size,
        };

        let ranking = self
            .cache
            .get_or_compute(&key, || async {
                let outcome = self.retrieval.retrieve(&query).await?;
                let source = outcome.source();
                CurationMetrics::record_source(source);
                let result = self
                    .selector
                    .select(outcome.into_candidates(), leader_size, total_size);
                Ok(CachedRanking { result, source })
            })
            .await?;

        let (leaders, followers) = self.presenter.map_result(&ranking.result).await;
        debug!(
            key = %key,
            source = ranking.source.as_str(),
            leaders = leaders.len(),
            followers = followers.len(),
            "Curated selection ready"
        );

        Ok(CuratedSelection {
            total_count: leaders.len() + followers.len(),
            leaders,
            followers,
            source_tag: ranking.source,
        })
    }

    /// Single-tier diverse list for the featured surface.
    pub async fn get_featured_selection(
        &self,
        category: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CuratedBusinessView>> {
        let size = self.resolve_limit(limit)?;
        let category = normalize_filter(category);

        let key = CacheKey::new(
            FEATURED_SURFACE,
            category.as_deref(),
            None,
            size,
            self.geo_precision,
        );
        let query = CandidateQuery {
            category,
            geo: None,
            limit: size,
        };

        let ranking = self
            .cache
            .get_or_compute(&key, || async {
                let outcome = self.retrieval.retrieve(&query).await?;
                let source = outcome.source();
                CurationMetrics::record_source(source);
                let followers = self.selector.select_flat(outcome.into_candidates(), size);
                Ok(CachedRanking {
                    result: RankedResult {
                        leaders: Vec::new(),
                        followers,
                    },
                    source,
                })
            })
            .await?;

        debug!(
            key = %key,
            source = ranking.source.as_str(),
            count = ranking.result.followers.len(),
            "Featured selection ready"
        );
        Ok(self.presenter.map_entries(&ranking.result.followers).await)
    }

    fn resolve_limit(&self, limit: i64) -> Result<usize> {
        if limit < 0 {
            return Err(CurationError::InvalidInput(format!(
                "limit must not be negative, got {}",
                limit
            )));
        }
        if limit == 0 {
            return Ok(self.selection.total_size.min(self.selection.max_limit));
        }

        let max = self.selection.max_limit.max(1);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        if limit > max {
            debug!(requested = limit, max, "Clamping requested limit");
        }
        Ok(limit.min(max))
    }
}

/// Drop coordinates that cannot be bucketed.
fn sanitize_geo(geo: Option<GeoPoint>) -> Option<GeoPoint> {
    geo.filter(|p| {
        let valid = p.lat.is_finite()
            && p.lng.is_finite()
            && (-90.0..=90.0).contains(&p.lat)
            && (-180.0..=180.0).contains(&p.lng);
        if !valid {
            warn!(lat = p.lat, lng = p.lng, "Ignoring invalid geo point");
        }
        valid
    })
}
