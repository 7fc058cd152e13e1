use crate::error::{CurationError, Result};
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "CURATION_";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub scoring: ScoringConfig,
    pub selection: SelectionConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub presentation: PresentationConfig,
    pub adapters: AdapterConfig,
}

/// Bayesian shrinkage and blend weights for the score calculator.
///
/// `prior_mean` and `prior_weight` act as `prior_weight` pseudo-reviews of
/// `prior_mean` stars added to every business.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub prior_mean: f64,
    pub prior_weight: f64,
    pub rating_weight: f64,
    pub volume_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            prior_mean: 4.0,
            prior_weight: 5.0,
            rating_weight: 0.7,
            volume_weight: 0.3,
        }
    }
}

/// Shape of the curated list: `leader_size` diverse leaders followed by
/// runners-up up to `total_size`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub leader_size: usize,
    pub total_size: usize,
    /// Backfill target when category variety is thin.
    pub min_fill: usize,
    /// Hard cap on any caller-requested limit.
    pub max_limit: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            leader_size: 3,
            total_size: 13,
            min_fill: 4,
            max_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub precomputed_timeout_ms: u64,
    pub oversample_factor: usize,
    pub max_pool_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            precomputed_timeout_ms: 800,
            oversample_factor: 5,
            max_pool_size: 200,
        }
    }
}

impl RetrievalConfig {
    pub fn precomputed_timeout(&self) -> Duration {
        Duration::from_millis(self.precomputed_timeout_ms)
    }

    /// Raw pool size pulled on the fallback path for a requested `limit`.
    pub fn fallback_pool_size(&self, limit: usize) -> usize {
        let oversampled = limit.saturating_mul(self.oversample_factor.max(1));
        oversampled.min(self.max_pool_size).max(limit)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub sweep_threshold: usize,
    /// Decimal places kept when bucketing coordinates (2 ~ 1 km).
    pub geo_precision: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            sweep_threshold: 100,
            geo_precision: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    pub shuffle_display: bool,
    pub placeholder_base_url: String,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            shuffle_display: false,
            placeholder_base_url: "/static/placeholders".to_string(),
        }
    }
}

/// Endpoints for the bundled Postgres and Redis adapters. Unprefixed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdapterConfig {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let prefixed = envy::prefixed(ENV_PREFIX);
        let config = Config {
            scoring: prefixed.from_env().map_err(config_error)?,
            selection: prefixed.from_env().map_err(config_error)?,
            retrieval: prefixed.from_env().map_err(config_error)?,
            cache: prefixed.from_env().map_err(config_error)?,
            presentation: prefixed.from_env().map_err(config_error)?,
            adapters: envy::from_env().map_err(config_error)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        let weights = [s.prior_mean, s.prior_weight, s.rating_weight, s.volume_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CurationError::Config(
                "scoring weights must be finite and non-negative".to_string(),
            ));
        }
        let sel = &self.selection;
        if sel.total_size == 0 {
            return Err(CurationError::Config(
                "CURATION_TOTAL_SIZE must be at least 1".to_string(),
            ));
        }
        if sel.leader_size > sel.total_size {
            return Err(CurationError::Config(format!(
                "CURATION_LEADER_SIZE ({}) must not exceed CURATION_TOTAL_SIZE ({})",
                sel.leader_size, sel.total_size
            )));
        }
        Ok(())
    }
}

fn config_error(e: envy::Error) -> CurationError {
    CurationError::Config(e.to_string())
}
