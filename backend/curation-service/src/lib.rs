//! Curation engine for the featured and curated discovery surfaces.
//!
//! Pipeline: cache lookup -> retrieval (precomputed ranking, local fallback)
//! -> scoring -> diversity selection -> presentation.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{CurationError, Result};
pub use services::{
    CurationCache, CurationService, PresentationMapper, RankingSelector, RetrievalStrategy,
    ScoreCalculator,
};
