pub mod cache;
pub mod curation;
pub mod presentation;
pub mod retrieval;
pub mod scoring;
pub mod selection;

pub use cache::{CacheKey, Clock, CurationCache, SystemClock};
pub use curation::{CuratedSelection, CurationService};
pub use presentation::{
    AssetLookup, Badge, CuratedBusinessView, NoAssets, NoShuffle, PresentationMapper,
    RandomShuffle, Shuffler,
};
pub use retrieval::{
    CandidateRepository, PgAssetLookup, PgCandidateRepository, PrecomputedRankingSource,
    RedisPrecomputedSource, RetrievalOutcome, RetrievalStrategy,
};
pub use scoring::ScoreCalculator;
pub use selection::RankingSelector;
