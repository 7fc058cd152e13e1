use super::PrecomputedRankingSource;
use crate::error::Result;
use crate::models::{Candidate, CandidateQuery};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

const KEY_PREFIX: &str = "curation:precomputed";

/// Precomputed ranking stored in Redis by the offline ranking job.
///
/// One JSON array of candidates per category, already in ranked order:
/// `curation:precomputed:{category|all}`. A missing key reads as empty.
///
/// Snapshots are not geo-aware: `query.geo` is ignored and every location
/// reads the same category snapshot. Location only splits the response cache.
#[derive(Clone)]
pub struct RedisPrecomputedSource {
    conn: ConnectionManager,
}

impl RedisPrecomputedSource {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }

    pub fn snapshot_key(category: Option<&str>) -> String {
        format!("{}:{}", KEY_PREFIX, category.unwrap_or("all"))
    }
}

#[async_trait]
impl PrecomputedRankingSource for RedisPrecomputedSource {
    async fn fetch_precomputed(&self, query: &CandidateQuery) -> Result<Vec<Candidate>> {
        let key = Self::snapshot_key(query.category.as_deref());
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;

        let Some(json) = raw else {
            debug!(key = %key, "No precomputed snapshot");
            return Ok(Vec::new());
        };

        let mut candidates: Vec<Candidate> = serde_json::from_str(&json)?;
        candidates.truncate(query.limit);
        debug!(key = %key, count = candidates.len(), "Loaded precomputed snapshot");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key() {
        assert_eq!(
            RedisPrecomputedSource::snapshot_key(Some("bakeries")),
            "curation:precomputed:bakeries"
        );
        assert_eq!(
            RedisPrecomputedSource::snapshot_key(None),
            "curation:precomputed:all"
        );
    }
}
