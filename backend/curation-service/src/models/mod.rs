use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category key used when a business has neither subcategory nor category.
pub const MISC_CATEGORY: &str = "miscellaneous";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A business eligible for ranking, as a read-only snapshot of the
/// repository row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    /// 0.0 - 5.0; 0 means no ratings yet. Not guaranteed consistent with `review_count`.
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub geo: Option<GeoPoint>,
    #[serde(default)]
    pub verified: bool,
    /// Denormalized primary image, when the source already has it.
    #[serde(default)]
    pub primary_image_url: Option<String>,
    /// Score assigned by the offline ranking job. Absent on repository rows.
    #[serde(default)]
    pub precomputed_score: Option<f64>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            subcategory: None,
            average_rating: 0.0,
            review_count: 0,
            last_activity_at: None,
            geo: None,
            verified: false,
            primary_image_url: None,
            precomputed_score: None,
        }
    }

    /// Diversity key: trimmed, lowercased subcategory, else category, else
    /// [`MISC_CATEGORY`].
    pub fn category_key(&self) -> String {
        [self.subcategory.as_deref(), self.category.as_deref()]
            .into_iter()
            .flatten()
            .map(|c| c.trim().to_lowercase())
            .find(|c| !c.is_empty())
            .unwrap_or_else(|| MISC_CATEGORY.to_string())
    }
}

/// Candidate plus its derived score. Computed per cache miss, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub candidate: Candidate,
    pub score: f64,
    /// 1-based, scoped to the entry's sub-list.
    pub rank: u32,
    pub is_leader: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub leaders: Vec<RankedEntry>,
    pub followers: Vec<RankedEntry>,
}

impl RankedResult {
    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty() && self.followers.is_empty()
    }

    pub fn total_count(&self) -> usize {
        self.leaders.len() + self.followers.len()
    }

    /// Leaders then followers, in rank order.
    pub fn entries(&self) -> impl Iterator<Item = &RankedEntry> {
        self.leaders.iter().chain(self.followers.iter())
    }
}

/// Which retrieval path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Precomputed,
    Fallback,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Precomputed => "precomputed",
            SourceTag::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value held by the curation cache: the ranking plus the path that served it.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRanking {
    pub result: RankedResult,
    pub source: SourceTag,
}

/// Query handed to both retrieval sources. The repository ignores `geo` and
/// treats `limit` as its pool size.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub category: Option<String>,
    pub geo: Option<GeoPoint>,
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_key_prefers_subcategory() {
        let mut c = Candidate::new("a", "Cafe");
        c.category = Some("Food".to_string());
        c.subcategory = Some("  Coffee Shops ".to_string());
        assert_eq!(c.category_key(), "coffee shops");
    }

    #[test]
    fn test_category_key_falls_back_to_category_then_misc() {
        let mut c = Candidate::new("a", "Cafe");
        c.category = Some("Food".to_string());
        c.subcategory = Some("   ".to_string());
        assert_eq!(c.category_key(), "food");

        let bare = Candidate::new("b", "Unknown");
        assert_eq!(bare.category_key(), MISC_CATEGORY);
    }

    #[test]
    fn test_source_tag_serializes_lowercase() {
        let json = serde_json::to_string(&SourceTag::Fallback).unwrap();
        assert_eq!(json, "\"fallback\"");
    }

    #[test]
    fn test_candidate_deserializes_with_missing_fields() {
        let c: Candidate = serde_json::from_str(r#"{"id":"x","name":"X"}"#).unwrap();
        assert_eq!(c.review_count, 0);
        assert!(c.geo.is_none());
        assert_eq!(c.category_key(), MISC_CATEGORY);
    }
}
