//! Presentation Mapper
//!
//! Turns ranked entries into client view models. Pure formatting: score and
//! rank pass through untouched. Display shuffling, when enabled, permutes the
//! order of each tier after ranks are assigned.

use crate::config::PresentationConfig;
use crate::error::Result;
use crate::models::{RankedEntry, RankedResult, MISC_CATEGORY};
use async_trait::async_trait;
use futures::future::join_all;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Primary image lookup for businesses without a denormalized image.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetLookup: Send + Sync {
    async fn fetch_primary_image(&self, candidate_id: &str) -> Result<Option<String>>;
}

/// Lookup that never finds anything; every business gets a placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

#[async_trait]
impl AssetLookup for NoAssets {
    async fn fetch_primary_image(&self, _candidate_id: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Display-order permutation applied at the presentation boundary.
pub trait Shuffler: Send + Sync {
    fn shuffle(&self, views: &mut [CuratedBusinessView]);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoShuffle;

impl Shuffler for NoShuffle {
    fn shuffle(&self, _views: &mut [CuratedBusinessView]) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomShuffle;

impl Shuffler for RandomShuffle {
    fn shuffle(&self, views: &mut [CuratedBusinessView]) {
        views.shuffle(&mut rand::thread_rng());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    Verified,
    TopPick,
    New,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedBusinessView {
    pub id: String,
    pub name: String,
    pub category_label: String,
    pub image_url: String,
    /// One decimal, absent until the business has reviews.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_display: Option<String>,
    pub review_count: i64,
    pub badges: Vec<Badge>,
    pub score: f64,
    pub rank: u32,
    pub is_leader: bool,
}

pub struct PresentationMapper {
    assets: Arc<dyn AssetLookup>,
    shuffler: Arc<dyn Shuffler>,
    placeholder_base_url: String,
}

impl PresentationMapper {
    pub fn new(
        assets: Arc<dyn AssetLookup>,
        shuffler: Arc<dyn Shuffler>,
        placeholder_base_url: impl Into<String>,
    ) -> Self {
        Self {
            assets,
            shuffler,
            placeholder_base_url: placeholder_base_url.into(),
        }
    }

    pub fn from_config(assets: Arc<dyn AssetLookup>, config: &PresentationConfig) -> Self {
        let shuffler: Arc<dyn Shuffler> = if config.shuffle_display {
            Arc::new(RandomShuffle)
        } else {
            Arc::new(NoShuffle)
        };
        Self::new(assets, shuffler, config.placeholder_base_url.clone())
    }

    /// Map both tiers. Returns `(leaders, followers)`.
    pub async fn map_result(
        &self,
        result: &RankedResult,
    ) -> (Vec<CuratedBusinessView>, Vec<CuratedBusinessView>) {
        let leaders = self.map_entries(&result.leaders).await;
        let followers = self.map_entries(&result.followers).await;
        (leaders, followers)
    }

    /// Image lookups for the tier run concurrently; output keeps entry order
    /// until the shuffler runs.
    pub async fn map_entries(&self, entries: &[RankedEntry]) -> Vec<CuratedBusinessView> {
        let mut views = join_all(entries.iter().map(|entry| self.map_entry(entry))).await;
        self.shuffler.shuffle(&mut views);
        views
    }

    async fn map_entry(&self, entry: &RankedEntry) -> CuratedBusinessView {
        let candidate = &entry.candidate;
        let category_key = candidate.category_key();
        let image_url = self
            .resolve_image(
                &candidate.id,
                candidate.primary_image_url.as_deref(),
                &category_key,
            )
            .await;

        let has_reviews = candidate.review_count > 0 && candidate.average_rating > 0.0;
        let mut badges = Vec::new();
        if candidate.verified {
            badges.push(Badge::Verified);
        }
        if entry.is_leader && entry.rank == 1 {
            badges.push(Badge::TopPick);
        }
        if !has_reviews {
            badges.push(Badge::New);
        }

        CuratedBusinessView {
            id: candidate.id.clone(),
            name: candidate.name.clone(),
            category_label: category_label(&category_key),
            image_url,
            rating_display: has_reviews
                .then(|| format!("{:.1}", candidate.average_rating.clamp(0.0, 5.0))),
            review_count: candidate.review_count.max(0),
            badges,
            score: entry.score,
            rank: entry.rank,
            is_leader: entry.is_leader,
        }
    }

    /// Denormalized image, then asset lookup, then category placeholder.
    async fn resolve_image(
        &self,
        id: &str,
        denormalized: Option<&str>,
        category_key: &str,
    ) -> String {
        if let Some(url) = denormalized.filter(|u| !u.trim().is_empty()) {
            return url.to_string();
        }

        match self.assets.fetch_primary_image(id).await {
            Ok(Some(url)) if !url.trim().is_empty() => url,
            Ok(_) => self.placeholder(category_key),
            Err(e) => {
                warn!(
                    business_id = %id,
                    error = %e,
                    "Primary image lookup failed, using placeholder"
                );
                self.placeholder(category_key)
            }
        }
    }

    fn placeholder(&self, category_key: &str) -> String {
        let base = self.placeholder_base_url.trim_end_matches('/');
        if category_key == MISC_CATEGORY {
            format!("{}/business.png", base)
        } else {
            let slug: String = category_key
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                .collect();
            format!("{}/{}.png", base, slug)
        }
    }
}

/// "coffee shops" -> "Coffee Shops"
fn category_label(category_key: &str) -> String {
    category_key
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CurationError;
    use crate::models::Candidate;

    fn entry(id: &str, rank: u32, is_leader: bool) -> RankedEntry {
        let mut candidate = Candidate::new(id, format!("Business {id}"));
        candidate.subcategory = Some("Coffee Shops".to_string());
        candidate.average_rating = 4.56;
        candidate.review_count = 40;
        RankedEntry {
            candidate,
            score: 4.2,
            rank,
            is_leader,
        }
    }

    fn mapper(assets: impl AssetLookup + 'static) -> PresentationMapper {
        PresentationMapper::new(Arc::new(assets), Arc::new(NoShuffle), "/static/placeholders/")
    }

    struct Reverse;

    impl Shuffler for Reverse {
        fn shuffle(&self, views: &mut [CuratedBusinessView]) {
            views.reverse();
        }
    }

    #[tokio::test]
    async fn test_maps_labels_rating_and_badges() {
        let mut top = entry("a", 1, true);
        top.candidate.verified = true;

        let views = mapper(NoAssets).map_entries(&[top]).await;

        let view = &views[0];
        assert_eq!(view.category_label, "Coffee Shops");
        assert_eq!(view.rating_display.as_deref(), Some("4.6"));
        assert_eq!(view.badges, vec![Badge::Verified, Badge::TopPick]);
        assert_eq!(view.image_url, "/static/placeholders/coffee-shops.png");
        assert_eq!(view.rank, 1);
        assert_eq!(view.score, 4.2);
    }

    #[tokio::test]
    async fn test_unreviewed_business_is_new_without_rating() {
        let mut fresh = entry("n", 2, false);
        fresh.candidate.review_count = 0;
        fresh.candidate.average_rating = 0.0;
        fresh.candidate.subcategory = None;

        let views = mapper(NoAssets).map_entries(&[fresh]).await;

        assert_eq!(views[0].badges, vec![Badge::New]);
        assert!(views[0].rating_display.is_none());
        assert_eq!(views[0].category_label, "Miscellaneous");
        assert_eq!(views[0].image_url, "/static/placeholders/business.png");
    }

    #[tokio::test]
    async fn test_image_resolution_order() {
        let mut assets = MockAssetLookup::new();
        assets
            .expect_fetch_primary_image()
            .withf(|id| id == "b")
            .returning(|_| Ok(Some("https://cdn.example/b.jpg".to_string())));
        assets
            .expect_fetch_primary_image()
            .withf(|id| id == "c")
            .returning(|_| Err(CurationError::Repository("timeout".to_string())));

        let mut denormalized = entry("a", 1, true);
        denormalized.candidate.primary_image_url = Some("https://cdn.example/a.jpg".to_string());

        let views = mapper(assets)
            .map_entries(&[denormalized, entry("b", 2, true), entry("c", 3, true)])
            .await;

        assert_eq!(views[0].image_url, "https://cdn.example/a.jpg");
        assert_eq!(views[1].image_url, "https://cdn.example/b.jpg");
        assert_eq!(views[2].image_url, "/static/placeholders/coffee-shops.png");
    }

    struct SlowAssets;

    #[async_trait]
    impl AssetLookup for SlowAssets {
        async fn fetch_primary_image(&self, candidate_id: &str) -> Result<Option<String>> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(Some(format!("https://cdn.example/{candidate_id}.jpg")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_lookups_run_concurrently() {
        let entries: Vec<RankedEntry> = (1..=10)
            .map(|i| entry(&format!("b{i}"), i, false))
            .collect();
        let started = tokio::time::Instant::now();

        let views = mapper(SlowAssets).map_entries(&entries).await;

        // Ten sequential lookups would take two seconds
        assert!(started.elapsed() < std::time::Duration::from_millis(400));
        assert_eq!(views.len(), 10);
        assert_eq!(views[0].image_url, "https://cdn.example/b1.jpg");
        assert_eq!(views[9].image_url, "https://cdn.example/b10.jpg");
    }

    #[tokio::test]
    async fn test_shuffle_keeps_merit_ranks() {
        let mapper = PresentationMapper::new(Arc::new(NoAssets), Arc::new(Reverse), "/p");
        let result = RankedResult {
            leaders: vec![entry("a", 1, true), entry("b", 2, true)],
            followers: vec![entry("c", 1, false)],
        };

        let (leaders, followers) = mapper.map_result(&result).await;

        assert_eq!(leaders[0].id, "b");
        assert_eq!(leaders[0].rank, 2);
        assert_eq!(leaders[1].rank, 1);
        assert_eq!(followers[0].rank, 1);
    }

    #[test]
    fn test_category_label() {
        assert_eq!(category_label("thai food"), "Thai Food");
        assert_eq!(category_label("spas"), "Spas");
    }
}
