//! Postgres-backed candidate repository and image lookup
//!
//! Read-only queries over the application's `businesses`, `reviews` and
//! `business_images` tables. The candidate query filters by category only;
//! location does not narrow the pool.

use super::CandidateRepository;
use crate::error::Result;
use crate::models::{Candidate, CandidateQuery, GeoPoint};
use crate::services::presentation::AssetLookup;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

type CandidateRow = (
    String,                // id
    String,                // name
    Option<String>,        // category
    Option<String>,        // subcategory
    f64,                   // average_rating
    i64,                   // review_count
    Option<DateTime<Utc>>, // last_activity_at
    Option<f64>,           // latitude
    Option<f64>,           // longitude
    bool,                  // is_verified
    Option<String>,        // primary_image_url
);

#[derive(Clone)]
pub struct PgCandidateRepository {
    pool: PgPool,
}

impl PgCandidateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandidateRepository for PgCandidateRepository {
    async fn fetch_candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT
                b.id::TEXT AS id,
                b.name,
                b.category,
                b.subcategory,
                COALESCE(r.average_rating, 0)::FLOAT8 AS average_rating,
                COALESCE(r.review_count, 0)::INT8 AS review_count,
                b.last_activity_at,
                b.latitude::FLOAT8 AS latitude,
                b.longitude::FLOAT8 AS longitude,
                b.is_verified,
                b.primary_image_url
            FROM businesses b
            LEFT JOIN (
                SELECT business_id, AVG(rating) AS average_rating, COUNT(*) AS review_count
                FROM reviews
                GROUP BY business_id
            ) r ON r.business_id = b.id
            WHERE b.is_active = TRUE
                AND ($1::TEXT IS NULL
                    OR LOWER(b.category) = $1
                    OR LOWER(b.subcategory) = $1)
            ORDER BY review_count DESC, b.id
            LIMIT $2
            "#,
        )
        .bind(query.category.as_deref())
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            category = query.category.as_deref().unwrap_or("all"),
            rows = rows.len(),
            "Fetched candidate pool"
        );

        Ok(rows.into_iter().map(candidate_from_row).collect())
    }
}

fn candidate_from_row(row: CandidateRow) -> Candidate {
    let (
        id,
        name,
        category,
        subcategory,
        average_rating,
        review_count,
        last_activity_at,
        latitude,
        longitude,
        verified,
        primary_image_url,
    ) = row;

    Candidate {
        id,
        name,
        category,
        subcategory,
        average_rating,
        review_count,
        last_activity_at,
        geo: latitude.zip(longitude).map(|(lat, lng)| GeoPoint::new(lat, lng)),
        verified,
        primary_image_url,
        precomputed_score: None,
    }
}

#[derive(Clone)]
pub struct PgAssetLookup {
    pool: PgPool,
}

impl PgAssetLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetLookup for PgAssetLookup {
    async fn fetch_primary_image(&self, candidate_id: &str) -> Result<Option<String>> {
        let url = sqlx::query_scalar::<_, String>(
            r#"
            SELECT url
            FROM business_images
            WHERE business_id::TEXT = $1
            ORDER BY is_primary DESC, sort_order ASC, created_at ASC
            LIMIT 1
            "#,
        )
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_from_row_requires_both_coordinates() {
        let row: CandidateRow = (
            "b1".to_string(),
            "Corner Bakery".to_string(),
            Some("Food".to_string()),
            Some("Bakeries".to_string()),
            4.5,
            12,
            None,
            Some(37.77),
            None,
            true,
            None,
        );

        let candidate = candidate_from_row(row);

        assert!(candidate.geo.is_none());
        assert!(candidate.verified);
        assert_eq!(candidate.category_key(), "bakeries");
    }

    #[test]
    fn test_candidate_from_row_maps_geo() {
        let row: CandidateRow = (
            "b2".to_string(),
            "Night Owl".to_string(),
            None,
            None,
            0.0,
            0,
            None,
            Some(40.7),
            Some(-74.0),
            false,
            Some("https://cdn.example/b2.jpg".to_string()),
        );

        let candidate = candidate_from_row(row);

        assert_eq!(candidate.geo, Some(GeoPoint::new(40.7, -74.0)));
        assert_eq!(
            candidate.primary_image_url.as_deref(),
            Some("https://cdn.example/b2.jpg")
        );
    }
}
