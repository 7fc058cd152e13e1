// Utility functions for curation-service

use crate::error::{CurationError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Normalize a caller-supplied category filter. Blank means "all categories".
pub fn normalize_filter(category: Option<&str>) -> Option<String> {
    category
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty() && c != "all")
}

/// Round a coordinate to `precision` decimal places for cache bucketing.
pub fn round_coordinate(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Run a fallible future under a deadline; elapsed maps to `CurationError::Timeout`.
pub async fn with_timeout_result<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(CurationError::Timeout(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_filter() {
        assert_eq!(normalize_filter(Some("  Bakeries ")), Some("bakeries".to_string()));
        assert_eq!(normalize_filter(Some("ALL")), None);
        assert_eq!(normalize_filter(Some("   ")), None);
        assert_eq!(normalize_filter(None), None);
    }

    #[test]
    fn test_round_coordinate() {
        assert!((round_coordinate(37.77493, 2) - 37.77).abs() < 1e-9);
        assert!((round_coordinate(-122.41942, 2) - -122.42).abs() < 1e-9);
        assert!((round_coordinate(1.5, 0) - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_timeout_result_success() {
        let result = with_timeout_result(Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_elapsed() {
        let result = with_timeout_result(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(42)
        })
        .await;

        assert!(matches!(result, Err(CurationError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_timeout_passes_inner_error_through() {
        let result: Result<i32> = with_timeout_result(Duration::from_secs(1), async {
            Err(CurationError::Upstream("boom".to_string()))
        })
        .await;

        assert!(matches!(result, Err(CurationError::Upstream(_))));
    }
}
