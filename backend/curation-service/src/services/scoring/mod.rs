// ============================================
// Score Calculator
// ============================================
//
// Bayesian shrinkage rating blended with a log volume boost:
//
//   weighted = (rating * n + prior_mean * prior_weight) / (n + prior_weight)
//   volume   = ln(1 + n)
//   score    = weighted * rating_weight + volume * volume_weight
//
// Low-volume businesses are pulled toward the prior mean, so one 5-star
// review cannot outrank hundreds of 4.6 reviews. Pure, never fails.

use crate::config::ScoringConfig;
use crate::models::{Candidate, ScoredCandidate};

const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, Default)]
pub struct ScoreCalculator {
    config: ScoringConfig,
}

impl ScoreCalculator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Composite relevance score. Out-of-range stats are clamped first.
    pub fn score(&self, candidate: &Candidate) -> f64 {
        let reviews = candidate.review_count.max(0) as f64;
        let rating = clamp_rating(candidate.average_rating);

        let prior_weight = self.config.prior_weight;
        let denominator = reviews + prior_weight;
        let weighted_rating = if denominator > 0.0 {
            (rating * reviews + self.config.prior_mean * prior_weight) / denominator
        } else {
            // No reviews and no prior: nothing to shrink toward
            self.config.prior_mean
        };

        let volume_boost = reviews.ln_1p();

        weighted_rating * self.config.rating_weight + volume_boost * self.config.volume_weight
    }

    /// Score every candidate, keeping repository order.
    pub fn score_all(&self, candidates: Vec<Candidate>) -> Vec<ScoredCandidate> {
        candidates
            .into_iter()
            .map(|candidate| {
                let score = self.score(&candidate);
                ScoredCandidate { candidate, score }
            })
            .collect()
    }
}

fn clamp_rating(rating: f64) -> f64 {
    if rating.is_nan() {
        0.0
    } else {
        rating.clamp(0.0, MAX_RATING)
    }
}
