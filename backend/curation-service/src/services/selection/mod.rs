use crate::config::SelectionConfig;
use crate::models::{RankedEntry, RankedResult, ScoredCandidate};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Ranking Selector - diversity-constrained top-K
///
/// Takes one representative per category key in score order, backfills from
/// the remaining pool when variety is thin, then splits the result into a
/// leaders tier and a followers tier.
#[derive(Debug, Clone)]
pub struct RankingSelector {
    min_fill: usize,
}

impl Default for RankingSelector {
    fn default() -> Self {
        Self::new(&SelectionConfig::default())
    }
}

impl RankingSelector {
    pub fn new(config: &SelectionConfig) -> Self {
        Self {
            min_fill: config.min_fill,
        }
    }

    pub fn with_min_fill(min_fill: usize) -> Self {
        Self { min_fill }
    }

    /// Select `total_size` entries, the first `leader_size` of them as leaders.
    ///
    /// Deterministic for identical input. `leader_size > total_size` is a
    /// configuration error and is corrected to `total_size`.
    pub fn select(
        &self,
        scored: Vec<ScoredCandidate>,
        leader_size: usize,
        total_size: usize,
    ) -> RankedResult {
        let leader_size = if leader_size > total_size {
            warn!(
                leader_size,
                total_size, "leader_size exceeds total_size, clamping"
            );
            total_size
        } else {
            leader_size
        };

        let picked = self.pick(scored, total_size);

        let mut followers: Vec<RankedEntry> = Vec::new();
        let mut leaders: Vec<RankedEntry> = Vec::with_capacity(leader_size);
        for (i, sc) in picked.into_iter().enumerate() {
            let is_leader = i < leader_size;
            let tier = if is_leader { &mut leaders } else { &mut followers };
            tier.push(RankedEntry {
                rank: tier.len() as u32 + 1,
                score: sc.score,
                candidate: sc.candidate,
                is_leader,
            });
        }

        RankedResult { leaders, followers }
    }

    /// Single-tier variant: diversity pick only, every entry a follower
    /// ranked from 1.
    pub fn select_flat(&self, scored: Vec<ScoredCandidate>, size: usize) -> Vec<RankedEntry> {
        self.select(scored, 0, size).followers
    }

    /// Sorted, one-per-category, backfilled and capped at `total_size`.
    fn pick(&self, mut scored: Vec<ScoredCandidate>, total_size: usize) -> Vec<ScoredCandidate> {
        if scored.is_empty() || total_size == 0 {
            return Vec::new();
        }

        sort_by_merit(&mut scored);

        let mut seen_categories: HashSet<String> = HashSet::new();
        let mut chosen = vec![false; scored.len()];
        let mut order: Vec<usize> = Vec::with_capacity(total_size);

        for (i, sc) in scored.iter().enumerate() {
            if order.len() >= total_size {
                break;
            }
            if seen_categories.insert(sc.candidate.category_key()) {
                chosen[i] = true;
                order.push(i);
            }
        }

        let diverse_count = order.len();
        let target = self.min_fill.min(total_size);
        if order.len() < target {
            let mut chosen_ids: HashSet<&str> = order
                .iter()
                .map(|&i| scored[i].candidate.id.as_str())
                .collect();
            for (i, sc) in scored.iter().enumerate() {
                if order.len() >= target {
                    break;
                }
                if !chosen[i] && chosen_ids.insert(sc.candidate.id.as_str()) {
                    chosen[i] = true;
                    order.push(i);
                }
            }
        }

        debug!(
            pool = scored.len(),
            distinct_categories = diverse_count,
            backfilled = order.len() - diverse_count,
            "Diversity selection complete"
        );

        let mut slots: Vec<Option<ScoredCandidate>> = scored.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect()
    }
}

/// Score desc, then review count desc, then id asc.
fn sort_by_merit(scored: &mut [ScoredCandidate]) {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.candidate.review_count.cmp(&a.candidate.review_count))
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });
}
