//! Curation metrics for observability

use crate::models::SourceTag;
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<CurationMetricsInner> = OnceLock::new();

struct CurationMetricsInner {
    sources: IntCounterVec,
    cache_events: IntCounterVec,
}

impl CurationMetricsInner {
    fn new() -> Self {
        Self {
            sources: IntCounterVec::new(
                Opts::new(
                    "curation_source_total",
                    "Curated selections computed, by retrieval path",
                ),
                &["source"],
            )
            .expect("valid metric definition"),
            cache_events: IntCounterVec::new(
                Opts::new("curation_cache_events_total", "Curation cache events"),
                &["event"],
            )
            .expect("valid metric definition"),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.sources.clone()))?;
        registry.register(Box::new(self.cache_events.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static CurationMetricsInner {
    METRICS.get_or_init(CurationMetricsInner::new)
}

/// Public facade over the process-wide counters.
pub struct CurationMetrics;

impl CurationMetrics {
    /// Register counters with a Prometheus registry. Call once at startup.
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_source(source: SourceTag) {
        get_metrics()
            .sources
            .with_label_values(&[source.as_str()])
            .inc();
    }

    pub fn record_hit() {
        Self::record_cache_event("hit", 1);
    }

    pub fn record_miss() {
        Self::record_cache_event("miss", 1);
    }

    pub fn record_sweep_evicted(count: usize) {
        Self::record_cache_event("sweep_evicted", count as u64);
    }

    fn record_cache_event(event: &str, count: u64) {
        get_metrics()
            .cache_events
            .with_label_values(&[event])
            .inc_by(count);
    }

    pub fn source_count(source: SourceTag) -> u64 {
        get_metrics()
            .sources
            .with_label_values(&[source.as_str()])
            .get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_record() {
        let registry = Registry::new();
        CurationMetrics::register(&registry).unwrap();

        let before = CurationMetrics::source_count(SourceTag::Fallback);
        CurationMetrics::record_source(SourceTag::Fallback);
        assert!(CurationMetrics::source_count(SourceTag::Fallback) > before);

        CurationMetrics::record_hit();
        CurationMetrics::record_sweep_evicted(3);
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "curation_cache_events_total"));
    }
}
