//! Decision-outcome metrics, registered into the same `prometheus::Registry`
//! that `metrics-endpoint::run_metrics_endpoint` serves on `/metrics`.

use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

pub struct AuthMetrics {
    pub decisions_total: IntCounterVec,
    pub cache_hits_total: IntCounterVec,
    pub logger_dropped_total: IntGauge,
    pub logger_queue_depth: IntGauge,
    pub store_reachable: IntGauge,
}

impl AuthMetrics {
    pub fn register(registry: &Registry) -> Self {
        let decisions_total = IntCounterVec::new(
            Opts::new("authd_decisions_total", "Decisions made, by endpoint and outcome"),
            &["endpoint", "outcome"],
        )
        .expect("metric definition is valid");
        let cache_hits_total = IntCounterVec::new(
            Opts::new("authd_cache_lookups_total", "Verdict cache lookups, by hit/miss"),
            &["outcome"],
        )
        .expect("metric definition is valid");
        let logger_dropped_total =
            IntGauge::new("authd_logger_dropped_records", "Activity records dropped due to a full queue")
                .expect("metric definition is valid");
        let logger_queue_depth =
            IntGauge::new("authd_logger_queue_depth", "Activity records currently queued")
                .expect("metric definition is valid");
        let store_reachable =
            IntGauge::new("authd_store_reachable", "1 if the credential store answered the last health probe")
                .expect("metric definition is valid");

        registry
            .register(Box::new(decisions_total.clone()))
            .expect("metric registration does not collide");
        registry
            .register(Box::new(cache_hits_total.clone()))
            .expect("metric registration does not collide");
        registry
            .register(Box::new(logger_dropped_total.clone()))
            .expect("metric registration does not collide");
        registry
            .register(Box::new(logger_queue_depth.clone()))
            .expect("metric registration does not collide");
        registry
            .register(Box::new(store_reachable.clone()))
            .expect("metric registration does not collide");

        Self {
            decisions_total,
            cache_hits_total,
            logger_dropped_total,
            logger_queue_depth,
            store_reachable,
        }
    }

    pub fn record_decision(&self, endpoint: &str, outcome: &str) {
        self.decisions_total.with_label_values(&[endpoint, outcome]).inc();
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits_total.with_label_values(&["hit"]).inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_hits_total.with_label_values(&["miss"]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_against_distinct_registries_does_not_panic() {
        let _a = AuthMetrics::register(&Registry::new());
        let _b = AuthMetrics::register(&Registry::new());
    }

    #[test]
    fn decisions_total_increments_by_label() {
        let registry = Registry::new();
        let metrics = AuthMetrics::register(&registry);
        metrics.record_decision("register", "allow");
        metrics.record_decision("register", "allow");
        metrics.record_decision("register", "deny");
        assert_eq!(
            metrics
                .decisions_total
                .with_label_values(&["register", "allow"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .decisions_total
                .with_label_values(&["register", "deny"])
                .get(),
            1
        );
    }
}
