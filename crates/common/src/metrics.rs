//! Prometheus metrics shared by the reconciliation engine and the daemon
//! binary, mirroring the teacher's `healthcheck-server::metrics`
//! (`Registry` built once, `Family`/`Gauge`/`Histogram` fields exposed
//! through small `record_*`/`set_*` methods so callers never touch the
//! registry directly).

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Labels for the `ipvsctl apply` outcome counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ApplyLabels {
    pub result: String,
}

/// All metrics exposed on the daemon's `/metrics` endpoint (§1 "Metrics").
pub struct MetricsRegistry {
    pub registry: Registry,

    config_snapshots_total: Counter,
    apply_total: Family<ApplyLabels, Counter>,
    apply_duration_seconds: Histogram,
    publisher_dispatches_total: Counter,
    active_service_workers: Gauge,
    active_publishers: Gauge,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let config_snapshots_total = Counter::default();
        registry.register(
            "ipvsmeshd_config_snapshots_total",
            "Total config snapshots published by the config watcher",
            config_snapshots_total.clone(),
        );

        let apply_total = Family::<ApplyLabels, Counter>::default();
        registry.register(
            "ipvsmeshd_ipvsctl_apply_total",
            "Total ipvsctl apply invocations by result",
            apply_total.clone(),
        );

        let apply_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 12));
        registry.register(
            "ipvsmeshd_ipvsctl_apply_duration_seconds",
            "ipvsctl apply call duration in seconds",
            apply_duration_seconds.clone(),
        );

        let publisher_dispatches_total = Counter::default();
        registry.register(
            "ipvsmeshd_publisher_dispatches_total",
            "Total sink dispatch calls across all publishers",
            publisher_dispatches_total.clone(),
        );

        let active_service_workers = Gauge::default();
        registry.register(
            "ipvsmeshd_active_service_workers",
            "Number of currently running service workers",
            active_service_workers.clone(),
        );

        let active_publishers = Gauge::default();
        registry.register(
            "ipvsmeshd_active_publishers",
            "Number of configured publishers with a live sink",
            active_publishers.clone(),
        );

        Self {
            registry,
            config_snapshots_total,
            apply_total,
            apply_duration_seconds,
            publisher_dispatches_total,
            active_service_workers,
            active_publishers,
        }
    }

    pub fn record_config_snapshot(&self) {
        self.config_snapshots_total.inc();
    }

    pub fn record_apply(&self, success: bool, duration: Duration) {
        let result = if success { "success" } else { "failure" };
        self.apply_total
            .get_or_create(&ApplyLabels { result: result.to_string() })
            .inc();
        self.apply_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn record_publisher_dispatch(&self) {
        self.publisher_dispatches_total.inc();
    }

    pub fn set_active_service_workers(&self, count: usize) {
        self.active_service_workers.set(count as i64);
    }

    pub fn set_active_publishers(&self, count: usize) {
        self.active_publishers.set(count as i64);
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_without_panicking() {
        let registry = MetricsRegistry::new();
        registry.record_config_snapshot();
        registry.record_apply(true, Duration::from_millis(5));
        registry.record_apply(false, Duration::from_millis(10));
        registry.record_publisher_dispatch();
        registry.set_active_service_workers(3);
        registry.set_active_publishers(1);
    }
}
