//! Prometheus metrics registry for the monitor.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and hand it to the
//! monitor context and, when enabled, the HTTP surface.

use prometheus::{Counter, Gauge, Opts, Registry};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Completed monitor cycles.
    pub cycles_total: Counter,
    /// Cycles that ended in an error.
    pub cycle_failures_total: Counter,
    /// Balance entries found below the minimum.
    pub breaches_total: Counter,
    /// Alert messages accepted by the transport.
    pub alerts_published_total: Counter,
    /// Upstream events forwarded to the transport.
    pub events_published_total: Counter,
    /// Distinct event ids held by the dedup registry.
    pub events_seen: Gauge,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles_total = Counter::with_opts(Opts::new(
            "stripe_watch_cycles_total",
            "Completed monitor cycles",
        ))?;

        let cycle_failures_total = Counter::with_opts(Opts::new(
            "stripe_watch_cycle_failures_total",
            "Monitor cycles that failed",
        ))?;

        let breaches_total = Counter::with_opts(Opts::new(
            "stripe_watch_breaches_total",
            "Balance entries found below the configured minimum",
        ))?;

        let alerts_published_total = Counter::with_opts(Opts::new(
            "stripe_watch_alerts_published_total",
            "Balance alerts published to the transport",
        ))?;

        let events_published_total = Counter::with_opts(Opts::new(
            "stripe_watch_events_published_total",
            "Upstream events forwarded to the transport",
        ))?;

        let events_seen = Gauge::with_opts(Opts::new(
            "stripe_watch_events_seen",
            "Distinct event ids observed since startup",
        ))?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_failures_total.clone()))?;
        registry.register(Box::new(breaches_total.clone()))?;
        registry.register(Box::new(alerts_published_total.clone()))?;
        registry.register(Box::new(events_published_total.clone()))?;
        registry.register(Box::new(events_seen.clone()))?;

        Ok(Self {
            cycles_total,
            cycle_failures_total,
            breaches_total,
            alerts_published_total,
            events_published_total,
            events_seen,
            registry,
        })
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
