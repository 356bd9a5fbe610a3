//! Everything a cycle needs, built once at startup.
//!
//! Only the dedup registry changes after construction.

use std::sync::Arc;
use std::time::Duration;

use crate::metrics::AppMetrics;
use crate::monitor::policy::FailurePolicy;
use crate::monitor::registry::DedupRegistry;
use crate::monitor::sink::FileSink;
use crate::monitor::threshold::Minimum;
use crate::services::{AccountProvider, Transport};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// `None` disables balance fetching and alerting.
    pub minimum: Option<Minimum>,
    pub poll_interval: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            minimum: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            failure_policy: FailurePolicy::default(),
        }
    }
}

pub struct MonitorContext {
    settings: MonitorSettings,
    provider: Arc<dyn AccountProvider>,
    transport: Arc<dyn Transport>,
    sink: Option<FileSink>,
    registry: DedupRegistry,
    metrics: Arc<AppMetrics>,
}

impl MonitorContext {
    pub fn new(
        settings: MonitorSettings,
        provider: Arc<dyn AccountProvider>,
        transport: Arc<dyn Transport>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            settings,
            provider,
            transport,
            sink: None,
            registry: DedupRegistry::new(),
            metrics,
        }
    }

    pub fn with_sink(mut self, sink: Option<FileSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn provider(&self) -> &dyn AccountProvider {
        self.provider.as_ref()
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn sink(&self) -> Option<&FileSink> {
        self.sink.as_ref()
    }

    pub fn registry(&self) -> &DedupRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &AppMetrics {
        &self.metrics
    }
}
