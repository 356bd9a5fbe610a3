//! Monitor core
//!
//! Threshold evaluation, alert formatting and dispatch, event dedup and
//! forwarding. The scheduler in [`crate::scheduler`] drives these once per
//! cycle.

pub mod alert;
pub mod context;
pub mod dispatch;
pub mod forward;
pub mod policy;
pub mod registry;
pub mod sink;
pub mod threshold;
pub mod types;

use thiserror::Error;

use crate::services::{ProviderError, TransportError};

pub use context::{MonitorContext, MonitorSettings};
pub use policy::FailurePolicy;
pub use registry::DedupRegistry;
pub use sink::{FileSink, SinkError};
pub use threshold::Minimum;
pub use types::*;

/// Errors that end a cycle.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("upstream error: {0}")]
    Provider(#[from] ProviderError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("file sink error: {0}")]
    Sink(#[from] SinkError),
}
