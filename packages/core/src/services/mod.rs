//! Upstream and downstream collaborators the monitor calls through.

pub mod error;
pub mod mock;
pub mod mqtt;
pub mod provider;
pub mod stripe;
pub mod transport;

pub use error::{ProviderError, TransportError};
pub use provider::{AccountProvider, ProviderResult};
pub use transport::{Transport, TransportAddress, TransportConnection, ALERT_TOPIC, EVENT_TOPIC};
