//! Account Provider Interface
//!
//! Abstraction over the upstream balance and event feed so the monitor can
//! run against the live API or a scripted double.

use async_trait::async_trait;

use crate::monitor::types::{BalanceSnapshot, EventRecord};
use crate::services::error::ProviderError;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Fetch the current available balances.
    async fn fetch_balances(&self) -> ProviderResult<BalanceSnapshot>;

    /// Fetch the most recent events, newest first.
    async fn fetch_recent_events(&self) -> ProviderResult<Vec<EventRecord>>;

    /// Get the name of this provider for logging/debugging
    fn provider_name(&self) -> &str;

    /// Verify the credential by performing an authenticated request.
    async fn health_check(&self) -> ProviderResult<()> {
        self.fetch_balances().await.map(|_| ())
    }
}
