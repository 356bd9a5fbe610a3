//! Core data types flowing through a monitor cycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single currency-scoped available balance, in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub amount: i64,
    pub currency: String,
}

impl BalanceEntry {
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

/// Balances returned by one upstream fetch. Never retained across cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub entries: Vec<BalanceEntry>,
}

impl BalanceSnapshot {
    pub fn new(entries: Vec<BalanceEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An upstream event. The payload is forwarded verbatim; identity is `id`.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: String,
    pub payload: Value,
}

impl EventRecord {
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

impl PartialEq for EventRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventRecord {}

/// A balance entry found strictly below the configured minimum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breach {
    pub amount: i64,
    pub currency: String,
}

/// Structured alert published to the transport for each breach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub description: String,
    pub minimum: String,
    pub balance: String,
    pub time: String,
}
