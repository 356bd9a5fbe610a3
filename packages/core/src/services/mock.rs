//! Scripted provider and recording transport.
//!
//! Used by unit tests and by the integration tests under `tests/`, so the
//! monitor can be exercised without a live upstream or broker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::monitor::types::{BalanceEntry, BalanceSnapshot, EventRecord};
use crate::services::error::{ProviderError, TransportError};
use crate::services::provider::{AccountProvider, ProviderResult};
use crate::services::transport::{Transport, TransportConnection};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queued responses first, then the fallback forever.
struct Script<T> {
    queued: VecDeque<ProviderResult<T>>,
    fallback: T,
}

impl<T: Clone> Script<T> {
    fn new(fallback: T) -> Self {
        Self {
            queued: VecDeque::new(),
            fallback,
        }
    }

    fn next(&mut self) -> ProviderResult<T> {
        self.queued
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

type FetchHook = Box<dyn Fn(usize) + Send + Sync>;

/// In-memory [`AccountProvider`] with per-call scripting and call counters.
pub struct MockProvider {
    balances: Mutex<Script<BalanceSnapshot>>,
    events: Mutex<Script<Vec<EventRecord>>>,
    balance_calls: AtomicUsize,
    event_calls: AtomicUsize,
    event_hook: Option<FetchHook>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(Script::new(BalanceSnapshot::default())),
            events: Mutex::new(Script::new(Vec::new())),
            balance_calls: AtomicUsize::new(0),
            event_calls: AtomicUsize::new(0),
            event_hook: None,
        }
    }

    /// Balances returned whenever nothing is queued. Currency is `usd`.
    pub fn with_balances(self, amounts: &[i64]) -> Self {
        let snapshot = BalanceSnapshot::new(
            amounts
                .iter()
                .map(|amount| BalanceEntry::new(*amount, "usd"))
                .collect(),
        );
        lock(&self.balances).fallback = snapshot;
        self
    }

    /// Events returned whenever nothing is queued.
    pub fn with_events(self, events: Vec<EventRecord>) -> Self {
        lock(&self.events).fallback = events;
        self
    }

    /// Queue the result of the next unscripted balance fetch.
    pub fn push_balances(self, result: ProviderResult<BalanceSnapshot>) -> Self {
        lock(&self.balances).queued.push_back(result);
        self
    }

    /// Queue the result of the next unscripted event fetch.
    pub fn push_events(self, result: ProviderResult<Vec<EventRecord>>) -> Self {
        lock(&self.events).queued.push_back(result);
        self
    }

    /// Call `hook` with the 1-based call number on every event fetch.
    pub fn with_event_hook(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.event_hook = Some(Box::new(hook));
        self
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn event_calls(&self) -> usize {
        self.event_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountProvider for MockProvider {
    async fn fetch_balances(&self) -> ProviderResult<BalanceSnapshot> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.balances).next()
    }

    async fn fetch_recent_events(&self) -> ProviderResult<Vec<EventRecord>> {
        let call = self.event_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = &self.event_hook {
            hook(call);
        }
        lock(&self.events).next()
    }

    fn provider_name(&self) -> &str {
        "Mock"
    }

    async fn health_check(&self) -> ProviderResult<()> {
        Ok(())
    }
}

/// A message captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Published {
    /// Decode the payload as JSON; `Null` when it is not valid JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Default)]
struct Recorder {
    published: Mutex<Vec<Published>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    fail_connect: bool,
    fail_send: bool,
}

/// [`Transport`] that keeps every sent message in memory.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Recorder>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `connect` fails.
    pub fn failing_connects() -> Self {
        Self {
            inner: Arc::new(Recorder {
                fail_connect: true,
                ..Recorder::default()
            }),
        }
    }

    /// Connections open, but every `send` fails.
    pub fn failing_sends() -> Self {
        Self {
            inner: Arc::new(Recorder {
                fail_send: true,
                ..Recorder::default()
            }),
        }
    }

    pub fn published(&self) -> Vec<Published> {
        lock(&self.inner.published).clone()
    }

    pub fn published_to(&self, topic: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|message| message.topic == topic)
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn connect(&self) -> Result<Box<dyn TransportConnection>, TransportError> {
        if self.inner.fail_connect {
            return Err(TransportError::connection("broker unreachable"));
        }
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingConnection {
            inner: self.inner.clone(),
        }))
    }
}

struct RecordingConnection {
    inner: Arc<Recorder>,
}

#[async_trait]
impl TransportConnection for RecordingConnection {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.inner.fail_send {
            return Err(TransportError::publish(topic, "broker rejected message"));
        }
        lock(&self.inner.published).push(Published {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Convenience for scripting a failed fetch.
pub fn unavailable() -> ProviderError {
    ProviderError::StatusError { status: 503 }
}
