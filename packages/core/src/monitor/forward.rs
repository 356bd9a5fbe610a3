//! Event dedup and forwarding.

use futures::future::join_all;

use crate::monitor::registry::DedupRegistry;
use crate::monitor::types::EventRecord;
use crate::monitor::{MonitorContext, MonitorError};
use crate::services::error::TransportError;
use crate::services::{TransportConnection, EVENT_TOPIC};

/// Forward every event not yet in the registry, verbatim, on the event topic.
///
/// One connection carries the whole batch and is closed after every send
/// has finished, whatever their outcome. An id is inserted before its
/// publish is attempted, so a failed send is not repeated in later cycles.
/// Returns the number of events published.
pub async fn forward_events(
    ctx: &MonitorContext,
    events: &[EventRecord],
) -> Result<usize, MonitorError> {
    let connection = ctx.transport().connect().await?;

    let results = join_all(
        events
            .iter()
            .map(|event| forward_one(ctx.registry(), connection.as_ref(), event)),
    )
    .await;

    let closed = connection.close().await;

    let mut published = 0;
    let mut first_error = None;
    for result in results {
        match result {
            Ok(true) => published += 1,
            Ok(false) => {}
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    ctx.metrics().events_published_total.inc_by(published as f64);
    ctx.metrics().events_seen.set(ctx.registry().len() as f64);

    if let Some(err) = first_error {
        return Err(err);
    }
    closed?;

    if published > 0 {
        tracing::info!(published, fetched = events.len(), "forwarded new events");
    }
    Ok(published)
}

async fn forward_one(
    registry: &DedupRegistry,
    connection: &dyn TransportConnection,
    event: &EventRecord,
) -> Result<bool, MonitorError> {
    if !registry.insert(&event.id) {
        return Ok(false);
    }

    let payload = serde_json::to_vec(&event.payload).map_err(|err| {
        TransportError::SerializeError {
            message: err.to_string(),
        }
    })?;

    connection.send(EVENT_TOPIC, payload).await.map_err(|err| {
        tracing::error!(event_id = %event.id, error = %err, "failed to forward event");
        err
    })?;

    tracing::debug!(event_id = %event.id, "event forwarded");
    Ok(true)
}
