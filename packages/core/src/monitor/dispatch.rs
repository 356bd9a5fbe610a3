//! Alert dispatch.
//!
//! Every breach is handled on its own: one optional line in the file sink
//! and one alert published over a dedicated transport connection. The file
//! write and the publish are both attempted even when the other fails, and
//! neither is retried.

use chrono::{Local, NaiveDateTime};
use futures::future::join_all;

use crate::monitor::alert::{format_alert, format_line};
use crate::monitor::threshold::Minimum;
use crate::monitor::types::Breach;
use crate::monitor::{MonitorContext, MonitorError};
use crate::services::error::TransportError;
use crate::services::ALERT_TOPIC;

/// Dispatch all breaches concurrently, stamped with the current local time.
///
/// Returns the number of alerts the transport accepted. Every breach is
/// attempted; the first failure is returned once all have finished.
pub async fn dispatch_alerts(
    ctx: &MonitorContext,
    minimum: Minimum,
    breaches: &[Breach],
) -> Result<usize, MonitorError> {
    let now = Local::now().naive_local();
    dispatch_alerts_at(ctx, minimum, breaches, &now).await
}

pub async fn dispatch_alerts_at(
    ctx: &MonitorContext,
    minimum: Minimum,
    breaches: &[Breach],
    now: &NaiveDateTime,
) -> Result<usize, MonitorError> {
    let results = join_all(
        breaches
            .iter()
            .map(|breach| dispatch_one(ctx, minimum, breach, now)),
    )
    .await;

    let mut published = 0;
    let mut first_error = None;
    for result in results {
        match result {
            Ok(()) => published += 1,
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(published),
    }
}

async fn dispatch_one(
    ctx: &MonitorContext,
    minimum: Minimum,
    breach: &Breach,
    now: &NaiveDateTime,
) -> Result<(), MonitorError> {
    let message = format_alert(minimum, breach.amount, now);
    let line = format_line(&message);
    tracing::warn!(currency = %breach.currency, "{}", line);

    let payload = serde_json::to_vec(&message).map_err(|err| TransportError::SerializeError {
        message: err.to_string(),
    })?;

    let write_line = async {
        match ctx.sink() {
            Some(sink) => sink.append_line(&line).await,
            None => Ok(()),
        }
    };
    let (written, published) = tokio::join!(
        write_line,
        ctx.transport().publish(ALERT_TOPIC, payload)
    );

    if let Err(err) = &written {
        tracing::error!(error = %err, "failed to append breach to log file");
    }
    match &published {
        Ok(()) => ctx.metrics().alerts_published_total.inc(),
        Err(err) => tracing::error!(error = %err, "failed to publish balance alert"),
    }

    published?;
    written?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use serde_json::json;

    use crate::metrics::AppMetrics;
    use crate::monitor::sink::FileSink;
    use crate::monitor::MonitorSettings;
    use crate::services::mock::{MockProvider, RecordingTransport};

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn breach(amount: i64) -> Breach {
        Breach {
            amount,
            currency: "usd".to_string(),
        }
    }

    fn context(transport: RecordingTransport, sink: Option<FileSink>) -> MonitorContext {
        MonitorContext::new(
            MonitorSettings::default(),
            Arc::new(MockProvider::new()),
            Arc::new(transport),
            Arc::new(AppMetrics::new().unwrap()),
        )
        .with_sink(sink)
    }

    #[tokio::test]
    async fn each_breach_gets_its_own_connection_and_alert() {
        let transport = RecordingTransport::new();
        let ctx = context(transport.clone(), None);
        let minimum = Minimum::new(100.0).unwrap();

        let published = dispatch_alerts_at(&ctx, minimum, &[breach(50), breach(99)], &noon())
            .await
            .unwrap();

        assert_eq!(published, 2);
        assert_eq!(transport.connects(), 2);
        assert_eq!(transport.closes(), 2);

        let mut balances: Vec<String> = transport
            .published_to(ALERT_TOPIC)
            .iter()
            .map(|m| m.json()["balance"].as_str().unwrap().to_string())
            .collect();
        balances.sort();
        assert_eq!(balances, vec!["50", "99"]);
    }

    #[tokio::test]
    async fn alert_payload_is_the_structured_message() {
        let transport = RecordingTransport::new();
        let ctx = context(transport.clone(), None);

        dispatch_alerts_at(&ctx, Minimum::new(100.0).unwrap(), &[breach(7)], &noon())
            .await
            .unwrap();

        assert_eq!(
            transport.published()[0].json(),
            json!({
                "description": "WARNING: Balance Below minimum.",
                "minimum": "100",
                "balance": "7",
                "time": "2026-05-01 12:00",
            })
        );
    }

    #[tokio::test]
    async fn breach_lines_are_appended_to_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.log");
        let ctx = context(RecordingTransport::new(), Some(FileSink::new(&path)));

        dispatch_alerts_at(&ctx, Minimum::new(100.0).unwrap(), &[breach(42)], &noon())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "WARNING: Balance Below minimum. MIN: 100 BALANCE: 42 at TIME 2026-05-01 12:00\n"
        );
    }

    #[tokio::test]
    async fn publish_failure_does_not_suppress_file_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.log");
        let ctx = context(
            RecordingTransport::failing_connects(),
            Some(FileSink::new(&path)),
        );

        let err = dispatch_alerts_at(&ctx, Minimum::new(10.0).unwrap(), &[breach(1)], &noon())
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::Transport(_)));
        assert!(std::fs::read_to_string(&path).unwrap().contains("BALANCE: 1 "));
    }

    #[tokio::test]
    async fn file_failure_does_not_suppress_publish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("balance.log");
        let transport = RecordingTransport::new();
        let ctx = context(transport.clone(), Some(FileSink::new(&path)));

        let err = dispatch_alerts_at(&ctx, Minimum::new(10.0).unwrap(), &[breach(1)], &noon())
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::Sink(_)));
        assert_eq!(transport.published_to(ALERT_TOPIC).len(), 1);
    }

    #[tokio::test]
    async fn no_breaches_opens_no_connections() {
        let transport = RecordingTransport::new();
        let ctx = context(transport.clone(), None);

        let published = dispatch_alerts_at(&ctx, Minimum::new(10.0).unwrap(), &[], &noon())
            .await
            .unwrap();

        assert_eq!(published, 0);
        assert_eq!(transport.connects(), 0);
    }
}
