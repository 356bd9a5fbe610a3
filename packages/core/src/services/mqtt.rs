//! MQTT implementation of the outbound transport.
//!
//! Each [`MqttConnection`] owns its own `rumqttc` event loop, driven on a
//! spawned task for the lifetime of the connection. Messages go out at QoS 1
//! and `close` waits for every PUBACK before sending DISCONNECT.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::services::error::TransportError;
use crate::services::transport::{Transport, TransportAddress, TransportConnection};

const REQUEST_CAPACITY: usize = 64;
const KEEP_ALIVE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct MqttTransport {
    address: TransportAddress,
    client_id_prefix: String,
}

impl MqttTransport {
    pub fn new(address: TransportAddress, client_id_prefix: impl Into<String>) -> Self {
        Self {
            address,
            client_id_prefix: client_id_prefix.into(),
        }
    }

    pub fn address(&self) -> &TransportAddress {
        &self.address
    }

    // Concurrent alert connections need distinct ids or the broker drops
    // the older session.
    fn next_client_id(&self) -> String {
        format!("{}-{:08x}", self.client_id_prefix, rand::random::<u32>())
    }

    fn options(&self) -> MqttOptions {
        let mut opts = MqttOptions::new(
            self.next_client_id(),
            self.address.host(),
            self.address.port(),
        );
        opts.set_keep_alive(KEEP_ALIVE);
        opts.set_clean_session(true);

        if let Some((username, password)) = self.address.credentials() {
            opts.set_credentials(username, password);
        }
        if self.address.is_tls() {
            opts.set_transport(rumqttc::Transport::tls_with_default_config());
        }

        opts
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&self) -> Result<Box<dyn TransportConnection>, TransportError> {
        let (client, eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);
        let (acked_tx, acked_rx) = watch::channel(0u64);
        let (ready_tx, ready_rx) = oneshot::channel();

        let driver = tokio::spawn(drive(eventloop, ready_tx, acked_tx));

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(TransportError::connection(
                    "event loop stopped before the broker acknowledged the connection",
                ))
            }
        }

        tracing::debug!(broker = %self.address, "transport connection opened");

        Ok(Box::new(MqttConnection {
            client,
            sent: AtomicU64::new(0),
            acked: acked_rx,
            driver,
        }))
    }
}

/// Poll the event loop until DISCONNECT goes out or the connection fails.
async fn drive(
    mut eventloop: EventLoop,
    ready: oneshot::Sender<Result<(), TransportError>>,
    acked: watch::Sender<u64>,
) -> Result<(), TransportError> {
    let mut ready = Some(ready);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Incoming(Packet::PubAck(_))) => {
                acked.send_modify(|count| *count += 1);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(()),
            Ok(_) => {}
            Err(err) => {
                let message = err.to_string();
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(TransportError::connection(message.clone())));
                }
                return Err(TransportError::connection(message));
            }
        }
    }
}

pub struct MqttConnection {
    client: AsyncClient,
    sent: AtomicU64,
    acked: watch::Receiver<u64>,
    driver: JoinHandle<Result<(), TransportError>>,
}

#[async_trait]
impl TransportConnection for MqttConnection {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|err| TransportError::publish(topic, err.to_string()))?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        let MqttConnection {
            client,
            sent,
            mut acked,
            driver,
        } = *self;
        let expected = sent.into_inner();

        // The sender side drops when the event loop dies; the driver's
        // result then carries the real error.
        if acked.wait_for(|count| *count >= expected).await.is_ok() {
            if let Err(err) = client.disconnect().await {
                tracing::debug!(error = %err, "disconnect request not delivered");
            }
        }

        match driver.await {
            Ok(result) => result,
            Err(join_err) => Err(TransportError::connection(format!(
                "event loop task failed: {}",
                join_err
            ))),
        }
    }
}
