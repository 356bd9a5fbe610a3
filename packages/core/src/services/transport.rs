//! Outbound message transport.
//!
//! A [`Transport`] hands out short-lived [`TransportConnection`]s. Nothing is
//! pooled: every alert opens its own connection through
//! [`Transport::publish`], and every event batch opens one connection that
//! is closed after the last send of the cycle.

use std::fmt;

use async_trait::async_trait;
use reqwest::Url;

use crate::services::error::TransportError;

/// Topic carrying balance alerts.
pub const ALERT_TOPIC: &str = "stripe-watch/alerts";
/// Topic carrying forwarded upstream events.
pub const EVENT_TOPIC: &str = "stripe-watch/events";

const MQTT_PORT: u16 = 1883;
const MQTTS_PORT: u16 = 8883;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a fresh connection.
    async fn connect(&self) -> Result<Box<dyn TransportConnection>, TransportError>;

    /// Send a single message over a dedicated connection.
    ///
    /// The connection is closed whether or not the send succeeded; the
    /// send error takes precedence over a close error.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let connection = self.connect().await?;
        let sent = connection.send(topic, payload).await;
        let closed = connection.close().await;
        sent.and(closed)
    }
}

#[async_trait]
pub trait TransportConnection: Send + Sync {
    /// Queue one message. Safe to call concurrently.
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Flush outstanding messages and close the connection.
    async fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// A validated broker address: `mqtt://[user[:pass]@]host[:port]`, or
/// `mqtts://` for TLS.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportAddress {
    host: String,
    port: u16,
    tls: bool,
    username: Option<String>,
    password: Option<String>,
}

impl TransportAddress {
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let url = Url::parse(raw.trim())
            .map_err(|err| TransportError::invalid_address(raw, err.to_string()))?;

        let tls = match url.scheme() {
            "mqtt" | "tcp" => false,
            "mqtts" | "ssl" => true,
            other => {
                return Err(TransportError::invalid_address(
                    raw,
                    format!("unsupported scheme `{}`", other),
                ))
            }
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| TransportError::invalid_address(raw, "missing host"))?
            .to_string();

        let port = url.port().unwrap_or(if tls { MQTTS_PORT } else { MQTT_PORT });

        let username = Some(url.username())
            .filter(|user| !user.is_empty())
            .map(str::to_owned);
        let password = url.password().map(str::to_owned);

        Ok(Self {
            host,
            port,
            tls,
            username,
            password,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Username and password, when the address carried a username.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.username
            .as_deref()
            .map(|user| (user, self.password.as_deref().unwrap_or("")))
    }
}

// Never print the password.
impl fmt::Debug for TransportAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportAddress")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TransportAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "mqtts" } else { "mqtt" };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}
