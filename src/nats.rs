//! NATS client wrapper
//!
//! Connection management with keep-alive pings and optional
//! user/password credentials. Publish and subscribe only; the service
//! has no request/response traffic.

use std::time::Duration;

use async_nats::{Client, ConnectOptions};
use bytes::Bytes;
use tracing::info;

use crate::error::ServiceError;

/// Ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// NATS client wrapper
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    /// Client name for logging
    name: String,
}

impl NatsClient {
    /// Connect to a NATS server.
    ///
    /// Fails fast if the server is unreachable; reconnection still works
    /// after the initial successful connection.
    pub async fn connect(
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
        name: &str,
    ) -> Result<Self, ServiceError> {
        info!("Connecting to NATS at {}", url);

        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(password)) = (user, password) {
            options = options.user_and_password(user.to_string(), password.to_string());
        }

        let client = options
            .connect(url)
            .await
            .map_err(|e| ServiceError::Nats(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {}", url);

        Ok(Self {
            client,
            name: name.to_string(),
        })
    }

    /// Get the underlying NATS client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Publish a message to a subject
    pub async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), ServiceError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| ServiceError::Nats(format!("Publish failed: {}", e)))
    }

    /// Subscribe to a subject
    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, ServiceError> {
        self.client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| ServiceError::Nats(format!("Subscribe failed: {}", e)))
    }

    /// Flush pending messages
    pub async fn flush(&self) -> Result<(), ServiceError> {
        self.client
            .flush()
            .await
            .map_err(|e| ServiceError::Nats(format!("Flush failed: {}", e)))
    }

    /// Get the client name
    pub fn name(&self) -> &str {
        &self.name
    }
}
