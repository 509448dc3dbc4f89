//! Outbound treatment notifications
//!
//! Publishing is best effort: a treatment is already committed by the
//! time the notification goes out, so a publish failure is logged and
//! swallowed rather than failing the write that succeeded.

use tracing::{debug, warn};

use crate::messages::{TreatmentPayload, TREATMENT_CREATED_SUBJECT};
use crate::nats::NatsClient;

/// Publishes treatment lifecycle notifications
#[derive(Clone)]
pub struct TreatmentPublisher {
    nats: NatsClient,
}

impl TreatmentPublisher {
    pub fn new(nats: NatsClient) -> Self {
        Self { nats }
    }

    /// Announce a newly created treatment. Never fails the caller.
    pub async fn publish_created(&self, payload: &TreatmentPayload) {
        let bytes = match payload.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(treatment_id = %payload.id, "Failed to encode treatment notification: {}", e);
                return;
            }
        };

        match self.nats.publish(TREATMENT_CREATED_SUBJECT, bytes).await {
            Ok(()) => {
                debug!(treatment_id = %payload.id, "Published treatment-created notification");
            }
            Err(e) => {
                warn!(treatment_id = %payload.id, "Failed to publish treatment notification: {}", e);
            }
        }
    }
}
