//! Inbound feedback consumer
//!
//! Subscribes to the feedback subjects and appends each report to the
//! ledger. A message that cannot be decoded or applied is logged and
//! dropped; the loop itself only stops on shutdown.

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::messages::{
    ActionFeedbackPayload, ValueFeedbackPayload, ACTION_FEEDBACK_SUBJECT, VALUE_FEEDBACK_SUBJECT,
};
use crate::nats::NatsClient;
use crate::service::RecordService;

/// Consumes feedback messages and feeds them into the ledger
pub struct FeedbackConsumer {
    nats: NatsClient,
    service: RecordService,
}

impl FeedbackConsumer {
    pub fn new(nats: NatsClient, service: RecordService) -> Self {
        Self { nats, service }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServiceError> {
        let mut action_sub = self.nats.subscribe(ACTION_FEEDBACK_SUBJECT).await?;
        let mut value_sub = self.nats.subscribe(VALUE_FEEDBACK_SUBJECT).await?;
        info!(
            "Listening for feedback on {} and {}",
            ACTION_FEEDBACK_SUBJECT, VALUE_FEEDBACK_SUBJECT
        );

        loop {
            tokio::select! {
                message = action_sub.next() => {
                    match message {
                        Some(message) => self.handle_action_feedback(&message.payload),
                        None => {
                            warn!("Action feedback subscription closed");
                            return Ok(());
                        }
                    }
                }
                message = value_sub.next() => {
                    match message {
                        Some(message) => self.handle_value_feedback(&message.payload),
                        None => {
                            warn!("Value feedback subscription closed");
                            return Ok(());
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Feedback consumer shutting down");
                    return Ok(());
                }
            }
        }
    }

    fn handle_action_feedback(&self, payload: &[u8]) {
        let payload = match ActionFeedbackPayload::from_bytes(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping undecodable action feedback: {}", e);
                return;
            }
        };

        match self.service.record_action_feedback(&payload) {
            Ok(()) => debug!(
                treatment_id = %payload.treatment_id,
                action = payload.action.as_str(),
                "Recorded action feedback"
            ),
            Err(e) => warn!(
                treatment_id = %payload.treatment_id,
                "Rejected action feedback: {}", e
            ),
        }
    }

    fn handle_value_feedback(&self, payload: &[u8]) {
        let payload = match ValueFeedbackPayload::from_bytes(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping undecodable value feedback: {}", e);
                return;
            }
        };

        match self.service.record_value_feedback(&payload) {
            Ok(()) => debug!(
                treatment_id = %payload.treatment_id,
                value_name = %payload.value_name,
                "Recorded value feedback"
            ),
            Err(e) => warn!(
                treatment_id = %payload.treatment_id,
                "Rejected value feedback: {}", e
            ),
        }
    }
}
