// libs/consultation-cell/src/services/notify.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{Consultation, ConsultationEvent};

/// Fire-and-forget lifecycle notifications. Delivery failures are logged by
/// the caller and never fail the surrounding scheduling operation.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, event: ConsultationEvent, consultation: &Consultation) -> Result<()>;
}

/// Posts a JSON event envelope to the practice's notification webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotifier {
    async fn notify(&self, event: ConsultationEvent, consultation: &Consultation) -> Result<()> {
        debug!(
            "Dispatching {} notification for consultation {}",
            event, consultation.id
        );

        let envelope = json!({
            "event": format!("consultation.{}", event),
            "consultation_id": consultation.id,
            "appointment_id": consultation.appointment_id,
            "pet_id": consultation.pet_id,
            "owner_id": consultation.owner_id,
            "practitioner_id": consultation.practitioner_id,
            "scheduled_start_time": consultation.scheduled_start_time.to_rfc3339(),
            "status": consultation.status.to_string(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("notification webhook returned {}", status));
        }

        Ok(())
    }
}

/// Used when no webhook is configured; keeps transitions observable in logs.
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn notify(&self, event: ConsultationEvent, consultation: &Consultation) -> Result<()> {
        info!(
            "Consultation {} {} (practitioner {}, owner {})",
            consultation.id, event, consultation.practitioner_id, consultation.owner_id
        );
        Ok(())
    }
}

pub fn dispatcher_from_config(config: &AppConfig) -> Arc<dyn NotificationDispatcher> {
    if config.is_notification_configured() {
        Arc::new(WebhookNotifier::new(config.notification_webhook_url.clone()))
    } else {
        warn!("NOTIFICATION_WEBHOOK_URL not set - lifecycle events will only be logged");
        Arc::new(LogNotifier)
    }
}
