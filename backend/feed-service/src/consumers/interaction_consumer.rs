//! Kafka consumer for interaction events
//!
//! Upstream services publish user interactions to `causeway.interactions`
//! with at-least-once delivery. Events are funneled into the same sharded
//! ingestion pipeline as the HTTP track endpoint; the event id makes
//! redelivery a no-op.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::KafkaConfig;
use crate::metrics;
use crate::models::{ContentRef, ContentType, InteractionType, UserInteraction};
use crate::services::IngestionService;

/// Wire shape of an interaction event as published to Kafka
#[derive(Debug, Deserialize)]
pub struct InteractionEvent {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub content_type: String,
    pub content_id: Uuid,
    pub interaction_type: String,
    #[serde(default)]
    pub time_spent_secs: Option<u32>,
    #[serde(default)]
    pub scroll_depth: Option<f32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl InteractionEvent {
    /// Validate the loosely-typed wire event into the domain type
    pub fn into_interaction(self) -> Option<UserInteraction> {
        let content_type = ContentType::parse(&self.content_type)?;
        let interaction_type = InteractionType::parse(&self.interaction_type)?;
        Some(UserInteraction {
            id: self.event_id,
            user_id: self.user_id,
            content: ContentRef::new(content_type, self.content_id),
            interaction_type,
            time_spent_secs: self.time_spent_secs,
            scroll_depth: self.scroll_depth,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}

fn create_consumer(kafka: &KafkaConfig) -> anyhow::Result<StreamConsumer> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &kafka.bootstrap_servers)
        .set("group.id", &kafka.group_id)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "earliest")
        .create()
        .context("Failed to create Kafka consumer")?;

    consumer
        .subscribe(&[kafka.interactions_topic.as_str()])
        .context("Failed to subscribe to interactions topic")?;

    Ok(consumer)
}

/// Run the consumer loop until the process shuts down.
/// Malformed payloads are dropped with a warning; the loop never dies
/// because of one bad message.
pub async fn run(kafka: KafkaConfig, ingestion: IngestionService) {
    let consumer = match create_consumer(&kafka) {
        Ok(consumer) => consumer,
        Err(e) => {
            error!("Interaction consumer setup failed: {:#}", e);
            return;
        }
    };

    info!(
        topic = %kafka.interactions_topic,
        group = %kafka.group_id,
        "Interaction consumer started"
    );

    loop {
        match consumer.recv().await {
            Ok(message) => {
                let Some(payload) = message.payload() else {
                    continue;
                };
                handle_payload(payload, &ingestion).await;
            }
            Err(e) => {
                warn!("Kafka receive error: {}", e);
            }
        }
    }
}

async fn handle_payload(payload: &[u8], ingestion: &IngestionService) {
    let event: InteractionEvent = match serde_json::from_slice(payload) {
        Ok(event) => event,
        Err(e) => {
            metrics::record_ingestion("malformed");
            warn!("Dropping malformed interaction payload: {}", e);
            return;
        }
    };

    let Some(interaction) = event.into_interaction() else {
        metrics::record_ingestion("malformed");
        warn!("Dropping interaction with unknown content/interaction type");
        return;
    };

    if let Err(e) = ingestion.enqueue(interaction).await {
        warn!("Failed to enqueue interaction from Kafka: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_parses_into_interaction() {
        let raw = serde_json::json!({
            "event_id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "content_type": "fundraiser",
            "content_id": Uuid::new_v4(),
            "interaction_type": "donate",
            "time_spent_secs": 45
        });
        let event: InteractionEvent = serde_json::from_value(raw).unwrap();
        let interaction = event.into_interaction().unwrap();
        assert_eq!(interaction.interaction_type, InteractionType::Donate);
        assert_eq!(interaction.time_spent_secs, Some(45));
    }

    #[test]
    fn test_unknown_types_rejected() {
        let event = InteractionEvent {
            event_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content_type: "video".to_string(),
            content_id: Uuid::new_v4(),
            interaction_type: "view".to_string(),
            time_spent_secs: None,
            scroll_depth: None,
            created_at: None,
        };
        assert!(event.into_interaction().is_none());
    }
}
