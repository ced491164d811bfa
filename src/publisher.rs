//! Delivery of domain events to NATS.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

#[derive(Error, Debug)]
#[error("failed to publish {subject}: {reason}")]
pub struct PublishError {
    pub subject: String,
    pub reason: String,
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

/// Publish every event, logging failures. Publishing never fails the caller.
pub async fn publish_all<P: EventPublisher + ?Sized>(publisher: &P, events: &[DomainEvent]) {
    for event in events {
        if let Err(e) = publisher.publish(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let subject = format!("{}.{}", self.prefix, event.subject());
        let payload = serde_json::to_vec(event)
            .map_err(|e| PublishError { subject: subject.clone(), reason: e.to_string() })?;
        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| PublishError { subject: subject.clone(), reason: e.to_string() })?;
        debug!(%subject, "published event");
        Ok(())
    }
}

/// Used when no NATS server is configured.
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        debug!(subject = %event.subject(), "no event bus configured");
        Ok(())
    }
}

/// Keeps published events in memory.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }

    pub async fn subjects(&self) -> Vec<String> {
        self.events.lock().await.iter().map(DomainEvent::subject).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
