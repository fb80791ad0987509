//! Outbound inventory notifications.

use async_trait::async_trait;
use std::sync::Mutex;
use crate::domain::events::InventoryEvent;

/// Receives events after their movement has committed. A failing sink never
/// undoes a movement.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &InventoryEvent) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn publish(&self, _event: &InventoryEvent) -> anyhow::Result<()> { Ok(()) }
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<InventoryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    pub fn events(&self) -> Vec<InventoryEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn publish(&self, event: &InventoryEvent) -> anyhow::Result<()> {
        self.events.lock().map_err(|_| anyhow::anyhow!("memory sink poisoned"))?.push(event.clone());
        Ok(())
    }
}

/// Publishes JSON events on `<prefix>.<event name>`.
pub struct NatsSink {
    client: async_nats::Client,
    prefix: String,
}

impl NatsSink {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }
}

#[async_trait]
impl EventSink for NatsSink {
    async fn publish(&self, event: &InventoryEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(event)?;
        let subject = format!("{}.{}", self.prefix, event.name());
        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }
}
