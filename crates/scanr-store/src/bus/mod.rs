use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::BusError;

/// One message received from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Receiving end of a topic subscription.
pub struct Subscription {
    topic: String,
    rx: mpsc::UnboundedReceiver<BusMessage>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, rx: mpsc::UnboundedReceiver<BusMessage>) -> Self {
        Self {
            topic: topic.into(),
            rx,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next message; `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }
}

/// Publish/subscribe channel used for the preference exchange.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Establish the connection to the broker at `uri`.
    async fn connect(&self, uri: &str) -> Result<(), BusError>;

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;
}

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<BusMessage>>>,
    connected: Option<String>,
}

/// In-process [`MessageBus`] delivering every publish to all live
/// subscribers of the exact topic.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<RwLock<BusInner>>,
    unreachable: bool,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus whose `connect` always fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// URI passed to the last successful `connect`.
    pub fn connected_to(&self) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.connected.clone()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn connect(&self, uri: &str) -> Result<(), BusError> {
        if self.unreachable {
            return Err(BusError::Unavailable(uri.to_string()));
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.connected = Some(uri.to_string());
        debug!(target: "scanr.store", uri, "memory bus connected");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .subscribers
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        trace!(target: "scanr.store", topic, "subscribed");
        Ok(Subscription::new(topic, rx))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(subs) = inner.subscribers.get_mut(topic) else {
            trace!(target: "scanr.store", topic, "publish without subscribers");
            return Ok(());
        };

        let msg = BusMessage {
            topic: topic.to_string(),
            payload,
        };
        subs.retain(|tx| tx.send(msg.clone()).is_ok());
        trace!(target: "scanr.store", topic, receivers = subs.len(), "published");
        Ok(())
    }
}
