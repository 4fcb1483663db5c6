//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. It is intended for tests, single-process deployments,
//! and as the reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! - Once `subscribe()` returns successfully, payloads published *after* that
//!   point on the same topic are deliverable.
//! - Topics match by exact string equality; there are no wildcards.
//! - Every live subscriber gets its own copy of each payload.
//! - Nothing is dropped due to timing or background IO. A full inbox applies
//!   backpressure to the publisher instead.
//!
//! ## Non-Goals
//!
//! This transport does not emulate the failure modes, persistence or
//! delivery guarantees of any specific broker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use crate::{
    // ---
    log_debug,
    Error,
    Result,
    ServiceConfig,
    SubscriptionHandle,
    Topic,
    Transport,
    TransportPtr,
};

/// Inbox depth for each subscription.
const INBOX_CAPACITY: usize = 64;

/// Hands out a distinct key per transport; node names may repeat.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

struct HubSubscriber {
    instance: u64,
    tx: mpsc::Sender<Bytes>,
}

/// Shared message bus for the in-memory transport.
///
/// Simulates a broker within a single process: every [`create_memory_transport`]
/// call attaches to one process-global hub, so transports created for
/// different nodes see each other's traffic exactly as nodes connected to a
/// real broker would.
///
/// Tests that must not observe each other construct their own hub and pass
/// it to [`create_memory_transport_with_hub`]:
///
/// ```
/// # use svcbus::{MemoryHub, ServiceConfig};
/// # #[tokio::main] async fn main() -> svcbus::Result<()> {
/// let hub = MemoryHub::new();
///
/// let server = svcbus::create_memory_transport_with_hub(&ServiceConfig::memory("server"), hub.clone()).await?;
/// let client = svcbus::create_memory_transport_with_hub(&ServiceConfig::memory("client"), hub).await?;
/// # let _ = (server, client);
/// # Ok(())
/// # }
/// ```
pub struct MemoryHub {
    // ---
    subscriptions: RwLock<HashMap<Topic, Vec<HubSubscriber>>>,
}

impl MemoryHub {
    /// Create a new, empty hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of live subscriptions on `topic`.
    pub async fn subscriber_count(&self, topic: &Topic) -> usize {
        // ---
        let subs = self.subscriptions.read().await;
        subs.get(topic)
            .map(|list| list.iter().filter(|s| !s.tx.is_closed()).count())
            .unwrap_or(0)
    }

    async fn publish(&self, _transport_id: &str, topic: &Topic, payload: Bytes) {
        // ---
        // Snapshot the senders so no lock is held across a full inbox.
        let senders: Vec<mpsc::Sender<Bytes>> = {
            let subs = self.subscriptions.read().await;
            match subs.get(topic) {
                Some(list) => list.iter().map(|s| s.tx.clone()).collect(),
                None => return,
            }
        };

        log_debug!(
            "{_transport_id}: publish {} bytes to {topic} ({} subscribers)",
            payload.len(),
            senders.len()
        );

        let mut saw_closed = false;
        for sender in senders {
            // A send error means the SubscriptionHandle was dropped.
            if sender.send(payload.clone()).await.is_err() {
                saw_closed = true;
            }
        }

        if saw_closed {
            self.prune(topic).await;
        }
    }

    async fn subscribe(&self, _transport_id: &str, instance: u64, topic: &Topic) -> SubscriptionHandle {
        // ---
        log_debug!("{_transport_id}#{instance}: subscribe to {topic}");

        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);

        let mut subs = self.subscriptions.write().await;
        subs.entry(topic.clone())
            .or_default()
            .push(HubSubscriber { instance, tx });

        SubscriptionHandle {
            topic: topic.clone(),
            inbox: rx,
        }
    }

    /// Remove every subscription owned by transport `instance`.
    ///
    /// Other transports sharing the hub keep theirs, including ones created
    /// under the same node name.
    async fn detach(&self, _transport_id: &str, instance: u64) {
        // ---
        log_debug!("{_transport_id}#{instance}: detaching from memory hub");

        let mut subs = self.subscriptions.write().await;
        for list in subs.values_mut() {
            list.retain(|s| s.instance != instance);
        }
        subs.retain(|_, list| !list.is_empty());
    }

    /// Drop every subscription on the hub.
    ///
    /// All inboxes report end-of-stream, so receive loops of servers, clients
    /// and subscribers attached here wind down. Transports stay usable and may
    /// subscribe again afterwards.
    pub async fn clear(&self) {
        // ---
        let mut subs = self.subscriptions.write().await;
        log_debug!("memory hub: clearing {} topics", subs.len());
        subs.clear();
    }

    async fn prune(&self, topic: &Topic) {
        // ---
        let mut subs = self.subscriptions.write().await;
        if let Some(list) = subs.get_mut(topic) {
            list.retain(|s| !s.tx.is_closed());
            if list.is_empty() {
                subs.remove(topic);
            }
        }
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }
}

/// Process-global hub used by [`create_memory_transport`].
static GLOBAL_HUB: OnceLock<Arc<MemoryHub>> = OnceLock::new();

fn global_hub() -> Arc<MemoryHub> {
    GLOBAL_HUB.get_or_init(MemoryHub::new).clone()
}

/// Tear down the process-global memory bus.
///
/// Every subscription made through [`create_memory_transport`] is dropped.
/// Endpoints on it stop receiving; explicit hubs are untouched.
pub async fn shutdown() {
    // ---
    if let Some(hub) = GLOBAL_HUB.get() {
        hub.clear().await;
    }
}

/// In-memory transport attached to a [`MemoryHub`].
struct MemoryTransport {
    // ---
    transport_id: Arc<str>,
    instance: u64,
    hub: Arc<MemoryHub>,
    closed: AtomicBool,
}

impl MemoryTransport {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    fn transport_id(&self) -> &str {
        &self.transport_id
    }

    async fn publish(&self, topic: &Topic, payload: Bytes) -> Result<()> {
        self.ensure_open()?;
        self.hub.publish(&self.transport_id, topic, payload).await;
        Ok(())
    }

    async fn subscribe(&self, topic: &Topic) -> Result<SubscriptionHandle> {
        self.ensure_open()?;
        Ok(self
            .hub
            .subscribe(&self.transport_id, self.instance, topic)
            .await)
    }

    /// Close the transport.
    ///
    /// Drops only this transport's subscriptions; their inboxes then report
    /// end-of-stream to whoever is reading them.
    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.hub.detach(&self.transport_id, self.instance).await;
        }
        Ok(())
    }
}

/// Create an in-memory transport on the process-global hub.
///
/// # Errors
///
/// Currently infallible.
pub async fn create_memory_transport(config: &ServiceConfig) -> Result<TransportPtr> {
    // ---
    create_memory_transport_with_hub(config, global_hub()).await
}

/// Create an in-memory transport on an explicitly provided hub.
///
/// Transports on different hubs never see each other's traffic, which keeps
/// tests running in parallel isolated.
///
/// # Errors
///
/// Currently infallible.
pub async fn create_memory_transport_with_hub(
    config: &ServiceConfig,
    hub: Arc<MemoryHub>,
) -> Result<TransportPtr> {
    // ---
    log_debug!("{}: create memory transport", config.node_name);

    Ok(Arc::new(MemoryTransport {
        transport_id: Arc::from(config.node_name.as_str()),
        instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        hub,
        closed: AtomicBool::new(false),
    }))
}
