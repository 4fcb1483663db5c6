// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the pub/sub primitive that service clients, service
//! servers and typed publishers/subscribers are built on. It intentionally
//! avoids any reference to concrete protocols, brokers, or client libraries.
//!
//! A transport only moves opaque payload bytes between a publisher and the
//! subscribers of a topic. Correlation, typing and timeouts all live above
//! this layer.
//!
//! Concrete implementations live under `src/transport/`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::Result;

/// A topic name.
///
/// Topics are opaque, exact-match identifiers at the domain level. Transports
/// may map them onto broker-specific concepts (an MQTT topic, a queue name),
/// but the domain makes no assumptions about hierarchy or wildcards.
///
/// Cheap to clone and safe to share across threads.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(pub Arc<str>);

impl Topic {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> From<T> for Topic
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        Topic(value.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle returned from a successful subscription.
///
/// Payloads published to the topic after `subscribe()` returned are
/// delivered to `inbox`. Dropping the handle closes the inbox, which the
/// transport treats as an unsubscribe.
///
/// # Example
///
/// ```
/// # use svcbus::{ServiceConfig, Topic};
/// # use bytes::Bytes;
/// # #[tokio::main] async fn main() -> svcbus::Result<()> {
/// let transport = svcbus::create_memory_transport(&ServiceConfig::memory("doc")).await?;
/// let topic = Topic::from("doc/notifications");
/// let mut handle = transport.subscribe(&topic).await?;
///
/// transport.publish(&topic, Bytes::from_static(b"ping")).await?;
/// assert_eq!(handle.inbox.recv().await, Some(Bytes::from_static(b"ping")));
/// # Ok(())
/// # }
/// ```
pub struct SubscriptionHandle {
    /// Topic this handle was subscribed to.
    pub topic: Topic,
    /// Receiver for payloads delivered on `topic`.
    pub inbox: mpsc::Receiver<Bytes>,
}

/// Publish/subscribe transport.
///
/// Implementations must ensure that:
/// - Once `subscribe()` returns successfully, payloads published *after* that
///   point on the same topic are deliverable to the returned inbox.
/// - Every live subscriber of a topic receives its own copy of each payload.
/// - No ordering is promised across topics.
///
/// The in-memory transport is the reference implementation of these
/// semantics.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Identifier of this transport instance, used for logging.
    fn transport_id(&self) -> &str;

    /// Publish `payload` to every current subscriber of `topic`.
    async fn publish(&self, topic: &Topic, payload: Bytes) -> Result<()>;

    /// Subscribe to `topic`.
    async fn subscribe(&self, topic: &Topic) -> Result<SubscriptionHandle>;

    /// Close the transport and drop its subscriptions.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// Clones share one underlying connection; used to erase concrete transport
/// types behind the domain interface.
pub type TransportPtr = Arc<dyn Transport>;
