//! Service client.
//!
//! A [`ServiceClient`] subscribes once to its service's reply topic and runs
//! a background receive loop that hands every reply envelope to the
//! correlation registry. Each call mints a fresh correlation id, registers a
//! pending entry, publishes the request and suspends on the entry's result
//! slot until a reply or the deadline settles it.
//!
//! # Concurrency
//!
//! Any number of calls may be in flight on one client (or its clones).
//! Replies are matched purely by correlation id, so the order in which they
//! arrive does not matter.

mod registry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::codec;
use crate::correlation::CorrelationIdGenerator;
use crate::graph::{EntityGuard, EntityKind, Graph};
use crate::protocol::{Envelope, ServiceTopics};
use crate::retry::Backoff;
use crate::schema::{MessageShape, Service};
use crate::sync::lock_ignore_poison;
use crate::{
    // ---
    log_debug,
    log_error,
    CorrelationId,
    Error,
    Result,
    RetryConfig,
    ServiceConfig,
    TransportPtr,
};

use registry::CorrelationRegistry;

/// Typed client for service `S`.
///
/// Cheap to clone (internally `Arc`-backed).
pub struct ServiceClient<S: Service> {
    inner: Arc<Inner<S>>,
}

impl<S: Service> Clone for ServiceClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S: Service> {
    // ---
    transport: TransportPtr,
    service_name: String,
    topics: ServiceTopics,
    ids: CorrelationIdGenerator,
    registry: CorrelationRegistry<S::Response>,
    request_timeout: Duration,
    retry_config: Option<RetryConfig>,
    closed: AtomicBool,
    rx_task: JoinHandle<()>,
    entity: Mutex<Option<EntityGuard>>,
}

impl<S: Service> Drop for Inner<S> {
    fn drop(&mut self) {
        self.rx_task.abort();
    }
}

/// Removes a call's registry entry if the call ends without settling it,
/// e.g. a failed publish or a dropped future.
struct CancelOnDrop<'a, S: Service> {
    registry: &'a CorrelationRegistry<S::Response>,
    id: CorrelationId,
}

impl<S: Service> Drop for CancelOnDrop<'_, S> {
    fn drop(&mut self) {
        self.registry.cancel(&self.id);
    }
}

impl<S: Service> ServiceClient<S> {
    // ---
    /// Create a client for the service published under `service_name`.
    ///
    /// # Errors
    ///
    /// - `Error::Schema` if `S::descriptor()` does not describe a valid
    ///   Request/Response pair for `S`
    /// - `Error::InvalidTopic` if `service_name` cannot be mapped to topics
    /// - `Error::Transport` if the reply subscription cannot be established
    pub async fn new(
        transport: TransportPtr,
        service_name: &str,
        config: &ServiceConfig,
    ) -> Result<Self> {
        // ---
        S::descriptor().validate_for::<S>()?;
        let topics = ServiceTopics::for_service(service_name)?;

        let mut handle = transport.subscribe(&topics.reply).await?;
        log_debug!(
            "{}: client for {} subscribed to {}",
            config.node_name,
            S::TYPE_NAME,
            topics.reply
        );

        let entity = Graph::register(EntityKind::Client, &config.node_name, service_name);

        let inner = Arc::new_cyclic(|weak: &std::sync::Weak<Inner<S>>| {
            // ---
            let weak = weak.clone();

            let rx_task = tokio::spawn(async move {
                // ---
                while let Some(bytes) = handle.inbox.recv().await {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    inner.handle_reply(bytes);
                }
                log_debug!("reply subscription on {} ended", handle.topic);
            });

            Inner {
                // ---
                transport,
                service_name: service_name.to_owned(),
                topics,
                ids: CorrelationIdGenerator::new(),
                registry: CorrelationRegistry::new(),
                request_timeout: config.request_timeout,
                retry_config: config.retry_config.clone(),
                closed: AtomicBool::new(false),
                rx_task,
                entity: Mutex::new(Some(entity)),
            }
        });

        Ok(Self { inner })
    }

    /// Call the service and wait up to `timeout` for each attempt's reply.
    ///
    /// If the client was configured with a [`RetryConfig`], a timed-out
    /// attempt is retried with a fresh correlation id.
    ///
    /// # Errors
    ///
    /// - `Error::Timeout` if no reply arrived in time (after any retries)
    /// - `Error::TypeMismatch` if the reply does not decode as `S::Response`
    /// - `Error::Transport` if the request could not be published
    /// - `Error::Closed` if the client was closed
    pub async fn call(&self, request: &S::Request, timeout: Duration) -> Result<S::Response> {
        // ---
        let payload = codec::encode(request)?;
        let mut backoff = self.inner.retry_config.as_ref().map(Backoff::new);

        loop {
            let err = match self.call_once(payload.clone(), timeout).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let delay = match backoff.as_mut() {
                Some(backoff) if err.is_retryable() => backoff.next_delay(),
                _ => None,
            };
            let Some(delay) = delay else {
                return Err(err);
            };

            log_debug!("{}: {err}, retrying in {delay:?}", self.inner.service_name);
            time::sleep(delay).await;
        }
    }

    /// [`call`](Self::call) with the configured default request timeout.
    pub async fn call_default(&self, request: &S::Request) -> Result<S::Response> {
        self.call(request, self.inner.request_timeout).await
    }

    async fn call_once(&self, payload: Bytes, timeout: Duration) -> Result<S::Response> {
        // ---
        let inner = &*self.inner;
        let id = inner.ids.next_id();
        let deadline = Instant::now() + timeout;

        // Register before publishing so a fast reply always finds its entry.
        // Fails with Closed once close() has run.
        let mut call = inner
            .registry
            .register(id, MessageShape::of::<S::Response>(), deadline)?;
        let _cancel = CancelOnDrop::<S> {
            registry: &inner.registry,
            id,
        };

        let envelope = Envelope::new(id, payload).encode()?;
        if let Err(err) = inner.transport.publish(&inner.topics.request, envelope).await {
            log_error!("{}: failed to publish request {id}: {err}", inner.service_name);
            return Err(err);
        }

        match time::timeout_at(call.deadline, &mut call.slot).await {
            Ok(outcome) => return outcome.map_err(|_| Error::Closed)?,
            Err(_elapsed) => {
                if inner.registry.expire(&call.id) {
                    log_debug!("{}: call {id} timed out", inner.service_name);
                }
            }
        }

        // Either expire or a reply that beat it has filled the slot.
        (&mut call.slot).await.map_err(|_| Error::Closed)?
    }

    /// Service name this client calls.
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Random instance id forming the high half of this client's correlation ids.
    pub fn client_id(&self) -> u64 {
        self.inner.ids.client()
    }

    /// Number of calls currently awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        self.inner.registry.len()
    }

    /// Stop receiving replies and fail every pending call with `Error::Closed`.
    ///
    /// Affects all clones. The shared transport stays open.
    pub fn close(&self) {
        // ---
        let inner = &*self.inner;
        if inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        inner.rx_task.abort();
        let _dropped = inner.registry.close();
        lock_ignore_poison(&inner.entity).take();

        log_debug!(
            "{}: client closed, {_dropped} pending calls dropped",
            inner.service_name
        );
    }
}

impl<S: Service> Inner<S> {
    fn handle_reply(&self, bytes: Bytes) {
        // ---
        let envelope = match Envelope::decode(bytes) {
            Ok(envelope) => envelope,
            Err(_err) => {
                log_debug!("{}: discarding reply: {_err}", self.service_name);
                return;
            }
        };

        if !self.registry.resolve(&envelope.correlation_id, &envelope.payload) {
            log_debug!(
                "{}: discarding stale or foreign reply {}",
                self.service_name,
                envelope.correlation_id
            );
        }
    }
}
