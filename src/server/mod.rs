//! Service server.
//!
//! A [`ServiceServer`] subscribes to its service's request topic. Every
//! request envelope is decoded and handed to the user handler in its own
//! task, so a slow handler never holds up later requests. A successful
//! response is published on the reply topic under the request's exact
//! correlation id.
//!
//! A request that fails to decode is logged and dropped. A handler error is
//! logged with the correlation id and produces no reply; the caller sees
//! its own timeout.

mod handler;

use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::codec;
use crate::graph::{EntityGuard, EntityKind, Graph};
use crate::protocol::{Envelope, ServiceTopics};
use crate::schema::Service;
use crate::sync::lock_ignore_poison;
use crate::{
    // ---
    log_debug,
    log_error,
    log_warn,
    Result,
    ServiceConfig,
    Topic,
    TransportPtr,
};

use handler::{wrap_async, wrap_blocking, BoxedHandler};

/// Serves requests for service `S` until closed or dropped.
pub struct ServiceServer<S: Service> {
    // ---
    service_name: String,
    rx_task: JoinHandle<()>,
    closed: AtomicBool,
    entity: Mutex<Option<EntityGuard>>,
    _service: PhantomData<fn() -> S>,
}

impl<S: Service> ServiceServer<S> {
    // ---
    /// Serve `service_name` with an async handler.
    ///
    /// # Errors
    ///
    /// - `Error::Schema` if `S::descriptor()` is not a valid Request/Response pair
    /// - `Error::InvalidTopic` if `service_name` cannot be mapped to topics
    /// - `Error::Transport` if the request subscription cannot be established
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use svcbus::{ServiceConfig, ServiceServer};
    /// # use svcbus::schema::{Message, Service};
    /// # use serde::{Deserialize, Serialize};
    /// # #[derive(Serialize, Deserialize)] struct AddReq { a: i64, b: i64 }
    /// # #[derive(Serialize, Deserialize)] struct AddResp { sum: i64 }
    /// # impl Message for AddReq { const TYPE_NAME: &'static str = "demo/srvs/math/AddTwoInts.Request"; }
    /// # impl Message for AddResp { const TYPE_NAME: &'static str = "demo/srvs/math/AddTwoInts.Response"; }
    /// # struct AddTwoInts;
    /// # impl Service for AddTwoInts {
    /// #     type Request = AddReq;
    /// #     type Response = AddResp;
    /// #     const TYPE_NAME: &'static str = "demo/srvs/math/AddTwoInts";
    /// # }
    /// # async fn example() -> svcbus::Result<()> {
    /// let config = ServiceConfig::memory("math-server");
    /// let transport = svcbus::create_transport(&config).await?;
    ///
    /// let server = ServiceServer::<AddTwoInts>::new(transport, "add_two_ints", &config, |req: AddReq| async move {
    ///     Ok(AddResp { sum: req.a + req.b })
    /// })
    /// .await?;
    /// # let _ = server;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new<F, Fut>(
        transport: TransportPtr,
        service_name: &str,
        config: &ServiceConfig,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(S::Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S::Response>> + Send + 'static,
    {
        Self::start(transport, service_name, config, wrap_async::<S, _, _>(handler)).await
    }

    /// Serve `service_name` with a synchronous handler.
    ///
    /// Each invocation runs on tokio's blocking pool, so the handler may do
    /// blocking IO or heavy computation.
    pub async fn new_blocking<F>(
        transport: TransportPtr,
        service_name: &str,
        config: &ServiceConfig,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(S::Request) -> Result<S::Response> + Send + Sync + 'static,
    {
        Self::start(transport, service_name, config, wrap_blocking::<S, _>(handler)).await
    }

    async fn start(
        transport: TransportPtr,
        service_name: &str,
        config: &ServiceConfig,
        handler: BoxedHandler<S>,
    ) -> Result<Self> {
        // ---
        S::descriptor().validate_for::<S>()?;
        let topics = ServiceTopics::for_service(service_name)?;

        let existing = Graph::count(EntityKind::Service, service_name);
        if existing > 0 {
            log_warn!(
                "{}: service '{service_name}' already has {existing} server(s) in this process ({:?}); \
                 callers may receive duplicate replies",
                config.node_name,
                Graph::nodes_with(EntityKind::Service, service_name)
            );
        }

        let mut handle = transport.subscribe(&topics.request).await?;
        log_debug!(
            "{}: serving {} on {}",
            config.node_name,
            S::TYPE_NAME,
            topics.request
        );

        let entity = Graph::register(EntityKind::Service, &config.node_name, service_name);

        let name = service_name.to_owned();
        let reply_topic = topics.reply;
        let rx_task = tokio::spawn(async move {
            // ---
            while let Some(bytes) = handle.inbox.recv().await {
                dispatch::<S>(&name, bytes, &handler, &transport, &reply_topic);
            }
            log_debug!("{name}: request subscription ended");
        });

        Ok(Self {
            service_name: service_name.to_owned(),
            rx_task,
            closed: AtomicBool::new(false),
            entity: Mutex::new(Some(entity)),
            _service: PhantomData,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Stop accepting requests. Handlers already running still reply.
    pub fn close(&self) {
        // ---
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.rx_task.abort();
        lock_ignore_poison(&self.entity).take();
        log_debug!("{}: server closed", self.service_name);
    }
}

impl<S: Service> Drop for ServiceServer<S> {
    fn drop(&mut self) {
        self.rx_task.abort();
    }
}

/// Decode one request envelope and run the handler for it in a new task.
fn dispatch<S: Service>(
    service_name: &str,
    bytes: Bytes,
    handler: &BoxedHandler<S>,
    transport: &TransportPtr,
    reply_topic: &Topic,
) {
    // ---
    let envelope = match Envelope::decode(bytes) {
        Ok(envelope) => envelope,
        Err(_err) => {
            log_warn!("{service_name}: dropping request: {_err}");
            return;
        }
    };
    let id = envelope.correlation_id;

    let request = match codec::decode_message::<S::Request>(&envelope.payload) {
        Ok(request) => request,
        Err(_err) => {
            log_warn!("{service_name}: dropping request {id}: {_err}");
            return;
        }
    };

    let handler = handler.clone();
    let transport = transport.clone();
    let reply_topic = reply_topic.clone();
    let service_name = service_name.to_owned();

    tokio::spawn(async move {
        // ---
        let response = match handler(request).await {
            Ok(response) => response,
            Err(err) => {
                log_error!("{service_name}: handler failed for request {id}: {err}");
                return;
            }
        };

        let reply = codec::encode(&response)
            .and_then(|payload| Envelope::new(id, payload).encode());
        let result = match reply {
            Ok(bytes) => transport.publish(&reply_topic, bytes).await,
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            log_error!("{service_name}: failed to publish reply {id}: {err}");
        }
    });
}
