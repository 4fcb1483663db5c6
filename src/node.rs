//! Nodes.
//!
//! A [`Node`] is a named participant owning one transport. It is the usual
//! way to create publishers, subscribers, service servers and clients: each
//! factory method passes along the node's transport and configuration.

use std::future::Future;
use std::sync::Mutex;

use crate::graph::{EntityGuard, EntityKind, Graph};
use crate::pubsub::{Publisher, Subscriber};
use crate::schema::{Message, Service};
use crate::sync::lock_ignore_poison;
use crate::{
    // ---
    create_transport,
    log_debug,
    log_info,
    Result,
    ServiceClient,
    ServiceConfig,
    ServiceServer,
    TransportPtr,
};

/// A named participant and factory for endpoints.
///
/// ```
/// # use svcbus::{Node, ServiceConfig};
/// # #[tokio::main] async fn main() -> svcbus::Result<()> {
/// let node = Node::new(ServiceConfig::memory("talker")).await?;
/// assert_eq!(node.name(), "talker");
/// node.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Node {
    // ---
    config: ServiceConfig,
    transport: TransportPtr,
    entity: Mutex<Option<EntityGuard>>,
}

impl Node {
    /// Create a node on the transport selected by `config`.
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        // ---
        let transport = create_transport(&config).await?;
        Ok(Self::with_transport(transport, config))
    }

    /// Create a node on an existing transport.
    pub fn with_transport(transport: TransportPtr, config: ServiceConfig) -> Self {
        // ---
        log_info!("{}: node started", config.node_name);
        let entity = Graph::register(EntityKind::Node, &config.node_name, &config.node_name);

        Self {
            config,
            transport,
            entity: Mutex::new(Some(entity)),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.node_name
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn transport(&self) -> &TransportPtr {
        &self.transport
    }

    pub fn create_publisher<M: Message>(&self, topic: &str) -> Result<Publisher<M>> {
        Publisher::new(self.transport.clone(), topic, &self.config)
    }

    pub async fn create_subscriber<M: Message>(&self, topic: &str) -> Result<Subscriber<M>> {
        Subscriber::new(self.transport.clone(), topic, &self.config).await
    }

    pub async fn create_subscriber_with_callback<M, F>(
        &self,
        topic: &str,
        callback: F,
    ) -> Result<Subscriber<M>>
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        Subscriber::with_callback(self.transport.clone(), topic, &self.config, callback).await
    }

    pub async fn create_service<S, F, Fut>(
        &self,
        service_name: &str,
        handler: F,
    ) -> Result<ServiceServer<S>>
    where
        S: Service,
        F: Fn(S::Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S::Response>> + Send + 'static,
    {
        ServiceServer::new(self.transport.clone(), service_name, &self.config, handler).await
    }

    pub async fn create_client<S: Service>(&self, service_name: &str) -> Result<ServiceClient<S>> {
        ServiceClient::new(self.transport.clone(), service_name, &self.config).await
    }

    /// Unregister the node and close its transport.
    ///
    /// Endpoints created from this node stop receiving once the transport
    /// closes.
    pub async fn close(&self) -> Result<()> {
        // ---
        lock_ignore_poison(&self.entity).take();
        log_debug!("{}: node closing", self.config.node_name);
        self.transport.close().await
    }
}
