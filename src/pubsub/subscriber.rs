use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::codec;
use crate::graph::{EntityGuard, EntityKind, Graph};
use crate::protocol::validate_topic_name;
use crate::schema::{Message, MessageShape};
use crate::sync::lock_ignore_poison;
use crate::{log_debug, log_warn, Result, ServiceConfig, Topic, TransportPtr};

type Callback<M> = Box<dyn Fn(&M) + Send + Sync>;

/// Receives messages of type `M` from one topic.
///
/// A background task decodes every payload, keeps the most recent message
/// for [`latest`](Self::latest) and invokes the optional callback. Payloads
/// carrying another type are logged and dropped.
pub struct Subscriber<M: Message> {
    // ---
    topic: Topic,
    latest: Arc<Mutex<Option<Arc<M>>>>,
    rx_task: JoinHandle<()>,
    entity: Mutex<Option<EntityGuard>>,
    _message: PhantomData<fn() -> M>,
}

impl<M: Message> Subscriber<M> {
    pub async fn new(transport: TransportPtr, topic: &str, config: &ServiceConfig) -> Result<Self> {
        Self::start(transport, topic, config, None).await
    }

    /// Subscribe and invoke `callback` for every message, in arrival order.
    pub async fn with_callback<F>(
        transport: TransportPtr,
        topic: &str,
        config: &ServiceConfig,
        callback: F,
    ) -> Result<Self>
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        Self::start(transport, topic, config, Some(Box::new(callback) as Callback<M>)).await
    }

    async fn start(
        transport: TransportPtr,
        topic: &str,
        config: &ServiceConfig,
        callback: Option<Callback<M>>,
    ) -> Result<Self> {
        // ---
        MessageShape::of::<M>().validate_topic_message()?;
        validate_topic_name(topic)?;

        let topic = Topic::from(topic);
        let mut handle = transport.subscribe(&topic).await?;
        let entity = Graph::register(EntityKind::Subscriber, &config.node_name, topic.as_str());

        let latest = Arc::new(Mutex::new(None));
        let slot = latest.clone();

        let rx_task = tokio::spawn(async move {
            // ---
            while let Some(bytes) = handle.inbox.recv().await {
                let message = match codec::decode_message::<M>(&bytes) {
                    Ok(message) => Arc::new(message),
                    Err(_err) => {
                        log_warn!("{}: dropping message: {_err}", handle.topic);
                        continue;
                    }
                };

                if let Some(callback) = &callback {
                    callback(&message);
                }
                *lock_ignore_poison(&slot) = Some(message);
            }
            log_debug!("subscription on {} ended", handle.topic);
        });

        Ok(Self {
            topic,
            latest,
            rx_task,
            entity: Mutex::new(Some(entity)),
            _message: PhantomData,
        })
    }

    /// Most recent message received, if any.
    pub fn latest(&self) -> Option<Arc<M>> {
        lock_ignore_poison(&self.latest).clone()
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Stop receiving. `latest` keeps returning the last message.
    pub fn close(&self) {
        // ---
        self.rx_task.abort();
        lock_ignore_poison(&self.entity).take();
    }
}

impl<M: Message> Drop for Subscriber<M> {
    fn drop(&mut self) {
        self.rx_task.abort();
    }
}
