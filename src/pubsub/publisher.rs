use std::marker::PhantomData;

use crate::codec;
use crate::graph::{EntityGuard, EntityKind, Graph};
use crate::protocol::validate_topic_name;
use crate::schema::{Message, MessageShape};
use crate::{Result, ServiceConfig, Topic, TransportPtr};

/// Publishes messages of type `M` on one topic.
pub struct Publisher<M: Message> {
    // ---
    transport: TransportPtr,
    topic: Topic,
    _entity: EntityGuard,
    _message: PhantomData<fn(M)>,
}

impl<M: Message> Publisher<M> {
    /// # Errors
    ///
    /// `Error::Schema` / `Error::InvalidTypeName` if `M` is not a `msgs`
    /// type, `Error::InvalidTopic` for an unusable topic name.
    pub fn new(transport: TransportPtr, topic: &str, config: &ServiceConfig) -> Result<Self> {
        // ---
        MessageShape::of::<M>().validate_topic_message()?;
        validate_topic_name(topic)?;

        Ok(Self {
            transport,
            topic: Topic::from(topic),
            _entity: Graph::register(EntityKind::Publisher, &config.node_name, topic),
            _message: PhantomData,
        })
    }

    pub async fn publish(&self, message: &M) -> Result<()> {
        // ---
        let bytes = codec::encode(message)?;
        self.transport.publish(&self.topic, bytes).await
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}
