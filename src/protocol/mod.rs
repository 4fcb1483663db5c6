/// Wire protocol for service calls
///
/// This module defines the envelope that tags every request and reply with
/// its correlation id, and the topic pair a service name maps onto.
mod envelope;
mod topics;

pub use envelope::Envelope;
pub use topics::ServiceTopics;

pub(crate) use topics::validate_topic_name;
