//! Typed request/response services over publish/subscribe transports
//!
//! `svcbus` gives RPC-like semantics (one call, one matched reply, a
//! deadline) on top of transports that only deliver unaddressed messages
//! to topic subscribers. Clients tag each request with a correlation id;
//! servers echo it on the reply; clients match replies back to the waiting
//! call and enforce its timeout.
//!
//! Services are statically typed: a [`Service`](schema::Service) names its
//! request and response types, and every frame on the wire carries a type
//! identifier so mismatches are detected on receipt.
//!
//! Alongside services the crate offers typed publishers and subscribers, a
//! [`Node`] factory, and a process-wide [`Graph`] of live entities.

// Import all sub modules once...
mod macros;
pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

mod client;
mod codec;
mod config;
mod correlation;
mod domain;
mod error;
mod graph;
mod node;
mod retry;
mod server;
mod sync;
mod transport;

pub mod protocol;
pub mod pubsub;
pub mod schema;

// Re-export main types
pub use client::ServiceClient;
pub use server::ServiceServer;

pub use config::{RetryConfig, ServiceConfig, DEFAULT_REQUEST_TIMEOUT};
pub use correlation::CorrelationId;
pub use error::{Error, Result};
pub use graph::{EntityKind, Graph};
pub use node::Node;

pub use codec::{decode, decode_message, encode, peek_type_name};

pub use transport::{
    //
    create_memory_transport,
    create_memory_transport_with_hub,
    create_transport,
    shutdown,
    MemoryHub,
};

#[cfg(feature = "transport_rumqttc")]
pub use transport::create_rumqttc_transport;

// --- public re-exports
pub use domain::{
    //
    SubscriptionHandle,
    Topic,
    Transport,
    TransportPtr,
};
