//! Message and service schemas.
//!
//! Types opt in by implementing [`Message`] (and [`Service`] for
//! request/response pairs). Every type carries a [`TypeName`] identifier
//! that the codec writes on the wire and checks on receipt.

mod message;
mod service;
mod type_name;

pub use message::{Message, MessageShape};
pub use service::{Service, ServiceDescriptor};
pub use type_name::{Category, TypeName};
