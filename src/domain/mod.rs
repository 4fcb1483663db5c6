//! Domain layer public interface.
//!
//! Abstractions here are independent of transport implementations and
//! infrastructure. Consumers import through this module rather than the
//! individual files.

mod transport;

pub use transport::{
    //
    SubscriptionHandle,
    Topic,
    Transport,
    TransportPtr,
};
