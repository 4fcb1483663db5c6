//! Transport implementations.
//!
//! Concrete implementations of the domain-level `Transport` trait. The
//! in-memory transport is always available; broker transports sit behind
//! feature flags and are reached only through constructor functions.
//!
//! Domain code must not depend on transport-specific types.

mod memory;

#[cfg(feature = "transport_rumqttc")]
mod rumqttc;

pub use memory::{create_memory_transport, create_memory_transport_with_hub, shutdown, MemoryHub};

#[cfg(feature = "transport_rumqttc")]
pub use self::rumqttc::create_transport as create_rumqttc_transport;

use crate::{Error, Result, ServiceConfig, TransportPtr};

/// Create the transport selected by `config.transport_uri`.
///
/// - `None` or `memory://…` → in-memory transport on the process-global hub
/// - `mqtt://…` / `tcp://…` → MQTT (requires the `transport_rumqttc` feature)
///
/// # Errors
///
/// Returns `Error::Transport` for an unknown scheme or a scheme whose
/// transport was not compiled in.
pub async fn create_transport(config: &ServiceConfig) -> Result<TransportPtr> {
    // ---
    let uri = match config.transport_uri.as_deref() {
        None => return create_memory_transport(config).await,
        Some(uri) => uri,
    };

    if uri.starts_with("memory://") {
        return create_memory_transport(config).await;
    }

    if uri.starts_with("mqtt://") || uri.starts_with("tcp://") {
        #[cfg(feature = "transport_rumqttc")]
        {
            return create_rumqttc_transport(config).await;
        }

        #[cfg(not(feature = "transport_rumqttc"))]
        {
            return Err(Error::Transport(format!(
                "{uri}: mqtt transport not enabled (build with feature `transport_rumqttc`)"
            )));
        }
    }

    Err(Error::Transport(format!("{uri}: unsupported transport scheme")))
}
