//! MQTT transport based on rumqttc.
//!
//! Adapts the rumqttc API to the domain-level `Transport` trait without
//! leaking MQTT concepts upward. Service topics map one-to-one onto MQTT
//! topics and payload bytes travel unmodified.
//!
//! Enable with the `transport_rumqttc` feature:
//!
//! ```toml
//! [dependencies]
//! svcbus = { version = "0.1", features = ["transport_rumqttc"] }
//! ```

mod transport;
pub use transport::create_transport;
