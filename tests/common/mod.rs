// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::{Arc, Once};

use serde::{Deserialize, Serialize};

use svcbus::schema::{Message, Service};
use svcbus::{MemoryHub, ServiceConfig, TransportPtr};

pub fn init_logging() {
    // ---
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub async fn transport_on(hub: &Arc<MemoryHub>, node: &str) -> TransportPtr {
    // ---
    svcbus::create_memory_transport_with_hub(&ServiceConfig::memory(node), hub.clone())
        .await
        .expect("failed to create memory transport")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub text: String,
}

impl Message for EchoRequest {
    const TYPE_NAME: &'static str = "test/srvs/echo/Echo.Request";
}

impl Message for EchoResponse {
    const TYPE_NAME: &'static str = "test/srvs/echo/Echo.Response";
}

pub struct Echo;

impl Service for Echo {
    type Request = EchoRequest;
    type Response = EchoResponse;
    const TYPE_NAME: &'static str = "test/srvs/echo/Echo";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Message for Point {
    const TYPE_NAME: &'static str = "test/msgs/geometry/Point";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub yaw: f64,
}

impl Message for Pose {
    const TYPE_NAME: &'static str = "test/msgs/geometry/Pose";
}
