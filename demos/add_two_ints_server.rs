//! AddTwoInts server using an MQTT broker.
//!
//! Run with: cargo run --example add_two_ints_server --features transport_rumqttc
//!
//! Requires: An MQTT broker running on localhost:1883
mod common;

use common::{AddTwoInts, AddTwoIntsRequest, AddTwoIntsResponse};
use svcbus::{Node, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---
    common::init_logging();

    let broker_uri =
        std::env::var("BROKER_URI").unwrap_or_else(|_| "mqtt://localhost:1883".to_string());

    let node = Node::new(ServiceConfig::with_broker(&broker_uri, "math-server")).await?;

    let server = node
        .create_service::<AddTwoInts, _, _>("add_two_ints", |req: AddTwoIntsRequest| async move {
            Ok(AddTwoIntsResponse {
                sum: req.a + req.b,
            })
        })
        .await?;

    println!("serving add_two_ints, Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    server.close();
    node.close().await?;
    Ok(())
}
