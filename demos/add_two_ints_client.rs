//! AddTwoInts client using an MQTT broker.
//!
//! Run with: cargo run --example add_two_ints_client --features transport_rumqttc -- 3 4
//!
//! Requires: An MQTT broker on localhost:1883 and the add_two_ints_server example.
mod common;

use std::time::Duration;

use common::{AddTwoInts, AddTwoIntsRequest};
use svcbus::{Node, RetryConfig, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---
    common::init_logging();

    let mut args = std::env::args().skip(1);
    let a: i64 = args.next().as_deref().unwrap_or("1").parse()?;
    let b: i64 = args.next().as_deref().unwrap_or("2").parse()?;

    let broker_uri =
        std::env::var("BROKER_URI").unwrap_or_else(|_| "mqtt://localhost:1883".to_string());

    // The server may still be subscribing; retry timed-out calls.
    let config = ServiceConfig::with_broker(&broker_uri, "math-client")
        .with_request_timeout(Duration::from_secs(2))
        .with_retry(RetryConfig::default());

    let node = Node::new(config).await?;
    let client = node.create_client::<AddTwoInts>("add_two_ints").await?;

    let resp = client.call_default(&AddTwoIntsRequest { a, b }).await?;
    println!("{a} + {b} = {}", resp.sum);

    node.close().await?;
    Ok(())
}
