//! Echo service over the in-memory transport.
//!
//! Run with: cargo run --example echo_memory
mod common;

use std::time::Duration;

use common::{Echo, EchoRequest, EchoResponse};
use svcbus::{Node, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---
    common::init_logging();

    let node = Node::new(ServiceConfig::memory("echo-node")).await?;

    let _server = node
        .create_service::<Echo, _, _>("echo", |req: EchoRequest| async move {
            Ok(EchoResponse { text: req.text })
        })
        .await?;

    let client = node.create_client::<Echo>("echo").await?;

    let resp = client
        .call(
            &EchoRequest {
                text: "hi".into(),
            },
            Duration::from_secs(1),
        )
        .await?;
    println!("echo -> {}", resp.text);

    node.close().await?;
    Ok(())
}
