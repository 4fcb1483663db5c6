//! AddTwoInts service and client sharing one in-memory hub.
//!
//! Also shows a blocking handler and a call that times out once the server
//! is gone.
//!
//! Run with: cargo run --example add_two_ints_memory
mod common;

use std::time::Duration;

use common::{AddTwoInts, AddTwoIntsRequest, AddTwoIntsResponse};
use svcbus::{Error, Node, ServiceConfig, ServiceServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---
    common::init_logging();

    let server_node = Node::new(ServiceConfig::memory("math-server")).await?;
    let client_node = Node::new(ServiceConfig::memory("math-client")).await?;

    let server = ServiceServer::<AddTwoInts>::new_blocking(
        server_node.transport().clone(),
        "add_two_ints",
        server_node.config(),
        |req: AddTwoIntsRequest| {
            Ok(AddTwoIntsResponse {
                sum: req.a + req.b,
            })
        },
    )
    .await?;

    let client = client_node.create_client::<AddTwoInts>("add_two_ints").await?;

    for (a, b) in [(1, 2), (40, 2), (-7, 7)] {
        let resp = client
            .call(&AddTwoIntsRequest { a, b }, Duration::from_secs(1))
            .await?;
        println!("{a} + {b} = {}", resp.sum);
    }

    server.close();

    match client
        .call(&AddTwoIntsRequest { a: 1, b: 1 }, Duration::from_millis(200))
        .await
    {
        Err(Error::Timeout) => println!("no server, call timed out as expected"),
        other => println!("unexpected outcome: {other:?}"),
    }

    client_node.close().await?;
    server_node.close().await?;
    Ok(())
}
