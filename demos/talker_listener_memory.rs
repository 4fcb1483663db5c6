//! Typed publish/subscribe: a talker publishing poses and a listener
//! reporting them through a callback.
//!
//! Run with: cargo run --example talker_listener_memory
mod common;

use std::time::Duration;

use common::{Point, Pose};
use svcbus::{EntityKind, Graph, Node, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---
    common::init_logging();

    let talker = Node::new(ServiceConfig::memory("talker")).await?;
    let listener = Node::new(ServiceConfig::memory("listener")).await?;

    let subscriber = listener
        .create_subscriber_with_callback::<Pose, _>("robot/pose", |pose: &Pose| {
            println!(
                "heard pose x={:.1} y={:.1} yaw={:.2}",
                pose.position.x, pose.position.y, pose.yaw
            );
        })
        .await?;

    let publisher = talker.create_publisher::<Pose>("robot/pose")?;

    println!("nodes: {:?}", Graph::node_names());
    println!(
        "robot/pose: {} publisher(s), {} subscriber(s)",
        Graph::count(EntityKind::Publisher, "robot/pose"),
        Graph::count(EntityKind::Subscriber, "robot/pose")
    );

    for i in 0..5 {
        let step = i as f64;
        publisher
            .publish(&Pose {
                position: Point {
                    x: step,
                    y: step * 0.5,
                    z: 0.0,
                },
                yaw: step * 0.1,
            })
            .await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    if let Some(pose) = subscriber.latest() {
        println!("latest pose: {pose:?}");
    }

    talker.close().await?;
    listener.close().await?;
    Ok(())
}
