// tests/services.rs

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::time::{sleep, timeout, Duration, Instant};

use svcbus::protocol::{Envelope, ServiceTopics};
use svcbus::schema::{Message, Service, ServiceDescriptor};
use svcbus::{
    // ---
    CorrelationId,
    Error,
    MemoryHub,
    Result,
    RetryConfig,
    ServiceClient,
    ServiceConfig,
    ServiceServer,
    TransportPtr,
};

use common::{init_logging, transport_on, Echo, EchoRequest, EchoResponse, Point};

async fn echo_server(transport: TransportPtr, name: &str) -> ServiceServer<Echo> {
    // ---
    ServiceServer::<Echo>::new(
        transport,
        name,
        &ServiceConfig::memory("echo-server"),
        |req: EchoRequest| async move { Ok(EchoResponse { text: req.text }) },
    )
    .await
    .expect("failed to start echo server")
}

async fn echo_client(transport: TransportPtr, name: &str) -> ServiceClient<Echo> {
    // ---
    ServiceClient::<Echo>::new(transport, name, &ServiceConfig::memory("echo-client"))
        .await
        .expect("failed to create echo client")
}

fn hi() -> EchoRequest {
    EchoRequest { text: "hi".into() }
}

#[tokio::test]
async fn test_echo_round_trip() -> Result<()> {
    // ---
    init_logging();

    let hub = MemoryHub::new();
    let _server = echo_server(transport_on(&hub, "server").await, "echo").await;
    let client = echo_client(transport_on(&hub, "client").await, "echo").await;

    let start = Instant::now();
    let resp = client.call(&hi(), Duration::from_secs(1)).await?;

    assert_eq!(resp.text, "hi");
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(client.pending_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_slow_handler_times_out_at_deadline() {
    // ---
    init_logging();

    let hub = MemoryHub::new();
    let _server = ServiceServer::<Echo>::new(
        transport_on(&hub, "server").await,
        "slow",
        &ServiceConfig::memory("slow-server"),
        |_req: EchoRequest| async move {
            std::future::pending::<()>().await;
            Ok(EchoResponse { text: String::new() })
        },
    )
    .await
    .unwrap();
    let client = echo_client(transport_on(&hub, "client").await, "slow").await;

    let start = Instant::now();
    let result = client.call(&hi(), Duration::from_millis(100)).await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(Error::Timeout)), "got {result:?}");
    assert!(elapsed >= Duration::from_millis(100), "timed out early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "timed out late: {elapsed:?}");
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_no_server_times_out() {
    // ---
    let hub = MemoryHub::new();
    let client = echo_client(transport_on(&hub, "client").await, "nobody-home").await;

    let start = Instant::now();
    let result = client.call(&hi(), Duration::from_millis(50)).await;

    assert!(matches!(result, Err(Error::Timeout)));
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_are_not_cross_assigned() {
    // ---
    init_logging();

    let hub = MemoryHub::new();

    // Later requests finish first, so replies arrive in reverse order.
    let _server = ServiceServer::<Echo>::new(
        transport_on(&hub, "server").await,
        "reverse",
        &ServiceConfig::memory("reverse-server"),
        |req: EchoRequest| async move {
            let n: u64 = req.text.parse().unwrap_or(0);
            sleep(Duration::from_millis(5 * (20 - n.min(20)))).await;
            Ok(EchoResponse { text: req.text })
        },
    )
    .await
    .unwrap();
    let client = echo_client(transport_on(&hub, "client").await, "reverse").await;

    let calls: Vec<_> = (0..20)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let req = EchoRequest {
                    text: i.to_string(),
                };
                (i, client.call(&req, Duration::from_secs(2)).await)
            })
        })
        .collect();

    for call in calls {
        let (i, result) = call.await.unwrap();
        assert_eq!(result.unwrap().text, i.to_string());
    }
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_stale_and_foreign_replies_are_discarded() {
    // ---
    init_logging();

    let hub = MemoryHub::new();
    let topics = ServiceTopics::for_service("noisy").unwrap();
    let noise = transport_on(&hub, "noise").await;

    let _server = ServiceServer::<Echo>::new(
        transport_on(&hub, "server").await,
        "noisy",
        &ServiceConfig::memory("noisy-server"),
        |req: EchoRequest| async move {
            sleep(Duration::from_millis(50)).await;
            Ok(EchoResponse { text: req.text })
        },
    )
    .await
    .unwrap();
    let client = echo_client(transport_on(&hub, "client").await, "noisy").await;

    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.call(&hi(), Duration::from_secs(1)).await })
    };

    // A well-formed reply for an id nobody is waiting on.
    let foreign = svcbus::encode(&EchoResponse {
        text: "not yours".into(),
    })
    .unwrap();
    let envelope = Envelope::new(CorrelationId::generate(), foreign).encode().unwrap();
    noise.publish(&topics.reply, envelope).await.unwrap();

    // Bytes that are not an envelope at all.
    noise
        .publish(&topics.reply, Bytes::from_static(b"garbage"))
        .await
        .unwrap();

    let resp = call.await.unwrap().unwrap();
    assert_eq!(resp.text, "hi");

    // The client still works afterwards.
    let resp = client.call(&hi(), Duration::from_secs(1)).await.unwrap();
    assert_eq!(resp.text, "hi");
}

#[tokio::test]
async fn test_wrong_reply_type_is_type_mismatch() {
    // ---
    init_logging();

    let hub = MemoryHub::new();
    let topics = ServiceTopics::for_service("rogue").unwrap();

    // A hand-rolled server that answers every request with a Point.
    let rogue = transport_on(&hub, "rogue").await;
    let mut requests = rogue.subscribe(&topics.request).await.unwrap();
    let reply_topic = topics.reply.clone();
    tokio::spawn(async move {
        while let Some(bytes) = requests.inbox.recv().await {
            let request = Envelope::decode(bytes).unwrap();
            let payload = svcbus::encode(&Point {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            })
            .unwrap();
            let reply = Envelope::new(request.correlation_id, payload).encode().unwrap();
            rogue.publish(&reply_topic, reply).await.unwrap();
        }
    });

    let client = echo_client(transport_on(&hub, "client").await, "rogue").await;
    match client.call(&hi(), Duration::from_secs(1)).await {
        Err(Error::TypeMismatch { expected, found }) => {
            assert_eq!(expected, EchoResponse::TYPE_NAME);
            assert_eq!(found, Point::TYPE_NAME);
        }
        other => panic!("expected type mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_echoes_correlation_id() {
    // ---
    let hub = MemoryHub::new();
    let topics = ServiceTopics::for_service("echo-id").unwrap();
    let _server = echo_server(transport_on(&hub, "server").await, "echo-id").await;

    let raw = transport_on(&hub, "raw").await;
    let mut replies = raw.subscribe(&topics.reply).await.unwrap();

    let id = CorrelationId::new(0xabcd, 42);
    let payload = svcbus::encode(&hi()).unwrap();
    raw.publish(&topics.request, Envelope::new(id, payload).encode().unwrap())
        .await
        .unwrap();

    let bytes = timeout(Duration::from_secs(1), replies.inbox.recv())
        .await
        .unwrap()
        .unwrap();
    let reply = Envelope::decode(bytes).unwrap();

    assert_eq!(reply.correlation_id, id);
    let resp: EchoResponse = svcbus::decode_message(&reply.payload).unwrap();
    assert_eq!(resp.text, "hi");
}

#[tokio::test]
async fn test_undecodable_request_does_not_stop_server() {
    // ---
    init_logging();

    let hub = MemoryHub::new();
    let topics = ServiceTopics::for_service("robust").unwrap();
    let _server = echo_server(transport_on(&hub, "server").await, "robust").await;
    let raw = transport_on(&hub, "raw").await;

    raw.publish(&topics.request, Bytes::from_static(b"junk"))
        .await
        .unwrap();
    let wrong_type = svcbus::encode(&Point {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    })
    .unwrap();
    raw.publish(
        &topics.request,
        Envelope::new(CorrelationId::generate(), wrong_type)
            .encode()
            .unwrap(),
    )
    .await
    .unwrap();

    let client = echo_client(transport_on(&hub, "client").await, "robust").await;
    let resp = client.call(&hi(), Duration::from_secs(1)).await.unwrap();
    assert_eq!(resp.text, "hi");
}

#[tokio::test]
async fn test_handler_error_leaves_caller_to_time_out() {
    // ---
    init_logging();

    let hub = MemoryHub::new();
    let _server = ServiceServer::<Echo>::new(
        transport_on(&hub, "server").await,
        "picky",
        &ServiceConfig::memory("picky-server"),
        |req: EchoRequest| async move {
            if req.text == "bad" {
                return Err(Error::handler("refusing 'bad'"));
            }
            Ok(EchoResponse { text: req.text })
        },
    )
    .await
    .unwrap();
    let client = echo_client(transport_on(&hub, "client").await, "picky").await;

    let bad = EchoRequest { text: "bad".into() };
    let result = client.call(&bad, Duration::from_millis(100)).await;
    assert!(matches!(result, Err(Error::Timeout)));

    let resp = client.call(&hi(), Duration::from_secs(1)).await.unwrap();
    assert_eq!(resp.text, "hi");
}

#[tokio::test]
async fn test_blocking_handler() {
    // ---
    let hub = MemoryHub::new();
    let _server = ServiceServer::<Echo>::new_blocking(
        transport_on(&hub, "server").await,
        "shout",
        &ServiceConfig::memory("shout-server"),
        |req: EchoRequest| {
            std::thread::sleep(Duration::from_millis(10));
            Ok(EchoResponse {
                text: req.text.to_uppercase(),
            })
        },
    )
    .await
    .unwrap();
    let client = echo_client(transport_on(&hub, "client").await, "shout").await;

    let resp = client.call(&hi(), Duration::from_secs(1)).await.unwrap();
    assert_eq!(resp.text, "HI");
}

#[tokio::test]
async fn test_retry_reissues_timed_out_call() {
    // ---
    init_logging();

    let hub = MemoryHub::new();
    let attempts = Arc::new(AtomicU32::new(0));

    // Drop the first request on the floor, answer the rest.
    let seen = attempts.clone();
    let _server = ServiceServer::<Echo>::new(
        transport_on(&hub, "server").await,
        "flaky",
        &ServiceConfig::memory("flaky-server"),
        move |req: EchoRequest| {
            let attempt = seen.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt == 1 {
                    return Err(Error::handler("first attempt dropped"));
                }
                Ok(EchoResponse { text: req.text })
            }
        },
    )
    .await
    .unwrap();

    let config = ServiceConfig::memory("flaky-client").with_retry(RetryConfig {
        max_attempts: 3,
        multiplier: 2.0,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    });
    let client = ServiceClient::<Echo>::new(transport_on(&hub, "client").await, "flaky", &config)
        .await
        .unwrap();

    let resp = client.call(&hi(), Duration::from_millis(100)).await.unwrap();
    assert_eq!(resp.text, "hi");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_gives_up_after_max_attempts() {
    // ---
    let hub = MemoryHub::new();
    let topics = ServiceTopics::for_service("silent").unwrap();

    // Count requests, never answer.
    let listener = transport_on(&hub, "silent").await;
    let mut requests = listener.subscribe(&topics.request).await.unwrap();
    let received = Arc::new(AtomicU32::new(0));
    let counter = received.clone();
    tokio::spawn(async move {
        while requests.inbox.recv().await.is_some() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let config = ServiceConfig::memory("silent-client").with_retry(RetryConfig {
        max_attempts: 2,
        multiplier: 2.0,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    });
    let client = ServiceClient::<Echo>::new(transport_on(&hub, "client").await, "silent", &config)
        .await
        .unwrap();

    let result = client.call(&hi(), Duration::from_millis(30)).await;
    assert!(matches!(result, Err(Error::Timeout)), "got {result:?}");
    // First attempt plus two retries, each under its own id.
    assert_eq!(received.load(Ordering::SeqCst), 3);
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_type_mismatch_is_not_retried() {
    // ---
    let hub = MemoryHub::new();
    let topics = ServiceTopics::for_service("rogue-retry").unwrap();

    let rogue = transport_on(&hub, "rogue").await;
    let mut requests = rogue.subscribe(&topics.request).await.unwrap();
    let received = Arc::new(AtomicU32::new(0));
    let counter = received.clone();
    let reply_topic = topics.reply.clone();
    tokio::spawn(async move {
        while let Some(bytes) = requests.inbox.recv().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let request = Envelope::decode(bytes).unwrap();
            let payload = svcbus::encode(&Point { x: 0.0, y: 0.0, z: 0.0 }).unwrap();
            let reply = Envelope::new(request.correlation_id, payload).encode().unwrap();
            rogue.publish(&reply_topic, reply).await.unwrap();
        }
    });

    let config = ServiceConfig::memory("rogue-client").with_retry(RetryConfig::default());
    let client = ServiceClient::<Echo>::new(transport_on(&hub, "client").await, "rogue-retry", &config)
        .await
        .unwrap();

    let result = client.call(&hi(), Duration::from_secs(1)).await;
    assert!(matches!(result, Err(Error::TypeMismatch { .. })), "got {result:?}");
    assert_eq!(received.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_close_fails_pending_calls() {
    // ---
    let hub = MemoryHub::new();
    let client = echo_client(transport_on(&hub, "client").await, "closing").await;

    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.call(&hi(), Duration::from_secs(5)).await })
    };

    sleep(Duration::from_millis(20)).await;
    assert_eq!(client.pending_calls(), 1);

    client.close();
    let result = timeout(Duration::from_secs(1), call).await.unwrap().unwrap();
    assert!(matches!(result, Err(Error::Closed)), "got {result:?}");

    assert!(matches!(
        client.call(&hi(), Duration::from_secs(1)).await,
        Err(Error::Closed)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_calls_racing_close_fail_fast() {
    // ---
    let hub = MemoryHub::new();
    let client = echo_client(transport_on(&hub, "client").await, "close-race").await;

    let calls: Vec<_> = (0..32)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call(&hi(), Duration::from_secs(30)).await })
        })
        .collect();

    client.close();

    // No call may slip in after close and sit out its 30 s timeout.
    for call in calls {
        let result = timeout(Duration::from_secs(1), call)
            .await
            .expect("call outlived close")
            .unwrap();
        assert!(matches!(result, Err(Error::Closed)), "got {result:?}");
    }
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_abandoned_call_releases_its_entry() {
    // ---
    let hub = MemoryHub::new();
    let client = echo_client(transport_on(&hub, "client").await, "abandoned").await;

    let res = timeout(
        Duration::from_millis(20),
        client.call(&hi(), Duration::from_secs(5)),
    )
    .await;

    assert!(res.is_err());
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reply_racing_deadline_has_single_outcome() {
    // ---
    init_logging();

    let hub = MemoryHub::new();
    let _server = ServiceServer::<Echo>::new(
        transport_on(&hub, "server").await,
        "racy",
        &ServiceConfig::memory("racy-server"),
        |req: EchoRequest| async move {
            sleep(Duration::from_millis(20)).await;
            Ok(EchoResponse { text: req.text })
        },
    )
    .await
    .unwrap();
    let client = echo_client(transport_on(&hub, "client").await, "racy").await;

    let calls: Vec<_> = (0..50)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call(&hi(), Duration::from_millis(20)).await })
        })
        .collect();

    for call in calls {
        match call.await.unwrap() {
            Ok(resp) => assert_eq!(resp.text, "hi"),
            Err(Error::Timeout) => {}
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }
    assert_eq!(client.pending_calls(), 0);
}

// --- schema validation

struct NoResponse;

impl Service for NoResponse {
    type Request = EchoRequest;
    type Response = EchoResponse;
    const TYPE_NAME: &'static str = "test/srvs/echo/Echo";

    fn descriptor() -> ServiceDescriptor {
        ServiceDescriptor::new(Self::TYPE_NAME).with_request::<EchoRequest>()
    }
}

struct Misnamed;

impl Service for Misnamed {
    type Request = EchoRequest;
    type Response = EchoResponse;
    const TYPE_NAME: &'static str = "test/srvs/other/Misnamed";
}

#[tokio::test]
async fn test_missing_shape_fails_construction() {
    // ---
    let hub = MemoryHub::new();
    let config = ServiceConfig::memory("schema");

    let client = ServiceClient::<NoResponse>::new(transport_on(&hub, "c").await, "schema", &config).await;
    assert!(matches!(client, Err(Error::Schema(_))));

    let server = ServiceServer::<NoResponse>::new(
        transport_on(&hub, "s").await,
        "schema",
        &config,
        |req: EchoRequest| async move { Ok(EchoResponse { text: req.text }) },
    )
    .await;
    assert!(matches!(server, Err(Error::Schema(_))));
}

#[tokio::test]
async fn test_shapes_not_nested_under_service_fail_construction() {
    // ---
    let hub = MemoryHub::new();
    let client = ServiceClient::<Misnamed>::new(
        transport_on(&hub, "c").await,
        "misnamed",
        &ServiceConfig::memory("schema"),
    )
    .await;

    match client {
        Err(Error::Schema(msg)) => assert!(msg.contains("Misnamed.Request"), "{msg}"),
        Err(other) => panic!("expected schema error, got {other}"),
        Ok(_) => panic!("expected schema error, got a client"),
    }
}

#[tokio::test]
async fn test_invalid_service_name_fails_construction() {
    // ---
    let hub = MemoryHub::new();
    let client = ServiceClient::<Echo>::new(
        transport_on(&hub, "c").await,
        "bad/+/name",
        &ServiceConfig::memory("topics"),
    )
    .await;
    assert!(matches!(client, Err(Error::InvalidTopic(_))));
}
