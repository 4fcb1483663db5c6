//! MQTT transport implementation using `rumqttc`.
//!
//! ## Concurrency model
//!
//! A single background actor task owns the MQTT `EventLoop` and the
//! `AsyncClient`. Publishing, subscribing and shutdown are sent to it as
//! commands, and it polls the event loop for incoming publishes in the same
//! `select!`. No other task touches the event loop.
//!
//! ## Delivery
//!
//! Incoming publishes are demultiplexed by topic and fanned out to every
//! local inbox registered for that topic, matching the memory transport.
//! Delivery is QoS 0: best effort, no retained messages, no persistence.
//! The actor never waits on a slow reader, so a payload arriving at a full
//! inbox is dropped with a warning. The inbox itself stays registered; only
//! closed inboxes are evicted.
//!
//! ## Subscription confirmation
//!
//! `subscribe()` returns only after the broker's SUBACK. The broker answers
//! SUBSCRIBE packets in order, so pending subscribes wait in a FIFO queue and
//! each SUBACK settles the oldest one. An inbox is registered only once its
//! subscription is accepted. After a reconnect every known topic is
//! subscribed again and in-flight subscribes are reissued.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rumqttc::{
    //
    AsyncClient,
    ConnectReturnCode,
    Event,
    EventLoop,
    MqttOptions,
    Packet,
    Publish,
    QoS,
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::{
    //
    log_debug,
    log_error,
    log_info,
    log_warn,
    Error,
    Result,
    ServiceConfig,
    SubscriptionHandle,
    Topic,
    Transport,
    TransportPtr,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const INBOX_CAPACITY: usize = 64;
const DEFAULT_PORT: u16 = 1883;

type Inbox = mpsc::Sender<Bytes>;
type InboxMap = HashMap<String, Vec<Inbox>>;

enum Cmd {
    //
    Publish {
        topic: String,
        payload: Bytes,
        resp: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        topic: String,
        inbox: Inbox,
        resp: oneshot::Sender<Result<()>>,
    },
    Close {
        resp: oneshot::Sender<()>,
    },
}

/// A SUBSCRIBE sent to the broker whose SUBACK has not arrived yet.
enum AwaitingAck {
    /// Issued by `Transport::subscribe`; the inbox joins on acceptance.
    Caller {
        topic: String,
        inbox: Inbox,
        resp: oneshot::Sender<Result<()>>,
    },
    /// Reissued after a reconnect for a topic that already has inboxes.
    Resubscribe { topic: String },
}

/// SUBSCRIBEs in the order they were sent.
#[derive(Default)]
struct SubscribeQueue {
    waiting: VecDeque<AwaitingAck>,
}

impl SubscribeQueue {
    fn push(&mut self, entry: AwaitingAck) {
        self.waiting.push_back(entry);
    }

    /// Settle the oldest pending subscribe with the broker's verdict.
    ///
    /// An accepted caller subscribe has its inbox added to `inboxes` before
    /// the caller is answered. A rejected one is answered with an error and
    /// its inbox is dropped. Returns the settled topic, or `None` when
    /// nothing was pending.
    fn settle(&mut self, accepted: bool, inboxes: &mut InboxMap) -> Option<String> {
        // ---
        match self.waiting.pop_front()? {
            AwaitingAck::Caller { topic, inbox, resp } => {
                if accepted {
                    inboxes.entry(topic.clone()).or_default().push(inbox);
                    let _ = resp.send(Ok(()));
                } else {
                    let _ = resp.send(Err(Error::Transport(format!(
                        "broker rejected subscription to {topic}"
                    ))));
                }
                Some(topic)
            }
            AwaitingAck::Resubscribe { topic } => Some(topic),
        }
    }

    /// Take the caller subscribes that were in flight when the session was
    /// lost. Pending resubscribes are discarded; they are issued afresh.
    fn take_callers(&mut self) -> Vec<AwaitingAck> {
        self.waiting
            .drain(..)
            .filter(|entry| matches!(entry, AwaitingAck::Caller { .. }))
            .collect()
    }
}

/// Offer `payload` to every inbox without waiting.
///
/// Closed inboxes are removed from `inboxes`. Full ones keep their place and
/// miss this payload. Returns how many payloads were dropped that way.
fn fan_out(inboxes: &mut Vec<Inbox>, payload: &Bytes) -> usize {
    // ---
    let mut dropped = 0;
    inboxes.retain(|tx| match tx.try_send(payload.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            dropped += 1;
            true
        }
        Err(TrySendError::Closed(_)) => false,
    });
    dropped
}

/// MQTT-backed transport: one broker connection, best-effort delivery.
struct RumqttcTransport {
    // ---
    transport_id: String,
    cmd_tx: mpsc::Sender<Cmd>,
    actor: Mutex<Option<JoinHandle<()>>>,
}

struct MqttActor {
    // ---
    transport_id: String,
    client: AsyncClient,
    event_loop: EventLoop,
    cmd_rx: mpsc::Receiver<Cmd>,
    inboxes: InboxMap,
    pending: SubscribeQueue,
    reconnect: bool,
}

impl MqttActor {
    // ---

    async fn run(mut self) {
        // ---
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Cmd::Publish { topic, payload, resp }) => {
                            let _ = resp.send(self.handle_publish(topic, payload).await);
                        }
                        Some(Cmd::Subscribe { topic, inbox, resp }) => {
                            self.handle_subscribe(topic, inbox, resp).await;
                        }
                        Some(Cmd::Close { resp }) => {
                            self.handle_close().await;
                            let _ = resp.send(());
                            break;
                        }
                        None => break,
                    }
                }

                event = self.event_loop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            self.handle_incoming(publish);
                        }
                        Ok(Event::Incoming(Packet::SubAck(suback))) => {
                            self.handle_suback(suback);
                        }
                        Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                            self.handle_connack(connack).await;
                        }
                        Ok(_event) => {
                            log_debug!("{}: mqtt event ignored: {_event:?}", self.transport_id);
                        }
                        Err(err) => {
                            if is_disconnect(&err) {
                                self.reconnect = true;
                                log_error!("{}: broker disconnected: {err}", self.transport_id);
                            } else {
                                log_error!("{}: mqtt error: {err}", self.transport_id);
                            }
                            tokio::time::sleep(RECONNECT_DELAY).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_publish(&mut self, topic: String, payload: Bytes) -> Result<()> {
        // ---
        self.client
            .publish(topic.as_str(), QoS::AtMostOnce, false, payload.to_vec())
            .await
            .map_err(|err| {
                log_error!("{}: publish to {topic} failed: {err}", self.transport_id);
                Error::Transport(format!("mqtt publish to {topic} failed: {err}"))
            })
    }

    async fn handle_subscribe(
        &mut self,
        topic: String,
        inbox: Inbox,
        resp: oneshot::Sender<Result<()>>,
    ) {
        // ---
        if let Err(err) = self.client.subscribe(topic.as_str(), QoS::AtMostOnce).await {
            log_error!("{}: subscribe to {topic} failed: {err}", self.transport_id);
            let _ = resp.send(Err(Error::Transport(format!(
                "mqtt subscribe to {topic} failed: {err}"
            ))));
            return;
        }

        self.pending.push(AwaitingAck::Caller { topic, inbox, resp });
    }

    fn handle_suback(&mut self, suback: rumqttc::SubAck) {
        // ---
        let accepted = suback
            .return_codes
            .iter()
            .all(|code| !matches!(code, rumqttc::SubscribeReasonCode::Failure));

        match self.pending.settle(accepted, &mut self.inboxes) {
            None => {
                log_debug!("{}: SUBACK with nothing pending", self.transport_id);
            }
            Some(_topic) if accepted => {
                log_info!("{}: subscribed to {_topic}", self.transport_id);
            }
            Some(_topic) => {
                log_error!(
                    "{}: broker rejected subscription to {_topic}: {:?}",
                    self.transport_id,
                    suback.return_codes
                );
            }
        }
    }

    async fn handle_connack(&mut self, connack: rumqttc::ConnAck) {
        // ---
        if connack.code != ConnectReturnCode::Success {
            log_error!("{}: connection refused: {:?}", self.transport_id, connack.code);
            return;
        }
        log_info!("{}: connected to broker", self.transport_id);

        if !self.reconnect {
            return;
        }
        self.reconnect = false;

        // SUBACKs for the old session will never come.
        let in_flight = self.pending.take_callers();

        let topics: Vec<String> = self.inboxes.keys().cloned().collect();
        for topic in topics {
            match self.client.subscribe(topic.as_str(), QoS::AtMostOnce).await {
                Ok(()) => self.pending.push(AwaitingAck::Resubscribe { topic }),
                Err(_err) => {
                    log_error!("{}: resubscribe to {topic} failed: {_err}", self.transport_id);
                }
            }
        }

        for entry in in_flight {
            if let AwaitingAck::Caller { topic, inbox, resp } = entry {
                self.handle_subscribe(topic, inbox, resp).await;
            }
        }
    }

    async fn handle_close(&mut self) {
        // ---
        log_debug!("{}: disconnecting mqtt client", self.transport_id);

        if let Err(_err) = self.client.disconnect().await {
            log_debug!("{}: mqtt disconnect failed: {_err}", self.transport_id);
        }
        self.inboxes.clear();
        for entry in self.pending.take_callers() {
            if let AwaitingAck::Caller { resp, .. } = entry {
                let _ = resp.send(Err(Error::Closed));
            }
        }
    }

    fn handle_incoming(&mut self, publish: Publish) {
        // ---
        let Some(inboxes) = self.inboxes.get_mut(&publish.topic) else {
            return;
        };

        let dropped = fan_out(inboxes, &publish.payload);
        if dropped > 0 {
            log_warn!(
                "{}: {dropped} full inboxes on {} missed a payload",
                self.transport_id,
                publish.topic
            );
        }

        if inboxes.is_empty() {
            log_debug!("{}: no live inboxes left on {}", self.transport_id, publish.topic);
            self.inboxes.remove(&publish.topic);
        }
    }
}

fn is_disconnect(err: &rumqttc::ConnectionError) -> bool {
    matches!(
        err,
        rumqttc::ConnectionError::Io(_) | rumqttc::ConnectionError::MqttState(_)
    )
}

impl RumqttcTransport {
    async fn send_cmd<T>(&self, cmd: Cmd, rx: oneshot::Receiver<T>) -> Result<T> {
        // ---
        self.cmd_tx.send(cmd).await.map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }
}

#[async_trait::async_trait]
impl Transport for RumqttcTransport {
    // ---
    fn transport_id(&self) -> &str {
        &self.transport_id
    }

    async fn publish(&self, topic: &Topic, payload: Bytes) -> Result<()> {
        // ---
        let (tx, rx) = oneshot::channel();
        let cmd = Cmd::Publish {
            topic: topic.as_str().to_owned(),
            payload,
            resp: tx,
        };
        self.send_cmd(cmd, rx).await?
    }

    async fn subscribe(&self, topic: &Topic) -> Result<SubscriptionHandle> {
        // ---
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);

        let (tx, rx) = oneshot::channel();
        let cmd = Cmd::Subscribe {
            topic: topic.as_str().to_owned(),
            inbox: inbox_tx,
            resp: tx,
        };
        self.send_cmd(cmd, rx).await??;

        Ok(SubscriptionHandle {
            topic: topic.clone(),
            inbox: inbox_rx,
        })
    }

    async fn close(&self) -> Result<()> {
        // ---
        let (tx, rx) = oneshot::channel();
        // The actor may already be gone; closing twice is fine.
        let _ = self.send_cmd(Cmd::Close { resp: tx }, rx).await;

        if let Some(handle) = self.actor.lock().await.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

/// Create a rumqttc-backed transport from `config`.
///
/// The broker connection is made lazily when the actor first polls the
/// event loop; connection failures are logged and retried.
///
/// # Errors
///
/// Returns `Error::Transport` if the broker URI is missing or has an invalid
/// port.
pub async fn create_transport(config: &ServiceConfig) -> Result<TransportPtr> {
    // ---
    let uri = config
        .transport_uri
        .as_deref()
        .ok_or_else(|| Error::Transport("mqtt transport requires a broker uri".into()))?;

    let (host, port) = parse_broker_uri(uri)?;

    let mut options = MqttOptions::new(config.node_name.clone(), host, port);
    if let Some(secs) = config.keep_alive_secs {
        options.set_keep_alive(Duration::from_secs(u64::from(secs)));
    }

    let (client, event_loop) = AsyncClient::new(options, 10);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);

    let actor = MqttActor {
        transport_id: config.node_name.clone(),
        client,
        event_loop,
        cmd_rx,
        inboxes: HashMap::new(),
        pending: SubscribeQueue::default(),
        reconnect: false,
    };
    let handle = tokio::spawn(actor.run());

    Ok(Arc::new(RumqttcTransport {
        transport_id: config.node_name.clone(),
        cmd_tx,
        actor: Mutex::new(Some(handle)),
    }))
}

/// Split `mqtt://host:port` (or `tcp://`, or bare `host[:port]`).
fn parse_broker_uri(uri: &str) -> Result<(String, u16)> {
    // ---
    let addr = uri
        .strip_prefix("mqtt://")
        .or_else(|| uri.strip_prefix("tcp://"))
        .unwrap_or(uri);

    match addr.split_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| Error::Transport(format!("invalid port in broker uri {uri}")))?;
            Ok((host.to_owned(), port))
        }
        None => Ok((addr.to_owned(), DEFAULT_PORT)),
    }
}
