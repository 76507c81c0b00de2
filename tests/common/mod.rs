//! Scripted in-memory transport and recording listener shared by the client
//! integration tests.

#![allow(dead_code)]

use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tidewire::{
    Client, ClientConfigBuilder, ClientFrame, ConnectTarget, Delivery, InboundMessage, Listener,
    Message, QoS, ServerFrame, Session, Status, Transport, TransportError,
};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

/// Upper bound on how long (virtual time) a test waits for something to happen.
const PATIENCE: Duration = Duration::from_secs(3600);

/// How a scripted handshake ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accept,
    /// The handshake succeeds but the session is already broken: every write
    /// fails.
    AcceptBroken,
    Refuse,
    Stall,
}

#[derive(Debug, Clone)]
pub struct Attempt {
    pub at: Instant,
    pub target: ConnectTarget,
}

struct Script {
    outcomes: VecDeque<Outcome>,
    default: Outcome,
    attempts: Vec<Attempt>,
}

/// A transport whose handshakes follow a script.
///
/// Every accepted session is handed to the test as a [`ServerSide`].
#[derive(Clone)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    sessions: mpsc::UnboundedSender<ServerSide>,
}

impl MockTransport {
    pub fn new(default: Outcome) -> (Self, mpsc::UnboundedReceiver<ServerSide>) {
        let (sessions, rx) = mpsc::unbounded_channel();
        let transport = Self {
            script: Arc::new(Mutex::new(Script {
                outcomes: VecDeque::new(),
                default,
                attempts: Vec::new(),
            })),
            sessions,
        };
        (transport, rx)
    }

    /// Queues outcomes for the next handshakes; the default applies after.
    pub fn script(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.script.lock().unwrap().outcomes.extend(outcomes);
    }

    pub fn set_default(&self, outcome: Outcome) {
        self.script.lock().unwrap().default = outcome;
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.script.lock().unwrap().attempts.clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.script.lock().unwrap().attempts.len()
    }
}

impl Transport for MockTransport {
    fn open(
        &self,
        target: ConnectTarget,
    ) -> BoxFuture<'static, Result<Box<dyn Session>, TransportError>> {
        let outcome = {
            let mut script = self.script.lock().unwrap();
            script.attempts.push(Attempt {
                at: Instant::now(),
                target: target.clone(),
            });
            let default = script.default;
            script.outcomes.pop_front().unwrap_or(default)
        };
        let sessions = self.sessions.clone();

        Box::pin(async move {
            match outcome {
                Outcome::Accept => {
                    let (session, server) = session_pair(target.address);
                    let _ = sessions.send(server);
                    Ok(Box::new(session) as Box<dyn Session>)
                }
                Outcome::AcceptBroken => {
                    let (session, _server) = session_pair(target.address);
                    Ok(Box::new(session) as Box<dyn Session>)
                }
                Outcome::Refuse => Err(TransportError::ConnectFailed {
                    address: target.address,
                    reason: "connection refused".to_string(),
                }),
                Outcome::Stall => Err(TransportError::Stalled),
            }
        })
    }
}

struct MockSession {
    outgoing: mpsc::UnboundedSender<ClientFrame>,
    incoming: mpsc::UnboundedReceiver<Result<ServerFrame, TransportError>>,
    closed: Arc<Mutex<bool>>,
}

impl Session for MockSession {
    fn send(&mut self, frame: ClientFrame) -> BoxFuture<'_, Result<(), TransportError>> {
        let result = self
            .outgoing
            .send(frame)
            .map_err(|_| TransportError::Closed);
        Box::pin(async move { result })
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<ServerFrame, TransportError>> {
        Box::pin(async move {
            match self.incoming.recv().await {
                Some(frame) => frame,
                None => Err(TransportError::Closed),
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        *self.closed.lock().unwrap() = true;
        Box::pin(async {})
    }
}

/// The test's end of an accepted session.
pub struct ServerSide {
    pub address: String,
    frames: mpsc::UnboundedReceiver<ClientFrame>,
    push: mpsc::UnboundedSender<Result<ServerFrame, TransportError>>,
    closed: Arc<Mutex<bool>>,
}

fn session_pair(address: String) -> (MockSession, ServerSide) {
    let (outgoing, frames) = mpsc::unbounded_channel();
    let (push, incoming) = mpsc::unbounded_channel();
    let closed = Arc::new(Mutex::new(false));
    (
        MockSession {
            outgoing,
            incoming,
            closed: Arc::clone(&closed),
        },
        ServerSide {
            address,
            frames,
            push,
            closed,
        },
    )
}

impl ServerSide {
    /// Next frame sent by the client.
    pub async fn frame(&mut self) -> ClientFrame {
        timeout(PATIENCE, self.frames.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("session dropped before sending a frame")
    }

    /// Whether the client has sent nothing that was not yet read.
    pub fn no_pending_frames(&mut self) -> bool {
        self.frames.try_recv().is_err()
    }

    pub fn send(&self, frame: ServerFrame) {
        let _ = self.push.send(Ok(frame));
    }

    /// Breaks the session with `err`.
    pub fn fail(&self, err: TransportError) {
        let _ = self.push.send(Err(err));
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Message(Message),
    Status(Status),
}

struct ChannelListener(mpsc::UnboundedSender<Event>);

impl Listener for ChannelListener {
    fn on_message(&mut self, message: Message) {
        let _ = self.0.send(Event::Message(message));
    }

    fn on_status(&mut self, status: Status) {
        let _ = self.0.send(Event::Status(status));
    }
}

/// A client wired to a [`MockTransport`] and a recording listener.
pub struct Harness {
    pub client: Client,
    pub transport: MockTransport,
    sessions: mpsc::UnboundedReceiver<ServerSide>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl Harness {
    pub fn new(builder: ClientConfigBuilder, default: Outcome) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .try_init();
        let config = builder.seed(42).build().expect("valid config");
        let (transport, sessions) = MockTransport::new(default);
        let (tx, events) = mpsc::unbounded_channel();
        let client = Client::new(config, transport.clone(), ChannelListener(tx));
        Self {
            client,
            transport,
            sessions,
            events,
        }
    }

    /// Waits for the next accepted session.
    pub async fn accept(&mut self) -> ServerSide {
        timeout(PATIENCE, self.sessions.recv())
            .await
            .expect("timed out waiting for a session")
            .expect("transport dropped")
    }

    pub async fn event(&mut self) -> Event {
        timeout(PATIENCE, self.events.recv())
            .await
            .expect("timed out waiting for a listener event")
            .expect("listener task ended")
    }

    pub async fn status(&mut self) -> Status {
        match self.event().await {
            Event::Status(status) => status,
            other => panic!("expected a status, got {other:?}"),
        }
    }

    pub async fn message(&mut self) -> Message {
        match self.event().await {
            Event::Message(message) => message,
            other => panic!("expected a message, got {other:?}"),
        }
    }

    /// Waits until every command sent so far has been handled.
    pub async fn settle(&self) {
        self.client.subjects().await.expect("client alive");
    }

    /// Lets `period` of virtual time pass and returns everything delivered
    /// meanwhile.
    pub async fn drain(&mut self, period: Duration) -> Vec<Event> {
        tokio::time::sleep(period).await;
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn servers(list: &[&str]) -> ClientConfigBuilder {
    tidewire::ClientConfig::builder()
        .name("test-client")
        .servers(list)
        .expect("valid servers")
}

pub fn inbound(subject: &str, epoch: u64, seq: u64, delivery: Delivery) -> ServerFrame {
    ServerFrame::Message(InboundMessage {
        subject: subject.to_string(),
        payload: format!("{subject}#{seq}").into_bytes(),
        compressed: false,
        reply_subject: None,
        qos: QoS::Guaranteed,
        retained: true,
        seq,
        epoch,
        delivery,
    })
}

pub fn statuses(events: &[Event]) -> Vec<&Status> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Status(status) => Some(status),
            Event::Message(_) => None,
        })
        .collect()
}
