use crate::config::ClientConfig;
use crate::dispatcher::{EventDispatcher, Listener};
use crate::error::ClientError;
use crate::machine::{Command, ConnectionStateMachine};
use crate::message::Message;
use crate::transport::Transport;
use std::sync::Arc;
use tidewire_reconnect::{ConnectionState, ServerPool, SharedConnectionState};
use tokio::sync::{mpsc, oneshot, watch};

/// Handle to a publish/subscribe session.
///
/// Every operation is queued to the client's connection task and returns
/// immediately; outcomes are reported to the [`Listener`]. Cloning the handle
/// is cheap and all clones drive the same session. The session shuts down once
/// the last handle is dropped.
///
/// # Examples
///
/// ```no_run
/// use tidewire::{Client, ClientConfig, Listener, Message, Status};
/// # use tidewire::{ConnectTarget, Session, Transport, TransportError};
/// # use futures::future::BoxFuture;
/// # struct WsTransport;
/// # impl Transport for WsTransport {
/// #     fn open(&self, _: ConnectTarget) -> BoxFuture<'static, Result<Box<dyn Session>, TransportError>> {
/// #         Box::pin(async { Err::<Box<dyn Session>, _>(TransportError::Closed) })
/// #     }
/// # }
///
/// struct Printer;
///
/// impl Listener for Printer {
///     fn on_message(&mut self, message: Message) {
///         println!("{message}");
///     }
///
///     fn on_status(&mut self, status: Status) {
///         println!("{status}");
///     }
/// }
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::builder()
///     .servers(["100 push1.example.com:80", "50 push2.example.com:80"])?
///     .build()?;
///
/// let client = Client::new(config, WsTransport, Printer);
/// client.subscribe(["/stocks/IBM"])?;
/// client.connect()?;
/// client.publish(Message::new("/stocks/IBM", "120.5").with_closure("tick-1"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    shared: SharedConnectionState,
}

impl Client {
    /// Creates a client and spawns its connection and listener tasks. The
    /// client starts disconnected.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new<T, L>(config: ClientConfig, transport: T, listener: L) -> Self
    where
        T: Transport,
        L: Listener,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (pause_tx, pause_rx) = watch::channel(false);
        let shared = SharedConnectionState::new();

        let (dispatcher, _) = EventDispatcher::spawn(listener, pause_rx);
        let machine = ConnectionStateMachine::new(
            config,
            Arc::new(transport),
            commands_rx,
            dispatcher,
            pause_tx,
            shared.clone(),
        );
        tokio::spawn(machine.run());

        Self {
            commands: commands_tx,
            shared,
        }
    }

    /// Connects to a server picked from the pool. Ignored unless the client is
    /// disconnected or closed.
    pub fn connect(&self) -> Result<(), ClientError> {
        self.send(Command::Connect)
    }

    /// Closes the session and cancels any pending reconnect. Outstanding
    /// publishes with closure data resolve as `NOTIFY_PUBLISH_FAILED`.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.send(Command::Disconnect)
    }

    /// Subscribes to `subjects`, starting from their latest retained message.
    ///
    /// Subjects already subscribed are left as they are.
    pub fn subscribe<I, S>(&self, subjects: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe_with_history(subjects, 0)
    }

    /// Subscribes to `subjects`, first delivering up to `count` cached
    /// messages per subject as `HISTORICAL`.
    pub fn subscribe_with_history<I, S>(&self, subjects: I, count: u32) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let subjects: Vec<String> = subjects.into_iter().map(Into::into).collect();
        if subjects.is_empty() {
            return Ok(());
        }
        self.send(Command::Subscribe {
            subjects,
            history: count,
        })
    }

    pub fn unsubscribe<I, S>(&self, subjects: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let subjects: Vec<String> = subjects.into_iter().map(Into::into).collect();
        if subjects.is_empty() {
            return Ok(());
        }
        self.send(Command::Unsubscribe(subjects))
    }

    /// Publishes `message`.
    ///
    /// While disconnected the message is queued and sent on the next
    /// connection. A message with a reply subject subscribes that subject
    /// first.
    pub fn publish(&self, message: Message) -> Result<(), ClientError> {
        self.send(Command::Publish(message))
    }

    /// Replaces the server pool; takes effect on the next connection attempt.
    ///
    /// The list is validated before anything is queued.
    pub fn set_servers<I, S>(&self, servers: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pool = ServerPool::parse(servers)?;
        self.send(Command::SetServers(pool))
    }

    /// Replaces the entitlement token; an empty token clears it. Takes effect
    /// on the next connection.
    pub fn set_entitlement_token(&self, token: impl Into<String>) -> Result<(), ClientError> {
        let token = token.into();
        self.send(Command::SetEntitlementToken(
            (!token.is_empty()).then_some(token),
        ))
    }

    /// Suspends the session: the connection is closed and listener deliveries
    /// are held until [`resume`](Self::resume).
    pub fn pause(&self) -> Result<(), ClientError> {
        self.send(Command::Pause)
    }

    /// Resumes a paused session, reconnecting if it was connected or trying to
    /// connect when paused.
    pub fn resume(&self) -> Result<(), ClientError> {
        self.send(Command::Resume)
    }

    /// Returns the subscribed subjects.
    pub async fn subjects(&self) -> Result<Vec<String>, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Subjects(tx))?;
        rx.await.map_err(|_| ClientError::Terminated)
    }

    /// Returns the connection state as last published by the connection task.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    /// Consecutive failed connection attempts since the last success.
    pub fn failed_attempts(&self) -> u32 {
        self.shared.failed_attempts()
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::Terminated)
    }
}
