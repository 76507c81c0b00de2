//! The connection state machine.
//!
//! A single task owns the session, the subscription registry, the publish
//! tracker and the reconnect schedule. The [`Client`](crate::Client) handle
//! talks to it through a command mailbox; the transport reaches it through the
//! handshake future and the session's receive side. Everything the application
//! must see is handed to the [`EventDispatcher`], so a slow listener never
//! holds up this task.
//!
//! ```text
//!                connect()
//!  Disconnected ───────────► Connecting ──handshake ok──► Connected
//!       ▲                      │    ▲                        │
//!       │ pause()     handshake│    │ timer             session lost
//!       │             failed   ▼    │                        │
//!       └──────────────────  Reconnecting ◄──────────────────┘
//!
//!  any state ──disconnect()──► Closed ──connect()──► Connecting
//! ```

use crate::codec;
use crate::config::ClientConfig;
use crate::dispatcher::EventDispatcher;
use crate::error::TransportError;
use crate::log::Logger;
use crate::message::Message;
use crate::protocol::{ClientFrame, InboundMessage, ServerFrame};
use crate::publish::PublishTracker;
use crate::recovery::GapRecovery;
use crate::registry::SubscriptionRegistry;
use crate::status::Status;
use crate::transport::{ConnectTarget, Session, Transport, TransportKind};
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tidewire_reconnect::{
    ConnectionState, EventListeners, ReconnectEvent, ReconnectRateGuard, ReconnectScheduler,
    ServerPool, SharedConnectionState,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// A handshake taking at least this long marks the network as atypical.
const SLOW_HANDSHAKE: Duration = Duration::from_secs(30);

/// Requests from the [`Client`](crate::Client) handle.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    Subscribe { subjects: Vec<String>, history: u32 },
    Unsubscribe(Vec<String>),
    Publish(Message),
    SetServers(ServerPool),
    SetEntitlementToken(Option<String>),
    Subjects(oneshot::Sender<Vec<String>>),
    Pause,
    Resume,
}

struct Handshake {
    started: Instant,
    future: BoxFuture<'static, Result<Box<dyn Session>, TransportError>>,
}

pub(crate) struct ConnectionStateMachine {
    name: String,
    transport: Arc<dyn Transport>,
    commands: mpsc::UnboundedReceiver<Command>,
    dispatcher: EventDispatcher,
    pause_tx: watch::Sender<bool>,
    shared: SharedConnectionState,
    logger: Logger,
    events: EventListeners,

    pool: ServerPool,
    token: Option<String>,
    kind: TransportKind,
    encrypted: bool,
    scheduler: ReconnectScheduler,
    guard: ReconnectRateGuard,
    rng: StdRng,

    registry: SubscriptionRegistry,
    recovery: GapRecovery,
    publishes: PublishTracker,

    state: ConnectionState,
    paused: bool,
    resume_pending: bool,
    address: Option<String>,
    handshake: Option<Handshake>,
    session: Option<Box<dyn Session>>,
    reconnect_at: Option<Instant>,
    failed_attempts: u32,
}

impl ConnectionStateMachine {
    pub(crate) fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        commands: mpsc::UnboundedReceiver<Command>,
        dispatcher: EventDispatcher,
        pause_tx: watch::Sender<bool>,
        shared: SharedConnectionState,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            logger: Logger::new(config.name.clone(), config.log),
            name: config.name,
            transport,
            commands,
            dispatcher,
            pause_tx,
            shared,
            events: config.event_listeners,
            pool: config.servers,
            token: config.token,
            kind: config.transport,
            encrypted: config.encrypted,
            guard: ReconnectRateGuard::new(config.reconnect.rate_threshold()),
            scheduler: ReconnectScheduler::new(config.reconnect),
            rng,
            registry: SubscriptionRegistry::new(),
            recovery: GapRecovery::new(),
            publishes: PublishTracker::new(),
            state: ConnectionState::Disconnected,
            paused: false,
            resume_pending: false,
            address: None,
            handshake: None,
            session: None,
            reconnect_at: None,
            failed_attempts: 0,
        }
    }

    /// Runs until every [`Client`](crate::Client) handle is dropped.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                result = await_handshake(&mut self.handshake) => self.on_handshake(result).await,
                frame = await_frame(&mut self.session) => self.on_frame(frame).await,
                () = await_deadline(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.begin_attempt(true);
                }
            }
        }

        self.logger.debug(format_args!("all handles dropped, shutting down"));
        self.handshake = None;
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Disconnect => self.disconnect().await,
            Command::Subscribe { subjects, history } => self.subscribe(subjects, history).await,
            Command::Unsubscribe(subjects) => self.unsubscribe(subjects).await,
            Command::Publish(message) => self.publish(message).await,
            Command::SetServers(pool) => {
                self.logger.info(format_args!(
                    "server list replaced ({} entries)",
                    pool.entries().len()
                ));
                self.pool = pool;
            }
            Command::SetEntitlementToken(token) => {
                self.logger.debug(format_args!("entitlement token updated"));
                self.token = token;
            }
            Command::Subjects(reply) => {
                let _ = reply.send(self.registry.subjects());
            }
            Command::Pause => self.pause().await,
            Command::Resume => self.resume(),
        }
    }

    fn connect(&mut self) {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Closed => {
                if self.paused {
                    self.resume_pending = true;
                    return;
                }
                self.failed_attempts = 0;
                self.shared.set_failed_attempts(0);
                self.scheduler.reset();
                self.begin_attempt(false);
            }
            state => {
                self.logger
                    .debug(format_args!("connect ignored while {state}"));
            }
        }
    }

    async fn disconnect(&mut self) {
        self.handshake = None;
        self.reconnect_at = None;
        self.resume_pending = false;
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        self.recovery.reset();
        self.set_state(ConnectionState::Closed);
        self.fail_publishes();
        self.logger.info(format_args!("disconnected"));
    }

    async fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.shared.set_paused(true);
        self.pause_tx.send_replace(true);

        self.resume_pending = matches!(
            self.state,
            ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Reconnecting
        );
        self.handshake = None;
        self.reconnect_at = None;
        if let Some(mut session) = self.session.take() {
            session.close().await;
            self.publishes.requeue();
        }
        self.recovery.reset();
        if self.resume_pending {
            self.set_state(ConnectionState::Disconnected);
        }
        self.logger.info(format_args!("paused"));
    }

    fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.shared.set_paused(false);
        self.pause_tx.send_replace(false);
        self.logger.info(format_args!("resumed"));

        if std::mem::take(&mut self.resume_pending) {
            self.scheduler.reset();
            self.begin_attempt(false);
        }
    }

    /// Picks a server and starts a handshake. `reconnect` marks attempts made
    /// by the backoff timer, which count toward the rate guard and avoid the
    /// server used last.
    fn begin_attempt(&mut self, reconnect: bool) {
        if self.paused || self.session.is_some() || self.handshake.is_some() {
            return;
        }
        let now = Instant::now();

        if reconnect {
            if let Some(attempts) = self.guard.record_attempt(now) {
                self.logger.error(format_args!(
                    "{attempts} reconnect attempts within the rate window"
                ));
                #[cfg(feature = "metrics")]
                counter!("tidewire_reconnect_rate_exceeded_total", "client" => self.name.clone())
                    .increment(1);
                self.emit(ReconnectEvent::RateExceeded {
                    client_name: self.name.clone(),
                    timestamp: now,
                    attempts,
                });
                self.dispatcher
                    .status(Status::ReconnectRateExceeded { attempts });
            }
        }

        let excluding = if reconnect {
            self.address.as_deref()
        } else {
            None
        };
        let Some(address) = self
            .pool
            .select_next(excluding, &mut self.rng)
            .map(|entry| entry.address().to_string())
        else {
            self.logger
                .error(format_args!("no server available to connect to"));
            self.set_state(ConnectionState::Disconnected);
            return;
        };

        self.logger.info(format_args!("connecting to {address}"));
        self.emit(ReconnectEvent::ServerSelected {
            client_name: self.name.clone(),
            timestamp: now,
            address: address.clone(),
        });

        let target = ConnectTarget {
            address: address.clone(),
            encrypted: self.encrypted,
            kind: self.kind,
            token: self.token.clone(),
        };
        self.address = Some(address);
        self.handshake = Some(Handshake {
            started: now,
            future: self.transport.open(target),
        });
        self.set_state(ConnectionState::Connecting);
    }

    async fn on_handshake(&mut self, result: Result<Box<dyn Session>, TransportError>) {
        let started = self.handshake.take().map(|handshake| handshake.started);
        let address = self.address.clone().unwrap_or_default();

        match result {
            Ok(session) => self.on_connected(session, address).await,
            Err(err) => {
                let slow = started.is_some_and(|started| started.elapsed() >= SLOW_HANDSHAKE);
                self.on_connect_failed(address, err, slow);
            }
        }
    }

    async fn on_connected(&mut self, session: Box<dyn Session>, address: String) {
        #[cfg(feature = "metrics")]
        counter!("tidewire_connection_attempts_total", "client" => self.name.clone(), "outcome" => "success")
            .increment(1);

        self.session = Some(session);
        self.failed_attempts = 0;
        self.shared.set_failed_attempts(0);
        self.scheduler.reset();
        self.set_state(ConnectionState::Connected);
        self.logger.info(format_args!("connected to {address}"));
        self.dispatcher.status(Status::ServerUp { address });

        let requests = self.recovery.plan_all(&self.registry);
        if !requests.is_empty() && !self.send(ClientFrame::Subscribe(requests)).await {
            return;
        }
        self.flush_publishes().await;
    }

    fn on_connect_failed(&mut self, address: String, err: TransportError, slow: bool) {
        #[cfg(feature = "metrics")]
        counter!("tidewire_connection_attempts_total", "client" => self.name.clone(), "outcome" => "failure")
            .increment(1);

        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.shared.set_failed_attempts(self.failed_attempts);
        self.logger.error(format_args!(
            "connection to {address} failed (attempt {}): {err}",
            self.failed_attempts
        ));

        let threshold = self.scheduler.config().failed_attempts_before_down().max(1);
        if self.failed_attempts % threshold == 0 {
            self.dispatcher.status(Status::ServerDown { address });
            self.fail_publishes();
        }

        self.schedule_reconnect(err.is_atypical() || slow);
    }

    /// Drops the broken session and schedules a failover.
    fn on_session_lost(&mut self, err: TransportError) {
        self.session = None;
        self.recovery.reset();
        self.publishes.requeue();
        self.logger.error(format_args!(
            "connection to {} lost: {err}",
            self.address.as_deref().unwrap_or("<none>")
        ));
        self.schedule_reconnect(err.is_atypical());
    }

    fn schedule_reconnect(&mut self, atypical: bool) {
        let delay = self.scheduler.next_delay(atypical, &mut self.rng);
        let context = self.scheduler.context();
        let now = Instant::now();
        self.reconnect_at = Some(now + delay);
        self.set_state(ConnectionState::Reconnecting);

        self.logger.info(format_args!(
            "reconnecting in {delay:?} ({:?} phase, attempt {})",
            context.phase, context.attempt_count
        ));
        self.emit(ReconnectEvent::ReconnectScheduled {
            client_name: self.name.clone(),
            timestamp: now,
            phase: context.phase,
            attempt: context.attempt_count,
            delay,
        });
    }

    async fn on_frame(&mut self, frame: Result<ServerFrame, TransportError>) {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => return self.on_session_lost(err),
        };

        match frame {
            ServerFrame::SubscribeReply { subject, allowed } => {
                if !self.registry.contains(&subject) {
                    return;
                }
                self.logger.debug(format_args!(
                    "subscription to {subject} {}",
                    if allowed { "allowed" } else { "denied" }
                ));
                self.dispatcher.status(if allowed {
                    Status::SubscribeAllow { subject }
                } else {
                    Status::SubscribeDeny { subject }
                });
            }
            ServerFrame::Recovery {
                subject,
                epoch,
                continuous,
            } => match self
                .recovery
                .on_verdict(&mut self.registry, &subject, epoch, continuous)
            {
                Some(status) => {
                    self.logger.info(format_args!("{status}"));
                    self.dispatcher.status(status);
                }
                None => self
                    .logger
                    .debug(format_args!("unexpected recovery verdict for {subject}")),
            },
            ServerFrame::Message(message) => self.on_message(message),
            ServerFrame::PublishReply { closure, outcome } => {
                match self.publishes.resolve(&closure, outcome) {
                    Some(status) => self.report_publish(status),
                    None => self
                        .logger
                        .debug(format_args!("reply for unknown publish {closure}")),
                }
            }
        }
    }

    fn on_message(&mut self, mut inbound: InboundMessage) {
        let payload = if inbound.compressed {
            match codec::decompress(&inbound.payload) {
                Ok(payload) => payload,
                Err(err) => {
                    self.logger.error(format_args!(
                        "dropping undecodable message on {}: {err}",
                        inbound.subject
                    ));
                    return;
                }
            }
        } else {
            std::mem::take(&mut inbound.payload)
        };

        let Some(message_type) = self.recovery.accept(&mut self.registry, &inbound) else {
            self.logger.trace(format_args!(
                "dropped {} seq {} epoch {}",
                inbound.subject, inbound.seq, inbound.epoch
            ));
            return;
        };

        self.dispatcher.message(Message::received(
            inbound.subject,
            String::from_utf8_lossy(&payload).into_owned(),
            inbound.reply_subject,
            inbound.qos,
            inbound.retained,
            inbound.compressed,
            inbound.seq,
            inbound.epoch,
            message_type,
        ));
    }

    async fn subscribe(&mut self, subjects: Vec<String>, history: u32) {
        let added: Vec<String> = subjects
            .into_iter()
            .filter(|subject| self.registry.insert(subject.clone(), history))
            .collect();
        if added.is_empty() {
            return;
        }
        self.logger
            .debug(format_args!("subscribing to {}", added.join(", ")));

        if self.session.is_some() {
            let requests = self
                .recovery
                .plan_subjects(&self.registry, added.iter().map(String::as_str));
            self.send(ClientFrame::Subscribe(requests)).await;
        }
    }

    async fn unsubscribe(&mut self, subjects: Vec<String>) {
        let removed: Vec<String> = subjects
            .into_iter()
            .filter(|subject| self.registry.remove(subject))
            .collect();
        if removed.is_empty() {
            return;
        }
        for subject in &removed {
            self.recovery.forget(subject);
        }
        self.logger
            .debug(format_args!("unsubscribing from {}", removed.join(", ")));

        if self.session.is_some() {
            self.send(ClientFrame::Unsubscribe(removed)).await;
        }
    }

    async fn publish(&mut self, message: Message) {
        if let Some(reply_subject) = message.reply_subject() {
            if !self.registry.contains(reply_subject) {
                self.subscribe(vec![reply_subject.to_string()], 0).await;
            }
        }

        self.publishes.submit(message, Instant::now());
        if self.session.is_some() {
            self.flush_publishes().await;
        } else {
            self.logger.debug(format_args!(
                "publish queued until connected ({} pending)",
                self.publishes.len()
            ));
        }
    }

    /// Writes queued publishes in submission order. A publish leaves the
    /// queue only once the session accepted it, so a write failure leaves it
    /// and everything after it for the next session.
    async fn flush_publishes(&mut self) {
        while let Some(outbound) = self.publishes.next_queued() {
            if !self.send(ClientFrame::Publish(outbound)).await {
                return;
            }
            if let Some(waited) = self.publishes.mark_sent(Instant::now()) {
                self.logger
                    .trace(format_args!("publish sent after {waited:?} in queue"));
            }
        }
    }

    /// Sends on the live session. Returns `false` if the session broke, in
    /// which case a reconnect has been scheduled.
    async fn send(&mut self, frame: ClientFrame) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.send(frame).await {
            Ok(()) => true,
            Err(err) => {
                self.on_session_lost(err);
                false
            }
        }
    }

    fn fail_publishes(&mut self) {
        let (failed, dropped) = self.publishes.fail_all();
        if dropped > 0 {
            self.logger.info(format_args!(
                "dropped {dropped} queued publishes without closure data"
            ));
        }
        for status in failed {
            self.report_publish(status);
        }
    }

    fn report_publish(&self, status: Status) {
        #[cfg(feature = "metrics")]
        counter!("tidewire_publish_results_total", "client" => self.name.clone(), "outcome" => status.as_str())
            .increment(1);

        self.logger.debug(format_args!("{status}"));
        self.dispatcher.status(status);
    }

    fn emit(&self, event: ReconnectEvent) {
        let panicked = self.events.emit(&event);
        if panicked > 0 {
            self.logger.error(format_args!(
                "{panicked} event observer(s) panicked on {}",
                event.event_type()
            ));
        }
    }

    fn set_state(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        self.shared.set_state(to);

        #[cfg(feature = "metrics")]
        gauge!("tidewire_connected", "client" => self.name.clone()).set(
            if to == ConnectionState::Connected {
                1.0
            } else {
                0.0
            },
        );

        self.logger.debug(format_args!("state {from} -> {to}"));
        self.emit(ReconnectEvent::StateTransition {
            client_name: self.name.clone(),
            timestamp: Instant::now(),
            from,
            to,
        });
    }
}

async fn await_handshake(
    handshake: &mut Option<Handshake>,
) -> Result<Box<dyn Session>, TransportError> {
    match handshake {
        Some(handshake) => (&mut handshake.future).await,
        None => pending().await,
    }
}

async fn await_frame(
    session: &mut Option<Box<dyn Session>>,
) -> Result<ServerFrame, TransportError> {
    match session {
        Some(session) => session.recv().await,
        None => pending().await,
    }
}

async fn await_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}
