use crate::log::{LogLevel, LogListener};
use crate::transport::TransportKind;
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
use std::fmt;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;
use tidewire_core::ConfigError;
use tidewire_reconnect::{
    EventListeners, ReconnectConfig, ReconnectConfigBuilder, ReconnectEvent, ReconnectPolicy,
    ServerPool,
};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Configuration for a [`Client`](crate::Client).
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) name: String,
    pub(crate) servers: ServerPool,
    pub(crate) token: Option<String>,
    pub(crate) transport: TransportKind,
    pub(crate) encrypted: bool,
    pub(crate) reconnect: ReconnectConfig,
    pub(crate) seed: Option<u64>,
    pub(crate) log: Option<(Arc<dyn LogListener>, LogLevel)>,
    pub(crate) event_listeners: EventListeners,
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "tidewire_connection_attempts_total",
                    "Total number of connection attempts, by outcome"
                );
                describe_counter!(
                    "tidewire_reconnect_rate_exceeded_total",
                    "Times the reconnect rate exceeded its threshold"
                );
                describe_counter!(
                    "tidewire_publish_results_total",
                    "Resolved publishes, by outcome"
                );
                describe_gauge!(
                    "tidewire_connected",
                    "Whether the client currently holds a live session (1) or not (0)"
                );
            });
        }
        ClientConfigBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn servers(&self) -> &ServerPool {
        &self.servers
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn reconnect(&self) -> &ReconnectConfig {
        &self.reconnect
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("name", &self.name)
            .field("servers", &self.servers)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("transport", &self.transport)
            .field("encrypted", &self.encrypted)
            .field("reconnect", &self.reconnect)
            .field("seed", &self.seed)
            .field("log_level", &self.log.as_ref().map(|(_, level)| *level))
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

/// Builder for [`ClientConfig`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tidewire::{ClientConfig, TransportKind};
///
/// let config = ClientConfig::builder()
///     .name("quotes")
///     .servers(["100 push1.example.com:80", "50 push2.example.com:80"])?
///     .transport(TransportKind::WebSocket)
///     .failed_attempts_before_down(3)?
///     .reconnect_time_interval(Duration::from_secs(30))?
///     .build()?;
///
/// assert_eq!(config.servers().entries().len(), 2);
/// assert_eq!(config.reconnect().failed_attempts_before_down(), 3);
/// # Ok::<(), tidewire::ConfigError>(())
/// ```
pub struct ClientConfigBuilder {
    name: String,
    servers: Option<ServerPool>,
    token: Option<String>,
    transport: TransportKind,
    encrypted: bool,
    reconnect: ReconnectConfigBuilder,
    seed: Option<u64>,
    log: Option<(Arc<dyn LogListener>, LogLevel)>,
    event_listeners: EventListeners,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            servers: None,
            token: None,
            transport: TransportKind::default(),
            encrypted: false,
            reconnect: ReconnectConfig::builder(),
            seed: None,
            log: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Names the client in logs and events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the cluster members, each as `"[weight ]host:port"`.
    ///
    /// Weights range over `0..=100` and default to 100.
    pub fn servers<I, S>(mut self, servers: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.servers = Some(ServerPool::parse(servers)?);
        Ok(self)
    }

    /// Sets the entitlement token presented on every connection.
    pub fn entitlement_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the transport by its canonical name (`HTTP` or `WEBSOCKET`).
    pub fn transport_name(mut self, name: &str) -> Result<Self, ConfigError> {
        self.transport = name.parse()?;
        Ok(self)
    }

    /// Enables TLS on the transport. Disabled by default.
    pub fn encryption(mut self, enabled: bool) -> Self {
        self.encrypted = enabled;
        self
    }

    /// Number of consecutive failed connection attempts that produce a
    /// `NOTIFY_SERVER_DOWN`. Default 1.
    pub fn failed_attempts_before_down(mut self, attempts: u32) -> Result<Self, ConfigError> {
        self.reconnect = self.reconnect.failed_attempts_before_down(attempts)?;
        Ok(self)
    }

    /// Reconnect attempts allowed per 3-minute window before
    /// `NOTIFY_RECONNECT_RATE_EXCEEDED`. Default 15.
    pub fn reconnect_rate_threshold(mut self, threshold: usize) -> Result<Self, ConfigError> {
        self.reconnect = self.reconnect.reconnect_rate_threshold(threshold)?;
        Ok(self)
    }

    pub fn quick_reconnect_initial_delay(mut self, delay: Duration) -> Self {
        self.reconnect = self.reconnect.quick_reconnect_initial_delay(delay);
        self
    }

    pub fn quick_reconnect_max_retries(mut self, retries: u32) -> Self {
        self.reconnect = self.reconnect.quick_reconnect_max_retries(retries);
        self
    }

    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = self.reconnect.policy(policy);
        self
    }

    /// Sets the post-quick policy by its canonical name.
    pub fn reconnect_policy_name(mut self, name: &str) -> Result<Self, ConfigError> {
        self.reconnect = self.reconnect.policy_name(name)?;
        Ok(self)
    }

    pub fn reconnect_time_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        self.reconnect = self.reconnect.reconnect_time_interval(interval)?;
        Ok(self)
    }

    pub fn reconnect_max_delay(mut self, max_delay: Duration) -> Result<Self, ConfigError> {
        self.reconnect = self.reconnect.reconnect_max_delay(max_delay)?;
        Ok(self)
    }

    /// Seeds the client's random source, making server selection and jitter
    /// reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Forwards log records up to `level` to `listener`.
    pub fn log_listener<L>(mut self, listener: L, level: LogLevel) -> Self
    where
        L: LogListener + 'static,
    {
        self.log = Some((Arc::new(listener), level));
        self
    }

    /// Registers a callback for connection-engine diagnostics.
    ///
    /// Callbacks run on the connection task and must not block.
    ///
    /// # Examples
    ///
    /// ```
    /// use tidewire::ClientConfig;
    ///
    /// let config = ClientConfig::builder()
    ///     .servers(["push.example.com:80"])?
    ///     .on_event(|event| println!("{}", event.event_type()))
    ///     .build()?;
    /// # Ok::<(), tidewire::ConfigError>(())
    /// ```
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ReconnectEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(f);
        self
    }

    /// Builds the configuration.
    ///
    /// Fails with [`ConfigError::EmptyServerList`] if no servers were set.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let servers = self.servers.ok_or(ConfigError::EmptyServerList)?;
        Ok(ClientConfig {
            name: self.name,
            servers,
            token: self.token,
            transport: self.transport,
            encrypted: self.encrypted,
            reconnect: self.reconnect.build(),
            seed: self.seed,
            log: self.log,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
