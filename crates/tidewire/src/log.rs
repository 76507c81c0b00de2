//! Bridge from the client's log records to `tracing` and to an application
//! [`LogListener`].

use std::fmt;
use std::sync::Arc;

/// Verbosity of a log record, ordered from least to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Error => "ERROR",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        })
    }
}

/// Receives the client's log records at or below the configured level.
///
/// Called from the client's background task; implementations should return
/// quickly.
pub trait LogListener: Send + Sync {
    fn on_log(&self, message: &str, level: LogLevel);
}

impl<F> LogListener for F
where
    F: Fn(&str, LogLevel) + Send + Sync,
{
    fn on_log(&self, message: &str, level: LogLevel) {
        self(message, level)
    }
}

/// Emits every record through `tracing` and forwards enabled ones to the
/// application's listener.
#[derive(Clone)]
pub(crate) struct Logger {
    client: String,
    sink: Option<(Arc<dyn LogListener>, LogLevel)>,
}

impl Logger {
    pub(crate) fn new(client: impl Into<String>, sink: Option<(Arc<dyn LogListener>, LogLevel)>) -> Self {
        Self {
            client: client.into(),
            sink,
        }
    }

    pub(crate) fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(client = %self.client, "{args}");
        self.forward(LogLevel::Error, args);
    }

    pub(crate) fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(client = %self.client, "{args}");
        self.forward(LogLevel::Info, args);
    }

    pub(crate) fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(client = %self.client, "{args}");
        self.forward(LogLevel::Debug, args);
    }

    pub(crate) fn trace(&self, args: fmt::Arguments<'_>) {
        tracing::trace!(client = %self.client, "{args}");
        self.forward(LogLevel::Trace, args);
    }

    fn forward(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if let Some((listener, threshold)) = &self.sink {
            if level <= *threshold {
                listener.on_log(&args.to_string(), level);
            }
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("client", &self.client)
            .field("level", &self.sink.as_ref().map(|(_, level)| *level))
            .finish()
    }
}
