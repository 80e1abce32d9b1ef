//! Core collector traits and types.
//!
//! The collector talks to its upstream through two object-safe seams:
//! [`Transport`] establishes a session, [`Connection`] owns it for exactly one
//! collection window.

use std::time::Duration;

use thiserror::Error;

use crate::storage::StorageError;

/// Minimum allowed interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Errors raised by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket protocol or I/O failure.
    #[error("websocket error: {0}")]
    WebSocket(#[source] Box<tokio_tungstenite::tungstenite::Error>),

    /// Peer closed the connection or the stream ended.
    #[error("connection closed: {0}")]
    Closed(String),

    /// Connection could not be established in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The endpoint could not be reached. Fatal to the cycle.
    #[error("failed to connect to {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    /// The connection failed after it was established. Partial readings are discarded.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// The caller cancelled the cycle before the window closed.
    #[error("collection cancelled")]
    Cancelled,

    /// Failed to persist the window record.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// One inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// Outcome of a bounded receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A data frame arrived within the wait bound.
    Frame(Frame),
    /// Nothing arrived before the wait bound elapsed.
    Timeout,
}

/// Factory for connections to a push-style endpoint.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a new connection. Callers bound this with their own connect timeout.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Connection>, TransportError>;
}

/// A single live session, exclusively owned by one collection cycle.
#[async_trait::async_trait]
pub trait Connection: Send {
    /// Send a text command to the peer.
    async fn send(&mut self, token: &str) -> Result<(), TransportError>;

    /// Wait at most `wait` for the next data frame.
    ///
    /// Must return [`Received::Timeout`] once `wait` elapses and must be
    /// cancel-safe: dropping the future mid-wait loses no frame state.
    async fn receive(&mut self, wait: Duration) -> Result<Received, TransportError>;

    /// Close the session. Errors are logged, never returned.
    async fn close(&mut self);
}

/// Schedule for collector execution.
///
/// Supports both fixed interval and cron-based scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed interval between collections.
    ///
    /// Interval is clamped to a minimum of 1 second.
    Interval(Duration),

    /// Cron expression for scheduled execution.
    ///
    /// Uses standard cron syntax: `sec min hour day month weekday` (6-field).
    /// Example: `"0 */5 * * * *"` = every 5 minutes at second 0
    Cron(String),
}

impl Schedule {
    /// Create an interval schedule.
    ///
    /// Interval is clamped to a minimum of 1 second.
    pub fn interval(duration: Duration) -> Self {
        if duration < MIN_INTERVAL {
            tracing::warn!(min_interval = ?MIN_INTERVAL,
                "Interval duration is less than minimum allowed. Using minimum duration."
            );
            Self::Interval(MIN_INTERVAL)
        } else {
            Self::Interval(duration)
        }
    }

    /// Create a cron schedule with immediate validation.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the cron expression is invalid.
    pub fn cron(expr: impl AsRef<str>) -> Result<Self, CollectorError> {
        use std::str::FromStr;

        let expr = expr.as_ref();
        cron::Schedule::from_str(expr)
            .map_err(|e| CollectorError::Config(format!("invalid cron expression: {e}")))?;

        Ok(Self::Cron(expr.to_string()))
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interval(d) => write!(f, "every {:?}", d),
            Self::Cron(expr) => write!(f, "cron: {}", expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_interval_minimum() {
        let schedule = Schedule::interval(Duration::from_millis(100));
        assert_eq!(schedule, Schedule::Interval(MIN_INTERVAL));
    }

    #[test]
    fn test_schedule_interval_valid() {
        let schedule = Schedule::interval(Duration::from_secs(300));
        assert_eq!(schedule, Schedule::Interval(Duration::from_secs(300)));
        assert_eq!(schedule.to_string(), "every 300s");
    }

    #[test]
    fn test_schedule_cron_valid() {
        let schedule = Schedule::cron("0 */5 * * * *").unwrap();
        assert_eq!(schedule, Schedule::Cron("0 */5 * * * *".to_string()));
    }

    #[test]
    fn test_schedule_cron_invalid() {
        let err = Schedule::cron("not a cron").unwrap_err();
        assert!(err.to_string().contains("invalid cron"));
    }

    #[test]
    fn test_frame_bytes() {
        assert_eq!(Frame::Text("all".into()).as_bytes(), b"all");
        assert_eq!(Frame::Binary(vec![1, 2]).as_bytes(), &[1, 2]);
    }

    #[test]
    fn test_connection_error_names_endpoint() {
        let err = CollectorError::Connection {
            endpoint: "wss://example.invalid/api".into(),
            source: TransportError::ConnectTimeout(Duration::from_secs(5)),
        };
        let msg = err.to_string();
        assert!(msg.contains("wss://example.invalid/api"));
        assert!(msg.contains("5s"));
    }
}
