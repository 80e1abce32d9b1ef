//! Windowed WebSocket collector.
//!
//! Holds one connection open for a fixed window and harvests every pushed
//! frame that mentions the tracked site.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

use crate::collector::decoder::{Decoded, decode};
use crate::collector::stats::{Statistics, summarize};
use crate::collector::{CollectorError, Connection, Received, Transport, TransportError};

/// Command the upstream expects right after connect.
pub const SUBSCRIBE_TOKEN: &str = "all";

/// Default connect timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

/// Configuration for one windowed listener.
///
/// `window` and `message_timeout` have no defaults and must be supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub endpoint: String,
    /// Identifier of the tracked site.
    pub target_uid: String,
    /// Total window length.
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Upper bound for a single receive.
    #[serde(with = "humantime_serde")]
    pub message_timeout: Duration,
    /// Connect timeout (default: 5s).
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl ListenerConfig {
    /// Create a listener configuration. Only the connect timeout is defaulted.
    pub fn new(
        endpoint: impl Into<String>,
        target_uid: impl Into<String>,
        window: Duration,
        message_timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            target_uid: target_uid.into(),
            window,
            message_timeout,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the window length.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the per-message receive bound.
    pub fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(CollectorError::Config(format!(
                "endpoint must be a ws:// or wss:// URL: '{}'",
                self.endpoint
            )));
        }
        if self.target_uid.trim().is_empty() {
            return Err(CollectorError::Config(
                "target_uid cannot be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("window", self.window),
            ("message_timeout", self.message_timeout),
            ("connect_timeout", self.connect_timeout),
        ] {
            if value.is_zero() {
                return Err(CollectorError::Config(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }
}

/// One occupancy observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub occupancy: u32,
    pub observed_at: DateTime<Utc>,
}

/// Parameters of a single collection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionWindow {
    pub target_id: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub per_message_timeout: Duration,
}

/// Outcome of a completed window.
#[derive(Debug, Clone)]
pub struct CollectionResult {
    /// Readings in arrival order. Never reordered or deduplicated.
    pub readings: Vec<Reading>,
    pub window: CollectionWindow,
    pub actual_elapsed: Duration,
}

impl CollectionResult {
    /// Occupancy values in arrival order.
    pub fn occupancies(&self) -> Vec<u32> {
        self.readings.iter().map(|r| r.occupancy).collect()
    }

    /// Summary of the window, or `None` if nothing was collected.
    pub fn statistics(&self) -> Option<Statistics> {
        summarize(&self.occupancies()).ok()
    }

    /// Wall-clock end of the window.
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.window.started_at + to_delta(self.actual_elapsed)
    }
}

/// Drives one bounded collection cycle per call over a [`Transport`].
pub struct WindowedCollector<T> {
    config: ListenerConfig,
    transport: T,
}

impl<T: Transport> WindowedCollector<T> {
    /// Create a new collector.
    pub fn new(config: ListenerConfig, transport: T) -> Self {
        Self { config, transport }
    }

    /// Get the collector's configuration.
    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Run one window to completion.
    ///
    /// Returns a result (possibly with no readings) when the window closes.
    /// Connect, subscribe and mid-window transport failures are fatal and
    /// discard anything collected. Firing `cancel` stops the cycle at the
    /// current suspension point with [`CollectorError::Cancelled`].
    pub async fn collect(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CollectionResult, CollectorError> {
        let window = CollectionWindow {
            target_id: self.config.target_uid.clone(),
            started_at: Utc::now(),
            duration: self.config.window,
            per_message_timeout: self.config.message_timeout,
        };
        let clock = Instant::now();
        let endpoint = self.config.endpoint.as_str();

        let mut conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CollectorError::Cancelled),
            res = timeout(self.config.connect_timeout, self.transport.connect(endpoint)) => {
                res.unwrap_or(Err(TransportError::ConnectTimeout(self.config.connect_timeout)))
                    .map_err(|source| CollectorError::Connection {
                        endpoint: endpoint.to_string(),
                        source,
                    })?
            }
        };
        tracing::info!(endpoint = %endpoint, site = %window.target_id, "Connected");

        let harvested = self.harvest(conn.as_mut(), &window, clock, cancel).await;
        let actual_elapsed = clock.elapsed();
        conn.close().await;

        let readings = harvested?;
        if readings.is_empty() {
            tracing::warn!(site = %window.target_id, elapsed = ?actual_elapsed, "Window closed with no readings");
        } else {
            tracing::info!(site = %window.target_id, readings = readings.len(), elapsed = ?actual_elapsed, "Window complete");
        }

        Ok(CollectionResult {
            readings,
            window,
            actual_elapsed,
        })
    }

    async fn harvest(
        &self,
        conn: &mut dyn Connection,
        window: &CollectionWindow,
        clock: Instant,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>, CollectorError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CollectorError::Cancelled),
            sent = conn.send(SUBSCRIBE_TOKEN) => sent.map_err(CollectorError::Transport)?,
        }
        tracing::debug!(token = SUBSCRIBE_TOKEN, "Subscription sent");

        let mut readings = Vec::new();
        loop {
            let remaining = window.duration.saturating_sub(clock.elapsed());
            if remaining.is_zero() {
                break;
            }
            let wait = remaining.min(window.per_message_timeout);

            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(site = %window.target_id, collected = readings.len(), "Window cancelled");
                    return Err(CollectorError::Cancelled);
                }
                received = conn.receive(wait) => received.map_err(|e| {
                    tracing::error!(site = %window.target_id, error = %e, discarded = readings.len(), "Connection lost mid-window");
                    CollectorError::Transport(e)
                })?,
            };
            let Received::Frame(frame) = received else {
                continue;
            };

            let observed_at = window.started_at + to_delta(clock.elapsed());
            match decode(frame.as_bytes(), &window.target_id, observed_at) {
                Decoded::Reading(reading) => {
                    readings.push(reading);
                    tracing::debug!(occupancy = reading.occupancy, count = readings.len(), "Reading collected");
                }
                Decoded::NotFound => {
                    tracing::trace!(site = %window.target_id, "Target absent from frame");
                }
                Decoded::Malformed(e) => {
                    tracing::warn!(error = %e, "Skipping malformed frame");
                }
            }
        }

        Ok(readings)
    }
}

impl<T> std::fmt::Debug for WindowedCollector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedCollector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn to_delta(elapsed: Duration) -> TimeDelta {
    TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::MAX)
}
