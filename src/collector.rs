//! Collector Layer
//!
//! Windowed collection over a push-style WebSocket endpoint. A collector holds
//! one connection open for a fixed window, decodes every pushed frame, and
//! hands back the readings for the tracked site.
//!
//! # Architecture
//!
//! - [`Transport`] / [`Connection`]: connect, subscribe, bounded receive, close
//! - [`WindowedCollector`]: drives one window per call, cancellable at every wait
//! - [`decode`]: frame to [`Decoded`] outcome for one target
//! - [`summarize`]: occupancy values to [`Statistics`]
//! - [`CollectorRegistry`]: runs windows on a schedule and persists their records
//!
//! # Example
//!
//! ```rust,no_run
//! use fillwatch::{ListenerConfig, WebSocketTransport, WindowedCollector};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ListenerConfig::new(
//!     "wss://badi-public.crowdmonitor.ch:9591/api",
//!     "SSD-7",
//!     Duration::from_secs(60),
//!     Duration::from_secs(1),
//! );
//! let collector = WindowedCollector::new(config, WebSocketTransport::new());
//! let result = collector.collect(&CancellationToken::new()).await?;
//! if let Some(stats) = result.statistics() {
//!     println!("{} readings, avg {:.1}", stats.count, stats.mean);
//! }
//! # Ok(())
//! # }
//! ```

mod decoder;
mod registry;
mod stats;
mod traits;
pub mod websocket;
mod window;

pub use decoder::{DecodeError, Decoded, decode};
pub use registry::{CollectorRegistry, DEFAULT_SHUTDOWN_TIMEOUT, JobInfo, run_cycle};
pub use stats::{Statistics, StatsError, summarize};
pub use traits::{
    CollectorError, Connection, Frame, MIN_INTERVAL, Received, Schedule, Transport, TransportError,
};
pub use websocket::WebSocketTransport;
pub use window::{
    CollectionResult, CollectionWindow, ListenerConfig, Reading, SUBSCRIBE_TOKEN, WindowedCollector,
};
