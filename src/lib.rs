//! Fillwatch - windowed occupancy collector
//!
//! Listens to a push-style WebSocket telemetry endpoint for a fixed window,
//! collects the fill level of one tracked site, and stores a summarized record
//! per window.
//!
//! # Architecture
//!
//! - **Collector**: windowed WebSocket listener, frame decoder, statistics, scheduler
//! - **Storage**: record documents keyed by window start time
//! - **Config**: YAML configuration with environment expansion

pub mod collector;
pub mod config;
pub mod storage;

pub use collector::{
    CollectionResult, CollectionWindow, CollectorError, CollectorRegistry, Connection, DecodeError,
    Decoded, Frame, ListenerConfig, Reading, Received, Schedule, Statistics, StatsError, Transport,
    TransportError, WebSocketTransport, WindowedCollector, decode, run_cycle, summarize,
};
pub use config::{AppConfig, ConfigError};
pub use storage::{FileStore, RecordStore, StorageError, WindowRecord};
