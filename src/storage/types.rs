//! Stored document types.
//!
//! One [`WindowRecord`] is written per completed window that produced at
//! least one reading:
//!
//! ```json
//! {
//!   "window": {"start": "...", "end": "...", "duration_seconds": 300},
//!   "target_uid": "SSD-7",
//!   "updates": [{"occupancy": 45, "timestamp": "..."}],
//!   "statistics": {"count": 1, "min": 45, "max": 45, "avg": 45.0, "median": 45}
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::{CollectionResult, Reading, Statistics};

/// Default key prefix for window records.
pub const DEFAULT_PREFIX: &str = "occupancy_data";

/// Time span covered by a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Configured window length in whole seconds.
    pub duration_seconds: u64,
}

/// A single stored occupancy update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub occupancy: u32,
    pub timestamp: DateTime<Utc>,
}

impl From<Reading> for UpdateRecord {
    fn from(reading: Reading) -> Self {
        Self {
            occupancy: reading.occupancy,
            timestamp: reading.observed_at,
        }
    }
}

/// Persisted summary of one collection window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub window: WindowSpan,
    pub target_uid: String,
    pub updates: Vec<UpdateRecord>,
    pub statistics: Statistics,
}

impl WindowRecord {
    /// Build a record from a finished window.
    ///
    /// Returns `None` when the window collected nothing.
    pub fn from_result(result: &CollectionResult) -> Option<Self> {
        let statistics = result.statistics()?;
        Some(Self {
            window: WindowSpan {
                start: result.window.started_at,
                end: result.ended_at(),
                duration_seconds: result.window.duration.as_secs(),
            },
            target_uid: result.window.target_id.clone(),
            updates: result.readings.iter().copied().map(UpdateRecord::from).collect(),
            statistics,
        })
    }

    /// Storage key under `prefix`.
    pub fn key(&self, prefix: &str) -> String {
        record_key(prefix, self.window.start, &self.target_uid)
    }
}

/// Key for a window that started at `start`: `{prefix}/{YYYYmmdd_HHMMSS}_{uid}.json`.
///
/// Keys sort chronologically within a prefix.
pub fn record_key(prefix: &str, start: DateTime<Utc>, target_uid: &str) -> String {
    let stamp = start.format("%Y%m%d_%H%M%S");
    format!("{}{stamp}_{target_uid}.json", key_prefix(prefix))
}

/// Directory part that [`record_key`] places in front of every key under `prefix`.
///
/// `"occupancy_data"` and `"occupancy_data/"` both give `"occupancy_data/"`; an
/// empty prefix gives `""`. Use it to list what was saved under `prefix`.
pub fn key_prefix(prefix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectionWindow;
    use chrono::TimeZone;
    use std::time::Duration;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 17, 10, 5, 0).unwrap()
    }

    fn result(occupancies: &[u32]) -> CollectionResult {
        let readings = occupancies
            .iter()
            .enumerate()
            .map(|(i, &occupancy)| Reading {
                occupancy,
                observed_at: start() + chrono::TimeDelta::seconds(4 * i as i64),
            })
            .collect();
        CollectionResult {
            readings,
            window: CollectionWindow {
                target_id: "SSD-7".to_string(),
                started_at: start(),
                duration: Duration::from_secs(300),
                per_message_timeout: Duration::from_secs(1),
            },
            actual_elapsed: Duration::from_millis(300_400),
        }
    }

    #[test]
    fn test_record_key_format() {
        assert_eq!(
            record_key(DEFAULT_PREFIX, start(), "SSD-7"),
            "occupancy_data/20260217_100500_SSD-7.json"
        );
        assert_eq!(record_key("", start(), "SSD-7"), "20260217_100500_SSD-7.json");
        assert_eq!(
            record_key("archive/", start(), "SSD-7"),
            "archive/20260217_100500_SSD-7.json"
        );
    }

    #[test]
    fn test_key_prefix_matches_record_key() {
        assert_eq!(key_prefix("occupancy_data"), "occupancy_data/");
        assert_eq!(key_prefix("archive/"), "archive/");
        assert_eq!(key_prefix("archive//"), "archive/");
        assert_eq!(key_prefix(""), "");
        assert_eq!(key_prefix("/"), "");
        for prefix in ["archive", "archive/", ""] {
            assert!(record_key(prefix, start(), "SSD-7").starts_with(&key_prefix(prefix)));
        }
    }

    #[test]
    fn test_from_result() {
        let record = WindowRecord::from_result(&result(&[40, 42, 42])).unwrap();
        assert_eq!(record.target_uid, "SSD-7");
        assert_eq!(record.window.duration_seconds, 300);
        assert_eq!(record.window.end, start() + chrono::TimeDelta::milliseconds(300_400));
        assert_eq!(record.updates.len(), 3);
        assert_eq!(record.updates[1].timestamp, start() + chrono::TimeDelta::seconds(4));
        assert_eq!(record.statistics.count, 3);
        assert_eq!(record.statistics.median, 42);
    }

    #[test]
    fn test_from_empty_result() {
        assert!(WindowRecord::from_result(&result(&[])).is_none());
    }

    #[test]
    fn test_document_shape() {
        let record = WindowRecord::from_result(&result(&[45])).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["window"]["duration_seconds"], 300);
        assert_eq!(json["updates"][0]["occupancy"], 45);
        assert!(json["updates"][0]["timestamp"].is_string());
        assert_eq!(json["statistics"]["avg"], 45.0);
    }
}
