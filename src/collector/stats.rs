//! Window statistics.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from [`summarize`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// No values to summarize. Check `count == 0` before calling.
    #[error("cannot summarize an empty sequence")]
    EmptyInput,
}

/// Summary of the occupancy values collected in one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub count: usize,
    pub min: u32,
    pub max: u32,
    /// Arithmetic mean, unrounded.
    #[serde(rename = "avg", alias = "mean")]
    pub mean: f64,
    /// Element at index `count / 2` of the sorted values.
    ///
    /// For even counts this is the upper of the two middle values, not their
    /// average. Stored documents depend on this.
    pub median: u32,
}

/// Summarize a non-empty sequence of occupancy values.
pub fn summarize(values: &[u32]) -> Result<Statistics, StatsError> {
    if values.is_empty() {
        return Err(StatsError::EmptyInput);
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let count = sorted.len();
    let sum: u64 = sorted.iter().map(|&v| u64::from(v)).sum();

    Ok(Statistics {
        count,
        min: sorted[0],
        max: sorted[count - 1],
        mean: sum as f64 / count as f64,
        median: sorted[count / 2],
    })
}
