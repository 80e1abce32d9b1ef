//! Occupancy frame decoder.
//!
//! Upstream frames are JSON arrays of site records:
//!
//! ```json
//! [{"uid": "SSD-7", "name": "Hallenbad", "currentfill": "45", "maxspace": 300}, ...]
//! ```
//!
//! Decoding never fails past this boundary. Every payload maps to exactly one
//! [`Decoded`] outcome.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use super::window::Reading;

/// Identifier field of a site record.
const UID_FIELD: &str = "uid";

/// Fill-level field of a site record.
const FILL_FIELD: &str = "currentfill";

/// Why a frame could not be turned into a reading.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON.
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Payload is valid JSON but not an array.
    #[error("expected a JSON array, got {0}")]
    NotAnArray(&'static str),

    /// An array element is not an object.
    #[error("element {index} is not a record")]
    NotARecord { index: usize },

    /// The matching record has no fill level.
    #[error("record '{uid}' has no 'currentfill' field")]
    MissingFill { uid: String },

    /// The matching record has a fill level that is not a non-negative number.
    #[error("record '{uid}' has invalid 'currentfill' value: {value}")]
    InvalidFill { uid: String, value: String },
}

/// Result of decoding one frame for one target.
#[derive(Debug)]
pub enum Decoded {
    /// The target was present with a usable fill level.
    Reading(Reading),
    /// The frame was well-formed but did not mention the target.
    NotFound,
    /// The frame could not be used.
    Malformed(DecodeError),
}

/// Decode a raw payload, looking for `target_uid`.
///
/// Only the first matching record is used. The reading is stamped with
/// `observed_at`, which the collector derives from the window clock.
pub fn decode(payload: &[u8], target_uid: &str, observed_at: DateTime<Utc>) -> Decoded {
    match find_fill(payload, target_uid) {
        Ok(Some(occupancy)) => Decoded::Reading(Reading {
            occupancy,
            observed_at,
        }),
        Ok(None) => Decoded::NotFound,
        Err(e) => Decoded::Malformed(e),
    }
}

fn find_fill(payload: &[u8], target_uid: &str) -> Result<Option<u32>, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;
    let records = match value {
        Value::Array(records) => records,
        other => return Err(DecodeError::NotAnArray(json_kind(&other))),
    };

    for (index, record) in records.iter().enumerate() {
        let Value::Object(fields) = record else {
            return Err(DecodeError::NotARecord { index });
        };
        if fields.get(UID_FIELD).and_then(Value::as_str) != Some(target_uid) {
            continue;
        }
        return match fields.get(FILL_FIELD) {
            None | Some(Value::Null) => Err(DecodeError::MissingFill {
                uid: target_uid.to_string(),
            }),
            Some(fill) => coerce_fill(fill)
                .map(Some)
                .ok_or_else(|| DecodeError::InvalidFill {
                    uid: target_uid.to_string(),
                    value: fill.to_string(),
                }),
        };
    }

    Ok(None)
}

/// Accept JSON numbers and numeric strings, truncating toward zero.
fn coerce_fill(fill: &Value) -> Option<u32> {
    let raw = match fill {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() || raw.trunc() < 0.0 || raw.trunc() > f64::from(u32::MAX) {
        return None;
    }
    Some(raw.trunc() as u32)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
