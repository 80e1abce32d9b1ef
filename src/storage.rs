//! Storage Layer
//!
//! Persistence handoff for completed windows:
//! - [`RecordStore`]: key/value seam (`put`, `get`, `list` by prefix)
//! - [`FileStore`]: filesystem-backed store rooted at a directory
//! - [`WindowRecord`]: the JSON document written per window, keyed by start time

mod error;
mod store;
mod types;

pub use error::StorageError;
pub use store::{FileStore, RecordStore, latest_record, load_record, save_record};
pub use types::{DEFAULT_PREFIX, UpdateRecord, WindowRecord, WindowSpan, key_prefix, record_key};
