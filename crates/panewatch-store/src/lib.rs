//! panewatch-store: typed storage contracts and the SQLite implementation.
//!
//! The core treats storage as a keyed-record abstraction: every operation
//! in [`Store`] is typed, idempotent where noted, and transactional. State
//! survives daemon restarts.

pub mod error;
pub mod ops;
pub mod redact;
pub mod sqlite;

pub use error::StoreError;
pub use ops::{PurgeStats, Store, SyncOutcome};
pub use redact::redact_payload;
pub use sqlite::SqliteStore;
