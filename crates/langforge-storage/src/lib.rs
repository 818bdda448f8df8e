//! Storage layer for langforge runs.
//!
//! Provides the [`RunStore`] trait defining the persistence contract, plus
//! [`InMemoryStore`] and [`SqliteStore`] as first-class backends. The store
//! holds two kinds of state:
//!
//! - **Run rows**: identity, phase, attempt counters, diagnostic, and the
//!   built package (with a blake3 content hash) once complete. Terminal
//!   rows are immutable.
//! - **Checkpoints**: per-(run, pipeline-phase) result payloads. Re-driving
//!   a run after a crash looks its completed phases up here instead of
//!   redoing them.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`hash`]: blake3 package content hashing
//! - [`traits`]: RunStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: migration setup for the SQLite backend
//! - [`sqlite`]: SqliteStore implementation

pub mod error;
pub mod hash;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use hash::package_hash;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::RunStore;

/// Current unix time in seconds, used for run row timestamps.
pub(crate) fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
