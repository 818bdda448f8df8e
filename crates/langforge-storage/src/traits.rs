//! The [`RunStore`] trait defining the persistence contract for runs.
//!
//! All backends (InMemoryStore, SqliteStore) implement this trait, ensuring
//! they are fully swappable without changing pipeline logic. The trait is
//! synchronous; async callers hold it behind an async-aware mutex.
//!
//! Terminal runs (complete / errored / terminated) are immutable: mutators
//! called against a terminal run are no-ops, except [`RunStore::terminate_run`]
//! which reports whether it actually transitioned the row.

use langforge_core::run::{PipelinePhase, RunPhase, RunRecord};

use crate::error::StorageError;

/// The persistence contract for runs and their phase checkpoints.
pub trait RunStore: Send {
    // -------------------------------------------------------------------
    // Run rows
    // -------------------------------------------------------------------

    /// Creates a new run in the `queued` phase.
    fn create_run(&mut self, id: &str, description: &str) -> Result<(), StorageError>;

    /// Loads a run row.
    fn get_run(&self, id: &str) -> Result<RunRecord, StorageError>;

    /// Moves a non-terminal run to `phase`.
    fn set_phase(&mut self, id: &str, phase: RunPhase) -> Result<(), StorageError>;

    /// Increments the generation attempt counter, returning the new value.
    fn bump_generate_attempts(&mut self, id: &str) -> Result<u32, StorageError>;

    /// Increments the build attempt counter, returning the new value.
    fn bump_build_attempts(&mut self, id: &str) -> Result<u32, StorageError>;

    /// Records the most recent failure diagnostic on a non-terminal run.
    fn set_diagnostic(&mut self, id: &str, diagnostic: &str) -> Result<(), StorageError>;

    /// Stores the built package (with its blake3 hash) and moves the run
    /// to `complete`.
    fn complete_run(&mut self, id: &str, package: &[u8]) -> Result<(), StorageError>;

    /// Records a terminal failure with its diagnostic.
    fn fail_run(&mut self, id: &str, diagnostic: &str) -> Result<(), StorageError>;

    /// Moves a non-terminal run to `terminated`.
    ///
    /// Returns `true` if the run transitioned, `false` if it was already
    /// terminal.
    fn terminate_run(&mut self, id: &str) -> Result<bool, StorageError>;

    /// Returns the stored package, verifying its content hash.
    fn get_package(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Lists runs that have not reached a terminal phase, oldest first.
    fn incomplete_runs(&self) -> Result<Vec<String>, StorageError>;

    // -------------------------------------------------------------------
    // Phase checkpoints
    // -------------------------------------------------------------------

    /// Saves (or replaces) the checkpoint payload for `(id, phase)`.
    fn save_checkpoint(
        &mut self,
        id: &str,
        phase: PipelinePhase,
        payload: &serde_json::Value,
    ) -> Result<(), StorageError>;

    /// Loads the checkpoint payload for `(id, phase)`, if one was saved.
    fn load_checkpoint(
        &self,
        id: &str,
        phase: PipelinePhase,
    ) -> Result<Option<serde_json::Value>, StorageError>;

    /// Removes the checkpoint for `(id, phase)`, if present.
    fn clear_checkpoint(&mut self, id: &str, phase: PipelinePhase) -> Result<(), StorageError>;
}
