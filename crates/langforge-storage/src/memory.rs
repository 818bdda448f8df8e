//! In-memory implementation of [`RunStore`].
//!
//! Mirrors the SQLite backend's semantics (terminal immutability, hash
//! verification, checkpoint replacement) without touching disk. Used by
//! unit tests and anywhere persistence across restarts is not needed.

use std::collections::HashMap;

use langforge_core::run::{PipelinePhase, RunPhase, RunRecord};

use crate::error::StorageError;
use crate::hash::package_hash;
use crate::now_secs;
use crate::traits::RunStore;

/// HashMap-backed implementation of [`RunStore`].
#[derive(Default)]
pub struct InMemoryStore {
    runs: HashMap<String, RunRecord>,
    checkpoints: HashMap<(String, &'static str), serde_json::Value>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn run_mut(&mut self, id: &str) -> Result<&mut RunRecord, StorageError> {
        self.runs
            .get_mut(id)
            .ok_or_else(|| StorageError::RunNotFound(id.to_string()))
    }

    fn run(&self, id: &str) -> Result<&RunRecord, StorageError> {
        self.runs
            .get(id)
            .ok_or_else(|| StorageError::RunNotFound(id.to_string()))
    }
}

impl RunStore for InMemoryStore {
    fn create_run(&mut self, id: &str, description: &str) -> Result<(), StorageError> {
        let now = now_secs();
        self.runs.insert(
            id.to_string(),
            RunRecord {
                id: id.to_string(),
                description: description.to_string(),
                phase: RunPhase::Queued,
                generate_attempts: 0,
                build_attempts: 0,
                diagnostic: None,
                package: None,
                package_hash: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    fn get_run(&self, id: &str) -> Result<RunRecord, StorageError> {
        self.run(id).cloned()
    }

    fn set_phase(&mut self, id: &str, phase: RunPhase) -> Result<(), StorageError> {
        let run = self.run_mut(id)?;
        if !run.phase.is_terminal() {
            run.phase = phase;
            run.updated_at = now_secs();
        }
        Ok(())
    }

    fn bump_generate_attempts(&mut self, id: &str) -> Result<u32, StorageError> {
        let run = self.run_mut(id)?;
        run.generate_attempts += 1;
        run.updated_at = now_secs();
        Ok(run.generate_attempts)
    }

    fn bump_build_attempts(&mut self, id: &str) -> Result<u32, StorageError> {
        let run = self.run_mut(id)?;
        run.build_attempts += 1;
        run.updated_at = now_secs();
        Ok(run.build_attempts)
    }

    fn set_diagnostic(&mut self, id: &str, diagnostic: &str) -> Result<(), StorageError> {
        let run = self.run_mut(id)?;
        if !run.phase.is_terminal() {
            run.diagnostic = Some(diagnostic.to_string());
            run.updated_at = now_secs();
        }
        Ok(())
    }

    fn complete_run(&mut self, id: &str, package: &[u8]) -> Result<(), StorageError> {
        let run = self.run_mut(id)?;
        if !run.phase.is_terminal() {
            run.phase = RunPhase::Complete;
            run.package = Some(package.to_vec());
            run.package_hash = Some(package_hash(package));
            run.updated_at = now_secs();
        }
        Ok(())
    }

    fn fail_run(&mut self, id: &str, diagnostic: &str) -> Result<(), StorageError> {
        let run = self.run_mut(id)?;
        if !run.phase.is_terminal() {
            run.phase = RunPhase::Errored;
            run.diagnostic = Some(diagnostic.to_string());
            run.updated_at = now_secs();
        }
        Ok(())
    }

    fn terminate_run(&mut self, id: &str) -> Result<bool, StorageError> {
        let run = self.run_mut(id)?;
        if run.phase.is_terminal() {
            return Ok(false);
        }
        run.phase = RunPhase::Terminated;
        run.updated_at = now_secs();
        Ok(true)
    }

    fn get_package(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let run = self.run(id)?;
        let Some(package) = &run.package else {
            return Ok(None);
        };
        let expected = run.package_hash.clone().unwrap_or_default();
        let actual = package_hash(package);
        if expected != actual {
            return Err(StorageError::IntegrityError {
                reason: format!("run {id} package hash mismatch: {expected} != {actual}"),
            });
        }
        Ok(Some(package.clone()))
    }

    fn incomplete_runs(&self) -> Result<Vec<String>, StorageError> {
        let mut pending: Vec<&RunRecord> = self
            .runs
            .values()
            .filter(|run| !run.phase.is_terminal())
            .collect();
        pending.sort_by_key(|run| run.created_at);
        Ok(pending.iter().map(|run| run.id.clone()).collect())
    }

    fn save_checkpoint(
        &mut self,
        id: &str,
        phase: PipelinePhase,
        payload: &serde_json::Value,
    ) -> Result<(), StorageError> {
        self.checkpoints
            .insert((id.to_string(), phase.as_str()), payload.clone());
        Ok(())
    }

    fn load_checkpoint(
        &self,
        id: &str,
        phase: PipelinePhase,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self
            .checkpoints
            .get(&(id.to_string(), phase.as_str()))
            .cloned())
    }

    fn clear_checkpoint(&mut self, id: &str, phase: PipelinePhase) -> Result<(), StorageError> {
        self.checkpoints.remove(&(id.to_string(), phase.as_str()));
        Ok(())
    }
}
