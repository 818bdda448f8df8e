//! SQLite implementation of [`RunStore`].
//!
//! Persists runs in a SQLite database with WAL mode and automatic schema
//! migrations. Checkpoint payloads are stored as JSON TEXT columns via
//! serde_json; the package blob is stored raw alongside its blake3 hash.

use langforge_core::run::{PipelinePhase, RunPhase, RunRecord};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StorageError;
use crate::hash::package_hash;
use crate::now_secs;
use crate::traits::RunStore;

/// SQLite-backed implementation of [`RunStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    /// Loads the current phase of a run, erroring if the run is unknown.
    fn phase_of(&self, id: &str) -> Result<RunPhase, StorageError> {
        let phase: Option<String> = self
            .conn
            .query_row("SELECT phase FROM runs WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        let phase = phase.ok_or_else(|| StorageError::RunNotFound(id.to_string()))?;
        RunPhase::parse(&phase).ok_or_else(|| StorageError::IntegrityError {
            reason: format!("run {id} has unknown phase '{phase}'"),
        })
    }

    /// Whether the run may still be mutated.
    fn assert_mutable(&self, id: &str) -> Result<bool, StorageError> {
        Ok(!self.phase_of(id)?.is_terminal())
    }
}

impl RunStore for SqliteStore {
    fn create_run(&mut self, id: &str, description: &str) -> Result<(), StorageError> {
        let now = now_secs();
        self.conn.execute(
            "INSERT INTO runs (id, description, phase, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, description, RunPhase::Queued.as_str(), now],
        )?;
        Ok(())
    }

    fn get_run(&self, id: &str) -> Result<RunRecord, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, description, phase, generate_attempts, build_attempts,
                        diagnostic, package, package_hash, created_at, updated_at
                 FROM runs WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<Vec<u8>>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, i64>(8)?,
                        row.get::<_, i64>(9)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| StorageError::RunNotFound(id.to_string()))?;

        let phase = RunPhase::parse(&row.2).ok_or_else(|| StorageError::IntegrityError {
            reason: format!("run {id} has unknown phase '{}'", row.2),
        })?;

        Ok(RunRecord {
            id: row.0,
            description: row.1,
            phase,
            generate_attempts: row.3,
            build_attempts: row.4,
            diagnostic: row.5,
            package: row.6,
            package_hash: row.7,
            created_at: row.8,
            updated_at: row.9,
        })
    }

    fn set_phase(&mut self, id: &str, phase: RunPhase) -> Result<(), StorageError> {
        if !self.assert_mutable(id)? {
            return Ok(());
        }
        self.conn.execute(
            "UPDATE runs SET phase = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, phase.as_str(), now_secs()],
        )?;
        Ok(())
    }

    fn bump_generate_attempts(&mut self, id: &str) -> Result<u32, StorageError> {
        self.conn.execute(
            "UPDATE runs SET generate_attempts = generate_attempts + 1, updated_at = ?2
             WHERE id = ?1",
            params![id, now_secs()],
        )?;
        Ok(self.get_run(id)?.generate_attempts)
    }

    fn bump_build_attempts(&mut self, id: &str) -> Result<u32, StorageError> {
        self.conn.execute(
            "UPDATE runs SET build_attempts = build_attempts + 1, updated_at = ?2
             WHERE id = ?1",
            params![id, now_secs()],
        )?;
        Ok(self.get_run(id)?.build_attempts)
    }

    fn set_diagnostic(&mut self, id: &str, diagnostic: &str) -> Result<(), StorageError> {
        if !self.assert_mutable(id)? {
            return Ok(());
        }
        self.conn.execute(
            "UPDATE runs SET diagnostic = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, diagnostic, now_secs()],
        )?;
        Ok(())
    }

    fn complete_run(&mut self, id: &str, package: &[u8]) -> Result<(), StorageError> {
        if !self.assert_mutable(id)? {
            return Ok(());
        }
        self.conn.execute(
            "UPDATE runs SET phase = ?2, package = ?3, package_hash = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                id,
                RunPhase::Complete.as_str(),
                package,
                package_hash(package),
                now_secs()
            ],
        )?;
        Ok(())
    }

    fn fail_run(&mut self, id: &str, diagnostic: &str) -> Result<(), StorageError> {
        if !self.assert_mutable(id)? {
            return Ok(());
        }
        self.conn.execute(
            "UPDATE runs SET phase = ?2, diagnostic = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, RunPhase::Errored.as_str(), diagnostic, now_secs()],
        )?;
        Ok(())
    }

    fn terminate_run(&mut self, id: &str) -> Result<bool, StorageError> {
        if !self.assert_mutable(id)? {
            return Ok(false);
        }
        self.conn.execute(
            "UPDATE runs SET phase = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, RunPhase::Terminated.as_str(), now_secs()],
        )?;
        Ok(true)
    }

    fn get_package(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let run = self.get_run(id)?;
        let Some(package) = run.package else {
            return Ok(None);
        };
        let expected = run.package_hash.unwrap_or_default();
        let actual = package_hash(&package);
        if expected != actual {
            return Err(StorageError::IntegrityError {
                reason: format!("run {id} package hash mismatch: {expected} != {actual}"),
            });
        }
        Ok(Some(package))
    }

    fn incomplete_runs(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM runs
             WHERE phase NOT IN ('complete', 'errored', 'terminated')
             ORDER BY created_at ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn save_checkpoint(
        &mut self,
        id: &str,
        phase: PipelinePhase,
        payload: &serde_json::Value,
    ) -> Result<(), StorageError> {
        let text = serde_json::to_string(payload)?;
        self.conn.execute(
            "INSERT INTO checkpoints (run_id, phase, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(run_id, phase) DO UPDATE SET payload = ?3, created_at = ?4",
            params![id, phase.as_str(), text, now_secs()],
        )?;
        Ok(())
    }

    fn load_checkpoint(
        &self,
        id: &str,
        phase: PipelinePhase,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM checkpoints WHERE run_id = ?1 AND phase = ?2",
                params![id, phase.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn clear_checkpoint(&mut self, id: &str, phase: PipelinePhase) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM checkpoints WHERE run_id = ?1 AND phase = ?2",
            params![id, phase.as_str()],
        )?;
        Ok(())
    }
}
