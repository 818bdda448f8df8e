//! Run lifecycle model: phases, wire statuses, and the persisted record.
//!
//! A run moves monotonically forward through its phases, except for the
//! bounded build-to-generate self-repair cycle. Once a terminal phase is
//! reached the record never changes again.

use serde::{Deserialize, Serialize};

/// Current phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    /// Created, pipeline not yet started.
    Queued,
    /// Invoking the generative model.
    Generating,
    /// Checking the parsed bundle.
    Validating,
    /// Waiting on the external build service.
    Building,
    /// Persisting the built package.
    Finalizing,
    /// Terminal: package available.
    Complete,
    /// Terminal: failed, diagnostic recorded.
    Errored,
    /// Terminal: stopped by an explicit terminate request.
    Terminated,
}

impl RunPhase {
    /// Stable lowercase name, used for storage columns and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Queued => "queued",
            RunPhase::Generating => "generating",
            RunPhase::Validating => "validating",
            RunPhase::Building => "building",
            RunPhase::Finalizing => "finalizing",
            RunPhase::Complete => "complete",
            RunPhase::Errored => "errored",
            RunPhase::Terminated => "terminated",
        }
    }

    /// Parses a stored phase name.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "queued" => RunPhase::Queued,
            "generating" => RunPhase::Generating,
            "validating" => RunPhase::Validating,
            "building" => RunPhase::Building,
            "finalizing" => RunPhase::Finalizing,
            "complete" => RunPhase::Complete,
            "errored" => RunPhase::Errored,
            "terminated" => RunPhase::Terminated,
            _ => return None,
        })
    }

    /// Whether the run can never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunPhase::Complete | RunPhase::Errored | RunPhase::Terminated
        )
    }
}

/// Status as reported to polling clients.
///
/// Collapses the in-flight phases into `running`; terminal phases map
/// one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Complete,
    Errored,
    Terminated,
}

impl RunStatus {
    /// Stable lowercase name, used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Errored => "errored",
            RunStatus::Terminated => "terminated",
        }
    }

    /// Whether a polling client should stop at this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Complete | RunStatus::Errored | RunStatus::Terminated
        )
    }
}

impl From<RunPhase> for RunStatus {
    fn from(phase: RunPhase) -> Self {
        match phase {
            RunPhase::Queued => RunStatus::Queued,
            RunPhase::Generating
            | RunPhase::Validating
            | RunPhase::Building
            | RunPhase::Finalizing => RunStatus::Running,
            RunPhase::Complete => RunStatus::Complete,
            RunPhase::Errored => RunStatus::Errored,
            RunPhase::Terminated => RunStatus::Terminated,
        }
    }
}

/// A checkpointed unit of pipeline work.
///
/// Checkpoint rows are keyed by (run id, pipeline phase); re-driving a run
/// loads the stored result instead of redoing the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Generate,
    Validate,
    Build,
    Finalize,
}

impl PipelinePhase {
    /// Stable name used as the checkpoint key.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelinePhase::Generate => "generate",
            PipelinePhase::Validate => "validate",
            PipelinePhase::Build => "build",
            PipelinePhase::Finalize => "finalize",
        }
    }
}

/// The persisted state of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// Unique run identifier (UUID string).
    pub id: String,
    /// The submitted language description. Immutable for the run's life.
    pub description: String,
    /// Current phase.
    pub phase: RunPhase,
    /// Generation invocations so far (including repair regenerations).
    pub generate_attempts: u32,
    /// Build attempts so far (bounded by the self-repair budget).
    pub build_attempts: u32,
    /// Most recent failure diagnostic, if any.
    pub diagnostic: Option<String>,
    /// Built package bytes, present once complete.
    pub package: Option<Vec<u8>>,
    /// blake3 hex digest of `package`.
    pub package_hash: Option<String>,
    /// Creation time, unix seconds.
    pub created_at: i64,
    /// Last update time, unix seconds.
    pub updated_at: i64,
}

impl RunRecord {
    /// Status as reported to polling clients.
    pub fn status(&self) -> RunStatus {
        self.phase.into()
    }
}
