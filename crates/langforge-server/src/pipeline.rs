//! The run pipeline: generate -> validate -> build -> finalize.
//!
//! Each phase is checkpointed: its result, once produced, is saved keyed
//! by (run id, phase), so re-driving a run after a crash loads completed
//! phases instead of redoing them. Phase retry policies are independent;
//! the build phase embeds the bounded self-repair loop that feeds compile
//! diagnostics back into regeneration.
//!
//! Error classification: [`PipelineError::MissingInput`] aborts a run
//! without consuming any retry budget; malformed artifacts, build
//! rejections, and transient transport faults are each retried against
//! their owning phase's budget, and exhaustion terminal-fails the run
//! carrying the last diagnostic.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;
use thiserror::Error;

use langforge_core::bundle::{parse_bundle, ArtifactBundle};
use langforge_core::run::{PipelinePhase, RunPhase};
use langforge_core::validate::{validate_bundle, ValidationReport};
use langforge_core::{CoreError, LanguagePackage};
use langforge_storage::{RunStore, StorageError};

use crate::builder::{BuildOutcome, BuildService};
use crate::generator::{initial_prompt, repair_prompt, Generator};

/// Shared, swappable run store handle.
///
/// rusqlite connections are `!Sync`, so the store sits behind an
/// async-aware mutex; handlers and the pipeline await the lock without
/// blocking the runtime.
pub type SharedStore = Arc<tokio::sync::Mutex<Box<dyn RunStore>>>;

/// Errors that can end (or delay) a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required run input absent. Aborts immediately, no retries.
    #[error("missing required input: {0}")]
    MissingInput(String),

    /// The validator rejected a bundle. Retried by regenerating.
    #[error("malformed artifact '{artifact}': {reason}")]
    MalformedArtifact { artifact: String, reason: String },

    /// The compile service rejected the artifacts. Retried through the
    /// self-repair loop up to the build budget.
    #[error("build failed: {diagnostic}")]
    BuildFailure { diagnostic: String },

    /// Transport-level fault talking to the model or the compile service.
    #[error("transient fault: {0}")]
    Transient(String),

    /// The built package is unusable (bad manifest, missing module).
    /// Fatal: rebuilding the same artifacts cannot fix a build service
    /// that emits incomplete packages.
    #[error("package error: {0}")]
    Package(#[from] CoreError),

    /// A checkpoint payload failed to decode.
    #[error("checkpoint decode error: {0}")]
    Checkpoint(#[from] serde_json::Error),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The run was terminated externally; stop driving it.
    #[error("run terminated")]
    Terminated,
}

impl PipelineError {
    /// Whether the owning phase may absorb this error against its budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::MalformedArtifact { .. }
                | PipelineError::BuildFailure { .. }
                | PipelineError::Transient(_)
        )
    }
}

/// Retry policy for one phase.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

/// Per-phase retry policies.
///
/// Validation runs once per bundle (its retry is the regeneration it
/// triggers) and finalization is effectively non-failing, so neither
/// carries a policy of its own.
#[derive(Debug, Clone, Copy)]
pub struct PhasePolicies {
    pub generate: RetryPolicy,
    pub build: RetryPolicy,
}

impl Default for PhasePolicies {
    fn default() -> Self {
        PhasePolicies {
            generate: RetryPolicy {
                max_attempts: 3,
                delay: Duration::from_secs(5),
            },
            build: RetryPolicy {
                max_attempts: 3,
                delay: Duration::from_secs(10),
            },
        }
    }
}

impl PhasePolicies {
    /// Policies with no inter-attempt delay (for tests).
    pub fn immediate() -> Self {
        PhasePolicies {
            generate: RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
            build: RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
        }
    }
}

/// Drives runs through the four pipeline phases.
pub struct Pipeline {
    store: SharedStore,
    generator: Arc<dyn Generator>,
    builder: Arc<dyn BuildService>,
    policies: PhasePolicies,
}

impl Pipeline {
    pub fn new(
        store: SharedStore,
        generator: Arc<dyn Generator>,
        builder: Arc<dyn BuildService>,
        policies: PhasePolicies,
    ) -> Self {
        Pipeline {
            store,
            generator,
            builder,
            policies,
        }
    }

    /// Drives a run to a terminal state, recording failures on the run row.
    ///
    /// Safe to call again after a crash or restart: completed phases are
    /// loaded from their checkpoints, and already-terminal runs are left
    /// untouched.
    pub async fn drive(&self, run_id: &str) {
        match self.drive_inner(run_id).await {
            Ok(()) => {}
            Err(PipelineError::Terminated) => {
                tracing::info!(run_id, "run terminated; pipeline stopped");
            }
            Err(err) => {
                tracing::warn!(run_id, error = %err, "run failed");
                let mut store = self.store.lock().await;
                if let Err(store_err) = store.fail_run(run_id, &err.to_string()) {
                    tracing::error!(run_id, error = %store_err, "failed to record run failure");
                }
            }
        }
    }

    async fn drive_inner(&self, run_id: &str) -> Result<(), PipelineError> {
        let run = { self.store.lock().await.get_run(run_id)? };
        if run.phase.is_terminal() {
            return Ok(());
        }
        if run.description.trim().is_empty() {
            return Err(PipelineError::MissingInput("prompt".to_string()));
        }

        let bundle = self.obtain_validated_bundle(run_id, &run.description).await?;
        let package = self.build_package(run_id, &run.description, bundle).await?;
        self.finalize(run_id, &package).await
    }

    // -------------------------------------------------------------------
    // Phases 1 + 2: generate and validate, with regeneration on failure
    // -------------------------------------------------------------------

    async fn obtain_validated_bundle(
        &self,
        run_id: &str,
        description: &str,
    ) -> Result<ArtifactBundle, PipelineError> {
        if let Some(payload) = self.load_checkpoint(run_id, PipelinePhase::Validate).await? {
            tracing::debug!(run_id, "validate checkpoint hit; skipping generation");
            return Ok(serde_json::from_value(payload)?);
        }

        let policy = self.policies.generate;
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.ensure_live(run_id).await?;
            match self
                .generate_and_validate(run_id, description, attempt == 1)
                .await
            {
                Ok(bundle) => return Ok(bundle),
                Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                    tracing::warn!(run_id, attempt, error = %err, "generation attempt failed, retrying");
                    {
                        let mut store = self.store.lock().await;
                        store.set_diagnostic(run_id, &err.to_string())?;
                        store.clear_checkpoint(run_id, PipelinePhase::Generate)?;
                    }
                    tokio::time::sleep(policy.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One generation attempt followed by its single validation attempt.
    ///
    /// The first attempt of a re-driven run reuses the generate checkpoint
    /// if one survived a crash between generation and validation.
    async fn generate_and_validate(
        &self,
        run_id: &str,
        description: &str,
        allow_resume: bool,
    ) -> Result<ArtifactBundle, PipelineError> {
        let resumed = if allow_resume {
            self.load_checkpoint(run_id, PipelinePhase::Generate).await?
        } else {
            None
        };

        let bundle = match resumed {
            Some(payload) => serde_json::from_value(payload)?,
            None => {
                self.set_phase(run_id, RunPhase::Generating).await?;
                {
                    self.store.lock().await.bump_generate_attempts(run_id)?;
                }
                let raw = self.generator.generate(&initial_prompt(description)).await?;
                let bundle = parse_bundle(&raw);
                self.save_checkpoint(
                    run_id,
                    PipelinePhase::Generate,
                    serde_json::to_value(&bundle)?,
                )
                .await?;
                bundle
            }
        };

        self.set_phase(run_id, RunPhase::Validating).await?;
        match validate_bundle(&bundle) {
            ValidationReport::Pass => {
                self.save_checkpoint(
                    run_id,
                    PipelinePhase::Validate,
                    serde_json::to_value(&bundle)?,
                )
                .await?;
                Ok(bundle)
            }
            ValidationReport::Fail { artifact, reason } => {
                Err(PipelineError::MalformedArtifact { artifact, reason })
            }
        }
    }

    // -------------------------------------------------------------------
    // Phase 3: build, embedding the self-repair loop
    // -------------------------------------------------------------------

    async fn build_package(
        &self,
        run_id: &str,
        description: &str,
        mut bundle: ArtifactBundle,
    ) -> Result<Vec<u8>, PipelineError> {
        if let Some(payload) = self.load_checkpoint(run_id, PipelinePhase::Build).await? {
            tracing::debug!(run_id, "build checkpoint hit; skipping compile");
            return decode_build_checkpoint(&payload);
        }

        let policy = self.policies.build;
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.ensure_live(run_id).await?;
            self.set_phase(run_id, RunPhase::Building).await?;
            {
                self.store.lock().await.bump_build_attempts(run_id)?;
            }

            match self.builder.build(&bundle).await {
                Ok(BuildOutcome::Package(bytes)) => {
                    // Reject incomplete packages before persisting anything.
                    LanguagePackage::decode(&bytes)?;
                    self.save_checkpoint(
                        run_id,
                        PipelinePhase::Build,
                        json!({ "package": BASE64.encode(&bytes) }),
                    )
                    .await?;
                    tracing::info!(run_id, attempt, "build succeeded");
                    return Ok(bytes);
                }
                Ok(BuildOutcome::Rejected { diagnostic }) => {
                    tracing::warn!(run_id, attempt, "build rejected by compile service");
                    {
                        self.store.lock().await.set_diagnostic(run_id, &diagnostic)?;
                    }
                    if attempt >= policy.max_attempts {
                        return Err(PipelineError::BuildFailure { diagnostic });
                    }
                    match self
                        .repair_bundle(run_id, description, &bundle, &diagnostic)
                        .await
                    {
                        Ok(repaired) => bundle = repaired,
                        Err(err) if err.is_retryable() => {
                            // Repair produced nothing usable; the next build
                            // attempt reuses the prior artifacts.
                            tracing::warn!(run_id, error = %err, "self-repair regeneration failed");
                        }
                        Err(err) => return Err(err),
                    }
                    tokio::time::sleep(policy.delay).await;
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(run_id, attempt, error = %err, "build attempt failed");
                    {
                        self.store.lock().await.set_diagnostic(run_id, &err.to_string())?;
                    }
                    if attempt >= policy.max_attempts {
                        return Err(PipelineError::BuildFailure {
                            diagnostic: err.to_string(),
                        });
                    }
                    tokio::time::sleep(policy.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Self-repair regeneration: the original description, the previous
    /// artifacts, and the compile diagnostic go back to the model; the new
    /// bundle is parsed and validated exactly like a first-phase bundle.
    async fn repair_bundle(
        &self,
        run_id: &str,
        description: &str,
        bundle: &ArtifactBundle,
        diagnostic: &str,
    ) -> Result<ArtifactBundle, PipelineError> {
        self.set_phase(run_id, RunPhase::Generating).await?;
        {
            self.store.lock().await.bump_generate_attempts(run_id)?;
        }
        let raw = self
            .generator
            .generate(&repair_prompt(description, bundle, diagnostic))
            .await?;
        let repaired = parse_bundle(&raw);

        self.set_phase(run_id, RunPhase::Validating).await?;
        match validate_bundle(&repaired) {
            ValidationReport::Pass => {
                self.save_checkpoint(
                    run_id,
                    PipelinePhase::Validate,
                    serde_json::to_value(&repaired)?,
                )
                .await?;
                Ok(repaired)
            }
            ValidationReport::Fail { artifact, reason } => {
                Err(PipelineError::MalformedArtifact { artifact, reason })
            }
        }
    }

    // -------------------------------------------------------------------
    // Phase 4: finalize
    // -------------------------------------------------------------------

    async fn finalize(&self, run_id: &str, package: &[u8]) -> Result<(), PipelineError> {
        self.ensure_live(run_id).await?;
        self.set_phase(run_id, RunPhase::Finalizing).await?;
        let mut store = self.store.lock().await;
        store.complete_run(run_id, package)?;
        store.save_checkpoint(run_id, PipelinePhase::Finalize, &json!({ "complete": true }))?;
        tracing::info!(run_id, "run complete");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Store helpers
    // -------------------------------------------------------------------

    /// Terminate requests are observed here, at phase boundaries.
    async fn ensure_live(&self, run_id: &str) -> Result<(), PipelineError> {
        let phase = { self.store.lock().await.get_run(run_id)?.phase };
        if phase == RunPhase::Terminated {
            Err(PipelineError::Terminated)
        } else {
            Ok(())
        }
    }

    async fn set_phase(&self, run_id: &str, phase: RunPhase) -> Result<(), PipelineError> {
        self.store.lock().await.set_phase(run_id, phase)?;
        Ok(())
    }

    async fn save_checkpoint(
        &self,
        run_id: &str,
        phase: PipelinePhase,
        payload: serde_json::Value,
    ) -> Result<(), PipelineError> {
        self.store
            .lock()
            .await
            .save_checkpoint(run_id, phase, &payload)?;
        Ok(())
    }

    async fn load_checkpoint(
        &self,
        run_id: &str,
        phase: PipelinePhase,
    ) -> Result<Option<serde_json::Value>, PipelineError> {
        Ok(self.store.lock().await.load_checkpoint(run_id, phase)?)
    }
}

/// Recovers package bytes from a build checkpoint payload.
fn decode_build_checkpoint(payload: &serde_json::Value) -> Result<Vec<u8>, PipelineError> {
    let encoded = payload
        .get("package")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            PipelineError::Storage(StorageError::IntegrityError {
                reason: "build checkpoint missing 'package' field".to_string(),
            })
        })?;
    BASE64.decode(encoded).map_err(|err| {
        PipelineError::Storage(StorageError::IntegrityError {
            reason: format!("build checkpoint is not valid base64: {err}"),
        })
    })
}
