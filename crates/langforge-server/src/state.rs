//! Application state shared across HTTP handlers.
//!
//! [`AppState`] wraps the run store in `Arc<tokio::sync::Mutex<>>` for use
//! with axum handlers. Uses `tokio::sync::Mutex` (async-aware) instead of
//! `std::sync::Mutex` so handlers await the lock without blocking the
//! tokio runtime; the SQLite connection inside is `!Sync`, which rules out
//! an `RwLock` anyway.

use std::sync::Arc;

use langforge_storage::{RunStore, SqliteStore};

use crate::builder::{BuildService, HttpBuilder};
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::generator::{ChatGenerator, Generator};
use crate::pipeline::{PhasePolicies, Pipeline, SharedStore};
use crate::runner::PipelineRunner;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The shared run store (async Mutex, non-blocking await).
    pub store: SharedStore,
    /// The pipeline driving submitted runs.
    pub pipeline: Arc<Pipeline>,
    /// Background pipeline task registry.
    pub runner: Arc<PipelineRunner>,
}

impl AppState {
    /// Creates state backed by a SQLite database and the real generation
    /// and build backends from `config`.
    pub fn new(config: &ServerConfig) -> Result<Self, ApiError> {
        let store: SharedStore = Arc::new(tokio::sync::Mutex::new(Box::new(SqliteStore::new(
            &config.db_path,
        )?)));
        let generator = Arc::new(ChatGenerator::new(
            &config.model_url,
            &config.api_key,
            &config.model,
        ));
        let builder = Arc::new(HttpBuilder::new(&config.builder_url));
        Ok(Self::with_backends(
            store,
            generator,
            builder,
            PhasePolicies::default(),
        ))
    }

    /// Creates state over explicit backends (used by tests, which pair an
    /// in-memory database with stub generator and build services).
    pub fn with_backends(
        store: SharedStore,
        generator: Arc<dyn Generator>,
        builder: Arc<dyn BuildService>,
        policies: PhasePolicies,
    ) -> Self {
        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&store),
            generator,
            builder,
            policies,
        ));
        AppState {
            store,
            pipeline,
            runner: Arc::new(PipelineRunner::new()),
        }
    }

    /// Creates SQLite-in-memory state over explicit backends.
    pub fn in_memory(
        generator: Arc<dyn Generator>,
        builder: Arc<dyn BuildService>,
        policies: PhasePolicies,
    ) -> Result<Self, ApiError> {
        let store: Box<dyn RunStore> = Box::new(SqliteStore::in_memory()?);
        Ok(Self::with_backends(
            Arc::new(tokio::sync::Mutex::new(store)),
            generator,
            builder,
            policies,
        ))
    }

    /// Re-drives runs that were interrupted by a restart, returning how
    /// many were resumed. Completed phases come back from checkpoints.
    pub async fn resume_incomplete_runs(&self) -> Result<usize, ApiError> {
        let ids = { self.store.lock().await.incomplete_runs()? };
        let count = ids.len();
        for id in ids {
            tracing::info!(run_id = %id, "resuming interrupted run");
            self.runner.start(Arc::clone(&self.pipeline), id);
        }
        Ok(count)
    }
}
