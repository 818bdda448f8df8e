//! Background pipeline task registry.
//!
//! Each submitted run gets one spawned task driving its pipeline. The
//! registry keys tasks by run id so a run is driven at most once per
//! process, including across the resume-on-startup path.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::pipeline::Pipeline;

/// Tracks in-flight pipeline tasks by run id.
pub struct PipelineRunner {
    tasks: DashMap<String, JoinHandle<()>>,
}

impl PipelineRunner {
    pub fn new() -> Self {
        PipelineRunner {
            tasks: DashMap::new(),
        }
    }

    /// Spawns the pipeline for `run_id` unless it is already being driven.
    pub fn start(self: &Arc<Self>, pipeline: Arc<Pipeline>, run_id: String) {
        if self.tasks.contains_key(&run_id) {
            return;
        }

        let registry = Arc::clone(self);
        let key = run_id.clone();
        let handle = tokio::spawn(async move {
            pipeline.drive(&run_id).await;
            registry.tasks.remove(&run_id);
        });

        self.tasks.insert(key, handle);
    }

    /// Whether a pipeline task is currently registered for `run_id`.
    pub fn is_running(&self, run_id: &str) -> bool {
        self.tasks.contains_key(run_id)
    }
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new()
    }
}
