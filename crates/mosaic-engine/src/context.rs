//! Per-job context passed explicitly through every component.

use std::sync::Mutex;

use tracing::warn;
use uuid::Uuid;

use crate::config::EngineConfig;

/// State owned by the caller for the lifetime of one extraction/mosaic job.
///
/// Holds the engine configuration and a buffer of job-scoped warnings.
/// Warnings are emitted as they happen and kept until [`JobContext::flush`]
/// is called at job end.
#[derive(Debug)]
pub struct JobContext {
    job_id: Uuid,
    config: EngineConfig,
    warnings: Mutex<Vec<String>>,
}

impl JobContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            config,
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Record a job-scoped warning.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(job_id = %self.job_id, "{}", message);
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(message);
        }
    }

    /// Snapshot of the warnings recorded so far.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    /// Drain all recorded warnings, leaving the buffer empty.
    pub fn flush(&self) -> Vec<String> {
        self.warnings
            .lock()
            .map(|mut w| std::mem::take(&mut *w))
            .unwrap_or_default()
    }
}

impl Default for JobContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
