//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while a generation run advances through its steps
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started for a project root
    Started { project_root: String },

    /// Module discovery finished
    DiscoveryComplete {
        modules: usize,
        skipped: usize,
        scan_time: Duration,
    },

    /// A step began executing
    StepStarted { step: String },

    /// A step finished and its checkpoint was written
    StepComplete { step: String, duration: Duration },

    /// A step was satisfied from a valid checkpoint
    StepResumed { step: String },

    /// A step was not executed at all
    StepSkipped { step: String, reason: String },

    /// Validation completed
    ValidationComplete { warnings: usize, errors: usize },

    /// Run finished successfully
    Completed { steps_run: usize, total_time: Duration },

    /// Run stopped with an error
    Failed { error: String },
}

/// Trait for handling progress events during a run
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
