//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { project_root } => {
                info!(root = %project_root, "Starting generation run");
            }
            ProgressEvent::DiscoveryComplete {
                modules,
                skipped,
                scan_time,
            } => {
                info!(
                    modules,
                    skipped,
                    scan_time_ms = scan_time.as_millis(),
                    "Module discovery complete"
                );
            }
            ProgressEvent::StepStarted { step } => {
                debug!(step = %step, "Starting step");
            }
            ProgressEvent::StepComplete { step, duration } => {
                info!(
                    step = %step,
                    duration_ms = duration.as_millis(),
                    "Step complete"
                );
            }
            ProgressEvent::StepResumed { step } => {
                info!(step = %step, "Step resumed from checkpoint");
            }
            ProgressEvent::StepSkipped { step, reason } => {
                info!(step = %step, reason = %reason, "Step skipped");
            }
            ProgressEvent::ValidationComplete { warnings, errors } => {
                if *errors > 0 {
                    warn!(warnings, errors, "Validation complete with errors");
                } else if *warnings > 0 {
                    info!(warnings, "Validation complete with warnings");
                } else {
                    debug!("Validation complete");
                }
            }
            ProgressEvent::Completed {
                steps_run,
                total_time,
            } => {
                info!(
                    steps_run,
                    total_time_ms = total_time.as_millis(),
                    "Generation complete"
                );
            }
            ProgressEvent::Failed { error } => {
                warn!(error = %error, "Generation failed");
            }
        }
    }
}
