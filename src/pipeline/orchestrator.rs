use super::checkpoint::CheckpointStore;
use super::context::PipelineContext;
use super::phase_trait::WorkflowPhase;
use super::phases::default_phases;
use super::{PipelineError, PipelineSummary, Step, StepOutcome, StepReport};
use crate::progress::{LoggingHandler, ProgressEvent, ProgressHandler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct PipelineOrchestrator {
    phases: Vec<Box<dyn WorkflowPhase>>,
    progress_handler: Arc<dyn ProgressHandler>,
    cancel: Arc<AtomicBool>,
}

impl PipelineOrchestrator {
    pub fn new() -> Self {
        Self::with_phases(default_phases())
    }

    pub fn with_phases(phases: Vec<Box<dyn WorkflowPhase>>) -> Self {
        Self {
            phases,
            progress_handler: Arc::new(LoggingHandler),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_progress_handler(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress_handler = handler;
        self
    }

    /// Flag checked between steps; setting it stops the run before the next step starts.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn emit(&self, event: ProgressEvent) {
        self.progress_handler.on_progress(&event);
    }

    pub async fn execute(
        &self,
        context: &mut PipelineContext,
    ) -> Result<PipelineSummary, PipelineError> {
        let result = self.run(context).await;
        if let Err(err) = &result {
            self.emit(ProgressEvent::Failed {
                error: err.to_string(),
            });
        }
        result
    }

    async fn run(&self, context: &mut PipelineContext) -> Result<PipelineSummary, PipelineError> {
        context.config.validate()?;

        let start = Instant::now();
        let output_dir = context.output_dir();
        info!(
            root = %context.config.project_root.display(),
            output = %output_dir.display(),
            dry_run = context.options.dry_run,
            resume = context.options.resume,
            "Starting pipeline orchestration"
        );
        self.emit(ProgressEvent::Started {
            project_root: context.config.project_root.display().to_string(),
        });

        let store = CheckpointStore::new(&output_dir);
        let mut summary = PipelineSummary {
            project_root: context.config.project_root.clone(),
            output_dir: output_dir.clone(),
            dry_run: context.options.dry_run,
            ..PipelineSummary::default()
        };
        // resume only holds until the first step without a usable checkpoint
        let mut resuming = context.options.resume;
        let mut steps_run = 0;

        for phase in &self.phases {
            let step = phase.step();
            if self.cancel.load(Ordering::SeqCst) {
                warn!(step = %step, "Cancellation requested");
                return Err(PipelineError::Cancelled { step });
            }

            if let Some(reason) = phase.skip_reason(context) {
                self.emit(ProgressEvent::StepSkipped {
                    step: step.to_string(),
                    reason: reason.clone(),
                });
                summary.steps.push(StepReport {
                    step,
                    outcome: StepOutcome::Skipped(reason),
                    duration_ms: 0,
                });
                continue;
            }

            let step_start = Instant::now();

            if resuming && phase.checkpointed() {
                if let Some(payload) = store.load(step, &context.inputs_digest) {
                    match phase.restore(context, payload) {
                        Ok(()) => {
                            phase.verify(context)?;
                            summary.artifacts.extend(phase.write_artifacts(context)?);
                            self.emit(ProgressEvent::StepResumed {
                                step: step.to_string(),
                            });
                            summary.steps.push(StepReport {
                                step,
                                outcome: StepOutcome::Resumed,
                                duration_ms: step_start.elapsed().as_millis() as u64,
                            });
                            self.after_step(step, context);
                            continue;
                        }
                        Err(err) => {
                            warn!(step = %step, error = %err, "Checkpoint could not be restored");
                        }
                    }
                }
                debug!(step = %step, "Resuming ends, running from here");
                resuming = false;
            }

            self.emit(ProgressEvent::StepStarted {
                step: step.to_string(),
            });
            let payload = phase.execute(context).await?;
            phase.verify(context)?;
            if phase.checkpointed() {
                store.save(step, &context.inputs_digest, payload)?;
            }
            summary.artifacts.extend(phase.write_artifacts(context)?);

            let duration = step_start.elapsed();
            self.emit(ProgressEvent::StepComplete {
                step: step.to_string(),
                duration,
            });
            summary.steps.push(StepReport {
                step,
                outcome: StepOutcome::Ran,
                duration_ms: duration.as_millis() as u64,
            });
            steps_run += 1;
            self.after_step(step, context);
        }

        fill_summary(&mut summary, context);
        info!(
            steps_run,
            modules = summary.modules_loaded,
            skipped = summary.files_skipped,
            warnings = summary.warnings.len(),
            "Pipeline complete"
        );
        self.emit(ProgressEvent::Completed {
            steps_run,
            total_time: start.elapsed(),
        });

        Ok(summary)
    }

    fn after_step(&self, step: Step, context: &PipelineContext) {
        match step {
            Step::Discover => {
                if let Some(discovery) = &context.discovery {
                    self.emit(ProgressEvent::DiscoveryComplete {
                        modules: discovery.modules.len(),
                        skipped: discovery.skipped.len(),
                        scan_time: std::time::Duration::from_millis(discovery.scan_time_ms),
                    });
                }
            }
            Step::Validate => {
                if let Some(result) = &context.validation {
                    self.emit(ProgressEvent::ValidationComplete {
                        warnings: result.warnings.len(),
                        errors: result.errors.len(),
                    });
                }
            }
            _ => {}
        }
    }
}

impl Default for PipelineOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn fill_summary(summary: &mut PipelineSummary, context: &PipelineContext) {
    if let Some(discovery) = &context.discovery {
        summary.modules_loaded = discovery.modules.len();
        summary.files_skipped = discovery.skipped.len();
        summary.warnings.extend(discovery.warnings.iter().cloned());
        summary.warnings.extend(
            discovery
                .skipped
                .iter()
                .map(|s| format!("Skipped {}: {}", s.path.display(), s.reason)),
        );
    }
    if let Some(validation) = &context.validation {
        summary.warnings.extend(validation.warnings.iter().cloned());
    }
    if let Some(report) = &context.credentials {
        summary.warnings.extend(report.warnings.iter().cloned());
    }
    if let Some(output) = &context.manifest {
        summary.tools = output
            .manifest
            .tool_names()
            .into_iter()
            .map(String::from)
            .collect();
        summary.connectors = output
            .manifest
            .connector_names()
            .into_iter()
            .map(String::from)
            .collect();
        summary.warnings.extend(output.conflicts.iter().map(|c| {
            format!(
                "Dependency {} resolved to {}: {}",
                c.package, c.chosen, c.reason
            )
        }));
    }
    summary.strategy = context.build_plan.as_ref().map(|plan| plan.strategy);
    summary.image = context
        .options
        .image
        .as_ref()
        .filter(|_| context.image_id.is_some())
        .map(|request| request.reference());
}
