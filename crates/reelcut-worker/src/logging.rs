//! Structured job logging.
//!
//! Every line is emitted inside the job's span, so the job id, operation
//! and video name are attached without repeating them at each call site.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Lifecycle logger for one video job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
    video: String,
    span: Span,
}

impl JobLogger {
    /// # Arguments
    /// * `job_id` - The unique identifier for the job
    /// * `operation` - The kind of work, e.g. `"shorten_video"`
    /// * `video` - Base name of the video the job produces
    pub fn new(job_id: &Uuid, operation: &'static str, video: &str) -> Self {
        let job_id = job_id.to_string();
        let span = tracing::info_span!("job", job_id = %job_id, operation, video);
        Self {
            job_id,
            operation,
            video: video.to_string(),
            span,
        }
    }

    pub fn log_start(&self, message: &str) {
        self.span.in_scope(|| info!("Job started: {}", message));
    }

    pub fn log_progress(&self, message: &str) {
        self.span.in_scope(|| info!("Job progress: {}", message));
    }

    pub fn log_warning(&self, message: &str) {
        self.span.in_scope(|| warn!("Job warning: {}", message));
    }

    pub fn log_error(&self, message: &str) {
        self.span.in_scope(|| error!("Job error: {}", message));
    }

    pub fn log_completion(&self, message: &str) {
        self.span.in_scope(|| info!("Job completed: {}", message));
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    pub fn video(&self) -> &str {
        &self.video
    }

    /// The job's span, for instrumenting its futures.
    pub fn span(&self) -> Span {
        self.span.clone()
    }
}
