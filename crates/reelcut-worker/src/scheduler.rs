//! Bounded job scheduler.
//!
//! Keeps a FIFO of pending videos and at most `bound` running jobs. A job
//! holds its semaphore permit until it finishes; finished jobs are reaped
//! as they complete, with a periodic tick as the idle wake-up.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use reelcut_models::ErrorEvent;

use crate::error::WorkerResult;
use crate::events::EventSink;

/// Outcome of a scheduler run.
#[derive(Debug, Default)]
pub struct SchedulerReport {
    /// Output paths of finished jobs, in completion order
    pub succeeded: Vec<PathBuf>,
    /// Source path and failure message of each failed job
    pub failed: Vec<(PathBuf, String)>,
}

impl SchedulerReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs jobs with a fixed concurrency bound.
#[derive(Debug, Clone)]
pub struct JobScheduler {
    bound: usize,
    poll_interval: Duration,
    events: EventSink,
}

impl JobScheduler {
    /// A scheduler running at most `bound` jobs at once (minimum 1).
    pub fn new(bound: usize, poll_interval: Duration, events: EventSink) -> Self {
        Self {
            bound: bound.max(1),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            events,
        }
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Run `job_fn` for every item and return once all have finished.
    ///
    /// A failing or panicking job is reported and counted; it never stops
    /// the remaining jobs.
    pub async fn run<F, Fut>(&self, items: Vec<PathBuf>, job_fn: F) -> SchedulerReport
    where
        F: Fn(PathBuf) -> Fut,
        Fut: Future<Output = WorkerResult<PathBuf>> + Send + 'static,
    {
        let permits = Arc::new(Semaphore::new(self.bound));
        let mut queue: VecDeque<PathBuf> = items.into();
        let mut in_flight: JoinSet<WorkerResult<PathBuf>> = JoinSet::new();
        let mut sources: HashMap<task::Id, PathBuf> = HashMap::new();
        let mut report = SchedulerReport::default();

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(jobs = queue.len(), bound = self.bound, "Starting job scheduler");

        loop {
            while !queue.is_empty() {
                let Ok(permit) = permits.clone().try_acquire_owned() else {
                    break;
                };
                let Some(source) = queue.pop_front() else {
                    break;
                };

                info!(source = %source.display(), "Starting job");
                let job = job_fn(source.clone());
                let handle = in_flight.spawn(async move {
                    let _permit = permit;
                    job.await
                });
                sources.insert(handle.id(), source);
            }

            if queue.is_empty() && in_flight.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = in_flight.join_next_with_id() => {
                    self.reap(joined, &mut sources, &mut report);
                }
                _ = ticker.tick() => {}
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Job scheduler finished"
        );
        report
    }

    fn reap(
        &self,
        joined: Result<(task::Id, WorkerResult<PathBuf>), JoinError>,
        sources: &mut HashMap<task::Id, PathBuf>,
        report: &mut SchedulerReport,
    ) {
        match joined {
            Ok((id, Ok(output))) => {
                let source = sources.remove(&id).unwrap_or_default();
                info!(
                    source = %source.display(),
                    output = %output.display(),
                    "Job finished"
                );
                report.succeeded.push(output);
            }
            Ok((id, Err(e))) => {
                let source = sources.remove(&id).unwrap_or_default();
                self.report_failure(&source, e.to_string(), e.details());
                report.failed.push((source, e.to_string()));
            }
            Err(join_error) => {
                let source = sources.remove(&join_error.id()).unwrap_or_default();
                let message = if join_error.is_panic() {
                    "Job panicked".to_string()
                } else {
                    format!("Job did not complete: {}", join_error)
                };
                self.report_failure(&source, message.clone(), json!({ "kind": "internal" }));
                report.failed.push((source, message));
            }
        }
    }

    fn report_failure(&self, source: &Path, message: String, details: serde_json::Value) {
        error!(source = %source.display(), "Job failed: {}", message);
        let video = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.events
            .error(ErrorEvent::new(message).for_video(video).with_details(details));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;

    #[tokio::test]
    async fn test_empty_run_returns_immediately() {
        let scheduler = JobScheduler::new(2, Duration::from_millis(10), EventSink::new());
        let report = scheduler
            .run(Vec::new(), |source| async move { Ok(source) })
            .await;
        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_reported_on_error_channel() {
        let (sink, mut rx) = EventSink::channels();
        let scheduler = JobScheduler::new(1, Duration::from_millis(10), sink);

        let report = scheduler
            .run(vec![PathBuf::from("/in/broken.mp4")], |_| async {
                Err(WorkerError::job_failed("encoder exited with 1"))
            })
            .await;

        assert_eq!(report.failed.len(), 1);
        let event = rx.errors.recv().await.unwrap();
        assert_eq!(event.video.as_deref(), Some("broken"));
        assert_eq!(event.details.unwrap()["kind"], "transcode");
    }

    #[tokio::test]
    async fn test_zero_bound_is_raised_to_one() {
        let scheduler = JobScheduler::new(0, Duration::from_millis(10), EventSink::new());
        assert_eq!(scheduler.bound(), 1);
    }
}
