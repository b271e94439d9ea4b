//! Per-video pipeline.
//!
//! Stages run strictly in order and each is announced on the processing
//! channel:
//!
//! ```text
//! init → creating_directories → extracting_frames → analyzing_frames
//!      → applying_modifications → compiling_video → cleanup → complete
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use reelcut_media::{plan_segments, EncodeRequest, PlannerConfig};
use reelcut_models::{ProcessingStage, SegmentPlan};

use crate::classifier::FrameClassifier;
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::events::EventSink;
use crate::job::VideoJob;
use crate::logging::JobLogger;
use crate::transcoder::Transcoder;

/// Runs one video through extraction, classification, planning and encoding.
#[derive(Clone)]
pub struct VideoProcessor {
    config: Arc<WorkerConfig>,
    classifier: Arc<FrameClassifier>,
    transcoder: Arc<dyn Transcoder>,
    events: EventSink,
}

impl VideoProcessor {
    pub fn new(
        config: WorkerConfig,
        classifier: Arc<FrameClassifier>,
        transcoder: Arc<dyn Transcoder>,
        events: EventSink,
    ) -> Self {
        Self {
            config: Arc::new(config),
            classifier,
            transcoder,
            events,
        }
    }

    /// Process `source`, returning the written output path.
    pub async fn process(&self, source: &Path) -> WorkerResult<PathBuf> {
        let job = VideoJob::new(
            source,
            &self.config.output_dir,
            &self.config.work_dir,
            self.config.window,
        )?;
        let logger = JobLogger::new(&job.id, "shorten_video", &job.base_name);
        let span = logger.span();

        let result = self.run_stages(&job, &logger).instrument(span).await;
        if let Err(e) = &result {
            logger.log_error(&e.to_string());
        }
        result
    }

    async fn run_stages(&self, job: &VideoJob, logger: &JobLogger) -> WorkerResult<PathBuf> {
        let started = Instant::now();
        let events = self.events.for_job(&job.base_name);

        events.stage(ProcessingStage::Init);
        logger.log_start(&job.source.display().to_string());

        events.stage(ProcessingStage::CreatingDirectories);
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        tokio::fs::create_dir_all(&job.work_dir).await?;
        // Removed on drop, so every early return below cleans up too
        let temp_dir = job.create_temp_dir()?;

        events.stage(ProcessingStage::ExtractingFrames);
        let frames = self
            .transcoder
            .extract_frames(
                &job.source,
                temp_dir.path(),
                self.config.sampling_interval_secs,
                job.window,
                &events,
            )
            .await?;
        logger.log_progress(&format!("Extracted {} frames", frames.len()));

        events.stage(ProcessingStage::AnalyzingFrames {
            processed: 0,
            total: frames.len(),
            percentage: 0.0,
        });
        let actions = self.classifier.classify_frames(&frames, &events).await;

        let planner = PlannerConfig::new(
            self.classifier.confidence_threshold(),
            self.config.sampling_interval_secs,
        );
        let plan = plan_segments(&actions, &planner);
        announce_plan(&plan, &events);

        let (source_duration_ms, has_audio) = match self.transcoder.probe(&job.source, &events).await {
            Ok(info) => (info.duration_ms(), info.has_audio),
            Err(e) => {
                logger.log_warning(&format!(
                    "Probe failed, assuming audio and unknown duration: {}",
                    e
                ));
                (None, true)
            }
        };

        let clip_ms = job
            .window
            .and_then(|w| w.duration_secs())
            .map(|secs| (secs * 1000.0).round() as u64)
            .or_else(|| {
                let start_ms = job
                    .window
                    .map(|w| (w.start_secs * 1000.0).round() as u64)
                    .unwrap_or(0);
                source_duration_ms.map(|total| total.saturating_sub(start_ms))
            });
        let total_ms = clip_ms.map(|ms| plan.estimated_output_ms(Some(ms)));
        events.stage(ProcessingStage::CompilingVideo {
            position_ms: 0,
            total_ms,
            percentage: total_ms.map(|_| 0.0),
        });

        self.transcoder
            .encode(
                EncodeRequest {
                    source: job.source.clone(),
                    output: job.output_path.clone(),
                    plan,
                    window: job.window,
                    source_duration_ms,
                    has_audio,
                },
                &events,
            )
            .await?;

        events.stage(ProcessingStage::Cleanup);
        let temp_path = temp_dir.path().to_path_buf();
        if let Err(e) = temp_dir.close() {
            logger.log_warning(&format!(
                "Failed to remove {}: {}",
                temp_path.display(),
                e
            ));
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        events.stage(ProcessingStage::Complete {
            output_path: job.output_path.display().to_string(),
            elapsed_ms,
        });
        logger.log_completion(&format!(
            "{} in {}ms",
            job.output_path.display(),
            elapsed_ms
        ));

        Ok(job.output_path.clone())
    }
}

fn announce_plan(plan: &SegmentPlan, events: &EventSink) {
    let stats = plan.stats();
    events.stage(ProcessingStage::ApplyingModifications {
        message: format!(
            "{} kept, {} sped up, {} removed, {} below confidence threshold",
            stats.passthrough_count,
            stats.speed_up_count,
            stats.removed_count,
            stats.low_confidence_count
        ),
    });

    for skipped in &plan.skipped {
        events.stage(ProcessingStage::SegmentSkipped {
            frame_ordinal: skipped.frame_ordinal,
            action: skipped.action,
            confidence: skipped.confidence,
            start_ms: skipped.start_ms,
            end_ms: skipped.end_ms,
            reason: skipped.reason,
        });
    }

    if plan.is_fallback {
        events.stage(ProcessingStage::ApplyingModifications {
            message: "No segments survived planning, keeping the whole clip".to_string(),
        });
    }
}
