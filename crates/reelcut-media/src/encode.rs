//! Encoder invocation for a segment plan.
//!
//! Applies the optional trim window on the input side, realizes the plan
//! as a filter graph and writes the final MP4, reporting progress from
//! the transcoder's telemetry.

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use reelcut_models::{SegmentPlan, TrimWindow};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::planner::build_filter_graph;
use crate::progress::FfmpegProgress;

/// Everything needed to render one output file.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub plan: SegmentPlan,
    pub window: Option<TrimWindow>,
    /// Source duration from probing, when available
    pub source_duration_ms: Option<u64>,
    pub has_audio: bool,
}

/// Encode progress derived from transcoder telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodeProgress {
    /// Output position in milliseconds
    pub position_ms: u64,
    /// Expected output length, once known
    pub total_ms: Option<u64>,
    /// Completion percentage in `[0, 100]`, only when the total is known
    pub percentage: Option<f64>,
}

/// Video encoding settings.
#[derive(Debug, Clone)]
pub struct Encoder {
    runner: FfmpegRunner,
    video_codec: String,
    preset: String,
    crf: u8,
    audio_codec: String,
    audio_bitrate: String,
}

impl Encoder {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 20,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Build the encode command for `request`.
    pub fn command(&self, request: &EncodeRequest) -> FfmpegCommand {
        let graph = build_filter_graph(&request.plan, request.has_audio);

        // The info-level input dump carries the duration used for progress
        let mut cmd = FfmpegCommand::new(&request.source, &request.output).log_level("info");

        if let Some(window) = &request.window {
            cmd = cmd.seek(window.start_secs);
            if let Some(duration) = window.duration_secs() {
                cmd = cmd.duration(duration);
            }
        }

        cmd = cmd.filter_complex(graph.graph).map(graph.video_label);
        if let Some(audio_label) = graph.audio_label {
            cmd = cmd
                .map(audio_label)
                .audio_codec(self.audio_codec.clone())
                .audio_bitrate(self.audio_bitrate.clone());
        }

        cmd.video_codec(self.video_codec.clone())
            .preset(self.preset.clone())
            .crf(self.crf)
            .output_args(["-pix_fmt", "yuv420p", "-movflags", "+faststart"])
    }

    /// Render `request`, calling `on_progress` for each telemetry update.
    pub async fn render<F>(&self, request: &EncodeRequest, on_progress: F) -> MediaResult<()>
    where
        F: Fn(EncodeProgress) + Send + Sync + 'static,
    {
        let cmd = self.command(request);
        let tracker = ProgressTracker::new(request);
        let started = Instant::now();

        info!(
            source = %request.source.display(),
            output = %request.output.display(),
            segments = request.plan.segments.len(),
            fallback = request.plan.is_fallback,
            "Encoding segment plan"
        );

        self.runner
            .run_with_progress(&cmd, move |progress| {
                on_progress(tracker.update(&progress, started.elapsed().as_millis() as u64));
            })
            .await?;

        info!(
            output = %request.output.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Encoding complete"
        );
        Ok(())
    }
}

/// Maps raw transcoder progress onto the expected output length.
#[derive(Debug, Clone)]
struct ProgressTracker {
    plan: SegmentPlan,
    /// Known clip duration before the transcoder reports anything
    known_clip_ms: Option<u64>,
    window: Option<TrimWindow>,
}

impl ProgressTracker {
    fn new(request: &EncodeRequest) -> Self {
        let window_ms = request
            .window
            .and_then(|w| w.duration_secs())
            .map(|secs| (secs * 1000.0).round() as u64);
        let known_clip_ms = window_ms.or_else(|| {
            let start_ms = request
                .window
                .map(|w| (w.start_secs * 1000.0).round() as u64)
                .unwrap_or(0);
            request
                .source_duration_ms
                .map(|total| total.saturating_sub(start_ms))
        });

        Self {
            plan: request.plan.clone(),
            known_clip_ms,
            window: request.window,
        }
    }

    fn clip_ms(&self, progress: &FfmpegProgress) -> Option<u64> {
        self.known_clip_ms.or_else(|| {
            let reported = u64::try_from(progress.input_duration_ms?).ok()?;
            let start_ms = self
                .window
                .map(|w| (w.start_secs * 1000.0).round() as u64)
                .unwrap_or(0);
            Some(reported.saturating_sub(start_ms))
        })
    }

    fn update(&self, progress: &FfmpegProgress, elapsed_ms: u64) -> EncodeProgress {
        let total_ms = self
            .clip_ms(progress)
            .map(|clip_ms| self.plan.estimated_output_ms(Some(clip_ms)))
            .filter(|total| *total > 0);

        // Wall-clock time stands in until the transcoder reports a position
        let position_ms = progress
            .out_time_ms
            .and_then(|ms| u64::try_from(ms).ok())
            .unwrap_or(elapsed_ms);

        let percentage = total_ms.map(|total| {
            if progress.is_complete {
                100.0
            } else {
                (position_ms as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
            }
        });

        EncodeProgress {
            position_ms,
            total_ms,
            percentage,
        }
    }
}
