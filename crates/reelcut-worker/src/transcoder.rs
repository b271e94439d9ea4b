//! Transcoder seam between the processor and ffmpeg.

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use reelcut_media::{probe_video, EncodeRequest, Encoder, FfmpegRunner, FrameSampler, VideoInfo};
use reelcut_models::{DebugEvent, Frame, ProcessingStage, TrimWindow};

use crate::error::WorkerResult;
use crate::events::EventSink;

/// The media operations a video job needs.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Sample one frame every `interval_secs` into `temp_dir`.
    async fn extract_frames(
        &self,
        video: &Path,
        temp_dir: &Path,
        interval_secs: f64,
        window: Option<TrimWindow>,
        events: &EventSink,
    ) -> WorkerResult<Vec<Frame>>;

    async fn probe(&self, video: &Path, events: &EventSink) -> WorkerResult<VideoInfo>;

    /// Render `request`, publishing `compiling_video` progress.
    async fn encode(&self, request: EncodeRequest, events: &EventSink) -> WorkerResult<()>;
}

/// [`Transcoder`] backed by the ffmpeg and ffprobe executables.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    crf: Option<u8>,
    preset: Option<String>,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = Some(crf);
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    fn runner(events: &EventSink) -> FfmpegRunner {
        FfmpegRunner::new().with_command_hook(events.command_hook())
    }

    fn encoder(&self, events: &EventSink) -> Encoder {
        let mut encoder = Encoder::new(Self::runner(events));
        if let Some(crf) = self.crf {
            encoder = encoder.with_crf(crf);
        }
        if let Some(preset) = &self.preset {
            encoder = encoder.with_preset(preset.clone());
        }
        encoder
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_frames(
        &self,
        video: &Path,
        temp_dir: &Path,
        interval_secs: f64,
        window: Option<TrimWindow>,
        events: &EventSink,
    ) -> WorkerResult<Vec<Frame>> {
        let sampler = FrameSampler::new(interval_secs)?.with_window(window);
        Ok(sampler.extract(&Self::runner(events), video, temp_dir).await?)
    }

    async fn probe(&self, video: &Path, events: &EventSink) -> WorkerResult<VideoInfo> {
        events.debug(
            DebugEvent::new("Probing source").with_payload(json!({ "path": video.display().to_string() })),
        );
        Ok(probe_video(video).await?)
    }

    async fn encode(&self, request: EncodeRequest, events: &EventSink) -> WorkerResult<()> {
        let sink = events.clone();
        self.encoder(events)
            .render(&request, move |progress| {
                sink.stage(ProcessingStage::CompilingVideo {
                    position_ms: progress.position_ms,
                    total_ms: progress.total_ms,
                    percentage: progress.percentage,
                });
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_interval_is_rejected_before_spawning() {
        let transcoder = FfmpegTranscoder::new();
        let dir = tempfile::tempdir().unwrap();

        let result = transcoder
            .extract_frames(Path::new("talk.mp4"), dir.path(), 0.0, None, &EventSink::new())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_encoder_settings_are_applied() {
        let transcoder = FfmpegTranscoder::new().with_crf(28).with_preset("ultrafast");
        let rendered = format!("{:?}", transcoder.encoder(&EventSink::new()));
        assert!(rendered.contains("crf: 28"));
        assert!(rendered.contains("ultrafast"));
    }
}
