//! Frame sampling.
//!
//! Extracts one still image per sampling interval into the job's temp
//! directory as `frame_00001.jpg`, `frame_00002.jpg`, ...

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use reelcut_models::{Frame, TrimWindow};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::filter_sample_every;

const FRAME_PREFIX: &str = "frame_";
const FRAME_EXTENSION: &str = "jpg";

/// Samples still frames from a video at a fixed interval.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    interval_secs: f64,
    window: Option<TrimWindow>,
}

impl FrameSampler {
    /// Create a sampler; the interval must be a positive number of seconds.
    pub fn new(interval_secs: f64) -> MediaResult<Self> {
        if !interval_secs.is_finite() || interval_secs <= 0.0 {
            return Err(MediaError::InvalidInterval(interval_secs));
        }
        Ok(Self {
            interval_secs,
            window: None,
        })
    }

    /// Sample only inside `window`, so frame timestamps line up with the
    /// trimmed clip the encoder renders.
    pub fn with_window(mut self, window: Option<TrimWindow>) -> Self {
        self.window = window;
        self
    }

    pub fn interval_ms(&self) -> u64 {
        (self.interval_secs * 1000.0).round() as u64
    }

    /// Build the extraction command.
    pub fn command(&self, video: &Path, temp_dir: &Path) -> FfmpegCommand {
        let pattern = temp_dir.join(format!("{}%05d.{}", FRAME_PREFIX, FRAME_EXTENSION));
        let mut cmd = FfmpegCommand::new(video, pattern);

        if let Some(window) = &self.window {
            cmd = cmd.seek(window.start_secs);
            if let Some(duration) = window.duration_secs() {
                cmd = cmd.duration(duration);
            }
        }

        cmd.video_filter(filter_sample_every(self.interval_secs))
            // Highest JPEG quality
            .output_args(["-q:v", "1"])
            // Accept limited-range YUV input for the JPEG encoder
            .output_args(["-strict", "unofficial"])
    }

    /// Extract frames and return them ordered by ordinal.
    pub async fn extract(
        &self,
        runner: &FfmpegRunner,
        video: &Path,
        temp_dir: &Path,
    ) -> MediaResult<Vec<Frame>> {
        if !video.exists() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }

        let cmd = self.command(video, temp_dir);
        runner.run(&cmd).await?;

        let frames = collect_frames(temp_dir, self.interval_ms()).await?;
        if frames.is_empty() {
            return Err(MediaError::NoFrames(video.to_path_buf()));
        }

        info!(
            video = %video.display(),
            frames = frames.len(),
            interval_secs = self.interval_secs,
            "Extracted frames"
        );
        Ok(frames)
    }
}

/// Enumerate numbered frame files in `dir`, ordered by ordinal.
pub async fn collect_frames(dir: &Path, interval_ms: u64) -> MediaResult<Vec<Frame>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut numbered: Vec<(u32, PathBuf)> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        match frame_ordinal(&path) {
            Some(ordinal) => numbered.push((ordinal, path)),
            None => debug!(path = %path.display(), "Ignoring non-frame file"),
        }
    }

    numbered.sort_by_key(|(ordinal, _)| *ordinal);
    Ok(numbered
        .into_iter()
        .map(|(ordinal, path)| Frame::new(ordinal, interval_ms, path))
        .collect())
}

fn frame_ordinal(path: &Path) -> Option<u32> {
    if path.extension()?.to_str()? != FRAME_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(FRAME_PREFIX)?
        .parse()
        .ok()
        .filter(|ordinal| *ordinal > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_interval() {
        assert!(FrameSampler::new(0.0).is_err());
        assert!(FrameSampler::new(-1.0).is_err());
        assert!(FrameSampler::new(f64::NAN).is_err());
    }

    #[test]
    fn test_command_uses_window_and_quality() {
        let window = TrimWindow::new(10.0, Some(40.0)).unwrap();
        let sampler = FrameSampler::new(2.0).unwrap().with_window(Some(window));
        let args = sampler
            .command(Path::new("in.mp4"), Path::new("/tmp/job"))
            .build_args();

        assert!(args.windows(2).any(|w| w[0] == "-ss" && w[1] == "10.000"));
        assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "30.000"));
        assert!(args.windows(2).any(|w| w[0] == "-vf" && w[1] == "fps=1/2"));
        assert!(args.windows(2).any(|w| w[0] == "-q:v" && w[1] == "1"));
        assert!(args.windows(2).any(|w| w[0] == "-strict" && w[1] == "unofficial"));
        assert!(args.last().unwrap().ends_with("frame_%05d.jpg"));
    }

    #[tokio::test]
    async fn test_collect_frames_orders_by_ordinal() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_00002.jpg", "frame_00010.jpg", "frame_00001.jpg", "notes.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let frames = collect_frames(dir.path(), 1000).await.unwrap();
        let ordinals: Vec<u32> = frames.iter().map(|f| f.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 10]);
        assert_eq!(frames[2].timestamp_ms, 9000);
    }
}
