//! Source metadata via ffprobe.

use std::path::Path;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// What the pipeline needs to know about a source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Container duration in seconds, 0 when unreported
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    /// Decides whether the filter graph gets audio chains
    pub has_audio: bool,
}

impl VideoInfo {
    /// Duration in milliseconds, if ffprobe reported one.
    pub fn duration_ms(&self) -> Option<u64> {
        (self.duration > 0.0).then(|| (self.duration * 1000.0).round() as u64)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

impl TryFrom<ProbeReport> for VideoInfo {
    type Error = MediaError;

    fn try_from(report: ProbeReport) -> MediaResult<Self> {
        let has_audio = report.streams.iter().any(|s| s.codec_type == "audio");
        let video = report
            .streams
            .into_iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| MediaError::InvalidVideo("no video stream".to_string()))?;

        let fps = [&video.avg_frame_rate, &video.r_frame_rate]
            .into_iter()
            .flatten()
            .find_map(|rate| frame_rate(rate))
            .unwrap_or(30.0);

        Ok(Self {
            duration: report
                .format
                .duration
                .and_then(|d| d.trim().parse().ok())
                .unwrap_or(0.0),
            width: video.width.unwrap_or_default(),
            height: video.height.unwrap_or_default(),
            fps,
            codec: video.codec_name.unwrap_or_default(),
            has_audio,
        })
    }
}

/// Probe `path` with ffprobe's JSON output.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    debug!(path = %path.display(), "Probing video");
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe exited with {}", output.status),
            stderr: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        });
    }

    let report: ProbeReport = serde_json::from_slice(&output.stdout)?;
    VideoInfo::try_from(report)
}

/// `"30000/1001"` or `"29.97"`; zero rates count as unknown.
fn frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            num.parse::<f64>().ok()? / den
        }
        None => raw.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(json: &str) -> MediaResult<VideoInfo> {
        VideoInfo::try_from(serde_json::from_str::<ProbeReport>(json).unwrap())
    }

    #[test]
    fn test_frame_rate_forms() {
        assert_eq!(frame_rate("30/1"), Some(30.0));
        assert!((frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(frame_rate("25"), Some(25.0));
        assert_eq!(frame_rate("0/0"), None);
    }

    #[test]
    fn test_report_with_audio() {
        let info = info(
            r#"{
                "format": { "duration": "12.500000" },
                "streams": [
                    { "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                      "avg_frame_rate": "0/0", "r_frame_rate": "24/1" },
                    { "codec_type": "audio", "codec_name": "aac" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(info.width, 1920);
        assert_eq!(info.fps, 24.0);
        assert!(info.has_audio);
        assert_eq!(info.duration_ms(), Some(12_500));
    }

    #[test]
    fn test_report_without_duration_or_audio() {
        let info = info(r#"{ "streams": [ { "codec_type": "video" } ] }"#).unwrap();
        assert!(!info.has_audio);
        assert_eq!(info.duration_ms(), None);
    }

    #[test]
    fn test_report_without_video() {
        let result = info(r#"{ "format": {}, "streams": [ { "codec_type": "audio" } ] }"#);
        assert!(matches!(result, Err(MediaError::InvalidVideo(_))));
    }
}
