//! Sampled frames and their classification results.

use std::fmt;
use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-frame classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FrameAction {
    /// Keep the interval as-is
    Keep,
    /// Drop the interval from the output
    Remove,
    /// Play the interval at double speed
    SpeedUp,
}

impl FrameAction {
    /// All actions, in the order offered to the classifier.
    pub const ALL: [FrameAction; 3] = [FrameAction::SpeedUp, FrameAction::Remove, FrameAction::Keep];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameAction::Keep => "keep",
            FrameAction::Remove => "remove",
            FrameAction::SpeedUp => "speed_up",
        }
    }
}

impl fmt::Display for FrameAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single sampled frame.
///
/// Immutable once built; confidence is always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct FrameAnalysis {
    action: FrameAction,
    confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    frame_ordinal: u32,
}

impl FrameAnalysis {
    /// Build an analysis, clamping confidence into `[0, 1]`.
    ///
    /// A NaN confidence is treated as zero.
    pub fn new(
        action: FrameAction,
        confidence: f64,
        reason: Option<String>,
        frame_ordinal: u32,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            action,
            confidence,
            reason,
            frame_ordinal,
        }
    }

    /// Result used whenever classification fails: keep, full confidence.
    pub fn fallback(frame_ordinal: u32) -> Self {
        Self::new(FrameAction::Keep, 1.0, None, frame_ordinal)
    }

    pub fn action(&self) -> FrameAction {
        self.action
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn frame_ordinal(&self) -> u32 {
        self.frame_ordinal
    }
}

/// A sampled still image on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// 1-based ordinal, matching the sampler's file numbering
    pub ordinal: u32,
    /// Position in the (trimmed) clip in milliseconds
    pub timestamp_ms: u64,
    /// Image file inside the job's temp directory
    pub path: PathBuf,
}

impl Frame {
    /// Build a frame from its ordinal; the first frame sits at t = 0.
    pub fn new(ordinal: u32, sampling_interval_ms: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            ordinal,
            timestamp_ms: u64::from(ordinal.saturating_sub(1)) * sampling_interval_ms,
            path: path.into(),
        }
    }
}
