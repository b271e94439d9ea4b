//! Timeline segments and the compiled segment plan.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::frame::FrameAction;

/// Playback rate applied to `speed_up` intervals.
pub const SPEED_UP_FACTOR: f64 = 2.0;

/// Timing transform applied to a kept interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SegmentTransform {
    /// Copy the interval at its original rate
    Passthrough,
    /// Play the interval at [`SPEED_UP_FACTOR`]
    SpeedUp,
}

impl SegmentTransform {
    /// Output duration of `source_ms` of input under this transform.
    pub fn output_ms(&self, source_ms: u64) -> u64 {
        match self {
            SegmentTransform::Passthrough => source_ms,
            SegmentTransform::SpeedUp => (source_ms as f64 / SPEED_UP_FACTOR).round() as u64,
        }
    }
}

/// Vertical reframing: scale to `content_height`, center-crop to
/// `frame_width`, then pad to `frame_height` with even black bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Reframe {
    pub frame_width: u32,
    pub frame_height: u32,
    pub content_height: u32,
}

impl Default for Reframe {
    fn default() -> Self {
        Self {
            frame_width: 1080,
            frame_height: 1920,
            content_height: 1440,
        }
    }
}

impl Reframe {
    /// Height of each black bar.
    pub fn bar_height(&self) -> u32 {
        self.frame_height.saturating_sub(self.content_height) / 2
    }
}

/// A contiguous output range with its transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Start in the (trimmed) clip, milliseconds
    pub start_ms: u64,
    /// End in the clip; `None` runs to the end of the clip
    pub end_ms: Option<u64>,
    pub transform: SegmentTransform,
    pub reframe: Reframe,
}

impl Segment {
    /// Source duration, when the segment is closed.
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_ms.map(|end| end.saturating_sub(self.start_ms))
    }

    pub fn start_secs(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end_secs(&self) -> Option<f64> {
        self.end_ms.map(|end| end as f64 / 1000.0)
    }
}

/// Why an interval produced no segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Classified as `remove`
    Removed,
    /// Confidence below the configured threshold
    LowConfidence,
}

/// An interval the planner dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedInterval {
    pub start_ms: u64,
    pub end_ms: Option<u64>,
    pub frame_ordinal: u32,
    pub action: FrameAction,
    pub confidence: f64,
    pub reason: SkipReason,
}

/// Segment counts for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub passthrough_count: usize,
    pub speed_up_count: usize,
    pub removed_count: usize,
    pub low_confidence_count: usize,
}

/// Ordered, non-overlapping segments ready for the encoder.
///
/// Segments are concatenated in the order they appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentPlan {
    pub segments: Vec<Segment>,
    pub skipped: Vec<SkippedInterval>,
    /// True when nothing survived planning and the whole clip is kept
    pub is_fallback: bool,
    pub sampling_interval_ms: u64,
}

impl SegmentPlan {
    pub fn stats(&self) -> PlanStats {
        let mut stats = PlanStats::default();
        for segment in &self.segments {
            match segment.transform {
                SegmentTransform::Passthrough => stats.passthrough_count += 1,
                SegmentTransform::SpeedUp => stats.speed_up_count += 1,
            }
        }
        for skipped in &self.skipped {
            match skipped.reason {
                SkipReason::Removed => stats.removed_count += 1,
                SkipReason::LowConfidence => stats.low_confidence_count += 1,
            }
        }
        stats
    }

    /// Estimated output length.
    ///
    /// The open-ended tail runs to `source_duration_ms` when known and is
    /// otherwise assumed to last one sampling interval.
    pub fn estimated_output_ms(&self, source_duration_ms: Option<u64>) -> u64 {
        self.segments
            .iter()
            .map(|segment| {
                let source_ms = match (segment.end_ms, source_duration_ms) {
                    (Some(end), _) => end.saturating_sub(segment.start_ms),
                    (None, Some(total)) => total.saturating_sub(segment.start_ms),
                    (None, None) => self.sampling_interval_ms,
                };
                segment.transform.output_ms(source_ms)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start_ms: u64, end_ms: Option<u64>, transform: SegmentTransform) -> Segment {
        Segment {
            start_ms,
            end_ms,
            transform,
            reframe: Reframe::default(),
        }
    }

    #[test]
    fn test_reframe_bars_are_even() {
        let reframe = Reframe::default();
        assert_eq!(reframe.bar_height(), 240);
        assert_eq!(reframe.frame_width * 16, reframe.frame_height * 9);
    }

    #[test]
    fn test_estimated_output_accounts_for_speed_up() {
        let plan = SegmentPlan {
            segments: vec![
                segment(0, Some(30_000), SegmentTransform::Passthrough),
                segment(30_000, Some(60_000), SegmentTransform::SpeedUp),
                segment(90_000, None, SegmentTransform::Passthrough),
            ],
            skipped: Vec::new(),
            is_fallback: false,
            sampling_interval_ms: 1000,
        };

        assert_eq!(plan.estimated_output_ms(Some(100_000)), 30_000 + 15_000 + 10_000);
        assert_eq!(plan.estimated_output_ms(None), 30_000 + 15_000 + 1000);
    }
}
