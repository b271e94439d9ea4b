//! Converts an action map into an ordered segment plan.
//!
//! Each map entry covers the time from its timestamp to the next entry's;
//! the final entry runs to the end of the clip.
//!
//! ```text
//!   ts:      0 ─────── 30 ─────── 60 ─────────► end
//!   action:  keep      speed_up   remove
//!   output:  [0,30) 1x [30,60) 2x (dropped)
//! ```

use tracing::{debug, info};

use reelcut_models::{
    ActionMap, FrameAction, Reframe, Segment, SegmentPlan, SegmentTransform, SkipReason,
    SkippedInterval,
};

/// Planner inputs besides the action map.
#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    /// Minimum confidence required to honor a classification
    pub confidence_threshold: f64,
    /// Seconds between sampled frames
    pub sampling_interval_secs: f64,
    pub reframe: Reframe,
}

impl PlannerConfig {
    pub fn new(confidence_threshold: f64, sampling_interval_secs: f64) -> Self {
        Self {
            confidence_threshold,
            sampling_interval_secs,
            reframe: Reframe::default(),
        }
    }

    pub fn with_reframe(mut self, reframe: Reframe) -> Self {
        self.reframe = reframe;
        self
    }
}

/// Build the segment plan for `map`.
///
/// Removals and low-confidence decisions of any action produce no segment
/// and are recorded in [`SegmentPlan::skipped`]. When nothing survives, the
/// plan falls back to one whole-clip passthrough so output is never empty.
pub fn plan_segments(map: &ActionMap, config: &PlannerConfig) -> SegmentPlan {
    let mut segments = Vec::new();
    let mut skipped = Vec::new();

    for (start_ms, end_ms, analysis) in map.intervals() {
        let skip_reason = if analysis.action() == FrameAction::Remove {
            Some(SkipReason::Removed)
        } else if analysis.confidence() < config.confidence_threshold {
            Some(SkipReason::LowConfidence)
        } else {
            None
        };

        if let Some(reason) = skip_reason {
            debug!(
                frame = analysis.frame_ordinal(),
                action = %analysis.action(),
                confidence = analysis.confidence(),
                ?reason,
                "Skipping interval"
            );
            skipped.push(SkippedInterval {
                start_ms,
                end_ms,
                frame_ordinal: analysis.frame_ordinal(),
                action: analysis.action(),
                confidence: analysis.confidence(),
                reason,
            });
            continue;
        }

        let transform = match analysis.action() {
            FrameAction::SpeedUp => SegmentTransform::SpeedUp,
            _ => SegmentTransform::Passthrough,
        };

        segments.push(Segment {
            start_ms,
            end_ms,
            transform,
            reframe: config.reframe,
        });
    }

    let is_fallback = segments.is_empty();
    if is_fallback {
        info!(
            entries = map.len(),
            "No segments survived planning, keeping the whole clip"
        );
        segments.push(Segment {
            start_ms: 0,
            end_ms: None,
            transform: SegmentTransform::Passthrough,
            reframe: config.reframe,
        });
    }

    let plan = SegmentPlan {
        segments,
        skipped,
        is_fallback,
        sampling_interval_ms: (config.sampling_interval_secs * 1000.0).round() as u64,
    };

    let stats = plan.stats();
    debug!(
        passthrough = stats.passthrough_count,
        speed_up = stats.speed_up_count,
        removed = stats.removed_count,
        low_confidence = stats.low_confidence_count,
        "Segment plan compiled"
    );

    plan
}
