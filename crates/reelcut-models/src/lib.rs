//! Shared data models for the reelcut pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Per-frame classification results and the timestamp-ordered action map
//! - Trim windows and timestamp parsing
//! - Timeline segments, reframing and the compiled segment plan
//! - The three observability channels (processing, error, debug)

pub mod action_map;
pub mod error;
pub mod events;
pub mod frame;
pub mod segment;
pub mod timestamp;

pub use action_map::ActionMap;
pub use error::{ModelError, ModelResult};
pub use events::{DebugEvent, ErrorEvent, ProcessingEvent, ProcessingStage};
pub use frame::{Frame, FrameAction, FrameAnalysis};
pub use segment::{
    PlanStats, Reframe, Segment, SegmentPlan, SegmentTransform, SkipReason, SkippedInterval,
    SPEED_UP_FACTOR,
};
pub use timestamp::{TimestampError, TrimWindow};
