//! Observability message types.
//!
//! Three independent channels carry these messages to whatever presents
//! them: processing stage transitions, errors and raw debug output.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::frame::FrameAction;
use crate::segment::SkipReason;

/// Pipeline stage, with the payload each stage reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ProcessingStage {
    Init,
    CreatingDirectories,
    ExtractingFrames,
    AnalyzingFrames {
        processed: usize,
        total: usize,
        percentage: f64,
    },
    ApplyingModifications {
        message: String,
    },
    /// Notice for an interval the planner did not emit
    SegmentSkipped {
        frame_ordinal: u32,
        action: FrameAction,
        confidence: f64,
        start_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_ms: Option<u64>,
        reason: SkipReason,
    },
    CompilingVideo {
        position_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        percentage: Option<f64>,
    },
    Cleanup,
    Complete {
        output_path: String,
        elapsed_ms: u64,
    },
}

impl ProcessingStage {
    /// Stage name; skip notices belong to `applying_modifications`.
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingStage::Init => "init",
            ProcessingStage::CreatingDirectories => "creating_directories",
            ProcessingStage::ExtractingFrames => "extracting_frames",
            ProcessingStage::AnalyzingFrames { .. } => "analyzing_frames",
            ProcessingStage::ApplyingModifications { .. }
            | ProcessingStage::SegmentSkipped { .. } => "applying_modifications",
            ProcessingStage::CompilingVideo { .. } => "compiling_video",
            ProcessingStage::Cleanup => "cleanup",
            ProcessingStage::Complete { .. } => "complete",
        }
    }
}

/// Stage transition for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingEvent {
    pub video: String,
    #[serde(flatten)]
    pub stage: ProcessingStage,
    pub timestamp: DateTime<Utc>,
}

impl ProcessingEvent {
    pub fn new(video: impl Into<String>, stage: ProcessingStage) -> Self {
        Self {
            video: video.into(),
            stage,
            timestamp: Utc::now(),
        }
    }
}

/// A failure worth surfacing; never implies the run stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            video: None,
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn for_video(mut self, video: impl Into<String>) -> Self {
        self.video = Some(video.into());
        self
    }
}

/// Raw diagnostic output such as invoked command lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DebugEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl DebugEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            video: None,
            message: message.into(),
            payload: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn for_video(mut self, video: impl Into<String>) -> Self {
        self.video = Some(video.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_serializes_with_tag() {
        let event = ProcessingEvent::new(
            "talk",
            ProcessingStage::AnalyzingFrames {
                processed: 1,
                total: 2,
                percentage: 50.0,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stage"], "analyzing_frames");
        assert_eq!(json["video"], "talk");
        assert_eq!(json["processed"], 1);
    }

    #[test]
    fn test_skip_notice_belongs_to_applying_modifications() {
        let stage = ProcessingStage::SegmentSkipped {
            frame_ordinal: 3,
            action: FrameAction::Keep,
            confidence: 0.2,
            start_ms: 2000,
            end_ms: None,
            reason: SkipReason::LowConfidence,
        };
        assert_eq!(stage.name(), "applying_modifications");
    }

    #[test]
    fn test_error_event_builder() {
        let event = ErrorEvent::new("classification failed")
            .for_video("talk")
            .with_details(serde_json::json!({ "status": 500 }));
        assert_eq!(event.video.as_deref(), Some("talk"));
        assert_eq!(event.details.unwrap()["status"], 500);
    }
}
