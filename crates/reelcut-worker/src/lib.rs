//! Batch video shortening pipeline.
//!
//! This crate provides:
//! - Environment-driven configuration for the run and the analyzer
//! - Gemini-backed per-frame classification with failure-safe defaults
//! - Per-video processing: extract, classify, plan, encode, clean up
//! - A bounded job scheduler that isolates per-video failures
//! - Typed event channels for stage progress, errors and debug output

pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod gemini;
pub mod job;
pub mod logging;
pub mod processor;
pub mod scheduler;
pub mod transcoder;

pub use classifier::{FrameClassificationService, FrameClassifier};
pub use config::{AnalyzerConfig, CriteriaConfig, WorkerConfig};
pub use error::{ErrorKind, WorkerError, WorkerResult};
pub use events::{EventReceivers, EventSink};
pub use gemini::GeminiClassifier;
pub use job::{discover_videos, output_collisions, VideoJob, VIDEO_EXTENSIONS};
pub use logging::JobLogger;
pub use processor::VideoProcessor;
pub use scheduler::{JobScheduler, SchedulerReport};
pub use transcoder::{FfmpegTranscoder, Transcoder};
