#![deny(unreachable_patterns)]
//! FFmpeg CLI boundary for the reelcut pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with a debug hook for the literal command line
//! - Progress parsing from `-progress pipe:2` plus input duration metadata
//! - Frame sampling at a fixed interval
//! - Segment planning from a frame action map
//! - Filter graph synthesis (trim, speed, vertical reframe, concat) and encoding

pub mod command;
pub mod encode;
pub mod error;
pub mod filters;
pub mod frames;
pub mod planner;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, CommandHook, FfmpegCommand, FfmpegRunner};
pub use encode::{EncodeProgress, EncodeRequest, Encoder};
pub use error::{MediaError, MediaResult};
pub use filters::reframe_filter;
pub use frames::FrameSampler;
pub use planner::{build_filter_graph, plan_segments, FilterGraph, PlannerConfig};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
