//! Segment planning from per-frame classifications.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ ActionMap    │───►│ Segmenter    │───►│ Filter graph │
//! │ (ts → action)│    │ (plan)       │    │ (trim/concat)│
//! └──────────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use reelcut_media::planner::{build_filter_graph, plan_segments, PlannerConfig};
//!
//! let plan = plan_segments(&action_map, &PlannerConfig::new(0.7, 1.0));
//! let graph = build_filter_graph(&plan, true);
//! ```

mod graph;
mod segmenter;

pub use graph::{build_filter_graph, FilterGraph};
pub use segmenter::{plan_segments, PlannerConfig};
