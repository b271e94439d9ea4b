//! Timestamp-ordered map of frame classifications.
//!
//! Built incrementally while frames are classified (possibly out of
//! order within a batch) and consumed once by the segment planner.

use std::collections::BTreeMap;

use crate::error::{ModelError, ModelResult};
use crate::frame::FrameAnalysis;

/// Ordered mapping of clip timestamp (milliseconds) to frame analysis.
///
/// Keys are unique and always iterated in ascending order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionMap {
    entries: BTreeMap<u64, FrameAnalysis>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an analysis; a timestamp may only be recorded once.
    pub fn insert(&mut self, timestamp_ms: u64, analysis: FrameAnalysis) -> ModelResult<()> {
        if self.entries.contains_key(&timestamp_ms) {
            return Err(ModelError::DuplicateTimestamp(timestamp_ms));
        }
        self.entries.insert(timestamp_ms, analysis);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, timestamp_ms: u64) -> Option<&FrameAnalysis> {
        self.entries.get(&timestamp_ms)
    }

    /// Entries in ascending timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &FrameAnalysis)> {
        self.entries.iter().map(|(ts, analysis)| (*ts, analysis))
    }

    /// Ascending timestamps.
    pub fn timestamps(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    /// Consecutive `(start, end, analysis)` intervals.
    ///
    /// Each entry covers the time up to the next entry; the last one is
    /// open-ended (`end == None`) and runs to the end of the clip.
    pub fn intervals(&self) -> Vec<(u64, Option<u64>, &FrameAnalysis)> {
        let keys: Vec<u64> = self.timestamps().collect();
        self.entries
            .iter()
            .enumerate()
            .map(|(i, (start, analysis))| (*start, keys.get(i + 1).copied(), analysis))
            .collect()
    }
}
