//! Transcoder telemetry parsing.
//!
//! `-progress pipe:2` interleaves `key=value` blocks with the regular
//! diagnostics on stderr. Each block ends with `progress=continue` or
//! `progress=end`.

use serde::{Deserialize, Serialize};

use reelcut_models::timestamp::parse_timestamp;

/// Latest telemetry reported by ffmpeg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Output position in milliseconds, once reported
    pub out_time_ms: Option<i64>,
    /// Encoding speed relative to realtime
    pub speed: Option<f64>,
    /// Duration of the first input, from the `Duration:` line of the input dump
    pub input_duration_ms: Option<i64>,
    pub is_complete: bool,
}

/// Fold one stderr line into `state`.
///
/// Returns a snapshot at the end of each progress block and once when the
/// input duration first becomes known.
pub(crate) fn parse_progress_line(line: &str, state: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("Duration:") {
        // Only the first input counts
        if state.input_duration_ms.is_some() {
            return None;
        }
        let value = rest.split(',').next()?.trim();
        let secs = parse_timestamp(value).ok()?;
        state.input_duration_ms = Some((secs * 1000.0).round() as i64);
        return Some(state.clone());
    }

    let (key, value) = line.split_once('=')?;
    let value = value.trim();
    match key.trim() {
        // Microseconds under both names
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                state.out_time_ms = Some(us.max(0) / 1000);
            }
            None
        }
        "frame" => {
            state.frame = value.parse().unwrap_or(state.frame);
            None
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                state.speed = Some(speed);
            }
            None
        }
        "progress" => {
            state.is_complete = value == "end";
            Some(state.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(lines: &[&str], state: &mut FfmpegProgress) -> Vec<FfmpegProgress> {
        lines
            .iter()
            .filter_map(|line| parse_progress_line(line, state))
            .collect()
    }

    #[test]
    fn test_block_yields_one_snapshot() {
        let mut state = FfmpegProgress::default();
        let snapshots = feed(
            &[
                "frame=120",
                "fps=29.97",
                "out_time_us=5000000",
                "out_time=00:00:05.000000",
                "speed=1.5x",
                "progress=continue",
            ],
            &mut state,
        );

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].frame, 120);
        assert_eq!(snapshots[0].out_time_ms, Some(5000));
        assert_eq!(snapshots[0].speed, Some(1.5));
        assert!(!snapshots[0].is_complete);
    }

    #[test]
    fn test_unavailable_values_are_ignored() {
        let mut state = FfmpegProgress::default();
        let snapshots = feed(
            &["out_time_us=N/A", "speed=N/A", "frame=N/A", "progress=end"],
            &mut state,
        );

        assert!(snapshots[0].out_time_ms.is_none());
        assert!(snapshots[0].speed.is_none());
        assert!(snapshots[0].is_complete);
    }

    #[test]
    fn test_first_input_duration_is_kept() {
        let mut state = FfmpegProgress::default();
        let snapshot = parse_progress_line(
            "  Duration: 00:01:02.50, start: 0.000000, bitrate: 1200 kb/s",
            &mut state,
        )
        .unwrap();
        assert_eq!(snapshot.input_duration_ms, Some(62_500));

        assert!(parse_progress_line("Duration: 00:00:01.00, start: 0", &mut state).is_none());
        assert_eq!(state.input_duration_ms, Some(62_500));
    }

    #[test]
    fn test_unknown_duration_is_skipped() {
        let mut state = FfmpegProgress::default();
        assert!(parse_progress_line("Duration: N/A, start: 0", &mut state).is_none());
        assert!(state.input_duration_ms.is_none());
    }
}
