//! Timestamp parsing and trim windows.
//!
//! Trim windows come either from configuration or from an input filename
//! of the form `HH:MM:SS-HH:MM:SS.<ext>`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ModelError, ModelResult};

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS, MM:SS or SS")]
    InvalidFormat(String),
}

/// Parse a timestamp string to total seconds.
///
/// Accepts `HH:MM:SS`, `MM:SS` and `SS`, each with optional fractional seconds.
///
/// # Examples
/// ```
/// use reelcut_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() > 3 {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    }

    const COMPONENTS: [&str; 3] = ["seconds", "minutes", "hours"];
    let mut total = 0.0;
    for (position, part) in parts.iter().rev().enumerate() {
        let name = COMPONENTS[position];
        let value: f64 = part
            .parse()
            .map_err(|_| TimestampError::InvalidValue(name, part.to_string()))?;
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        total += value * 60f64.powi(position as i32);
    }

    Ok(total)
}

/// Format seconds into HH:MM:SS or HH:MM:SS.mmm.
pub fn format_seconds(total_secs: f64) -> String {
    let hours = (total_secs / 3600.0).floor() as u32;
    let mins = ((total_secs % 3600.0) / 60.0).floor() as u32;
    let secs = total_secs % 60.0;

    if (secs - secs.floor()).abs() > 0.0001 {
        format!("{:02}:{:02}:{:06.3}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs.floor() as u32)
    }
}

/// Start/end trim applied to the source before sampling and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrimWindow {
    /// Start offset into the source, in seconds
    pub start_secs: f64,
    /// Optional end offset into the source, in seconds
    pub end_secs: Option<f64>,
}

impl TrimWindow {
    /// Create a window, rejecting an end that does not come after the start.
    pub fn new(start_secs: f64, end_secs: Option<f64>) -> ModelResult<Self> {
        if !start_secs.is_finite() || start_secs < 0.0 {
            return Err(ModelError::InvalidWindow(format!(
                "start must be a non-negative number, got {}",
                start_secs
            )));
        }
        if let Some(end) = end_secs {
            if !end.is_finite() || end <= start_secs {
                return Err(ModelError::InvalidWindow(format!(
                    "end ({}) must be after start ({})",
                    format_seconds(end.max(0.0)),
                    format_seconds(start_secs)
                )));
            }
        }
        Ok(Self { start_secs, end_secs })
    }

    /// Parse a window from optional `HH:MM:SS` start and end strings.
    ///
    /// Returns `None` when neither bound is given.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> ModelResult<Option<Self>> {
        if start.is_none() && end.is_none() {
            return Ok(None);
        }
        let start_secs = start.map(parse_timestamp).transpose()?.unwrap_or(0.0);
        let end_secs = end.map(parse_timestamp).transpose()?;
        Self::new(start_secs, end_secs).map(Some)
    }

    /// Window length in seconds, when the end is known.
    pub fn duration_secs(&self) -> Option<f64> {
        self.end_secs.map(|end| end - self.start_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_components() {
        assert_eq!(parse_timestamp("00:00:00").unwrap(), 0.0);
        assert_eq!(parse_timestamp("01:30:45").unwrap(), 5445.0);
        assert_eq!(parse_timestamp("53:53").unwrap(), 3233.0);
        assert!((parse_timestamp("00:00:30.500").unwrap() - 30.5).abs() < 0.001);
    }

    #[test]
    fn test_parse_timestamp_errors() {
        assert!(matches!(parse_timestamp("  "), Err(TimestampError::Empty)));
        assert!(matches!(parse_timestamp("abc"), Err(TimestampError::InvalidValue("seconds", _))));
        assert!(matches!(parse_timestamp("1:2:3:4"), Err(TimestampError::InvalidFormat(_))));
        assert!(matches!(parse_timestamp("-1:00"), Err(TimestampError::Negative)));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(90.0), "00:01:30");
        assert_eq!(format_seconds(3661.0), "01:01:01");
        assert_eq!(format_seconds(1.5), "00:00:01.500");
    }

    #[test]
    fn test_window_parse() {
        let window = TrimWindow::parse(Some("00:00:10"), Some("00:01:00")).unwrap().unwrap();
        assert_eq!(window.start_secs, 10.0);
        assert_eq!(window.duration_secs(), Some(50.0));

        let open = TrimWindow::parse(Some("00:00:10"), None).unwrap().unwrap();
        assert_eq!(open.duration_secs(), None);

        assert!(TrimWindow::parse(None, None).unwrap().is_none());
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        assert!(TrimWindow::parse(Some("00:02:00"), Some("00:01:00")).is_err());
        assert!(TrimWindow::new(5.0, Some(5.0)).is_err());
    }
}
