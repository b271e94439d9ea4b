//! FFmpeg video filter definitions.

use reelcut_models::Reframe;

/// Pixel shape reset after reframing so players do not stretch the output.
pub const FILTER_SQUARE_PIXELS: &str = "setsar=1";

/// Vertical reframe chain for a segment.
///
/// Scales to the content height, center-crops to the frame width (or keeps
/// narrower sources whole) and pads with black bars split evenly top and
/// bottom. The crop has no x offset so FFmpeg centers it.
pub fn reframe_filter(reframe: &Reframe) -> String {
    format!(
        "scale=-2:{ch},crop=min(iw\\,{w}):{ch},pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,{sar}",
        w = reframe.frame_width,
        h = reframe.frame_height,
        ch = reframe.content_height,
        sar = FILTER_SQUARE_PIXELS,
    )
}

/// Sampling filter producing one image every `interval_secs`.
pub fn filter_sample_every(interval_secs: f64) -> String {
    format!("fps=1/{}", interval_secs)
}
