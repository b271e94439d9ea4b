//! Filter graph synthesis for a segment plan.
//!
//! Every segment becomes a trim chain on the source streams; the chains
//! are concatenated in plan order:
//!
//! ```text
//! [0:v]trim=start=0:end=30,setpts=PTS-STARTPTS,<reframe>[v0];
//! [0:a]atrim=start=0:end=30,asetpts=PTS-STARTPTS[a0];
//! [0:v]trim=start=30:end=60,setpts=PTS-STARTPTS,setpts=PTS/2,<reframe>[v1];
//! [0:a]atrim=start=30:end=60,asetpts=PTS-STARTPTS,atempo=2[a1];
//! [v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]
//! ```

use reelcut_models::{Segment, SegmentPlan, SegmentTransform, SPEED_UP_FACTOR};

use crate::filters::reframe_filter;

const VIDEO_OUT: &str = "outv";
const AUDIO_OUT: &str = "outa";

/// A `-filter_complex` graph and the labels to map into the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph {
    pub graph: String,
    pub video_label: String,
    pub audio_label: Option<String>,
}

/// Build the trim/speed/reframe/concat graph for `plan`.
///
/// Audio chains are only emitted when the source has an audio stream.
pub fn build_filter_graph(plan: &SegmentPlan, with_audio: bool) -> FilterGraph {
    let mut chains = Vec::with_capacity(plan.segments.len() * 2 + 1);
    let mut concat_inputs = String::new();

    for (i, segment) in plan.segments.iter().enumerate() {
        chains.push(video_chain(segment, i));
        concat_inputs.push_str(&format!("[v{}]", i));
        if with_audio {
            chains.push(audio_chain(segment, i));
            concat_inputs.push_str(&format!("[a{}]", i));
        }
    }

    let outputs = if with_audio {
        format!("[{}][{}]", VIDEO_OUT, AUDIO_OUT)
    } else {
        format!("[{}]", VIDEO_OUT)
    };
    chains.push(format!(
        "{}concat=n={}:v=1:a={}{}",
        concat_inputs,
        plan.segments.len(),
        u8::from(with_audio),
        outputs
    ));

    FilterGraph {
        graph: chains.join(";"),
        video_label: format!("[{}]", VIDEO_OUT),
        audio_label: with_audio.then(|| format!("[{}]", AUDIO_OUT)),
    }
}

fn trim_bounds(segment: &Segment) -> String {
    match segment.end_secs() {
        Some(end) => format!("start={:.3}:end={:.3}", segment.start_secs(), end),
        None => format!("start={:.3}", segment.start_secs()),
    }
}

fn video_chain(segment: &Segment, index: usize) -> String {
    let mut chain = format!("[0:v]trim={},setpts=PTS-STARTPTS", trim_bounds(segment));
    if segment.transform == SegmentTransform::SpeedUp {
        chain.push_str(&format!(",setpts=PTS/{}", SPEED_UP_FACTOR));
    }
    chain.push(',');
    chain.push_str(&reframe_filter(&segment.reframe));
    chain.push_str(&format!("[v{}]", index));
    chain
}

fn audio_chain(segment: &Segment, index: usize) -> String {
    let mut chain = format!("[0:a]atrim={},asetpts=PTS-STARTPTS", trim_bounds(segment));
    if segment.transform == SegmentTransform::SpeedUp {
        chain.push_str(&format!(",atempo={}", SPEED_UP_FACTOR));
    }
    chain.push_str(&format!("[a{}]", index));
    chain
}
