//! FFmpeg filter graph construction.

use beatcut_models::{Edl, OutputSpec, TimelineClip};

/// Silent stereo source used when the render has no uploaded audio.
pub const SILENCE_SOURCE: &str = "anullsrc=channel_layout=stereo:sample_rate=48000";

/// Loudness target applied when the EDL asks for normalization.
pub const LOUDNORM_FILTER: &str = "loudnorm=I=-14:TP=-1.5:LRA=11";

/// Label of the audio branch output.
pub const AUDIO_OUT: &str = "[aout]";

/// Per-clip filter: scale to cover, center-crop, square pixels, constant
/// frame rate, then an optional speed change.
pub fn segment_filter(output: &OutputSpec, speed: Option<f64>) -> String {
    let (w, h) = (output.width, output.height);
    let mut filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={}",
        output.fps
    );
    if let Some(speed) = speed.filter(|s| *s != 1.0) {
        filter.push_str(&format!(",setpts=PTS/{}", speed));
    }
    filter
}

/// The compose-stage filter graph.
///
/// Inputs `0..n` are the intermediate clips in timeline order; input `n` is
/// the audio source (uploaded track or synthesized silence).
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionGraph {
    video_filters: Vec<String>,
    audio_filter: String,
    video_out: String,
}

impl CompositionGraph {
    /// Build the graph for `edl`. `uploaded_audio` is true when input `n`
    /// is a real audio file rather than the silence source.
    pub fn build(edl: &Edl, uploaded_audio: bool) -> Self {
        let (video_filters, video_out) = video_chain(&edl.timeline);
        let audio_filter = audio_branch(edl, edl.timeline.len(), uploaded_audio);
        Self {
            video_filters,
            audio_filter,
            video_out,
        }
    }

    /// Label carrying the final video stream.
    pub fn video_output(&self) -> &str {
        &self.video_out
    }

    /// Label carrying the final audio stream.
    pub fn audio_output(&self) -> &str {
        AUDIO_OUT
    }

    /// Render as a `-filter_complex` argument.
    pub fn to_filter_complex(&self) -> String {
        let mut parts = self.video_filters.clone();
        parts.push(self.audio_filter.clone());
        parts.join(";")
    }
}

/// Rebase every clip, then fold them left to right with xfade.
///
/// The offset of each fade is the accumulated duration so far minus the
/// fade length; a cut is a fade of [`Transition::fade_secs`] for `None`.
///
/// [`Transition::fade_secs`]: beatcut_models::Transition::fade_secs
fn video_chain(timeline: &[TimelineClip]) -> (Vec<String>, String) {
    let mut filters: Vec<String> = (0..timeline.len())
        .map(|i| format!("[{i}:v]setpts=PTS-STARTPTS[v{i}]"))
        .collect();

    let mut current = "[v0]".to_string();
    let mut accumulated = timeline.first().map(TimelineClip::duration).unwrap_or(0.0);

    for (i, clip) in timeline.iter().enumerate().skip(1) {
        let fade = clip.transition.fade_secs();
        let offset = (accumulated - fade).max(0.0);
        let next = format!("[vxf{}]", i - 1);
        filters.push(format!(
            "{current}[v{i}]xfade=transition=fade:duration={fade:.3}:offset={offset:.3}{next}"
        ));
        current = next;
        accumulated += clip.duration() - fade;
    }

    (filters, current)
}

fn audio_branch(edl: &Edl, audio_input: usize, uploaded_audio: bool) -> String {
    let target = edl.output.target_duration;

    if edl.audio.use_uploaded_audio && uploaded_audio {
        let (start, end) = edl
            .audio
            .selected_segment
            .map(|seg| (seg.start, seg.end))
            .unwrap_or((0.0, target));
        let normalize = if edl.audio.normalize {
            format!("{LOUDNORM_FILTER},")
        } else {
            String::new()
        };
        format!(
            "[{audio_input}:a]atrim=start={start}:end={end},asetpts=PTS-STARTPTS,{normalize}volume={}{AUDIO_OUT}",
            edl.audio.mix_level
        )
    } else {
        format!("[{audio_input}:a]atrim=0:{target},asetpts=PTS-STARTPTS,volume=0{AUDIO_OUT}")
    }
}
