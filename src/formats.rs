//! Format descriptors reported by the extractor, and the selection logic
//! that turns a quality label into a video+audio pair.

use serde::Deserialize;
use std::collections::BTreeSet;

use crate::error::FormatError;
use crate::model::Quality;

/// Container every paired download is merged into.
pub const MERGE_CONTAINER: &str = "mp4";

/// One audio-only or video-only stream variant.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Format {
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub protocol: Option<String>,
}

impl Format {
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|c| c != "none")
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|c| c != "none")
    }

    pub fn is_video_only(&self) -> bool {
        self.has_video() && !self.has_audio()
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }
}

/// Metadata for a single video as returned by extraction.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<Format>,
}

/// The chosen video and audio streams, downloaded separately and merged.
#[derive(Clone, Debug, PartialEq)]
pub struct FormatSelection {
    pub video: Format,
    pub audio: Format,
}

impl FormatSelection {
    /// `-f` argument for the extractor, e.g. `137+140`.
    pub fn format_spec(&self) -> String {
        format!("{}+{}", self.video.format_id, self.audio.format_id)
    }

    pub fn ext(&self) -> &str {
        &self.video.ext
    }

    pub fn protocol(&self) -> String {
        let p = |f: &Format| f.protocol.clone().unwrap_or_else(|| "https".to_owned());
        format!("{}+{}", p(&self.video), p(&self.audio))
    }

    /// Number of separate transfers the extractor will report.
    pub fn stream_count(&self) -> usize {
        2
    }
}

/// Distinct heights of the video-only formats, ascending.
pub fn quality_options(formats: &[Format]) -> Vec<Quality> {
    formats
        .iter()
        .filter(|f| f.is_video_only())
        .filter_map(|f| f.height)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(Quality)
        .collect()
}

/// Audio container that pairs with a given video container.
pub fn companion_audio_ext(video_ext: &str) -> Option<&'static str> {
    match video_ext {
        "mp4" => Some("m4a"),
        "webm" => Some("webm"),
        _ => None,
    }
}

/// Picks the video-only format of exactly the requested height and the
/// audio-only format in the matching container.
///
/// The extractor lists formats worst-to-best, so among equal candidates the
/// last one wins. There is no fallback to a nearby height.
pub fn select_format(formats: &[Format], label: &str) -> Result<FormatSelection, FormatError> {
    let quality: Quality = label
        .parse()
        .map_err(|_| FormatError::InvalidQuality(label.to_owned()))?;

    let video = formats
        .iter()
        .rev()
        .find(|f| f.is_video_only() && f.height == Some(quality.height()))
        .ok_or(FormatError::NoVideoFormat(quality.height()))?;

    let audio_ext = companion_audio_ext(&video.ext)
        .ok_or_else(|| FormatError::UnsupportedContainer(video.ext.clone()))?;

    let audio = formats
        .iter()
        .rev()
        .find(|f| f.is_audio_only() && f.ext == audio_ext)
        .ok_or_else(|| FormatError::NoAudioFormat(audio_ext.to_owned()))?;

    Ok(FormatSelection {
        video: video.clone(),
        audio: audio.clone(),
    })
}
