//! Preview parameters and the URL fragment they travel in.
//!
//! The producer serialises a [`PreviewParams`] value to JSON, percent-encodes
//! it and appends it to the previewer page URL after `#`. Everything the
//! player needs (clip URLs, clip lengths, narration) is carried that way.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{PreviewerError, Result};

/// Characters escaped when building a fragment. Mirrors the unreserved set of
/// `encodeURIComponent` so the page can decode what we produce.
const FRAGMENT_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A single video clip inside a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    /// URL of the clip. Empty for a placeholder that only occupies time.
    #[serde(default)]
    pub video: String,
    /// Natural length of the clip in seconds.
    pub video_duration: f64,
}

impl Clip {
    pub fn new(video: impl Into<String>, video_duration: f64) -> Self {
        Self {
            video: video.into(),
            video_duration,
        }
    }

    pub fn placeholder(video_duration: f64) -> Self {
        Self::new(String::new(), video_duration)
    }

    /// Placeholder clips have no media and are played out on a timer.
    pub fn is_placeholder(&self) -> bool {
        self.video.is_empty()
    }
}

/// A narrated segment: a run of clips stretched over one audio track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub videos: Vec<Clip>,
    /// Narration for this line. Unused when a global voice-over is present.
    #[serde(default)]
    pub audio: String,
    /// Length of the narration in seconds.
    pub audio_duration: f64,
}

impl Line {
    pub fn new(videos: Vec<Clip>, audio: impl Into<String>, audio_duration: f64) -> Self {
        Self {
            videos,
            audio: audio.into(),
            audio_duration,
        }
    }

    /// Sum of the natural lengths of every clip in the line.
    pub fn total_video_duration(&self) -> f64 {
        self.videos.iter().map(|clip| clip.video_duration).sum()
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.videos.is_empty() {
            return Err(PreviewerError::invalid_line(index, "line has no clips"));
        }
        if !self.audio_duration.is_finite() || self.audio_duration <= 0.0 {
            return Err(PreviewerError::invalid_line(
                index,
                "audio duration must be a positive number of seconds",
            ));
        }
        for (clip_index, clip) in self.videos.iter().enumerate() {
            if !clip.video_duration.is_finite() || clip.video_duration <= 0.0 {
                return Err(PreviewerError::invalid_clip(
                    index,
                    clip_index,
                    "video duration must be a positive number of seconds",
                ));
            }
        }
        Ok(())
    }
}

/// Everything the previewer page is told about what to play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewParams {
    pub lines: Vec<Line>,
    /// One narration track spanning the whole preview. When set, per-line
    /// audio is not played.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_voice_over: Option<String>,
}

impl PreviewParams {
    pub fn new(lines: Vec<Line>) -> Self {
        Self {
            lines,
            global_voice_over: None,
        }
    }

    pub fn with_global_voice_over(mut self, url: impl Into<String>) -> Self {
        self.global_voice_over = Some(url.into());
        self
    }

    pub fn has_global_voice_over(&self) -> bool {
        self.global_voice_over.is_some()
    }

    /// Parses a raw JSON payload and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Decodes the value carried in a URL fragment. A single leading `#` is
    /// accepted and ignored.
    pub fn from_fragment(fragment: &str) -> Result<Self> {
        let encoded = fragment.strip_prefix('#').unwrap_or(fragment);
        let json = decode_component(encoded)?;
        Self::from_json(&json)
    }

    /// Extracts and decodes the fragment of an absolute page URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        let fragment = parsed
            .fragment()
            .ok_or_else(|| PreviewerError::Fragment(format!("`{url}` has no fragment")))?;
        Self::from_fragment(fragment)
    }

    /// Accepts either a full page URL or a bare `#...` fragment.
    pub fn from_location(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.starts_with('#') {
            Self::from_fragment(location)
        } else {
            Self::from_url(location)
        }
    }

    /// Encodes the parameters the way the page expects to find them after
    /// `#`. The returned string does not include the `#`.
    pub fn to_fragment(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(utf8_percent_encode(&json, FRAGMENT_ESCAPES).to_string())
    }

    /// Checks that every line can actually be played.
    pub fn validate(&self) -> Result<()> {
        if self.lines.is_empty() {
            return Err(PreviewerError::InvalidInput(
                "preview parameters contain no lines".to_string(),
            ));
        }
        for (index, line) in self.lines.iter().enumerate() {
            line.validate(index)?;
        }
        Ok(())
    }
}

/// Percent-decodes a URI component. Unlike a lenient decoder, a `%` that is
/// not followed by two hex digits is an error.
fn decode_component(encoded: &str) -> Result<Cow<'_, str>> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    while let Some(offset) = bytes[index..].iter().position(|b| *b == b'%') {
        let start = index + offset;
        let escape = bytes.get(start + 1..start + 3);
        match escape {
            Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                index = start + 3;
            }
            _ => {
                return Err(PreviewerError::Fragment(format!(
                    "invalid percent escape at byte {start}"
                )))
            }
        }
    }

    percent_decode_str(encoded)
        .decode_utf8()
        .map_err(|err| PreviewerError::Fragment(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "lines": [
            {
                "videos": [
                    { "video": "https://cdn.example/a.mp4", "videoDuration": 4.0 },
                    { "video": "", "videoDuration": 2.0 }
                ],
                "audio": "https://cdn.example/line0.mp3",
                "audioDuration": 3.0
            }
        ]
    }"#;

    fn sample() -> PreviewParams {
        PreviewParams::new(vec![Line::new(
            vec![
                Clip::new("https://cdn.example/a.mp4", 4.0),
                Clip::placeholder(2.0),
            ],
            "https://cdn.example/line0.mp3",
            3.0,
        )])
    }

    #[test]
    fn parses_camel_case_payload() {
        let params = PreviewParams::from_json(SAMPLE).unwrap();
        assert_eq!(params, sample());
        assert!(!params.has_global_voice_over());
        assert!(params.lines[0].videos[1].is_placeholder());
        assert!((params.lines[0].total_video_duration() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn null_voice_over_means_none() {
        let json = r#"{"lines":[{"videos":[{"video":"a","videoDuration":1}],"audio":"b","audioDuration":1}],"globalVoiceOver":null}"#;
        let params = PreviewParams::from_json(json).unwrap();
        assert_eq!(params.global_voice_over, None);
    }

    #[test]
    fn decodes_fragment_with_and_without_hash() {
        let fragment = sample().with_global_voice_over("vo.mp3").to_fragment().unwrap();
        assert!(!fragment.contains('{'));
        assert!(!fragment.contains('"'));

        let bare = PreviewParams::from_fragment(&fragment).unwrap();
        let hashed = PreviewParams::from_fragment(&format!("#{fragment}")).unwrap();
        assert_eq!(bare, hashed);
        assert_eq!(bare.global_voice_over.as_deref(), Some("vo.mp3"));
    }

    #[test]
    fn decodes_from_full_url() {
        let fragment = sample().to_fragment().unwrap();
        let url = format!("https://preview.example/index.html#{fragment}");
        assert_eq!(PreviewParams::from_url(&url).unwrap(), sample());
        assert_eq!(PreviewParams::from_location(&url).unwrap(), sample());
    }

    #[test]
    fn url_without_fragment_is_rejected() {
        let err = PreviewParams::from_url("https://preview.example/index.html").unwrap_err();
        assert!(matches!(err, PreviewerError::Fragment(_)));
    }

    #[test]
    fn malformed_escape_is_rejected() {
        let err = PreviewParams::from_fragment("#%7B%2").unwrap_err();
        assert!(matches!(err, PreviewerError::Fragment(_)));

        let err = PreviewParams::from_fragment("%zz").unwrap_err();
        assert!(matches!(err, PreviewerError::Fragment(_)));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = PreviewParams::from_fragment("#%FF").unwrap_err();
        assert!(matches!(err, PreviewerError::Fragment(_)));
    }

    #[test]
    fn invalid_json_is_rejected() {
        let err = PreviewParams::from_fragment("#%7Bnot-json").unwrap_err();
        assert!(matches!(err, PreviewerError::Json(_)));
    }

    #[test]
    fn validation_names_the_offending_clip() {
        let mut params = sample();
        params.lines[0].videos[1].video_duration = 0.0;
        let err = params.validate().unwrap_err();
        assert!(format!("{err}").contains("line 0, clip 1"));
    }

    #[test]
    fn validation_rejects_empty_and_silent_lines() {
        assert!(PreviewParams::new(Vec::new()).validate().is_err());

        let mut params = sample();
        params.lines[0].videos.clear();
        assert!(format!("{}", params.validate().unwrap_err()).contains("no clips"));

        let mut params = sample();
        params.lines[0].audio_duration = f64::NAN;
        assert!(params.validate().is_err());
    }
}
