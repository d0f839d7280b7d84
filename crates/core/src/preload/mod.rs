use std::collections::HashSet;

use serde::Serialize;

use crate::PreviewParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Video,
    LineAudio,
    VoiceOver,
}

/// One asset the page fetches ahead of playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreloadEntry {
    pub kind: AssetKind,
    pub url: String,
    pub line: Option<usize>,
    pub clip: Option<usize>,
}

/// Assets listed in the order playback first needs them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreloadManifest {
    entries: Vec<PreloadEntry>,
}

impl PreloadManifest {
    pub fn build(params: &PreviewParams) -> Self {
        let mut entries = Vec::new();

        if let Some(url) = &params.global_voice_over {
            entries.push(PreloadEntry {
                kind: AssetKind::VoiceOver,
                url: url.clone(),
                line: None,
                clip: None,
            });
        }

        for (line_index, line) in params.lines.iter().enumerate() {
            entries.extend(
                line.videos
                    .iter()
                    .enumerate()
                    .filter(|(_, clip)| !clip.is_placeholder())
                    .map(|(clip_index, clip)| PreloadEntry {
                        kind: AssetKind::Video,
                        url: clip.video.clone(),
                        line: Some(line_index),
                        clip: Some(clip_index),
                    }),
            );
            if !params.has_global_voice_over() {
                entries.push(PreloadEntry {
                    kind: AssetKind::LineAudio,
                    url: line.audio.clone(),
                    line: Some(line_index),
                    clip: None,
                });
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[PreloadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct URLs, first occurrence wins.
    pub fn urls(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|entry| entry.url.as_str())
            .filter(|url| seen.insert(*url))
            .collect()
    }
}
