//! Chapter bundles: the verse list and optional whole-chapter recording
//! exported by the content client.

use crate::fetch::read_location;
use anyhow::{Context, Result, anyhow};
use hifz_core::entry::{ChapterRecording, VerseRecord};
use hifz_core::queue::{PlaybackScope, clamp_range};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterBundle {
    pub chapter: u16,
    #[serde(default)]
    pub verses: Vec<VerseRecord>,
    #[serde(default)]
    pub chapter_audio: Option<ChapterRecording>,
}

/// Which part of the bundle to play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeRequest {
    pub from: Option<u32>,
    pub to: Option<u32>,
    pub whole: bool,
}

pub fn load_bundle(client: &Client, location: &str) -> Result<ChapterBundle> {
    let bytes = read_location(client, location)?;
    let bundle = parse_bundle(&bytes).with_context(|| format!("Parsing bundle {location}"))?;
    info!(
        chapter = bundle.chapter,
        verses = bundle.verses.len(),
        whole = bundle.chapter_audio.is_some(),
        "Loaded chapter bundle"
    );
    Ok(bundle)
}

pub fn parse_bundle(bytes: &[u8]) -> Result<ChapterBundle> {
    Ok(serde_json::from_slice(bytes)?)
}

impl ChapterBundle {
    pub fn scope(&self, request: ScopeRequest) -> Result<PlaybackScope> {
        if request.whole {
            let recording = self
                .chapter_audio
                .clone()
                .ok_or_else(|| anyhow!("Chapter {} has no whole-chapter recording", self.chapter))?;
            return Ok(PlaybackScope::Whole(recording));
        }
        let last = self
            .verses
            .iter()
            .map(|verse| verse.order_in_chapter)
            .max()
            .unwrap_or(1);
        let (from, to) = clamp_range(request.from.unwrap_or(1), request.to.unwrap_or(last), last);
        Ok(PlaybackScope::Range { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"{
        "chapter": 112,
        "verses": [
            {"verseKey": "112:1", "orderInChapter": 1, "text": "qul huwa", "audioUrl": "112001.mp3", "durationSeconds": 3.5},
            {"verseKey": "112:2", "orderInChapter": 2, "text": "allahu", "audioUrl": "112002.mp3"},
            {"verseKey": "112:3", "orderInChapter": 3, "text": "lam yalid"}
        ],
        "chapterAudio": {
            "audioUrl": "112.mp3",
            "durationSeconds": 14.0,
            "timestamps": [{"verseKey": "112:1", "fromMs": 0, "toMs": 3500}]
        }
    }"#;

    #[test]
    fn parses_camel_case_bundle() {
        let bundle = parse_bundle(BUNDLE.as_bytes()).unwrap();
        assert_eq!(bundle.chapter, 112);
        assert_eq!(bundle.verses.len(), 3);
        assert_eq!(bundle.verses[0].duration_seconds, Some(3.5));
        assert!(bundle.verses[2].audio_url.is_none());
        let audio = bundle.chapter_audio.unwrap();
        assert_eq!(audio.timestamps.len(), 1);
    }

    #[test]
    fn range_scope_defaults_to_whole_chapter_span() {
        let bundle = parse_bundle(BUNDLE.as_bytes()).unwrap();
        let scope = bundle.scope(ScopeRequest::default()).unwrap();
        assert!(matches!(scope, PlaybackScope::Range { from: 1, to: 3 }));

        let scope = bundle
            .scope(ScopeRequest {
                from: Some(2),
                ..ScopeRequest::default()
            })
            .unwrap();
        assert!(matches!(scope, PlaybackScope::Range { from: 2, to: 3 }));

        let scope = bundle
            .scope(ScopeRequest {
                from: Some(3),
                to: Some(99),
                whole: false,
            })
            .unwrap();
        assert!(matches!(scope, PlaybackScope::Range { from: 3, to: 3 }));
    }

    #[test]
    fn whole_scope_requires_recording() {
        let mut bundle = parse_bundle(BUNDLE.as_bytes()).unwrap();
        let request = ScopeRequest {
            whole: true,
            ..ScopeRequest::default()
        };
        assert!(matches!(
            bundle.scope(request).unwrap(),
            PlaybackScope::Whole(_)
        ));
        bundle.chapter_audio = None;
        assert!(bundle.scope(request).is_err());
    }
}
