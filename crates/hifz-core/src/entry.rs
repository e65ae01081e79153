//! Verse records from the content client and the playable entries built
//! from them.

use crate::error::VerseKeyError;
use crate::segment::{TimeSegment, coerce_segments};
use crate::text_utils::split_words;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `chapter:verse` identity, ordered by chapter then verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VerseKey {
    pub chapter: u16,
    pub verse: u16,
}

impl VerseKey {
    pub fn new(chapter: u16, verse: u16) -> Self {
        Self { chapter, verse }
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)
    }
}

impl FromStr for VerseKey {
    type Err = VerseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (chapter, verse) = trimmed
            .split_once(':')
            .ok_or_else(|| VerseKeyError::Malformed(trimmed.to_string()))?;
        let parse = |part: &str| -> Result<u16, VerseKeyError> {
            let value: u16 = part
                .trim()
                .parse()
                .map_err(|_| VerseKeyError::Malformed(trimmed.to_string()))?;
            if value == 0 {
                return Err(VerseKeyError::OutOfRange(trimmed.to_string()));
            }
            Ok(value)
        };
        Ok(Self {
            chapter: parse(chapter)?,
            verse: parse(verse)?,
        })
    }
}

impl Serialize for VerseKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VerseKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One word as delivered by the content client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordRecord {
    pub id: u64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// One verse as delivered by the content client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerseRecord {
    pub verse_key: VerseKey,
    #[serde(alias = "order")]
    pub order_in_chapter: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    /// Word-level `[start, end]` pairs local to this verse's own audio.
    #[serde(default)]
    pub segments: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub words: Vec<WordRecord>,
}

/// Verse-level timing inside a whole-chapter recording.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerseTimestamp {
    pub verse_key: VerseKey,
    pub from_ms: f64,
    pub to_ms: f64,
    /// Word-level `[start, end]` pairs in seconds, local to the verse start.
    #[serde(default)]
    pub segments: Option<Vec<Vec<f64>>>,
}

impl VerseTimestamp {
    pub fn segment(&self) -> TimeSegment {
        TimeSegment::new(self.from_ms / 1000.0, self.to_ms / 1000.0)
    }
}

/// A single long recording covering the entire chapter.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecording {
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub timestamps: Vec<VerseTimestamp>,
}

/// A word ready for display, optionally tappable for pronunciation.
#[derive(Debug, Clone, PartialEq)]
pub struct WordToken {
    pub key: String,
    pub text: String,
    pub audio_url: Option<String>,
}

/// The unit the engine plays and highlights. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableEntry {
    verse_key: VerseKey,
    order: u32,
    text: String,
    audio_url: String,
    duration_secs: f64,
    word_segments: Vec<TimeSegment>,
    words: Vec<WordToken>,
}

impl PlayableEntry {
    /// Build from a record; `audio_url` must already be resolved (or empty).
    pub fn from_record(record: &VerseRecord, audio_url: String, base_url: &str) -> Self {
        let duration_secs = record
            .duration_seconds
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .unwrap_or(0.0);
        Self {
            verse_key: record.verse_key,
            order: record.order_in_chapter,
            text: record.text.clone(),
            audio_url,
            duration_secs,
            word_segments: record
                .segments
                .as_deref()
                .map(coerce_segments)
                .unwrap_or_default(),
            words: build_words(record, base_url),
        }
    }

    pub fn verse_key(&self) -> VerseKey {
        self.verse_key
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn audio_url(&self) -> &str {
        &self.audio_url
    }

    pub fn has_audio(&self) -> bool {
        !self.audio_url.is_empty()
    }

    /// Authoritative duration if known, else 0.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn word_segments(&self) -> &[TimeSegment] {
        &self.word_segments
    }

    pub fn words(&self) -> &[WordToken] {
        &self.words
    }
}

fn build_words(record: &VerseRecord, base_url: &str) -> Vec<WordToken> {
    let listed: Vec<WordToken> = record
        .words
        .iter()
        .filter(|word| !word.text.trim().is_empty())
        .map(|word| WordToken {
            key: format!("{}-{}", record.verse_key, word.id),
            text: word.text.trim().to_string(),
            audio_url: word
                .audio_url
                .as_deref()
                .map(|url| resolve_audio_url(url, base_url))
                .filter(|url| !url.is_empty()),
        })
        .collect();
    if !listed.is_empty() {
        return listed;
    }
    split_words(&record.text)
        .into_iter()
        .enumerate()
        .map(|(idx, text)| WordToken {
            key: format!("{}-w{}", record.verse_key, idx + 1),
            text,
            audio_url: None,
        })
        .collect()
}

/// Resolve an audio reference to an absolute address. Blank input resolves
/// to an empty string, meaning "no audio".
pub fn resolve_audio_url(raw: &str, base_url: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if trimmed.contains("://") || base_url.trim().is_empty() {
        return trimmed.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim().trim_end_matches('/'),
        trimmed.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> VerseRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn verse_key_parsing_and_order() {
        let key: VerseKey = "2:255".parse().unwrap();
        assert_eq!(key, VerseKey::new(2, 255));
        assert_eq!(key.to_string(), "2:255");
        assert!(VerseKey::new(2, 9) < VerseKey::new(2, 10));
        assert!(VerseKey::new(1, 7) < VerseKey::new(2, 1));
        assert!(matches!(
            "2-255".parse::<VerseKey>(),
            Err(VerseKeyError::Malformed(_))
        ));
        assert!(matches!(
            "0:1".parse::<VerseKey>(),
            Err(VerseKeyError::OutOfRange(_))
        ));
    }

    #[test]
    fn deserializes_content_client_shape() {
        let rec = record(
            r#"{
                "verseKey": "1:2",
                "orderInChapter": 2,
                "text": "alhamdu lillahi",
                "audioUrl": "Alafasy/mp3/001002.mp3",
                "durationSeconds": 4.5,
                "segments": [[0, 1.2], [1.2, 2.8], [3]],
                "words": [
                    {"id": 10, "text": "alhamdu", "audioUrl": "wbw/001_002_001.mp3"},
                    {"id": 11, "text": " "},
                    {"id": 12, "text": "lillahi"}
                ]
            }"#,
        );
        let entry = PlayableEntry::from_record(
            &rec,
            resolve_audio_url(rec.audio_url.as_deref().unwrap_or(""), "https://cdn.test"),
            "https://cdn.test/",
        );
        assert_eq!(entry.verse_key(), VerseKey::new(1, 2));
        assert_eq!(entry.audio_url(), "https://cdn.test/Alafasy/mp3/001002.mp3");
        assert_eq!(entry.word_segments().len(), 2);
        assert_eq!(entry.words().len(), 2);
        assert_eq!(entry.words()[0].key, "1:2-10");
        assert_eq!(
            entry.words()[0].audio_url.as_deref(),
            Some("https://cdn.test/wbw/001_002_001.mp3")
        );
        assert_eq!(entry.words()[1].audio_url, None);
    }

    #[test]
    fn words_fall_back_to_text_split() {
        let rec = record(r#"{"verseKey": "1:1", "orderInChapter": 1, "text": "a b  c"}"#);
        let entry = PlayableEntry::from_record(&rec, String::new(), "");
        let texts: Vec<&str> = entry.words().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert!(!entry.has_audio());
        assert_eq!(entry.duration_secs(), 0.0);
    }

    #[test]
    fn audio_url_resolution() {
        assert_eq!(resolve_audio_url("  ", "https://x"), "");
        assert_eq!(resolve_audio_url("//cdn/a.mp3", ""), "https://cdn/a.mp3");
        assert_eq!(resolve_audio_url("http://h/a.mp3", "https://x"), "http://h/a.mp3");
        assert_eq!(resolve_audio_url("/a.mp3", "https://x/"), "https://x/a.mp3");
        assert_eq!(resolve_audio_url("a.mp3", ""), "a.mp3");
    }
}
