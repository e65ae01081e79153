//! Queue assembly: verse records plus a playback scope become an ordered,
//! immutable list of playable entries.

use crate::entry::{ChapterRecording, PlayableEntry, VerseRecord, resolve_audio_url};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};
use ts_rs::TS;

/// What the learner asked to hear.
#[derive(Debug, Clone)]
pub enum PlaybackScope {
    /// A fixed verse slice, one short recording per verse.
    Range { from: u32, to: u32 },
    /// One long recording spanning the chapter.
    Whole(ChapterRecording),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ScopeKind {
    Range,
    Whole,
}

impl ScopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Range => "range",
            ScopeKind::Whole => "whole",
        }
    }
}

/// The single source backing a whole-chapter queue.
#[derive(Debug, Clone)]
pub struct WholeRecording {
    pub audio_url: String,
    pub duration_secs: f64,
    pub recording: ChapterRecording,
}

#[derive(Debug, Clone)]
pub enum QueueSource {
    /// Each entry is its own track.
    Chained,
    /// Entries are a display breakdown of one long track.
    SingleFile(WholeRecording),
}

#[derive(Debug, Clone)]
pub struct Queue {
    source: QueueSource,
    entries: Vec<PlayableEntry>,
    identity: String,
}

impl Default for Queue {
    fn default() -> Self {
        Self::from_parts(QueueSource::Chained, Vec::new())
    }
}

impl Queue {
    fn from_parts(source: QueueSource, entries: Vec<PlayableEntry>) -> Self {
        let kind = match source {
            QueueSource::Chained => ScopeKind::Range,
            QueueSource::SingleFile(_) => ScopeKind::Whole,
        };
        let keys: Vec<String> = entries.iter().map(|e| e.verse_key().to_string()).collect();
        let identity = format!("{}:{}", kind.as_str(), keys.join("|"));
        Self {
            source,
            entries,
            identity,
        }
    }

    pub fn source(&self) -> &QueueSource {
        &self.source
    }

    pub fn kind(&self) -> ScopeKind {
        match self.source {
            QueueSource::Chained => ScopeKind::Range,
            QueueSource::SingleFile(_) => ScopeKind::Whole,
        }
    }

    pub fn entries(&self) -> &[PlayableEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PlayableEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scope tag plus the ordered verse keys; a change means a reset.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn index_of(&self, key: crate::entry::VerseKey) -> Option<usize> {
        self.entries.iter().position(|e| e.verse_key() == key)
    }

    /// Cumulative nominal start of the track at `index` in chained mode.
    pub fn nominal_start(&self, index: usize) -> f64 {
        self.entries
            .iter()
            .take(index)
            .map(PlayableEntry::duration_secs)
            .sum()
    }

    /// Best known total duration of the queue, 0 when unknown.
    pub fn total_duration(&self) -> f64 {
        let summed: f64 = self.entries.iter().map(PlayableEntry::duration_secs).sum();
        match &self.source {
            QueueSource::Chained => summed,
            QueueSource::SingleFile(whole) => {
                let timeline_end = whole
                    .recording
                    .timestamps
                    .iter()
                    .map(|ts| ts.segment().end)
                    .fold(0.0_f64, f64::max);
                whole.duration_secs.max(timeline_end).max(summed)
            }
        }
    }
}

/// Clamp a requested verse range to `[1, verses_count]` with `to >= from`.
pub fn clamp_range(from: u32, to: u32, verses_count: u32) -> (u32, u32) {
    let max = verses_count.max(1);
    let from = from.clamp(1, max);
    let to = to.clamp(from, max);
    (from, to)
}

/// Build the queue for `scope`. Verses without audio are dropped; chapter
/// order is preserved. An empty result is a valid "no audio" queue.
pub fn assemble(records: &[VerseRecord], scope: &PlaybackScope, base_url: &str) -> Queue {
    let mut ordered: Vec<&VerseRecord> = records.iter().collect();
    ordered.sort_by_key(|record| (record.verse_key, record.order_in_chapter));

    let queue = match scope {
        PlaybackScope::Range { from, to } => {
            let entries = ordered
                .into_iter()
                .filter(|record| (*from..=*to).contains(&record.order_in_chapter))
                .filter_map(|record| {
                    let url = resolve_audio_url(record.audio_url.as_deref().unwrap_or(""), base_url);
                    if url.is_empty() {
                        debug!(verse = %record.verse_key, "Skipping verse without audio");
                        return None;
                    }
                    Some(PlayableEntry::from_record(record, url, base_url))
                })
                .collect();
            Queue::from_parts(QueueSource::Chained, entries)
        }
        PlaybackScope::Whole(recording) => {
            let audio_url =
                resolve_audio_url(recording.audio_url.as_deref().unwrap_or(""), base_url);
            if audio_url.is_empty() {
                info!("Whole-chapter scope has no recording; queue is empty");
                Queue::from_parts(
                    QueueSource::SingleFile(WholeRecording {
                        audio_url,
                        duration_secs: 0.0,
                        recording: recording.clone(),
                    }),
                    Vec::new(),
                )
            } else {
                let timed: HashSet<_> = recording.timestamps.iter().map(|ts| ts.verse_key).collect();
                let entries = ordered
                    .into_iter()
                    .filter_map(|record| {
                        let url =
                            resolve_audio_url(record.audio_url.as_deref().unwrap_or(""), base_url);
                        if url.is_empty() && !timed.contains(&record.verse_key) {
                            return None;
                        }
                        Some(PlayableEntry::from_record(record, url, base_url))
                    })
                    .collect();
                let duration_secs = recording
                    .duration_seconds
                    .filter(|secs| secs.is_finite() && *secs > 0.0)
                    .unwrap_or(0.0);
                Queue::from_parts(
                    QueueSource::SingleFile(WholeRecording {
                        audio_url,
                        duration_secs,
                        recording: recording.clone(),
                    }),
                    entries,
                )
            }
        }
    };

    info!(
        scope = queue.kind().as_str(),
        entries = queue.len(),
        total_secs = queue.total_duration(),
        "Assembled playback queue"
    );
    queue
}
