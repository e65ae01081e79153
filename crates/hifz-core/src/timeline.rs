//! Maps playback position onto the active verse and word.
//!
//! Chained queues highlight `queue[index]` and look words up in that track's
//! own segments. Whole-chapter queues look the verse up on the long
//! recording's timestamps and translate into verse-local time for words.

use crate::error::PlaybackError;
use crate::pagination::clamp_page_size;
use crate::queue::{Queue, QueueSource};
use crate::segment::{SegmentTimeline, TimeSegment, coerce_segments};
use tracing::debug;

pub const DEFAULT_PERCEPTUAL_LEAD_SECS: f64 = 0.2;
pub const MAX_PERCEPTUAL_LEAD_SECS: f64 = 1.0;
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineConfig {
    /// Added to the probe time before any lookup.
    pub perceptual_lead_secs: f64,
    pub page_size: usize,
}

impl TimelineConfig {
    pub fn new(perceptual_lead_secs: f64, page_size: usize) -> Self {
        let lead = if perceptual_lead_secs.is_finite() {
            perceptual_lead_secs.clamp(0.0, MAX_PERCEPTUAL_LEAD_SECS)
        } else {
            DEFAULT_PERCEPTUAL_LEAD_SECS
        };
        Self {
            perceptual_lead_secs: lead,
            page_size: clamp_page_size(page_size),
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PERCEPTUAL_LEAD_SECS, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Highlight {
    /// Queue index of the active verse.
    pub verse: Option<usize>,
    /// Index into that verse's display words.
    pub word: Option<usize>,
}

#[derive(Debug, Clone)]
enum Mode {
    Chained,
    Whole { verses: SegmentTimeline<usize> },
}

#[derive(Debug, Clone)]
pub struct TimelineSync {
    config: TimelineConfig,
    mode: Mode,
    /// Per queue index; chained tracks are track-local, whole verses are
    /// verse-local.
    words: Vec<SegmentTimeline<usize>>,
    word_counts: Vec<usize>,
}

impl TimelineSync {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            config,
            mode: Mode::Chained,
            words: Vec::new(),
            word_counts: Vec::new(),
        }
    }

    /// Rebuild every lookup table for `queue`.
    pub fn build(queue: &Queue, config: TimelineConfig) -> Self {
        let word_counts = queue.entries().iter().map(|e| e.words().len()).collect();
        match queue.source() {
            QueueSource::Chained => {
                let words = queue
                    .entries()
                    .iter()
                    .map(|entry| {
                        let label = format!("words {}", entry.verse_key());
                        SegmentTimeline::new(&label, tag_words(entry.word_segments()))
                    })
                    .collect();
                Self {
                    config,
                    mode: Mode::Chained,
                    words,
                    word_counts,
                }
            }
            QueueSource::SingleFile(whole) => {
                let mut words = vec![SegmentTimeline::default(); queue.len()];
                let mut spans = Vec::new();
                for timestamp in &whole.recording.timestamps {
                    let Some(index) = queue.index_of(timestamp.verse_key) else {
                        debug!(verse = %timestamp.verse_key, "Timestamp for verse outside queue");
                        continue;
                    };
                    spans.push((timestamp.segment(), index));
                    let local = timestamp
                        .segments
                        .as_deref()
                        .map(coerce_segments)
                        .unwrap_or_default();
                    if !local.is_empty() {
                        let label = format!("words {}", timestamp.verse_key);
                        words[index] = SegmentTimeline::new(&label, tag_words(&local));
                    }
                }
                Self {
                    config,
                    mode: Mode::Whole {
                        verses: SegmentTimeline::new("verses", spans),
                    },
                    words,
                    word_counts,
                }
            }
        }
    }

    /// Overlapping segments found while building, as a reportable error.
    pub fn anomaly(&self) -> Option<PlaybackError> {
        let verse_overlaps = match &self.mode {
            Mode::Whole { verses } => verses.overlaps(),
            Mode::Chained => 0,
        };
        let overlaps =
            verse_overlaps + self.words.iter().map(SegmentTimeline::overlaps).sum::<usize>();
        (overlaps > 0).then_some(PlaybackError::SegmentDataAnomaly { overlaps })
    }

    /// Start and end of a verse inside the long recording.
    pub fn verse_segment(&self, index: usize) -> Option<TimeSegment> {
        match &self.mode {
            Mode::Whole { verses } => verses.segment_of(index),
            Mode::Chained => None,
        }
    }

    pub fn has_word_timing(&self, index: usize) -> bool {
        self.words.get(index).is_some_and(|words| !words.is_empty())
    }

    /// `index` and `local` describe the current chained track; `position` is
    /// the continuous playback position.
    pub fn highlight(&self, index: usize, local: f64, position: f64) -> Highlight {
        let lead = self.config.perceptual_lead_secs;
        match &self.mode {
            Mode::Chained => {
                if index >= self.word_counts.len() {
                    return Highlight::default();
                }
                Highlight {
                    verse: Some(index),
                    word: self.word_at(index, local + lead),
                }
            }
            Mode::Whole { verses } => match verses.lookup(position + lead) {
                Some((segment, verse)) => Highlight {
                    verse: Some(verse),
                    word: self.word_at(verse, position + lead - segment.start),
                },
                None => Highlight::default(),
            },
        }
    }

    fn word_at(&self, index: usize, t: f64) -> Option<usize> {
        let count = self.word_counts.get(index).copied().unwrap_or(0);
        if count == 0 {
            return None;
        }
        self.words
            .get(index)?
            .lookup(t)
            .map(|(_, word)| word.min(count - 1))
    }
}

fn tag_words(segments: &[TimeSegment]) -> Vec<(TimeSegment, usize)> {
    segments
        .iter()
        .enumerate()
        .map(|(word, segment)| (*segment, word))
        .collect()
}
