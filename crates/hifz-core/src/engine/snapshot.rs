use super::RecitationEngine;
use crate::pagination::{page_for_index, total_pages};
use crate::queue::ScopeKind;
use crate::text_utils::{format_clock, format_duration};
use crate::transport::TransportState;
use serde::Serialize;
use ts_rs::TS;

const NO_AUDIO_MESSAGE: &str = "No audio available for this selection.";

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WordView {
    pub key: String,
    pub text: String,
    pub has_audio: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EntryView {
    pub verse_key: String,
    pub order: u32,
    pub text: String,
    pub duration: Option<f64>,
    pub has_word_timing: bool,
    pub failed: bool,
    pub words: Vec<WordView>,
}

/// Everything a UI needs to render the player.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayerSnapshot {
    pub scope: ScopeKind,
    pub entries: Vec<EntryView>,
    pub index: usize,
    pub transport: TransportState,
    pub is_playing: bool,
    pub position: f64,
    pub displayed_position: f64,
    pub duration: Option<f64>,
    pub progress: f64,
    pub looping: bool,
    pub scrubbing: bool,
    pub active_verse_key: Option<String>,
    pub active_word_index: Option<usize>,
    pub active_word_key: Option<String>,
    pub playing_word_key: Option<String>,
    pub page: usize,
    pub page_count: usize,
    pub disabled: bool,
    pub status_message: Option<String>,
    pub label: String,
    pub position_text: String,
    pub duration_text: String,
}

impl RecitationEngine {
    pub fn snapshot(&self) -> PlayerSnapshot {
        let queue = &self.queue;
        let highlight = self.highlight;
        let index = self.current_index();
        let position = self.position();
        let displayed_position = self.displayed_position();
        let duration = Some(self.duration()).filter(|secs| *secs > 0.0);
        let progress = duration.map_or(0.0, |total| (displayed_position / total).clamp(0.0, 1.0));

        let entries = queue
            .entries()
            .iter()
            .enumerate()
            .map(|(idx, entry)| EntryView {
                verse_key: entry.verse_key().to_string(),
                order: entry.order(),
                text: entry.text().to_string(),
                duration: Some(entry.duration_secs()).filter(|secs| *secs > 0.0),
                has_word_timing: self.timeline.has_word_timing(idx),
                failed: self.cursor.is_failed(idx)
                    || (idx == index
                        && self.transport.state() == TransportState::Failed),
                words: entry
                    .words()
                    .iter()
                    .map(|word| WordView {
                        key: word.key.clone(),
                        text: word.text.clone(),
                        has_audio: word.audio_url.is_some(),
                    })
                    .collect(),
            })
            .collect();

        let active = highlight.verse.and_then(|idx| queue.get(idx));
        let active_word_key = active.zip(highlight.word).and_then(|(entry, word)| {
            entry.words().get(word).map(|token| token.key.clone())
        });
        let labelled = active.or_else(|| match queue.kind() {
            ScopeKind::Range => queue.get(index),
            ScopeKind::Whole => None,
        });
        let label = if queue.is_empty() {
            "No audio queued".to_string()
        } else {
            format!(
                "Ayah {} of {}",
                labelled.map_or(0, |entry| entry.order()),
                queue.len()
            )
        };

        let page_size = self.pages.page_size();
        let page = self
            .pages
            .current()
            .unwrap_or_else(|| page_for_index(highlight.verse.unwrap_or(0), page_size));

        let status_message = if queue.is_empty() {
            Some(NO_AUDIO_MESSAGE.to_string())
        } else {
            self.transport
                .failure()
                .or(self.last_error.as_ref())
                .map(ToString::to_string)
        };

        PlayerSnapshot {
            scope: queue.kind(),
            entries,
            index,
            transport: self.transport.state(),
            is_playing: self.transport.is_playing(),
            position,
            displayed_position,
            duration,
            progress,
            looping: self.transport.looping(),
            scrubbing: self.scrub.is_dragging(),
            active_verse_key: active.map(|entry| entry.verse_key().to_string()),
            active_word_index: highlight.word,
            active_word_key,
            playing_word_key: self.words.playing_key().map(str::to_string),
            page,
            page_count: total_pages(queue.len(), page_size),
            disabled: queue.is_empty() || self.transport.state() == TransportState::Failed,
            status_message,
            label,
            position_text: format_clock(displayed_position),
            duration_text: format_duration(duration),
        }
    }
}
