//! Gapless continuation across a chain of short per-verse tracks.
//!
//! The cursor owns the queue index and the time completed before the current
//! track. On a natural end the next source is loaded and played at once; the
//! finished track is only reported once that play request settles. A hand-off
//! is tracked by the play token it issued, so a late outcome for an older
//! swap cannot commit anything.

use crate::error::PlaybackError;
use crate::media::{MediaCommand, PlayToken};
use crate::queue::Queue;
use crate::transport::{PlaySettlement, Transport};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handoff {
    pub token: PlayToken,
    pub from: usize,
    pub to: usize,
    /// Seconds credited for the track at `from`.
    pub completed: f64,
    prior_elapsed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// Next track is loaded and playing.
    HandedOff { commands: Vec<MediaCommand>, from: usize, to: usize },
    /// The only track starts over.
    Repeated { commands: Vec<MediaCommand>, completed: f64 },
    /// Nothing left to play; the transport rests paused at the end.
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandoffResolution {
    Committed {
        index: usize,
        completed: f64,
        preload: Option<MediaCommand>,
    },
    /// The next track did not start; the previous one is restored, parked
    /// at its end.
    FellBack {
        commands: Vec<MediaCommand>,
        failed: Option<(usize, PlaybackError)>,
    },
    Dropped,
}

#[derive(Debug, Clone, Default)]
pub struct ChainCursor {
    index: usize,
    elapsed: f64,
    handoff: Option<Handoff>,
    finished: bool,
    failed: BTreeSet<usize>,
}

impl ChainCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Seconds completed before the current track.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn handoff(&self) -> Option<&Handoff> {
        self.handoff.as_ref()
    }

    pub fn in_handoff(&self) -> bool {
        self.handoff.is_some()
    }

    /// The last track ended and nothing followed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.contains(&index)
    }

    pub fn mark_failed(&mut self, index: usize) {
        self.failed.insert(index);
    }

    pub fn clear_failed(&mut self, index: usize) {
        self.failed.remove(&index);
    }

    pub fn position(&self, transport: &Transport) -> f64 {
        self.elapsed + transport.local_time()
    }

    /// Sum of nominal durations, letting the current track's media
    /// duration stretch its share.
    pub fn duration(&self, queue: &Queue, transport: &Transport) -> f64 {
        queue
            .entries()
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                if idx == self.index {
                    entry.duration_secs().max(transport.duration())
                } else {
                    entry.duration_secs()
                }
            })
            .sum()
    }

    /// Swap to `index`, keeping whether the transport was playing.
    pub fn jump(&mut self, queue: &Queue, index: usize, transport: &mut Transport) -> Vec<MediaCommand> {
        let Some(entry) = queue.get(index) else {
            debug!(index, len = queue.len(), "Jump outside queue ignored");
            return Vec::new();
        };
        let was_playing = transport.is_playing() || self.handoff.is_some();
        self.index = index;
        self.elapsed = queue.nominal_start(index);
        self.handoff = None;
        self.finished = false;
        self.failed.remove(&index);
        let mut commands = transport.load(entry.audio_url(), entry.duration_secs());
        if was_playing {
            commands.extend(transport.play());
        }
        commands
    }

    /// Pause and rewind the whole chain to the first track.
    pub fn stop(&mut self, queue: &Queue, transport: &mut Transport) -> Vec<MediaCommand> {
        let mut commands = transport.stop();
        if self.index != 0 || self.handoff.is_some() {
            commands.extend(self.jump(queue, 0, transport));
        }
        self.elapsed = 0.0;
        self.finished = false;
        commands
    }

    /// Before playing again after the chain finished: a finished queue
    /// starts over from the first track.
    pub fn rewind_if_finished(&mut self, queue: &Queue, transport: &mut Transport) -> Vec<MediaCommand> {
        if !self.finished {
            return Vec::new();
        }
        self.finished = false;
        if self.index + 1 >= queue.len() && self.index != 0 {
            info!(from = self.index, "Queue finished earlier; restarting from first track");
            return self.jump(queue, 0, transport);
        }
        Vec::new()
    }

    /// Seek on the cumulative clock by choosing the track that holds
    /// `target` and seeking inside it.
    pub fn seek(&mut self, queue: &Queue, transport: &mut Transport, target: f64) -> Vec<MediaCommand> {
        let total = self.duration(queue, transport);
        if queue.is_empty() || total <= 0.0 || !target.is_finite() {
            debug!(target, total, "Chained seek ignored");
            return Vec::new();
        }
        let target = target.clamp(0.0, total);
        let (track, start) = self.track_at(queue, transport, target);
        let mut commands = Vec::new();
        if track != self.index || self.handoff.is_some() {
            commands.extend(self.jump(queue, track, transport));
        } else {
            self.elapsed = start;
            self.finished = false;
        }
        commands.extend(transport.seek(target - start));
        commands
    }

    fn track_at(&self, queue: &Queue, transport: &Transport, target: f64) -> (usize, f64) {
        let mut start = 0.0;
        let mut fallback = (0, 0.0);
        for (idx, entry) in queue.entries().iter().enumerate() {
            let width = if idx == self.index {
                entry.duration_secs().max(transport.duration())
            } else {
                entry.duration_secs()
            };
            if target >= start && target < start + width {
                return (idx, start);
            }
            if start <= target {
                fallback = (idx, start);
            }
            start += entry.duration_secs();
        }
        fallback
    }

    /// React to the transport's natural end. Call after
    /// [`Transport::on_ended`].
    pub fn on_track_ended(&mut self, queue: &Queue, transport: &mut Transport) -> Continuation {
        let nominal = queue.get(self.index).map_or(0.0, |e| e.duration_secs());
        let completed = transport.local_time().max(nominal);
        let len = queue.len();
        let next = if self.index + 1 < len {
            Some(self.index + 1)
        } else if transport.looping() && len > 1 {
            Some(0)
        } else {
            None
        };

        let Some(to) = next else {
            if transport.looping() && len == 1 {
                info!(completed, "Repeating single track");
                return Continuation::Repeated {
                    commands: transport.restart(),
                    completed,
                };
            }
            info!(index = self.index, "Queue finished");
            self.finished = true;
            return Continuation::Finished;
        };
        let Some(entry) = queue.get(to) else {
            self.finished = true;
            return Continuation::Finished;
        };

        let from = self.index;
        let prior_elapsed = self.elapsed;
        self.index = to;
        self.elapsed = if to == 0 { 0.0 } else { prior_elapsed + completed };
        self.finished = false;
        let mut commands = transport.load(entry.audio_url(), entry.duration_secs());
        commands.extend(transport.play());
        let Some(token) = transport.pending_play() else {
            warn!(from, to, "Next track could not be started");
            self.index = from;
            self.elapsed = prior_elapsed;
            self.finished = true;
            return Continuation::Finished;
        };
        info!(from, to, completed, wrap = to == 0, "Handing off to next track");
        self.handoff = Some(Handoff {
            token,
            from,
            to,
            completed,
            prior_elapsed,
        });
        Continuation::HandedOff { commands, from, to }
    }

    /// Apply a settled play request that may belong to the hand-off.
    pub fn on_play_settled(
        &mut self,
        token: PlayToken,
        settlement: &PlaySettlement,
        queue: &Queue,
        transport: &mut Transport,
        preload_next: bool,
    ) -> HandoffResolution {
        let Some(handoff) = self.handoff else {
            return HandoffResolution::Dropped;
        };
        if handoff.token != token {
            return HandoffResolution::Dropped;
        }
        match settlement {
            PlaySettlement::Started => {
                self.handoff = None;
                let preload = if preload_next {
                    preload_after(queue, handoff.to)
                } else {
                    None
                };
                HandoffResolution::Committed {
                    index: handoff.from,
                    completed: handoff.completed,
                    preload,
                }
            }
            // Paused or aborted before settling: the swap already happened,
            // so the finished track still counts.
            PlaySettlement::Ignored => {
                self.handoff = None;
                debug!(from = handoff.from, to = handoff.to, "Hand-off settled while paused");
                HandoffResolution::Committed {
                    index: handoff.from,
                    completed: handoff.completed,
                    preload: None,
                }
            }
            PlaySettlement::Rejected(_) => self.fall_back(queue, transport, None),
            PlaySettlement::Failed(error) => self.fall_back(queue, transport, Some(error.clone())),
        }
    }

    /// Abandon an in-flight hand-off because the new source failed.
    pub fn fail_handoff(
        &mut self,
        queue: &Queue,
        transport: &mut Transport,
        error: PlaybackError,
    ) -> HandoffResolution {
        if self.handoff.is_none() {
            return HandoffResolution::Dropped;
        }
        self.fall_back(queue, transport, Some(error))
    }

    fn fall_back(
        &mut self,
        queue: &Queue,
        transport: &mut Transport,
        error: Option<PlaybackError>,
    ) -> HandoffResolution {
        let Some(handoff) = self.handoff.take() else {
            return HandoffResolution::Dropped;
        };
        warn!(
            from = handoff.from,
            to = handoff.to,
            ?error,
            "Next track did not start; stopping at end of previous track"
        );
        let failed = error.filter(PlaybackError::disables_track).map(|error| {
            self.failed.insert(handoff.to);
            (handoff.to, error)
        });
        self.index = handoff.from;
        self.elapsed = handoff.prior_elapsed;
        self.finished = true;
        let mut commands = Vec::new();
        if let Some(entry) = queue.get(handoff.from) {
            commands.extend(transport.load(entry.audio_url(), entry.duration_secs()));
            commands.push(transport.hold_at_end(handoff.completed));
        }
        HandoffResolution::FellBack { commands, failed }
    }
}

/// Warm-up hint for the track after `index`.
pub fn preload_after(queue: &Queue, index: usize) -> Option<MediaCommand> {
    queue
        .get(index + 1)
        .filter(|entry| entry.has_audio())
        .map(|entry| MediaCommand::Preload {
            source: entry.audio_url().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{VerseKey, VerseRecord};
    use crate::error::MediaFailure;
    use crate::queue::{PlaybackScope, assemble};

    fn queue(durations: &[f64]) -> Queue {
        let records: Vec<VerseRecord> = durations
            .iter()
            .enumerate()
            .map(|(idx, secs)| VerseRecord {
                verse_key: VerseKey::new(1, idx as u16 + 1),
                order_in_chapter: idx as u32 + 1,
                text: String::new(),
                audio_url: Some(format!("url{}", idx + 1)),
                duration_seconds: Some(*secs),
                segments: None,
                words: Vec::new(),
            })
            .collect();
        assemble(
            &records,
            &PlaybackScope::Range {
                from: 1,
                to: durations.len() as u32,
            },
            "",
        )
    }

    fn started(queue: &Queue) -> (ChainCursor, Transport) {
        let cursor = ChainCursor::new();
        let mut transport = Transport::new();
        let first = queue.get(0).unwrap();
        transport.load(first.audio_url(), first.duration_secs());
        let token = transport.play().into_iter().find_map(|c| match c {
            MediaCommand::Play { token } => Some(token),
            _ => None,
        });
        transport.on_play_settled(token.unwrap(), Ok(()));
        (cursor, transport)
    }

    fn end_track(cursor: &mut ChainCursor, queue: &Queue, transport: &mut Transport, last_local: f64) -> Continuation {
        transport.on_time_update(last_local);
        transport.on_ended();
        cursor.on_track_ended(queue, transport)
    }

    #[test]
    fn hands_off_with_swap_before_play() {
        let q = queue(&[3.0, 4.0]);
        let (mut cursor, mut transport) = started(&q);
        let Continuation::HandedOff { commands, from, to } = end_track(&mut cursor, &q, &mut transport, 2.9) else {
            panic!("expected hand-off");
        };
        assert_eq!((from, to), (0, 1));
        assert_eq!(commands[0], MediaCommand::Pause);
        assert!(matches!(&commands[1], MediaCommand::Load { source, .. } if source == "url2"));
        assert!(matches!(commands[2], MediaCommand::Play { .. }));
        assert!((cursor.position(&transport) - 3.0).abs() < 1e-9);

        let token = transport.pending_play().unwrap();
        let settlement = transport.on_play_settled(token, Ok(()));
        let resolution = cursor.on_play_settled(token, &settlement, &q, &mut transport, true);
        assert_eq!(
            resolution,
            HandoffResolution::Committed {
                index: 0,
                completed: 3.0,
                preload: None
            }
        );
        assert!(!cursor.in_handoff());
    }

    #[test]
    fn pause_before_handoff_settles_still_commits() {
        let q = queue(&[3.0, 4.0]);
        let (mut cursor, mut transport) = started(&q);
        end_track(&mut cursor, &q, &mut transport, 3.0);
        let token = transport.pending_play().unwrap();
        transport.pause();

        let settlement = transport.on_play_settled(token, Err(MediaFailure::Aborted));
        assert_eq!(settlement, PlaySettlement::Ignored);
        assert_eq!(
            cursor.on_play_settled(token, &settlement, &q, &mut transport, true),
            HandoffResolution::Committed {
                index: 0,
                completed: 3.0,
                preload: None
            }
        );
        assert!(!cursor.in_handoff());
        assert_eq!(cursor.index(), 1);
        assert!(!transport.is_playing());

        let again = transport.on_play_settled(token, Ok(()));
        assert_eq!(
            cursor.on_play_settled(token, &again, &q, &mut transport, true),
            HandoffResolution::Dropped
        );
    }

    #[test]
    fn completed_duration_prefers_longer_observation() {
        let q = queue(&[3.0, 4.0, 5.0]);
        let (mut cursor, mut transport) = started(&q);
        end_track(&mut cursor, &q, &mut transport, 3.4);
        assert!((cursor.handoff().unwrap().completed - 3.4).abs() < 1e-9);
        assert!((cursor.elapsed() - 3.4).abs() < 1e-9);
    }

    #[test]
    fn last_track_finishes_at_cumulative_end() {
        let q = queue(&[3.0, 4.0]);
        let (mut cursor, mut transport) = started(&q);
        end_track(&mut cursor, &q, &mut transport, 3.0);
        let token = transport.pending_play().unwrap();
        let settlement = transport.on_play_settled(token, Ok(()));
        cursor.on_play_settled(token, &settlement, &q, &mut transport, true);

        assert_eq!(end_track(&mut cursor, &q, &mut transport, 3.8), Continuation::Finished);
        assert_eq!(cursor.index(), 1);
        assert!((cursor.position(&transport) - 7.0).abs() < 1e-9);
        assert!(cursor.is_finished());
    }

    #[test]
    fn looping_queue_wraps_and_resets_elapsed() {
        let q = queue(&[3.0, 4.0]);
        let (mut cursor, mut transport) = started(&q);
        transport.set_looping(true);
        cursor.jump(&q, 1, &mut transport);
        let outcome = end_track(&mut cursor, &q, &mut transport, 4.0);
        assert!(matches!(outcome, Continuation::HandedOff { from: 1, to: 0, .. }));
        assert_eq!(cursor.index(), 0);
        assert_eq!(cursor.position(&transport), 0.0);
    }

    #[test]
    fn looping_single_track_repeats() {
        let q = queue(&[3.0]);
        let (mut cursor, mut transport) = started(&q);
        transport.set_looping(true);
        let outcome = end_track(&mut cursor, &q, &mut transport, 3.0);
        assert!(matches!(outcome, Continuation::Repeated { completed, .. } if (completed - 3.0).abs() < 1e-9));
        assert!(transport.is_playing());
        assert_eq!(transport.local_time(), 0.0);
    }

    #[test]
    fn failed_handoff_stops_without_advancing() {
        let q = queue(&[3.0, 4.0, 5.0]);
        let (mut cursor, mut transport) = started(&q);
        end_track(&mut cursor, &q, &mut transport, 3.0);
        let token = transport.pending_play().unwrap();
        let settlement = transport.on_play_settled(token, Err(MediaFailure::Decode));
        let HandoffResolution::FellBack { commands, failed } =
            cursor.on_play_settled(token, &settlement, &q, &mut transport, true)
        else {
            panic!("expected fallback");
        };
        assert!(matches!(&commands[1], MediaCommand::Load { source, .. } if source == "url1"));
        assert_eq!(commands.last(), Some(&MediaCommand::Seek { seconds: 3.0 }));
        assert_eq!(failed.map(|(idx, _)| idx), Some(1));
        assert_eq!(cursor.index(), 0);
        assert!(cursor.is_failed(1));
        assert!(!transport.is_playing());
        assert!((cursor.position(&transport) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn stale_tokens_do_not_commit() {
        let q = queue(&[3.0, 4.0, 5.0]);
        let (mut cursor, mut transport) = started(&q);
        end_track(&mut cursor, &q, &mut transport, 3.0);
        let stale = transport.pending_play().unwrap();
        cursor.jump(&q, 2, &mut transport);
        let settlement = transport.on_play_settled(stale, Ok(()));
        assert_eq!(
            cursor.on_play_settled(stale, &settlement, &q, &mut transport, true),
            HandoffResolution::Dropped
        );
        assert_eq!(cursor.index(), 2);
    }

    #[test]
    fn seek_maps_onto_containing_track() {
        let q = queue(&[3.0, 4.0, 5.0]);
        let (mut cursor, mut transport) = started(&q);
        let commands = cursor.seek(&q, &mut transport, 8.5);
        assert!(matches!(&commands[1], MediaCommand::Load { source, .. } if source == "url3"));
        assert_eq!(cursor.index(), 2);
        assert!((cursor.position(&transport) - 8.5).abs() < 1e-9);
        assert!(transport.is_playing());

        cursor.seek(&q, &mut transport, 10.0);
        assert_eq!(cursor.index(), 2);
        assert!((cursor.position(&transport) - 10.0).abs() < 1e-9);

        cursor.seek(&q, &mut transport, 1.0);
        assert_eq!(cursor.index(), 0);
        assert!((cursor.position(&transport) - 1.0).abs() < 1e-9);
    }
}
