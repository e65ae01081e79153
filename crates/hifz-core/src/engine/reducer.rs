use super::{EngineEvent, Effect, Notice, RecitationEngine};
use crate::continuation::{Continuation, HandoffResolution, preload_after};
use crate::error::{MediaFailure, PlaybackError};
use crate::media::{MediaCommand, MediaEvent, PlayToken, WordEvent};
use crate::queue::{Queue, QueueSource, ScopeKind};
use crate::scrub::ScrubGesture;
use crate::timeline::{Highlight, TimelineSync};
use crate::transport::{PlaySettlement, TransportState};
use tracing::{debug, info, warn};

impl RecitationEngine {
    /// Apply one event and return the effects the host must run, in order.
    pub fn dispatch(&mut self, event: EngineEvent) -> Vec<Effect> {
        let mut effects = Vec::new();

        match event {
            EngineEvent::LoadQueue(queue) => self.handle_load_queue(queue, &mut effects),
            EngineEvent::ClearQueue => self.handle_load_queue(Queue::default(), &mut effects),
            EngineEvent::Play => self.handle_play(&mut effects),
            EngineEvent::Pause => self.handle_pause(&mut effects),
            EngineEvent::TogglePlayPause => {
                if self.transport.is_playing() {
                    self.handle_pause(&mut effects);
                } else {
                    self.handle_play(&mut effects);
                }
            }
            EngineEvent::Stop => self.handle_stop(&mut effects),
            EngineEvent::ToggleLoop => {
                self.transport.toggle_loop();
            }
            EngineEvent::Seek { seconds } => self.handle_seek(seconds, &mut effects),
            EngineEvent::SelectTrack { index } => self.handle_select_track(index, &mut effects),
            EngineEvent::Retry => self.handle_retry(&mut effects),
            EngineEvent::Scrub(gesture) => self.handle_scrub(gesture, &mut effects),
            EngineEvent::PlayWord { url, key } => self.handle_play_word(&url, &key, &mut effects),
            EngineEvent::Media { generation, event } => {
                self.handle_media(generation, event, &mut effects)
            }
            EngineEvent::Word { shot, event } => self.handle_word_event(shot, event, &mut effects),
        }

        self.refresh_highlight(&mut effects);
        effects
    }

    fn handle_load_queue(&mut self, queue: Queue, effects: &mut Vec<Effect>) {
        if queue.identity() == self.queue.identity() {
            self.handle_requeue(queue, effects);
            return;
        }
        info!(
            identity = queue.identity(),
            entries = queue.len(),
            scope = queue.kind().as_str(),
            "Replacing playback queue"
        );
        push_main(effects, self.transport.unload());
        self.cursor.reset();
        self.scrub.reset();
        self.pages.reset();
        self.highlight = Highlight::default();
        self.last_error = None;
        self.timeline = TimelineSync::build(&queue, self.config.timeline());
        if let Some(anomaly) = self.timeline.anomaly() {
            warn!(%anomaly, "Segment data anomaly; continuing with first-match lookup");
        }
        self.queue = queue;

        match self.queue.source() {
            QueueSource::Chained => {
                if let Some(first) = self.queue.get(0) {
                    let commands = self.transport.load(first.audio_url(), first.duration_secs());
                    push_main(effects, commands);
                    if self.config.preload_next {
                        push_main(effects, preload_after(&self.queue, 0));
                    }
                }
            }
            QueueSource::SingleFile(whole) => {
                if !self.queue.is_empty() {
                    let commands = self
                        .transport
                        .load(&whole.audio_url, self.queue.total_duration());
                    push_main(effects, commands);
                }
            }
        }
        effects.push(Effect::Notify(Notice::PositionChanged { seconds: 0.0 }));
    }

    /// Same verses and scope: keep index and position, but adopt the new
    /// entries so a changed recording source takes effect.
    fn handle_requeue(&mut self, queue: Queue, effects: &mut Vec<Effect>) {
        self.timeline = TimelineSync::build(&queue, self.config.timeline());
        self.queue = queue;
        if self.queue.is_empty() {
            return;
        }
        let index = self.cursor.index();
        let (source, duration) = match self.queue.source() {
            QueueSource::Chained => match self.queue.get(index) {
                Some(entry) => (entry.audio_url().to_string(), entry.duration_secs()),
                None => return,
            },
            QueueSource::SingleFile(whole) => {
                (whole.audio_url.clone(), self.queue.total_duration())
            }
        };
        if self.transport.source() == Some(source.trim()) {
            debug!(identity = self.queue.identity(), "Queue unchanged; keeping playback state");
            return;
        }

        let local = self.transport.local_time();
        let was_playing = self.transport.is_playing() || self.cursor.in_handoff();
        info!(
            identity = self.queue.identity(),
            index,
            local,
            source = source.as_str(),
            "Audio source changed for the same verses; reloading in place"
        );
        let mut commands = match self.queue.kind() {
            ScopeKind::Range => {
                self.transport.pause();
                self.cursor.jump(&self.queue, index, &mut self.transport)
            }
            ScopeKind::Whole => self.transport.load(&source, duration),
        };
        commands.extend(self.transport.seek(local));
        if was_playing {
            commands.extend(self.transport.play());
        }
        push_main(effects, commands);
        if self.queue.kind() == ScopeKind::Range && self.config.preload_next {
            push_main(effects, preload_after(&self.queue, index));
        }
        effects.push(Effect::Notify(Notice::PositionChanged {
            seconds: self.position(),
        }));
    }

    fn handle_play(&mut self, effects: &mut Vec<Effect>) {
        if self.queue.is_empty() {
            debug!("Play ignored; no audio queued");
            return;
        }
        if self.transport.state() == TransportState::Failed {
            debug!(index = self.current_index(), "Play ignored; track is disabled");
            return;
        }
        if self.queue.kind() == ScopeKind::Range {
            let commands = self.cursor.rewind_if_finished(&self.queue, &mut self.transport);
            push_main(effects, commands);
        }
        push_main(effects, self.transport.play());
    }

    fn handle_pause(&mut self, effects: &mut Vec<Effect>) {
        if let Some(command) = self.transport.pause() {
            effects.push(Effect::Main(command));
            effects.push(Effect::Notify(Notice::Paused));
        }
    }

    fn handle_stop(&mut self, effects: &mut Vec<Effect>) {
        if self.queue.is_empty() {
            return;
        }
        let was_playing = self.transport.is_playing();
        let commands = match self.queue.kind() {
            ScopeKind::Range => self.cursor.stop(&self.queue, &mut self.transport),
            ScopeKind::Whole => self.transport.stop(),
        };
        push_main(effects, commands);
        if was_playing {
            effects.push(Effect::Notify(Notice::Paused));
        }
        effects.push(Effect::Notify(Notice::PositionChanged { seconds: 0.0 }));
    }

    fn handle_seek(&mut self, seconds: f64, effects: &mut Vec<Effect>) {
        let commands = match self.queue.kind() {
            ScopeKind::Range => self.cursor.seek(&self.queue, &mut self.transport, seconds),
            ScopeKind::Whole => self.transport.seek(seconds).into_iter().collect(),
        };
        if commands.is_empty() {
            return;
        }
        push_main(effects, commands);
        effects.push(Effect::Notify(Notice::PositionChanged {
            seconds: self.position(),
        }));
    }

    fn handle_select_track(&mut self, index: usize, effects: &mut Vec<Effect>) {
        if index >= self.queue.len() {
            debug!(index, len = self.queue.len(), "Track selection outside queue");
            return;
        }
        match self.queue.kind() {
            ScopeKind::Range => {
                if self.transport.state() == TransportState::Failed {
                    self.last_error = None;
                }
                let commands = self.cursor.jump(&self.queue, index, &mut self.transport);
                push_main(effects, commands);
                effects.push(Effect::Notify(Notice::PositionChanged {
                    seconds: self.position(),
                }));
            }
            ScopeKind::Whole => match self.timeline.verse_segment(index) {
                Some(segment) => self.handle_seek(segment.start, effects),
                None => debug!(index, "No timestamp for selected verse"),
            },
        }
    }

    fn handle_retry(&mut self, effects: &mut Vec<Effect>) {
        if self.transport.state() != TransportState::Failed {
            debug!("Retry ignored; nothing failed");
            return;
        }
        info!(index = self.current_index(), "Retrying failed track");
        self.cursor.clear_failed(self.cursor.index());
        self.last_error = None;
        push_main(effects, self.transport.retry());
    }

    fn handle_scrub(&mut self, gesture: ScrubGesture, effects: &mut Vec<Effect>) {
        let duration = self.duration();
        let target = self.scrub.apply(gesture, duration);
        if let Some(preview) = self.scrub.preview() {
            effects.push(Effect::Notify(Notice::ScrubPreview { seconds: preview }));
        }
        if let Some(target) = target {
            debug!(target, duration, "Committing scrub seek");
            self.handle_seek(target, effects);
        }
    }

    fn handle_play_word(&mut self, url: &str, key: &str, effects: &mut Vec<Effect>) {
        let commands = self.words.play(url, key);
        if commands.is_empty() {
            return;
        }
        if self.config.word_pauses_transport {
            self.handle_pause(effects);
        }
        effects.extend(commands.into_iter().map(Effect::Word));
        effects.push(Effect::Notify(Notice::WordStarted {
            key: key.trim().to_string(),
        }));
    }

    fn handle_word_event(&mut self, shot: u64, event: WordEvent, effects: &mut Vec<Effect>) {
        if let WordEvent::Failed(failure) = event {
            warn!(shot, ?failure, "Word clip failed");
        }
        if let Some(key) = self.words.on_finished(shot) {
            effects.push(Effect::Notify(Notice::WordFinished { key }));
        }
    }

    fn handle_media(&mut self, generation: u64, event: MediaEvent, effects: &mut Vec<Effect>) {
        if generation != self.transport.generation() {
            debug!(
                generation,
                current = self.transport.generation(),
                event = event.label(),
                "Dropping event from replaced source"
            );
            return;
        }
        match event {
            MediaEvent::MetadataLoaded { duration } => self.transport.on_metadata(duration),
            MediaEvent::TimeUpdate { seconds } => {
                self.transport.on_time_update(seconds);
                if !self.scrub.is_dragging() {
                    effects.push(Effect::Notify(Notice::PositionChanged {
                        seconds: self.position(),
                    }));
                }
            }
            MediaEvent::Started => {
                if self.transport.on_started() {
                    effects.push(Effect::Notify(Notice::Started));
                }
            }
            MediaEvent::Paused => {
                if self.cursor.in_handoff() {
                    debug!("Ignoring pause during track hand-off");
                } else if self.transport.on_paused() {
                    effects.push(Effect::Notify(Notice::Paused));
                }
            }
            MediaEvent::Ended => self.handle_ended(effects),
            MediaEvent::Failed(failure) => self.handle_media_failure(failure, effects),
            MediaEvent::PlaySettled { token, outcome } => {
                self.handle_play_settled(token, outcome, effects)
            }
        }
    }

    fn handle_ended(&mut self, effects: &mut Vec<Effect>) {
        self.transport.on_ended();
        match self.queue.kind() {
            ScopeKind::Range => match self.cursor.on_track_ended(&self.queue, &mut self.transport) {
                Continuation::HandedOff { commands, .. } => push_main(effects, commands),
                Continuation::Repeated { commands, completed } => {
                    push_main(effects, commands);
                    effects.push(Effect::Notify(Notice::TrackCompleted {
                        index: self.cursor.index(),
                        seconds: completed,
                    }));
                }
                Continuation::Finished => self.notify_ended(effects),
            },
            ScopeKind::Whole => {
                if self.transport.looping() {
                    info!("Repeating whole-chapter recording");
                    push_main(effects, self.transport.restart());
                } else {
                    self.notify_ended(effects);
                }
            }
        }
    }

    fn notify_ended(&self, effects: &mut Vec<Effect>) {
        effects.push(Effect::Notify(Notice::Ended));
        effects.push(Effect::Notify(Notice::PositionChanged {
            seconds: self.position(),
        }));
    }

    fn handle_media_failure(&mut self, failure: MediaFailure, effects: &mut Vec<Effect>) {
        let Some(error) = self.transport.on_failed(failure) else {
            return;
        };
        if self.cursor.in_handoff() {
            let resolution = self
                .cursor
                .fail_handoff(&self.queue, &mut self.transport, error);
            self.apply_handoff_resolution(resolution, effects);
            return;
        }
        self.record_failure(error, effects);
    }

    fn handle_play_settled(
        &mut self,
        token: PlayToken,
        outcome: Result<(), MediaFailure>,
        effects: &mut Vec<Effect>,
    ) {
        let settlement = self.transport.on_play_settled(token, outcome);
        if self.queue.kind() == ScopeKind::Range && self.cursor.in_handoff() {
            let resolution = self.cursor.on_play_settled(
                token,
                &settlement,
                &self.queue,
                &mut self.transport,
                self.config.preload_next,
            );
            if resolution != HandoffResolution::Dropped {
                self.apply_handoff_resolution(resolution, effects);
                return;
            }
        }
        match settlement {
            PlaySettlement::Started => {
                self.last_error = None;
                effects.push(Effect::Notify(Notice::Started));
            }
            PlaySettlement::Ignored => {}
            PlaySettlement::Rejected(error) | PlaySettlement::Failed(error) => {
                self.record_failure(error, effects);
            }
        }
    }

    fn apply_handoff_resolution(&mut self, resolution: HandoffResolution, effects: &mut Vec<Effect>) {
        match resolution {
            HandoffResolution::Committed {
                index,
                completed,
                preload,
            } => {
                effects.push(Effect::Notify(Notice::TrackCompleted {
                    index,
                    seconds: completed,
                }));
                push_main(effects, preload);
            }
            HandoffResolution::FellBack { commands, failed } => {
                push_main(effects, commands);
                if let Some((index, error)) = failed {
                    self.last_error = Some(error.clone());
                    effects.push(Effect::Notify(Notice::Failed {
                        index: Some(index),
                        error,
                    }));
                }
                self.notify_ended(effects);
            }
            HandoffResolution::Dropped => {}
        }
    }

    /// Turn a transport error into state and notices. Rejections only pause.
    fn record_failure(&mut self, error: PlaybackError, effects: &mut Vec<Effect>) {
        let index = (!self.queue.is_empty()).then(|| self.current_index());
        if error.disables_track() {
            if let Some(index) = index.filter(|_| self.queue.kind() == ScopeKind::Range) {
                self.cursor.mark_failed(index);
            }
            effects.push(Effect::Notify(Notice::Failed {
                index,
                error: error.clone(),
            }));
        } else {
            effects.push(Effect::Notify(Notice::Paused));
        }
        self.last_error = Some(error);
    }

    fn refresh_highlight(&mut self, effects: &mut Vec<Effect>) {
        let next = if self.queue.is_empty() {
            Highlight::default()
        } else {
            self.timeline.highlight(
                self.cursor.index(),
                self.transport.local_time(),
                self.position(),
            )
        };
        if next.verse != self.highlight.verse {
            let verse_key = next
                .verse
                .and_then(|idx| self.queue.get(idx))
                .map(|entry| entry.verse_key().to_string());
            debug!(index = ?next.verse, verse = ?verse_key, "Active verse changed");
            effects.push(Effect::Notify(Notice::ActiveVerseChanged {
                index: next.verse,
                verse_key,
            }));
            if self.config.page_follow {
                if let Some(page) = next.verse.and_then(|idx| self.pages.follow(idx)) {
                    effects.push(Effect::Notify(Notice::PageChanged { page }));
                }
            }
        }
        self.highlight = next;
    }
}

fn push_main(effects: &mut Vec<Effect>, commands: impl IntoIterator<Item = MediaCommand>) {
    effects.extend(commands.into_iter().map(Effect::Main));
}
