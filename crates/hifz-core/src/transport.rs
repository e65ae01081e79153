//! Transport controller for the single main media source.
//!
//! Tracks what is loaded, whether it should be playing, and the source-local
//! clock. Every mutation returns the media commands needed to make the
//! platform match.

use crate::error::{MediaFailure, PlaybackError};
use crate::media::{MediaCommand, PlayToken};
use serde::Serialize;
use tracing::{debug, info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TransportState {
    #[default]
    Empty,
    Ready,
    Playing,
    Paused,
    Failed,
}

/// How a play request resolved, from the transport's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaySettlement {
    Started,
    /// Stale token or an intentional abort; nothing to report.
    Ignored,
    /// Refused by the platform; transport is paused and may be retried.
    Rejected(PlaybackError),
    /// Source could not be played; transport is disabled for it.
    Failed(PlaybackError),
}

#[derive(Debug, Clone, Default)]
pub struct Transport {
    state: TransportState,
    source: Option<String>,
    generation: u64,
    attempts: u64,
    pending_play: Option<PlayToken>,
    local_time: f64,
    duration_hint: f64,
    media_duration: f64,
    looping: bool,
    finished: bool,
    failure: Option<PlaybackError>,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_play(&self) -> Option<PlayToken> {
        self.pending_play
    }

    /// Source-local playback time in seconds.
    pub fn local_time(&self) -> f64 {
        self.local_time
    }

    /// Hint when known, otherwise what the media reported; 0 means unknown.
    pub fn duration(&self) -> f64 {
        if self.duration_hint > 0.0 {
            self.duration_hint
        } else {
            self.media_duration
        }
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    /// The source played to its natural end and has not been rewound.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn failure(&self) -> Option<&PlaybackError> {
        self.failure.as_ref()
    }

    /// Assign `source`. Reloading the loaded source is a no-op that keeps
    /// the play state; a different source always starts from zero.
    pub fn load(&mut self, source: &str, duration_hint: f64) -> Vec<MediaCommand> {
        let source = source.trim();
        if source.is_empty() {
            return self.unload();
        }
        let loaded = !matches!(self.state, TransportState::Empty | TransportState::Failed);
        if loaded && self.source.as_deref() == Some(source) {
            debug!(source, "Source already loaded; keeping transport state");
            return Vec::new();
        }

        let mut commands = Vec::new();
        if self.source.is_some() {
            commands.push(MediaCommand::Pause);
        }
        self.generation = self.generation.wrapping_add(1);
        self.source = Some(source.to_string());
        self.pending_play = None;
        self.local_time = 0.0;
        self.duration_hint = sanitize_duration(duration_hint);
        self.media_duration = 0.0;
        self.finished = false;
        self.failure = None;
        self.state = TransportState::Ready;
        debug!(
            source,
            generation = self.generation,
            duration_hint = self.duration_hint,
            "Loading source"
        );
        commands.push(MediaCommand::Load {
            source: source.to_string(),
            generation: self.generation,
        });
        commands
    }

    /// Release the current source entirely.
    pub fn unload(&mut self) -> Vec<MediaCommand> {
        let had_source = self.source.take().is_some();
        self.generation = self.generation.wrapping_add(1);
        self.state = TransportState::Empty;
        self.pending_play = None;
        self.local_time = 0.0;
        self.duration_hint = 0.0;
        self.media_duration = 0.0;
        self.finished = false;
        self.failure = None;
        if had_source {
            vec![MediaCommand::Pause]
        } else {
            Vec::new()
        }
    }

    pub fn play(&mut self) -> Vec<MediaCommand> {
        match self.state {
            TransportState::Empty | TransportState::Failed => {
                debug!(state = ?self.state, "Play ignored; nothing playable loaded");
                return Vec::new();
            }
            TransportState::Playing => return Vec::new(),
            TransportState::Ready | TransportState::Paused => {}
        }
        let mut commands = Vec::new();
        if self.finished {
            self.finished = false;
            self.local_time = 0.0;
            commands.push(MediaCommand::Seek { seconds: 0.0 });
        }
        commands.push(self.issue_play());
        commands
    }

    /// Rewind and play again; used for repeat-on-end.
    pub fn restart(&mut self) -> Vec<MediaCommand> {
        if matches!(self.state, TransportState::Empty | TransportState::Failed) {
            return Vec::new();
        }
        self.finished = false;
        self.local_time = 0.0;
        vec![MediaCommand::Seek { seconds: 0.0 }, self.issue_play()]
    }

    fn issue_play(&mut self) -> MediaCommand {
        self.attempts = self.attempts.wrapping_add(1);
        let token = PlayToken {
            generation: self.generation,
            attempt: self.attempts,
        };
        self.pending_play = Some(token);
        self.state = TransportState::Playing;
        MediaCommand::Play { token }
    }

    /// Returns whether the transport was playing.
    pub fn pause(&mut self) -> Option<MediaCommand> {
        self.pending_play = None;
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
            Some(MediaCommand::Pause)
        } else {
            None
        }
    }

    /// Rewind to zero and pause.
    pub fn stop(&mut self) -> Vec<MediaCommand> {
        if self.state == TransportState::Empty {
            return Vec::new();
        }
        self.pending_play = None;
        self.local_time = 0.0;
        self.finished = false;
        if self.state != TransportState::Failed {
            self.state = TransportState::Paused;
        }
        vec![MediaCommand::Pause, MediaCommand::Seek { seconds: 0.0 }]
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.looping = !self.looping;
        info!(looping = self.looping, "Toggled loop");
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Clamp to `[0, duration]`; a no-op while the duration is unknown.
    pub fn seek(&mut self, target: f64) -> Option<MediaCommand> {
        if matches!(self.state, TransportState::Empty | TransportState::Failed) {
            return None;
        }
        let duration = self.duration();
        if duration <= 0.0 || !target.is_finite() {
            debug!(target, duration, "Seek ignored; duration unknown");
            return None;
        }
        let seconds = target.clamp(0.0, duration);
        self.local_time = seconds;
        self.finished = false;
        Some(MediaCommand::Seek { seconds })
    }

    /// Force a fresh load of the current source after a failure.
    pub fn retry(&mut self) -> Vec<MediaCommand> {
        let Some(source) = self.source.clone() else {
            return Vec::new();
        };
        let hint = self.duration_hint;
        self.state = TransportState::Empty;
        self.load(&source, hint)
    }

    pub fn on_metadata(&mut self, duration: f64) {
        let duration = sanitize_duration(duration);
        if duration > 0.0 {
            self.media_duration = duration;
        }
    }

    pub fn on_time_update(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds >= 0.0 {
            self.local_time = seconds;
        }
    }

    /// Platform reported that playback began. Returns whether state changed.
    pub fn on_started(&mut self) -> bool {
        if matches!(self.state, TransportState::Ready | TransportState::Paused) {
            self.state = TransportState::Playing;
            return true;
        }
        false
    }

    /// Platform paused on its own. Returns whether state changed.
    pub fn on_paused(&mut self) -> bool {
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
            self.pending_play = None;
            return true;
        }
        false
    }

    pub fn on_play_settled(
        &mut self,
        token: PlayToken,
        outcome: Result<(), MediaFailure>,
    ) -> PlaySettlement {
        if self.pending_play != Some(token) {
            debug!(?token, pending = ?self.pending_play, "Ignoring stale play outcome");
            return PlaySettlement::Ignored;
        }
        self.pending_play = None;
        match outcome {
            Ok(()) => {
                self.state = TransportState::Playing;
                PlaySettlement::Started
            }
            Err(MediaFailure::Aborted) => {
                debug!(?token, "Play aborted; swallowing");
                if self.state == TransportState::Playing {
                    self.state = TransportState::Paused;
                }
                PlaySettlement::Ignored
            }
            Err(MediaFailure::NotAllowed) => {
                warn!(?token, "Playback start refused by platform");
                self.state = TransportState::Paused;
                PlaySettlement::Rejected(PlaybackError::PlayRejected)
            }
            Err(failure) => PlaySettlement::Failed(self.fail(failure)),
        }
    }

    /// Asynchronous error from the media element. `None` when swallowed.
    pub fn on_failed(&mut self, failure: MediaFailure) -> Option<PlaybackError> {
        if !failure.is_user_visible() {
            debug!("Ignoring abort from source swap");
            return None;
        }
        if failure == MediaFailure::NotAllowed {
            self.pending_play = None;
            self.state = TransportState::Paused;
            return Some(PlaybackError::PlayRejected);
        }
        Some(self.fail(failure))
    }

    fn fail(&mut self, failure: MediaFailure) -> PlaybackError {
        let error = PlaybackError::from(failure);
        warn!(source = ?self.source, %error, "Source failed");
        self.state = TransportState::Failed;
        self.pending_play = None;
        self.failure = Some(error.clone());
        error
    }

    /// Park a freshly loaded source at `seconds`, as if it had just ended.
    pub fn hold_at_end(&mut self, seconds: f64) -> MediaCommand {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.local_time = seconds;
        self.pending_play = None;
        self.finished = true;
        if self.state != TransportState::Empty {
            self.state = TransportState::Paused;
        }
        MediaCommand::Seek { seconds }
    }

    /// Natural end of the source: hold at the end, paused.
    pub fn on_ended(&mut self) {
        self.local_time = self.local_time.max(self.duration());
        self.pending_play = None;
        self.finished = true;
        if self.state != TransportState::Failed {
            self.state = TransportState::Paused;
        }
    }
}

fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}
