//! The seam between the engine and a platform media element.
//!
//! The engine never touches audio itself. It emits [`MediaCommand`]s and
//! consumes [`MediaEvent`]s; a [`MediaOutput`] implementation turns commands
//! into sound and reports back what happened.

use crate::error::MediaFailure;

/// Identifies one play attempt on one loaded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayToken {
    pub generation: u64,
    pub attempt: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaCommand {
    /// Replace the source. Anything pending on the previous one is void.
    Load { source: String, generation: u64 },
    /// Hint that `source` will be loaded soon.
    Preload { source: String },
    Play { token: PlayToken },
    Pause,
    Seek { seconds: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    MetadataLoaded { duration: f64 },
    TimeUpdate { seconds: f64 },
    Started,
    Paused,
    Ended,
    Failed(MediaFailure),
    /// Resolution of the asynchronous play request identified by `token`.
    PlaySettled {
        token: PlayToken,
        outcome: Result<(), MediaFailure>,
    },
}

impl MediaEvent {
    pub fn label(&self) -> &'static str {
        match self {
            MediaEvent::MetadataLoaded { .. } => "loaded_metadata",
            MediaEvent::TimeUpdate { .. } => "time_update",
            MediaEvent::Started => "play",
            MediaEvent::Paused => "pause",
            MediaEvent::Ended => "ended",
            MediaEvent::Failed(_) => "error",
            MediaEvent::PlaySettled { .. } => "play_settled",
        }
    }
}

/// Commands for the independent word-pronunciation output.
#[derive(Debug, Clone, PartialEq)]
pub enum WordCommand {
    Start { shot: u64, url: String },
    Stop { shot: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WordEvent {
    Ended,
    Failed(MediaFailure),
}

/// Output for word clips. Each shot is independent; stopping an unknown or
/// finished shot is harmless.
pub trait WordOutput {
    fn start(&mut self, shot: u64, url: &str);

    fn stop(&mut self, shot: u64);

    /// Drain `(shot, event)` pairs observed since the previous poll.
    fn poll(&mut self) -> Vec<(u64, WordEvent)>;
}

/// A platform audio element. Implementations must apply a `load` before any
/// later `play`, and tag polled events with the generation they belong to.
pub trait MediaOutput {
    /// Assign a new source; load failures surface later through [`poll`].
    ///
    /// [`poll`]: MediaOutput::poll
    fn load(&mut self, source: &str, generation: u64);

    fn preload(&mut self, source: &str);

    /// Start or resume the current source.
    fn play(&mut self) -> Result<(), MediaFailure>;

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64);

    /// Drain `(generation, event)` pairs observed since the previous poll.
    fn poll(&mut self) -> Vec<(u64, MediaEvent)>;
}
