//! The recitation engine.
//!
//! One state machine owns the queue, the transport, the chain cursor and
//! every derived view. Hosts feed it [`EngineEvent`]s through
//! [`RecitationEngine::dispatch`] and carry out the returned [`Effect`]s;
//! nothing in here performs I/O.

mod reducer;
mod snapshot;

pub use snapshot::{EntryView, PlayerSnapshot, WordView};

use crate::config::EngineConfig;
use crate::continuation::ChainCursor;
use crate::error::PlaybackError;
use crate::media::{MediaCommand, MediaEvent, WordCommand, WordEvent};
use crate::pagination::PageFollower;
use crate::queue::{Queue, ScopeKind};
use crate::scrub::{ScrubController, ScrubGesture};
use crate::timeline::{Highlight, TimelineSync};
use crate::transport::Transport;
use crate::word_shot::WordShotPlayer;
use serde::Serialize;
use ts_rs::TS;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    LoadQueue(Queue),
    ClearQueue,
    Play,
    Pause,
    TogglePlayPause,
    Stop,
    ToggleLoop,
    Seek { seconds: f64 },
    SelectTrack { index: usize },
    Retry,
    Scrub(ScrubGesture),
    PlayWord { url: String, key: String },
    /// Callback from the main output, tagged with the source generation.
    Media { generation: u64, event: MediaEvent },
    /// Callback from the word output for one shot.
    Word { shot: u64, event: WordEvent },
}

impl EngineEvent {
    pub fn action(&self) -> &'static str {
        match self {
            Self::LoadQueue(_) => "load_queue",
            Self::ClearQueue => "clear_queue",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::TogglePlayPause => "toggle_play_pause",
            Self::Stop => "stop",
            Self::ToggleLoop => "toggle_loop",
            Self::Seek { .. } => "seek",
            Self::SelectTrack { .. } => "select_track",
            Self::Retry => "retry",
            Self::Scrub(_) => "scrub",
            Self::PlayWord { .. } => "play_word",
            Self::Media { event, .. } => event.label(),
            Self::Word { .. } => "word_event",
        }
    }
}

/// Work the host must perform after a dispatch, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Main(MediaCommand),
    Word(WordCommand),
    Notify(Notice),
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum Notice {
    PositionChanged { seconds: f64 },
    /// Displayed position while a scrub drag is in progress.
    ScrubPreview { seconds: f64 },
    Started,
    Paused,
    Ended,
    Failed {
        index: Option<usize>,
        error: PlaybackError,
    },
    TrackCompleted { index: usize, seconds: f64 },
    ActiveVerseChanged {
        index: Option<usize>,
        verse_key: Option<String>,
    },
    PageChanged { page: usize },
    WordStarted { key: String },
    WordFinished { key: String },
}

#[derive(Debug, Clone)]
pub struct RecitationEngine {
    config: EngineConfig,
    queue: Queue,
    transport: Transport,
    cursor: ChainCursor,
    timeline: TimelineSync,
    scrub: ScrubController,
    words: WordShotPlayer,
    pages: PageFollower,
    highlight: Highlight,
    last_error: Option<PlaybackError>,
}

impl RecitationEngine {
    pub fn new(config: EngineConfig) -> Self {
        let config = config.clamped();
        let mut transport = Transport::new();
        transport.set_looping(config.loop_queue);
        Self {
            timeline: TimelineSync::new(config.timeline()),
            pages: PageFollower::new(config.page_size),
            config,
            queue: Queue::default(),
            transport,
            cursor: ChainCursor::new(),
            scrub: ScrubController::new(),
            words: WordShotPlayer::new(),
            highlight: Highlight::default(),
            last_error: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn current_index(&self) -> usize {
        match self.queue.kind() {
            ScopeKind::Range => self.cursor.index(),
            ScopeKind::Whole => self.highlight.verse.unwrap_or(0),
        }
    }

    /// Continuous playback position in seconds.
    pub fn position(&self) -> f64 {
        match self.queue.kind() {
            ScopeKind::Range => self.cursor.position(&self.transport),
            ScopeKind::Whole => self.transport.local_time(),
        }
    }

    /// Best known total duration; 0 while unknown.
    pub fn duration(&self) -> f64 {
        match self.queue.kind() {
            ScopeKind::Range => self.cursor.duration(&self.queue, &self.transport),
            ScopeKind::Whole => self.transport.duration(),
        }
    }

    /// Position shown to the user: follows the pointer while dragging.
    pub fn displayed_position(&self) -> f64 {
        self.scrub.displayed(self.position())
    }

    pub fn highlight(&self) -> Highlight {
        self.highlight
    }

    pub fn playing_word_key(&self) -> Option<&str> {
        self.words.playing_key()
    }
}
