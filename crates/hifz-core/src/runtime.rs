//! Runs engine effects against real outputs.
//!
//! Play requests are settled synchronously: the outcome returned by the
//! output is fed back into the engine as the next event, after the rest of
//! the current batch of effects has run.

use crate::engine::{Effect, EngineEvent, Notice, RecitationEngine};
use crate::media::{MediaCommand, MediaEvent, MediaOutput, WordCommand, WordOutput};
use std::collections::VecDeque;
use tracing::{debug, trace};

pub struct Runtime<M: MediaOutput, W: WordOutput> {
    engine: RecitationEngine,
    main: M,
    word: W,
}

impl<M: MediaOutput, W: WordOutput> Runtime<M, W> {
    pub fn new(engine: RecitationEngine, main: M, word: W) -> Self {
        Self { engine, main, word }
    }

    pub fn engine(&self) -> &RecitationEngine {
        &self.engine
    }

    pub fn main_output(&self) -> &M {
        &self.main
    }

    pub fn word_output(&self) -> &W {
        &self.word
    }

    /// Dispatch `event` plus every event it triggers; returns the notices.
    pub fn dispatch(&mut self, event: EngineEvent) -> Vec<Notice> {
        let mut pending = VecDeque::from([event]);
        let mut notices = Vec::new();
        while let Some(event) = pending.pop_front() {
            trace!(action = event.action(), "Dispatching engine event");
            for effect in self.engine.dispatch(event) {
                match effect {
                    Effect::Main(command) => {
                        if let Some(follow_up) = self.run_main(command) {
                            pending.push_back(follow_up);
                        }
                    }
                    Effect::Word(command) => self.run_word(command),
                    Effect::Notify(notice) => notices.push(notice),
                }
            }
        }
        notices
    }

    /// Poll both outputs and dispatch whatever they observed.
    pub fn tick(&mut self) -> Vec<Notice> {
        let mut events: Vec<EngineEvent> = self
            .main
            .poll()
            .into_iter()
            .map(|(generation, event)| EngineEvent::Media { generation, event })
            .collect();
        events.extend(
            self.word
                .poll()
                .into_iter()
                .map(|(shot, event)| EngineEvent::Word { shot, event }),
        );
        let mut notices = Vec::new();
        for event in events {
            notices.extend(self.dispatch(event));
        }
        notices
    }

    fn run_main(&mut self, command: MediaCommand) -> Option<EngineEvent> {
        match command {
            MediaCommand::Load { source, generation } => {
                debug!(%source, generation, "Loading main source");
                self.main.load(&source, generation);
                None
            }
            MediaCommand::Preload { source } => {
                self.main.preload(&source);
                None
            }
            MediaCommand::Play { token } => {
                let outcome = self.main.play();
                Some(EngineEvent::Media {
                    generation: token.generation,
                    event: MediaEvent::PlaySettled { token, outcome },
                })
            }
            MediaCommand::Pause => {
                self.main.pause();
                None
            }
            MediaCommand::Seek { seconds } => {
                self.main.seek(seconds);
                None
            }
        }
    }

    fn run_word(&mut self, command: WordCommand) {
        match command {
            WordCommand::Start { shot, url } => self.word.start(shot, &url),
            WordCommand::Stop { shot } => self.word.stop(shot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::entry::{VerseKey, VerseRecord};
    use crate::error::MediaFailure;
    use crate::media::WordEvent;
    use crate::queue::{PlaybackScope, assemble};

    /// In-memory main output that plays instantly and records calls.
    #[derive(Default)]
    struct FakeOutput {
        calls: Vec<String>,
        generation: u64,
        source: Option<String>,
        playing: bool,
        fail_sources: Vec<String>,
        events: Vec<(u64, MediaEvent)>,
    }

    impl FakeOutput {
        fn emit(&mut self, event: MediaEvent) {
            self.events.push((self.generation, event));
        }
    }

    impl MediaOutput for FakeOutput {
        fn load(&mut self, source: &str, generation: u64) {
            self.calls.push(format!("load {source}"));
            self.generation = generation;
            self.source = Some(source.to_string());
            self.playing = false;
        }

        fn preload(&mut self, source: &str) {
            self.calls.push(format!("preload {source}"));
        }

        fn play(&mut self) -> Result<(), MediaFailure> {
            self.calls.push("play".into());
            if self
                .source
                .as_ref()
                .is_some_and(|source| self.fail_sources.contains(source))
            {
                return Err(MediaFailure::Decode);
            }
            self.playing = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.calls.push("pause".into());
            self.playing = false;
        }

        fn seek(&mut self, seconds: f64) {
            self.calls.push(format!("seek {seconds}"));
        }

        fn poll(&mut self) -> Vec<(u64, MediaEvent)> {
            std::mem::take(&mut self.events)
        }
    }

    #[derive(Default)]
    struct FakeWords {
        calls: Vec<String>,
        events: Vec<(u64, WordEvent)>,
    }

    impl WordOutput for FakeWords {
        fn start(&mut self, shot: u64, url: &str) {
            self.calls.push(format!("start {shot} {url}"));
        }

        fn stop(&mut self, shot: u64) {
            self.calls.push(format!("stop {shot}"));
        }

        fn poll(&mut self) -> Vec<(u64, WordEvent)> {
            std::mem::take(&mut self.events)
        }
    }

    fn runtime(durations: &[f64]) -> Runtime<FakeOutput, FakeWords> {
        let records: Vec<VerseRecord> = durations
            .iter()
            .enumerate()
            .map(|(idx, secs)| VerseRecord {
                verse_key: VerseKey::new(2, idx as u16 + 1),
                order_in_chapter: idx as u32 + 1,
                text: String::new(),
                audio_url: Some(format!("t{}.mp3", idx + 1)),
                duration_seconds: Some(*secs),
                segments: None,
                words: Vec::new(),
            })
            .collect();
        let queue = assemble(
            &records,
            &PlaybackScope::Range {
                from: 1,
                to: durations.len() as u32,
            },
            "",
        );
        let mut runtime = Runtime::new(
            RecitationEngine::new(EngineConfig::default()),
            FakeOutput::default(),
            FakeWords::default(),
        );
        runtime.dispatch(EngineEvent::LoadQueue(queue));
        runtime
    }

    #[test]
    fn play_outcome_is_fed_back() {
        let mut rt = runtime(&[2.0, 3.0]);
        let notices = rt.dispatch(EngineEvent::Play);
        assert!(notices.contains(&Notice::Started));
        assert!(rt.main_output().playing);
        assert_eq!(
            rt.main_output().calls,
            vec!["load t1.mp3", "preload t2.mp3", "play"]
        );
    }

    #[test]
    fn polled_end_hands_off_to_next_output_source() {
        let mut rt = runtime(&[2.0, 3.0, 4.0]);
        rt.dispatch(EngineEvent::Play);
        rt.main.emit(MediaEvent::TimeUpdate { seconds: 2.0 });
        rt.main.emit(MediaEvent::Ended);
        let notices = rt.tick();

        assert!(notices.contains(&Notice::TrackCompleted {
            index: 0,
            seconds: 2.0
        }));
        assert_eq!(rt.main_output().source.as_deref(), Some("t2.mp3"));
        assert!(rt.main_output().playing);
        assert_eq!(rt.main_output().calls.last().map(String::as_str), Some("preload t3.mp3"));
        assert_eq!(rt.engine().snapshot().index, 1);
    }

    #[test]
    fn failing_next_source_falls_back() {
        let mut rt = runtime(&[2.0, 3.0]);
        rt.main.fail_sources.push("t2.mp3".into());
        rt.dispatch(EngineEvent::Play);
        rt.main.emit(MediaEvent::Ended);
        let notices = rt.tick();

        assert!(notices.contains(&Notice::Ended));
        assert_eq!(rt.main_output().source.as_deref(), Some("t1.mp3"));
        assert!(!rt.main_output().playing);
        assert_eq!(rt.engine().snapshot().index, 0);
    }

    #[test]
    fn word_output_receives_exclusive_shots() {
        let mut rt = runtime(&[2.0]);
        rt.dispatch(EngineEvent::Play);
        rt.dispatch(EngineEvent::PlayWord {
            url: "a.mp3".into(),
            key: "2:1-1".into(),
        });
        rt.dispatch(EngineEvent::PlayWord {
            url: "b.mp3".into(),
            key: "2:1-2".into(),
        });
        assert_eq!(
            rt.word_output().calls,
            vec!["start 1 a.mp3", "stop 1", "start 2 b.mp3"]
        );
        assert!(!rt.main_output().playing);

        rt.word.events.push((2, WordEvent::Failed(MediaFailure::Network)));
        let notices = rt.tick();
        assert_eq!(
            notices,
            vec![Notice::WordFinished {
                key: "2:1-2".into()
            }]
        );
    }
}
