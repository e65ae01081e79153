//! Exclusive single-shot playback of word pronunciations.

use crate::media::WordCommand;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct WordShotPlayer {
    next_shot: u64,
    current: Option<(u64, String)>,
}

impl WordShotPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playing_key(&self) -> Option<&str> {
        self.current.as_ref().map(|(_, key)| key.as_str())
    }

    /// Interrupt whatever clip is playing and start `url`. Blank input is
    /// ignored.
    pub fn play(&mut self, url: &str, key: &str) -> Vec<WordCommand> {
        let (url, key) = (url.trim(), key.trim());
        if url.is_empty() || key.is_empty() {
            debug!(key, "Word clip without audio ignored");
            return Vec::new();
        }
        let mut commands = self.stop();
        self.next_shot = self.next_shot.wrapping_add(1);
        let shot = self.next_shot;
        self.current = Some((shot, key.to_string()));
        commands.push(WordCommand::Start {
            shot,
            url: url.to_string(),
        });
        commands
    }

    pub fn stop(&mut self) -> Vec<WordCommand> {
        self.current
            .take()
            .map(|(shot, _)| WordCommand::Stop { shot })
            .into_iter()
            .collect()
    }

    /// The clip for `shot` ended or failed. Returns the key it cleared.
    pub fn on_finished(&mut self, shot: u64) -> Option<String> {
        match &self.current {
            Some((current, _)) if *current == shot => self.current.take().map(|(_, key)| key),
            _ => {
                debug!(shot, "Ignoring finish for an interrupted word clip");
                None
            }
        }
    }
}
