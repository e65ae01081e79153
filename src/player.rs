//! rodio-backed media outputs for the engine.
//!
//! Each loaded source gets its own paused [`Sink`]; replacing a source drops
//! the old sink. rodio 0.18 does not report a playback position, so local
//! time is tracked from the last seek plus a monotonic clock.

use crate::fetch::SourceFetcher;
use anyhow::{Context, Result};
use hifz_core::error::MediaFailure;
use hifz_core::media::{MediaEvent, MediaOutput, WordEvent, WordOutput};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Keeps the audio device open for as long as it lives.
pub struct AudioDevice {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl AudioDevice {
    pub fn open() -> Result<Self> {
        let (_stream, handle) = OutputStream::try_default().context("Opening audio output")?;
        info!("Opened default audio output");
        Ok(Self { _stream, handle })
    }

    pub fn handle(&self) -> OutputStreamHandle {
        self.handle.clone()
    }
}

type DecodedSource = Decoder<Cursor<Arc<[u8]>>>;

fn decode(bytes: &Arc<[u8]>) -> Result<DecodedSource, MediaFailure> {
    Decoder::new(Cursor::new(bytes.clone())).map_err(|err| {
        warn!("Audio decode failed: {err}");
        MediaFailure::Decode
    })
}

/// Local time of a sink, in seconds.
#[derive(Debug, Clone, Copy, Default)]
struct PlayClock {
    base: f64,
    running_since: Option<Instant>,
}

impl PlayClock {
    fn position(&self) -> f64 {
        self.base
            + self
                .running_since
                .map_or(0.0, |since| since.elapsed().as_secs_f64())
    }

    fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        self.base = self.position();
        self.running_since = None;
    }

    fn set(&mut self, seconds: f64) {
        self.base = seconds;
        if self.running_since.is_some() {
            self.running_since = Some(Instant::now());
        }
    }
}

struct LoadedSource {
    url: String,
    bytes: Arc<[u8]>,
    sink: Sink,
    duration: Option<f64>,
    clock: PlayClock,
    ended: bool,
}

impl LoadedSource {
    fn position(&self) -> f64 {
        let position = self.clock.position();
        self.duration.map_or(position, |total| position.min(total))
    }

    /// Queue a fresh decoder once the previous one has drained.
    fn rearm(&mut self) -> Result<(), MediaFailure> {
        if self.sink.empty() {
            self.sink.append(decode(&self.bytes)?);
            self.ended = false;
        }
        Ok(())
    }
}

/// Main transport output: one source at a time.
pub struct RodioOutput {
    handle: OutputStreamHandle,
    fetcher: SourceFetcher,
    volume: f32,
    generation: u64,
    current: Option<LoadedSource>,
    load_failure: Option<MediaFailure>,
    events: Vec<(u64, MediaEvent)>,
}

impl RodioOutput {
    pub fn new(handle: OutputStreamHandle, fetcher: SourceFetcher, volume: f32) -> Self {
        Self {
            handle,
            fetcher,
            volume,
            generation: 0,
            current: None,
            load_failure: None,
            events: Vec::new(),
        }
    }

    fn emit(&mut self, event: MediaEvent) {
        self.events.push((self.generation, event));
    }

    fn open(&self, url: &str) -> Result<LoadedSource, MediaFailure> {
        let bytes = self.fetcher.fetch(url)?;
        let source = decode(&bytes)?;
        let duration = source.total_duration().map(|d| d.as_secs_f64());
        let sink = Sink::try_new(&self.handle).map_err(|err| {
            warn!("Failed to create sink: {err}");
            MediaFailure::Decode
        })?;
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(source);
        Ok(LoadedSource {
            url: url.to_string(),
            bytes,
            sink,
            duration,
            clock: PlayClock::default(),
            ended: false,
        })
    }
}

impl MediaOutput for RodioOutput {
    fn load(&mut self, source: &str, generation: u64) {
        if let Some(previous) = self.current.take() {
            debug!(url = %previous.url, "Dropping previous sink");
            previous.sink.stop();
        }
        self.generation = generation;
        self.load_failure = None;
        match self.open(source) {
            Ok(loaded) => {
                debug!(url = %source, generation, duration = ?loaded.duration, "Source ready");
                let duration = loaded.duration;
                self.current = Some(loaded);
                if let Some(duration) = duration {
                    self.emit(MediaEvent::MetadataLoaded { duration });
                }
            }
            Err(failure) => {
                self.load_failure = Some(failure);
                self.emit(MediaEvent::Failed(failure));
            }
        }
    }

    fn preload(&mut self, source: &str) {
        self.fetcher.prefetch(source);
    }

    fn play(&mut self) -> Result<(), MediaFailure> {
        if let Some(failure) = self.load_failure {
            // Reported through the play outcome instead.
            self.events
                .retain(|(_, event)| !matches!(event, MediaEvent::Failed(_)));
            return Err(failure);
        }
        let Some(current) = self.current.as_mut() else {
            return Err(MediaFailure::Aborted);
        };
        current.rearm()?;
        current.sink.play();
        current.clock.start();
        self.emit(MediaEvent::Started);
        Ok(())
    }

    fn pause(&mut self) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        if current.sink.is_paused() {
            return;
        }
        current.sink.pause();
        current.clock.stop();
        self.emit(MediaEvent::Paused);
    }

    fn seek(&mut self, seconds: f64) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let seconds = current
            .duration
            .map_or(seconds, |total| seconds.min(total))
            .max(0.0);
        if let Err(failure) = current.rearm() {
            warn!(?failure, "Could not re-arm source for seek");
            return;
        }
        if let Err(err) = current.sink.try_seek(Duration::from_secs_f64(seconds)) {
            warn!(seconds, "Seek failed: {err}");
            return;
        }
        current.clock.set(seconds);
    }

    fn poll(&mut self) -> Vec<(u64, MediaEvent)> {
        let generation = self.generation;
        if let Some(current) = self
            .current
            .as_mut()
            .filter(|current| !current.ended && !current.sink.is_paused())
        {
            if current.sink.empty() {
                current.ended = true;
                current.clock.stop();
                let end = current.duration.unwrap_or_else(|| current.clock.position());
                self.events
                    .push((generation, MediaEvent::TimeUpdate { seconds: end }));
                self.events.push((generation, MediaEvent::Ended));
            } else {
                let seconds = current.position();
                self.events
                    .push((generation, MediaEvent::TimeUpdate { seconds }));
            }
        }
        std::mem::take(&mut self.events)
    }
}

/// Word pronunciation output; at most one shot audible at a time.
pub struct RodioWordOutput {
    handle: OutputStreamHandle,
    fetcher: SourceFetcher,
    volume: f32,
    current: Option<(u64, Sink)>,
    events: Vec<(u64, WordEvent)>,
}

impl RodioWordOutput {
    pub fn new(handle: OutputStreamHandle, fetcher: SourceFetcher, volume: f32) -> Self {
        Self {
            handle,
            fetcher,
            volume,
            current: None,
            events: Vec::new(),
        }
    }

    fn open(&self, url: &str) -> Result<Sink, MediaFailure> {
        let bytes = self.fetcher.fetch(url)?;
        let source = decode(&bytes)?;
        let sink = Sink::try_new(&self.handle).map_err(|err| {
            warn!("Failed to create word sink: {err}");
            MediaFailure::Decode
        })?;
        sink.set_volume(self.volume);
        sink.append(source);
        Ok(sink)
    }
}

impl WordOutput for RodioWordOutput {
    fn start(&mut self, shot: u64, url: &str) {
        if let Some((_, sink)) = self.current.take() {
            sink.stop();
        }
        match self.open(url) {
            Ok(sink) => {
                debug!(shot, %url, "Word shot started");
                self.current = Some((shot, sink));
            }
            Err(failure) => self.events.push((shot, WordEvent::Failed(failure))),
        }
    }

    fn stop(&mut self, shot: u64) {
        if self.current.as_ref().is_some_and(|(current, _)| *current == shot) {
            if let Some((_, sink)) = self.current.take() {
                sink.stop();
            }
        }
    }

    fn poll(&mut self) -> Vec<(u64, WordEvent)> {
        if self.current.as_ref().is_some_and(|(_, sink)| sink.empty()) {
            if let Some((shot, _)) = self.current.take() {
                self.events.push((shot, WordEvent::Ended));
            }
        }
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_accumulates_only_while_running() {
        let mut clock = PlayClock::default();
        clock.set(4.0);
        assert_eq!(clock.position(), 4.0);
        clock.start();
        std::thread::sleep(Duration::from_millis(20));
        clock.stop();
        let stopped = clock.position();
        assert!(stopped >= 4.02 && stopped < 5.0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.position(), stopped);
    }

    #[test]
    fn clock_seek_rebases_running_clock() {
        let mut clock = PlayClock::default();
        clock.start();
        std::thread::sleep(Duration::from_millis(20));
        clock.set(1.0);
        assert!(clock.position() < 1.02);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let bytes: Arc<[u8]> = Arc::from(&b"not audio at all"[..]);
        assert_eq!(decode(&bytes).err(), Some(MediaFailure::Decode));
    }
}
