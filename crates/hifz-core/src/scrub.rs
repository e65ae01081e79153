//! Pointer input over the progress track.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Horizontal pointer position together with the track's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerSample {
    pub client_x: f64,
    pub track_left: f64,
    pub track_width: f64,
}

impl PointerSample {
    pub fn new(client_x: f64, track_left: f64, track_width: f64) -> Self {
        Self {
            client_x,
            track_left,
            track_width,
        }
    }

    /// Fraction of the track left of the pointer, clamped to `[0, 1]`.
    pub fn ratio(&self) -> f64 {
        if !(self.track_width > 0.0) || !self.client_x.is_finite() {
            return 0.0;
        }
        ((self.client_x - self.track_left) / self.track_width).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "snake_case")]
pub enum ScrubGesture {
    Click(PointerSample),
    Press(PointerSample),
    Move(PointerSample),
    /// End of a drag; without a sample the last preview is committed.
    Release { sample: Option<PointerSample> },
    Cancel,
}

/// Tracks drag state so the displayed position follows the finger and a
/// drag commits exactly one seek.
#[derive(Debug, Clone, Default)]
pub struct ScrubController {
    dragging: bool,
    preview: Option<f64>,
    suppress_click: bool,
}

impl ScrubController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn preview(&self) -> Option<f64> {
        self.preview
    }

    /// What the UI should show given the real playback position.
    pub fn displayed(&self, position: f64) -> f64 {
        self.preview.unwrap_or(position)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns the seek target to commit, if any.
    pub fn apply(&mut self, gesture: ScrubGesture, duration: f64) -> Option<f64> {
        let known = duration.is_finite() && duration > 0.0;
        let target = |sample: PointerSample| sample.ratio() * duration;
        match gesture {
            ScrubGesture::Click(sample) => {
                if std::mem::take(&mut self.suppress_click) {
                    debug!("Click after drag suppressed");
                    return None;
                }
                known.then(|| target(sample))
            }
            ScrubGesture::Press(sample) => {
                self.suppress_click = false;
                if !known {
                    debug!("Scrub press ignored; duration unknown");
                    return None;
                }
                self.dragging = true;
                self.preview = Some(target(sample));
                None
            }
            ScrubGesture::Move(sample) => {
                if self.dragging && known {
                    self.preview = Some(target(sample));
                }
                None
            }
            ScrubGesture::Release { sample } => {
                if !self.dragging {
                    return None;
                }
                self.dragging = false;
                self.suppress_click = true;
                let preview = self.preview.take();
                match sample {
                    Some(sample) if known => Some(target(sample)),
                    _ => preview,
                }
            }
            ScrubGesture::Cancel => {
                self.dragging = false;
                self.preview = None;
                None
            }
        }
    }
}
