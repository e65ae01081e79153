//! Error taxonomy for the playback engine.
//!
//! Transport-level failures never propagate as `Err` through the engine; they
//! are converted into state and surfaced as notices carrying these values.

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

/// Raw reason a media output gives for refusing or losing a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MediaFailure {
    Decode,
    Network,
    /// The source was swapped or stopped while an operation was pending.
    Aborted,
    /// The platform refused to start playback (autoplay policy and similar).
    NotAllowed,
}

impl MediaFailure {
    /// Aborts caused by intentional source swaps are never shown to the user.
    pub fn is_user_visible(self) -> bool {
        !matches!(self, MediaFailure::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LoadFailureKind {
    Network,
    Decode,
}

#[derive(Error, Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum PlaybackError {
    /// Network or decode failure; disables the affected track only.
    #[error("Audio could not be loaded ({kind:?})")]
    SourceLoad { kind: LoadFailureKind },

    /// Playback start was refused; recoverable by an explicit play.
    #[error("Playback was blocked; press play to try again")]
    PlayRejected,

    #[error("Playback aborted by a source change")]
    AbortedBySwap,

    #[error("Timing data has {overlaps} overlapping segment(s)")]
    SegmentDataAnomaly { overlaps: usize },
}

impl From<MediaFailure> for PlaybackError {
    fn from(failure: MediaFailure) -> Self {
        match failure {
            MediaFailure::Decode => PlaybackError::SourceLoad {
                kind: LoadFailureKind::Decode,
            },
            MediaFailure::Network => PlaybackError::SourceLoad {
                kind: LoadFailureKind::Network,
            },
            MediaFailure::Aborted => PlaybackError::AbortedBySwap,
            MediaFailure::NotAllowed => PlaybackError::PlayRejected,
        }
    }
}

impl PlaybackError {
    /// Whether this error leaves the track unusable until retried.
    pub fn disables_track(&self) -> bool {
        matches!(self, PlaybackError::SourceLoad { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerseKeyError {
    #[error("verse key `{0}` is not of the form chapter:verse")]
    Malformed(String),
    #[error("verse key `{0}` uses zero or out-of-range numbers")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborts_are_hidden_from_users() {
        assert!(!MediaFailure::Aborted.is_user_visible());
        assert!(MediaFailure::NotAllowed.is_user_visible());
        assert_eq!(
            PlaybackError::from(MediaFailure::Aborted),
            PlaybackError::AbortedBySwap
        );
    }

    #[test]
    fn only_load_failures_disable_tracks() {
        assert!(PlaybackError::from(MediaFailure::Network).disables_track());
        assert!(!PlaybackError::from(MediaFailure::NotAllowed).disables_track());
    }

    #[test]
    fn errors_serialize_with_type_tag() {
        let load = serde_json::to_value(PlaybackError::from(MediaFailure::Decode)).unwrap();
        assert_eq!(load, serde_json::json!({ "type": "source_load", "kind": "decode" }));

        let anomaly = serde_json::to_value(PlaybackError::SegmentDataAnomaly { overlaps: 2 }).unwrap();
        assert_eq!(anomaly, serde_json::json!({ "type": "segment_data_anomaly", "overlaps": 2 }));
    }
}
