//! Half-open time segments and sorted segment lookup.

use serde::Serialize;
use tracing::warn;
use ts_rs::TS;

/// `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct TimeSegment {
    pub start: f64,
    pub end: f64,
}

impl TimeSegment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

/// Normalise raw `[start, end, ...]` arrays. Entries with fewer than two
/// values, non-finite values, or an end before the start are dropped.
pub fn coerce_segments(raw: &[Vec<f64>]) -> Vec<TimeSegment> {
    raw.iter()
        .filter_map(|values| match values.as_slice() {
            [start, end, ..] if start.is_finite() && end.is_finite() && end >= start => {
                Some(TimeSegment::new(*start, *end))
            }
            _ => None,
        })
        .collect()
}

/// Segments sorted by start, each tagged with a value (queue index, word
/// index). Lookup picks the first segment by start whose window contains the
/// probe; between segments and after the last one, the preceding segment
/// stays active. Before the first segment nothing is active.
#[derive(Debug, Clone)]
pub struct SegmentTimeline<T> {
    spans: Vec<(TimeSegment, T)>,
    overlaps: usize,
}

impl<T> Default for SegmentTimeline<T> {
    fn default() -> Self {
        Self {
            spans: Vec::new(),
            overlaps: 0,
        }
    }
}

impl<T: Copy> SegmentTimeline<T> {
    pub fn new(label: &str, mut spans: Vec<(TimeSegment, T)>) -> Self {
        spans.sort_by(|a, b| a.0.start.total_cmp(&b.0.start));
        let overlaps = spans
            .windows(2)
            .filter(|pair| pair[1].0.start < pair[0].0.end)
            .count();
        if overlaps > 0 {
            warn!(
                timeline = label,
                overlaps,
                segments = spans.len(),
                "Overlapping segments; earliest-starting match wins"
            );
        }
        Self { spans, overlaps }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps
    }

    /// Segment tagged with `value`, if any.
    pub fn segment_of(&self, value: T) -> Option<TimeSegment>
    where
        T: PartialEq,
    {
        self.spans
            .iter()
            .find(|(_, tag)| *tag == value)
            .map(|(segment, _)| *segment)
    }

    /// Span active at `t`: the latest one that has started.
    ///
    /// Inside a gap between spans the previous one stays active, and past the
    /// last span the last one holds, so highlights never flicker off mid-play.
    /// Before the first span nothing is active; callers get `None` rather than
    /// an early highlight of the first word.
    pub fn lookup(&self, t: f64) -> Option<(TimeSegment, T)> {
        if !t.is_finite() {
            return None;
        }
        let started = self.spans.partition_point(|(segment, _)| segment.start <= t);
        if started == 0 {
            return None;
        }
        let candidates = &self.spans[..started];
        let last = candidates[started - 1];
        if self.overlaps == 0 {
            return Some(last);
        }
        Some(
            candidates
                .iter()
                .find(|(segment, _)| segment.contains(t))
                .copied()
                .unwrap_or(last),
        )
    }
}
