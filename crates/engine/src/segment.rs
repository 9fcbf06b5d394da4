use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::span::{Span, SpanId};
use crate::time::{format_hhmmss, millis_to_seconds, parse_hhmmss, seconds_to_millis};

/// Shortest segment a clamped drag may produce, in seconds.
pub const MIN_SEGMENT_SECONDS: f64 = 0.001;

/// Waveform widget representation of a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SpanId,
    pub start_time: f64,
    pub end_time: f64,
    pub editable: bool,
}

/// Form text derived from segment bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanFields {
    pub begin_time: String,
    pub end_time: String,
}

/// Maps a span to a non-editable segment.
///
/// # Example
/// ```
/// use span_engine::segment::to_segment;
/// use span_engine::span::Span;
///
/// let segment = to_segment(&Span {
///     id: "s1".to_string(),
///     title: "Intro".to_string(),
///     start_time: 1.5,
///     end_time: 9.0,
/// });
/// assert_eq!(segment.start_time, 1.5);
/// assert!(!segment.editable);
/// ```
pub fn to_segment(span: &Span) -> Segment {
    Segment {
        id: span.id.clone(),
        start_time: span.start_time,
        end_time: span.end_time,
        editable: false,
    }
}

/// Formats segment bounds as form text.
pub fn to_span_fields(segment: &Segment) -> Result<SpanFields> {
    Ok(SpanFields {
        begin_time: format_hhmmss(segment.start_time)?,
        end_time: format_hhmmss(segment.end_time)?,
    })
}

/// Clamps drag bounds into `[0, track_duration]` with `start < end`.
///
/// Returns the bounds and whether anything had to change. Non-finite input is
/// pulled to the nearest track edge.
pub fn clamp_bounds(start_time: f64, end_time: f64, track_duration: f64) -> (f64, f64, bool) {
    let duration = track_duration.max(MIN_SEGMENT_SECONDS);
    let clamp = |value: f64, fallback: f64| {
        if value.is_nan() {
            fallback
        } else {
            value.clamp(0.0, duration)
        }
    };

    let mut start = clamp(start_time, 0.0);
    let mut end = clamp(end_time, duration);
    if start >= end {
        end = (start + MIN_SEGMENT_SECONDS).min(duration);
        start = start.min(end - MIN_SEGMENT_SECONDS).max(0.0);
    }

    let start = millis_to_seconds(seconds_to_millis(start));
    let end = millis_to_seconds(seconds_to_millis(end));
    let changed = start != start_time || end != end_time;
    (start, end, changed)
}

/// Applies parseable form text to segment bounds.
///
/// A valid typed pair replaces both bounds at once. Otherwise each bound is
/// only taken from the form when it parses, stays inside the track and keeps
/// the segment non-empty; anything else leaves that bound as it was.
pub fn apply_form_bounds(
    segment: &Segment,
    begin_text: &str,
    end_text: &str,
    track_duration: f64,
) -> Segment {
    let mut next = segment.clone();
    let in_track = |value: f64| value >= 0.0 && value <= track_duration;

    if let (Ok(begin), Ok(end)) = (parse_hhmmss(begin_text), parse_hhmmss(end_text)) {
        if in_track(begin) && in_track(end) && begin < end {
            next.start_time = begin;
            next.end_time = end;
            return next;
        }
    }

    if let Ok(begin) = parse_hhmmss(begin_text) {
        if in_track(begin) && begin < next.end_time {
            next.start_time = begin;
        }
    }
    if let Ok(end) = parse_hhmmss(end_text) {
        if in_track(end) && end > next.start_time {
            next.end_time = end;
        }
    }
    next
}

/// Mirror of the waveform widget's segment list.
///
/// At most one segment is editable at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentSet {
    segments: Vec<Segment>,
}

impl SegmentSet {
    pub fn from_spans(spans: &[Span]) -> Self {
        Self {
            segments: spans.iter().map(to_segment).collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.id == id)
    }

    /// Returns the editable segment, if any.
    pub fn active(&self) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.editable)
    }

    /// Makes `id` the only editable segment.
    pub fn activate(&mut self, id: &str) -> Result<()> {
        if self.get(id).is_none() {
            warn!(segment_id = id, "activate rejected: segment not found");
            return Err(EngineError::SegmentNotFound {
                segment_id: id.to_string(),
            });
        }

        for segment in &mut self.segments {
            segment.editable = segment.id == id;
        }
        debug!(segment_id = id, "segment activated");
        self.debug_assert_single_editable();
        Ok(())
    }

    /// Makes `id` non-editable; other segments are untouched.
    pub fn deactivate(&mut self, id: &str) {
        if let Some(segment) = self.segments.iter_mut().find(|segment| segment.id == id) {
            segment.editable = false;
        }
    }

    /// Replaces the stored bounds of `segment.id`, inserting it when unknown.
    ///
    /// An editable incoming segment takes the editable slot from any other.
    pub fn upsert(&mut self, segment: Segment) {
        if segment.editable {
            for other in &mut self.segments {
                other.editable = false;
            }
        }
        match self.segments.iter_mut().find(|existing| existing.id == segment.id) {
            Some(existing) => *existing = segment,
            None => self.segments.push(segment),
        }
        self.debug_assert_single_editable();
    }

    fn debug_assert_single_editable(&self) {
        debug_assert!(
            self.segments.iter().filter(|segment| segment.editable).count() <= 1,
            "more than one editable segment"
        );
    }
}
