//! Validity checks for a timespan being edited against its sibling spans.
//!
//! Every failing check becomes a [`ValidationReason`] owned by exactly one form
//! field. The per-field state functions run only the checks their field owns,
//! so the aggregate result is valid exactly when all three fields are valid.

use serde::{Deserialize, Serialize};

use crate::span::{Span, SpanId};
use crate::time::{parse_hhmmss, seconds_to_millis};

/// Editable fields of the timespan form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    BeginTime,
    EndTime,
    Title,
}

/// Visual feedback state of one form field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    #[default]
    Neutral,
    Valid,
    Invalid,
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ValidationReason {
    BeginUnparseable,
    EndUnparseable,
    BeginNotBeforeEnd,
    EndBeyondDuration,
    BeginInsideSibling { span_id: SpanId },
    EndInsideSibling { span_id: SpanId },
    ContainsSibling { span_id: SpanId },
    EmptyTitle,
}

impl ValidationReason {
    pub fn is_overlap(&self) -> bool {
        matches!(
            self,
            Self::BeginInsideSibling { .. }
                | Self::EndInsideSibling { .. }
                | Self::ContainsSibling { .. }
        )
    }

    fn check_order(&self) -> u8 {
        match self {
            Self::BeginUnparseable | Self::EndUnparseable => 0,
            Self::BeginNotBeforeEnd | Self::EndBeyondDuration => 1,
            Self::BeginInsideSibling { .. }
            | Self::EndInsideSibling { .. }
            | Self::ContainsSibling { .. } => 2,
            Self::EmptyTitle => 3,
        }
    }
}

/// Raw form text to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanDraft<'a> {
    pub begin_time: &'a str,
    pub end_time: &'a str,
    pub title: &'a str,
}

/// Aggregate result with every applicable reason, in check order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub reasons: Vec<ValidationReason>,
    pub begin_time: FieldState,
    pub end_time: FieldState,
    pub title: FieldState,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.reasons.is_empty()
    }

    /// The reason a short-circuiting validator would have stopped at.
    pub fn first_reason(&self) -> Option<&ValidationReason> {
        self.reasons.first()
    }

    pub fn field_state(&self, field: FormField) -> FieldState {
        match field {
            FormField::BeginTime => self.begin_time,
            FormField::EndTime => self.end_time,
            FormField::Title => self.title,
        }
    }
}

/// Returns true when `title` has content after trimming.
pub fn title_valid(title: &str) -> bool {
    !title.trim().is_empty()
}

/// Validates a draft against `siblings` and the track duration in seconds.
///
/// Intervals are half-open, so a span may start exactly where a sibling ends.
///
/// # Example
/// ```
/// use span_engine::span::Span;
/// use span_engine::validate::{SpanDraft, validate};
///
/// let siblings = vec![Span {
///     id: "a".to_string(),
///     title: "Intro".to_string(),
///     start_time: 0.0,
///     end_time: 10.0,
/// }];
/// let draft = SpanDraft {
///     begin_time: "00:00:10",
///     end_time: "00:00:20",
///     title: "Verse",
/// };
///
/// assert!(validate(&draft, &siblings, 60.0).is_valid());
/// ```
pub fn validate(draft: &SpanDraft<'_>, siblings: &[Span], track_duration: f64) -> Validation {
    let begin = begin_reasons(draft.begin_time, siblings);
    let end = end_reasons(draft.begin_time, draft.end_time, siblings, track_duration);
    let title = title_reasons(draft.title);

    let begin_state = text_field_state(draft.begin_time, &begin);
    let end_state = text_field_state(draft.end_time, &end);
    let title_state = title_field_state_from(&title);

    let mut reasons: Vec<ValidationReason> = begin.into_iter().chain(end).chain(title).collect();
    reasons.sort_by_key(ValidationReason::check_order);

    Validation {
        reasons,
        begin_time: begin_state,
        end_time: end_state,
        title: title_state,
    }
}

/// State of the begin field: parseable and not inside any sibling.
pub fn begin_field_state(begin_text: &str, siblings: &[Span]) -> FieldState {
    text_field_state(begin_text, &begin_reasons(begin_text, siblings))
}

/// State of the end field: parseable, after begin, within the track and not
/// overlapping any sibling.
pub fn end_field_state(
    begin_text: &str,
    end_text: &str,
    siblings: &[Span],
    track_duration: f64,
) -> FieldState {
    text_field_state(
        end_text,
        &end_reasons(begin_text, end_text, siblings, track_duration),
    )
}

pub fn title_field_state(title: &str) -> FieldState {
    title_field_state_from(&title_reasons(title))
}

fn text_field_state(text: &str, reasons: &[ValidationReason]) -> FieldState {
    if text.trim().is_empty() {
        FieldState::Neutral
    } else if reasons.is_empty() {
        FieldState::Valid
    } else {
        FieldState::Invalid
    }
}

fn title_field_state_from(reasons: &[ValidationReason]) -> FieldState {
    if reasons.is_empty() {
        FieldState::Valid
    } else {
        FieldState::Invalid
    }
}

fn parse_ms(text: &str) -> Option<i64> {
    parse_hhmmss(text).ok().map(seconds_to_millis)
}

fn begin_reasons(begin_text: &str, siblings: &[Span]) -> Vec<ValidationReason> {
    let Some(begin) = parse_ms(begin_text) else {
        return vec![ValidationReason::BeginUnparseable];
    };

    siblings
        .iter()
        .filter(|sibling| {
            let (start, end) = sibling.interval_ms();
            start <= begin && begin < end
        })
        .map(|sibling| ValidationReason::BeginInsideSibling {
            span_id: sibling.id.clone(),
        })
        .collect()
}

fn end_reasons(
    begin_text: &str,
    end_text: &str,
    siblings: &[Span],
    track_duration: f64,
) -> Vec<ValidationReason> {
    let Some(end) = parse_ms(end_text) else {
        return vec![ValidationReason::EndUnparseable];
    };
    let begin = parse_ms(begin_text);

    let mut reasons = Vec::new();
    if begin.is_some_and(|begin| begin >= end) {
        reasons.push(ValidationReason::BeginNotBeforeEnd);
    }
    if end > seconds_to_millis(track_duration) {
        reasons.push(ValidationReason::EndBeyondDuration);
    }

    for sibling in siblings {
        let (start, sibling_end) = sibling.interval_ms();
        if start < end && end <= sibling_end {
            reasons.push(ValidationReason::EndInsideSibling {
                span_id: sibling.id.clone(),
            });
        } else if begin.is_some_and(|begin| begin < start && sibling_end < end) {
            reasons.push(ValidationReason::ContainsSibling {
                span_id: sibling.id.clone(),
            });
        }
    }

    reasons
}

fn title_reasons(title: &str) -> Vec<ValidationReason> {
    if title_valid(title) {
        Vec::new()
    } else {
        vec![ValidationReason::EmptyTitle]
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FieldState, FormField, SpanDraft, ValidationReason, begin_field_state, end_field_state,
        title_field_state, title_valid, validate,
    };
    use crate::span::Span;

    fn span(id: &str, start_time: f64, end_time: f64) -> Span {
        Span {
            id: id.to_string(),
            title: id.to_string(),
            start_time,
            end_time,
        }
    }

    fn draft<'a>(begin_time: &'a str, end_time: &'a str, title: &'a str) -> SpanDraft<'a> {
        SpanDraft {
            begin_time,
            end_time,
            title,
        }
    }

    #[test]
    fn adjacent_span_is_valid() {
        let siblings = vec![span("a", 0.0, 10.0)];

        let result = validate(&draft("00:00:10", "00:00:20", "B"), &siblings, 60.0);

        assert!(result.is_valid(), "{:?}", result.reasons);
        assert_eq!(result.begin_time, FieldState::Valid);
        assert_eq!(result.end_time, FieldState::Valid);
        assert_eq!(result.title, FieldState::Valid);
    }

    #[test]
    fn span_adjacent_on_both_sides_is_valid() {
        let siblings = vec![span("a", 0.0, 10.0), span("c", 20.0, 30.0)];

        let result = validate(&draft("00:00:10", "00:00:20", "B"), &siblings, 60.0);

        assert!(result.is_valid(), "{:?}", result.reasons);
    }

    #[test]
    fn partial_overlap_is_reported_on_end_field() {
        let siblings = vec![span("s", 15.0, 25.0)];

        let result = validate(&draft("10", "20", "B"), &siblings, 60.0);

        assert!(!result.is_valid());
        assert_eq!(
            result.reasons,
            vec![ValidationReason::EndInsideSibling {
                span_id: "s".to_string()
            }]
        );
        assert!(result.reasons[0].is_overlap());
        assert_eq!(result.begin_time, FieldState::Valid);
        assert_eq!(result.end_time, FieldState::Invalid);
    }

    #[test]
    fn begin_inside_sibling_is_reported_on_begin_field() {
        let siblings = vec![span("s", 5.0, 15.0)];

        let result = validate(&draft("10", "20", "B"), &siblings, 60.0);

        assert_eq!(
            result.reasons,
            vec![ValidationReason::BeginInsideSibling {
                span_id: "s".to_string()
            }]
        );
        assert_eq!(result.field_state(FormField::BeginTime), FieldState::Invalid);
        assert_eq!(result.field_state(FormField::EndTime), FieldState::Valid);
    }

    #[test]
    fn containment_in_either_direction_is_an_overlap() {
        let inner = vec![span("inner", 12.0, 18.0)];
        let covering = validate(&draft("10", "20", "B"), &inner, 60.0);
        assert_eq!(
            covering.reasons,
            vec![ValidationReason::ContainsSibling {
                span_id: "inner".to_string()
            }]
        );

        let outer = vec![span("outer", 0.0, 30.0)];
        let inside = validate(&draft("10", "20", "B"), &outer, 60.0);
        assert_eq!(inside.reasons.len(), 2);
        assert!(inside.reasons.iter().all(ValidationReason::is_overlap));
        assert_eq!(inside.begin_time, FieldState::Invalid);
        assert_eq!(inside.end_time, FieldState::Invalid);
    }

    #[test]
    fn all_applicable_reasons_are_surfaced_in_check_order() {
        let siblings = vec![span("s", 0.0, 100.0)];

        let result = validate(&draft("00:00:50", "00:02:00", "  "), &siblings, 90.0);

        assert_eq!(
            result.reasons,
            vec![
                ValidationReason::EndBeyondDuration,
                ValidationReason::BeginInsideSibling {
                    span_id: "s".to_string()
                },
                ValidationReason::EmptyTitle,
            ]
        );
        assert_eq!(
            result.first_reason(),
            Some(&ValidationReason::EndBeyondDuration)
        );
    }

    #[test]
    fn end_not_after_begin_is_invalid() {
        let result = validate(&draft("00:00:20", "00:00:20", "B"), &[], 60.0);

        assert_eq!(result.reasons, vec![ValidationReason::BeginNotBeforeEnd]);
        assert_eq!(result.end_time, FieldState::Invalid);
    }

    #[test]
    fn end_equal_to_duration_is_valid() {
        let result = validate(&draft("00:00:50", "00:01:00", "B"), &[], 60.0);
        assert!(result.is_valid());
    }

    #[test]
    fn empty_time_fields_are_neutral_but_invalid_in_aggregate() {
        let result = validate(&draft("", "  ", "B"), &[], 60.0);

        assert!(!result.is_valid());
        assert_eq!(result.begin_time, FieldState::Neutral);
        assert_eq!(result.end_time, FieldState::Neutral);
        assert_eq!(
            result.reasons,
            vec![
                ValidationReason::BeginUnparseable,
                ValidationReason::EndUnparseable
            ]
        );
    }

    #[test]
    fn malformed_text_marks_field_invalid() {
        assert_eq!(begin_field_state("00:7x", &[]), FieldState::Invalid);
        assert_eq!(
            end_field_state("00:00:01", "00:99", &[], 60.0),
            FieldState::Invalid
        );
    }

    #[test]
    fn title_must_have_content_after_trimming() {
        assert!(title_valid("Act I"));
        assert!(!title_valid("   "));
        assert_eq!(title_field_state(""), FieldState::Invalid);
        assert_eq!(title_field_state("x"), FieldState::Valid);
    }

    #[test]
    fn field_states_agree_with_aggregate() {
        let siblings = vec![span("a", 10.0, 20.0), span("b", 40.0, 45.0)];
        let times = ["", "0", "00:00:05", "00:00:10", "15", "00:00:20", "30", "00:00:45", "50", "99"];
        let titles = ["", "T"];

        for begin in times {
            for end in times {
                for title in titles {
                    let draft = draft(begin, end, title);
                    let result = validate(&draft, &siblings, 60.0);
                    let states = [
                        begin_field_state(begin, &siblings),
                        end_field_state(begin, end, &siblings, 60.0),
                        title_field_state(title),
                    ];

                    assert_eq!(states[0], result.begin_time);
                    assert_eq!(states[1], result.end_time);
                    assert_eq!(states[2], result.title);
                    assert_eq!(
                        result.is_valid(),
                        states.iter().all(|state| *state == FieldState::Valid),
                        "begin={begin:?} end={end:?} title={title:?}"
                    );
                }
            }
        }
    }
}
