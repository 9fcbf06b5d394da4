//! Edit session state machine for one timespan.
//!
//! [`transition`] is a pure function from `(state, event)` to the next state
//! plus the effects the caller must carry out (store dispatches, commit
//! emission, form notifications). [`SessionMachine`] holds the current state
//! for callers that want a mutable handle.
//!
//! Typed and dragged input may both move the segment. [`reconcile_decision`]
//! settles which source the form text follows.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bridge::StoreAction;
use crate::error::{EngineError, Result};
use crate::segment::{
    Segment, SpanFields, apply_form_bounds, clamp_bounds, to_segment, to_span_fields,
};
use crate::span::{Span, SpanCommit, SpanId};
use crate::time::parse_hhmmss;
use crate::validate::{FieldState, FormField, SpanDraft, Validation, validate};

/// Input-mode flags used to arbitrate between typed and dragged bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputModeFlags {
    pub is_typing: bool,
    pub is_dragging: bool,
    pub is_initializing: bool,
}

/// Text currently shown in the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveForm {
    pub begin_time: String,
    pub end_time: String,
    pub title: String,
}

impl LiveForm {
    pub fn draft(&self) -> SpanDraft<'_> {
        SpanDraft {
            begin_time: &self.begin_time,
            end_time: &self.end_time,
            title: &self.title,
        }
    }

    fn field_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::BeginTime => &mut self.begin_time,
            FormField::EndTime => &mut self.end_time,
            FormField::Title => &mut self.title,
        }
    }
}

/// Form text plus per-field feedback, as rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormView {
    pub span_id: SpanId,
    pub begin_time: String,
    pub end_time: String,
    pub title: String,
    pub begin_state: FieldState,
    pub end_state: FieldState,
    pub title_state: FieldState,
    pub can_save: bool,
}

/// State owned by one open edit session.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub target_span_id: SpanId,
    /// Copy of the other spans taken when the session opened.
    pub sibling_snapshot: Vec<Span>,
    pub original_segment: Segment,
    /// Live mirror of the target's segment.
    pub segment: Segment,
    pub live_form: LiveForm,
    pub flags: InputModeFlags,
    pub track_duration: f64,
}

impl EditSession {
    pub fn validation(&self) -> Validation {
        validate(
            &self.live_form.draft(),
            &self.sibling_snapshot,
            self.track_duration,
        )
    }

    pub fn form_view(&self) -> FormView {
        let validation = self.validation();
        FormView {
            span_id: self.target_span_id.clone(),
            begin_time: self.live_form.begin_time.clone(),
            end_time: self.live_form.end_time.clone(),
            title: self.live_form.title.clone(),
            begin_state: validation.begin_time,
            end_state: validation.end_time,
            title_state: validation.title,
            can_save: validation.is_valid(),
        }
    }

    /// Overwrites begin/end text; returns whether anything changed.
    fn show_fields(&mut self, fields: SpanFields) -> bool {
        let changed = self.live_form.begin_time != fields.begin_time
            || self.live_form.end_time != fields.end_time;
        self.live_form.begin_time = fields.begin_time;
        self.live_form.end_time = fields.end_time;
        changed
    }
}

/// Lifecycle phase, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Initializing,
    Editing,
    Committing,
    Cancelling,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Idle,
    Initializing(EditSession),
    Editing(EditSession),
    Committing(EditSession),
    Cancelling(EditSession),
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Idle => SessionPhase::Idle,
            Self::Initializing(_) => SessionPhase::Initializing,
            Self::Editing(_) => SessionPhase::Editing,
            Self::Committing(_) => SessionPhase::Committing,
            Self::Cancelling(_) => SessionPhase::Cancelling,
        }
    }

    pub fn session(&self) -> Option<&EditSession> {
        match self {
            Self::Idle => None,
            Self::Initializing(session)
            | Self::Editing(session)
            | Self::Committing(session)
            | Self::Cancelling(session) => Some(session),
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BeginEdit {
        span: Span,
        siblings: Vec<Span>,
        track_duration: f64,
    },
    /// A render pass: recompute form text from the segment where allowed.
    Reconcile,
    Type {
        field: FormField,
        value: String,
    },
    Drag {
        start_time: f64,
        end_time: f64,
    },
    DragEnd,
    Save,
    Cancel,
    /// Ends a committing or cancelling session.
    Finish,
}

/// Work the caller carries out after a transition, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    Started { span_id: SpanId },
    Dispatch(StoreAction),
    FormChanged,
    SaveRejected(Validation),
    Commit(SpanCommit),
    Cancelled { span_id: SpanId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<SessionEffect>,
}

/// A contract violation; the state is handed back untouched.
#[derive(Debug)]
pub struct Rejected {
    pub state: SessionState,
    pub error: EngineError,
}

/// Outcome of derived-state reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Show the segment's bounds in the form.
    Reformat,
    /// Keep the text the form already shows.
    Retain,
}

/// Decides whether the form should follow the segment.
///
/// Segment bounds win while a drag is in progress and neither typing nor
/// initialization blocks it, and once on the first pass after the session
/// opens (non-empty segment, no drag or typing). Otherwise user text stays.
pub fn reconcile_decision(flags: InputModeFlags, segment: &Segment) -> Reconciliation {
    let InputModeFlags {
        is_typing,
        is_dragging,
        is_initializing,
    } = flags;

    if is_dragging && !is_typing && !is_initializing {
        return Reconciliation::Reformat;
    }
    if is_initializing && !is_dragging && !is_typing && segment.end_time > segment.start_time {
        return Reconciliation::Reformat;
    }
    Reconciliation::Retain
}

/// Applies one event.
pub fn transition(
    state: SessionState,
    event: SessionEvent,
) -> std::result::Result<Transition, Rejected> {
    let from = state.phase();
    let result = match (state, event) {
        (
            SessionState::Idle,
            SessionEvent::BeginEdit {
                span,
                siblings,
                track_duration,
            },
        ) => begin_edit(span, siblings, track_duration).map_err(|error| Rejected {
            state: SessionState::Idle,
            error,
        }),
        (SessionState::Idle, SessionEvent::Reconcile) => Ok(unchanged(SessionState::Idle)),
        (SessionState::Idle, _) => Err(Rejected {
            state: SessionState::Idle,
            error: EngineError::NoActiveSession,
        }),
        (SessionState::Initializing(session), event) => step_open(session, true, event),
        (SessionState::Editing(session), event) => step_open(session, false, event),
        (SessionState::Committing(_) | SessionState::Cancelling(_), SessionEvent::Finish) => {
            Ok(unchanged(SessionState::Idle))
        }
        (state @ (SessionState::Committing(_) | SessionState::Cancelling(_)), _) => {
            Err(Rejected {
                state,
                error: EngineError::NoActiveSession,
            })
        }
    };

    match &result {
        Ok(transition) if transition.state.phase() != from => {
            debug!(?from, to = ?transition.state.phase(), "session transition");
        }
        Ok(_) => {}
        Err(rejected) => warn!(?from, error = %rejected.error, "session event rejected"),
    }
    result
}

fn unchanged(state: SessionState) -> Transition {
    Transition {
        state,
        effects: Vec::new(),
    }
}

fn begin_edit(span: Span, siblings: Vec<Span>, track_duration: f64) -> Result<Transition> {
    let original_segment = to_segment(&span);
    let fields = to_span_fields(&original_segment)?;
    let segment = Segment {
        editable: true,
        ..original_segment.clone()
    };
    let sibling_snapshot: Vec<Span> = siblings
        .into_iter()
        .filter(|sibling| sibling.id != span.id)
        .collect();

    info!(
        span_id = %span.id,
        siblings = sibling_snapshot.len(),
        track_duration,
        "edit session started"
    );

    let session = EditSession {
        target_span_id: span.id.clone(),
        sibling_snapshot,
        original_segment,
        segment: segment.clone(),
        live_form: LiveForm {
            begin_time: fields.begin_time,
            end_time: fields.end_time,
            title: span.title,
        },
        flags: InputModeFlags {
            is_initializing: true,
            ..InputModeFlags::default()
        },
        track_duration,
    };

    Ok(Transition {
        state: SessionState::Initializing(session),
        effects: vec![
            SessionEffect::Started { span_id: span.id.clone() },
            SessionEffect::Dispatch(StoreAction::ActivateSegment { segment_id: span.id }),
            SessionEffect::Dispatch(StoreAction::UpdateSegment { segment }),
            SessionEffect::FormChanged,
        ],
    })
}

fn step_open(
    mut session: EditSession,
    initializing: bool,
    event: SessionEvent,
) -> std::result::Result<Transition, Rejected> {
    let reopen = |session: EditSession| {
        if initializing {
            SessionState::Initializing(session)
        } else {
            SessionState::Editing(session)
        }
    };

    match event {
        SessionEvent::BeginEdit { .. } => Err(Rejected {
            error: EngineError::SessionAlreadyOpen {
                span_id: session.target_span_id.clone(),
            },
            state: reopen(session),
        }),
        SessionEvent::Reconcile => Ok(on_reconcile(session, initializing)),
        SessionEvent::Type { field, value } => Ok(on_type(session, field, value)),
        SessionEvent::Drag {
            start_time,
            end_time,
        } => Ok(on_drag(session, start_time, end_time)),
        SessionEvent::DragEnd => {
            session.flags.is_dragging = false;
            Ok(unchanged(reopen(session)))
        }
        SessionEvent::Save => Ok(on_save(session, reopen)),
        SessionEvent::Cancel => Ok(on_cancel(session)),
        SessionEvent::Finish => Ok(unchanged(reopen(session))),
    }
}

fn on_reconcile(mut session: EditSession, initializing: bool) -> Transition {
    let decision = reconcile_decision(session.flags, &session.segment);
    debug!(?decision, flags = ?session.flags, "reconcile");

    let mut changed = false;
    if decision == Reconciliation::Reformat {
        match to_span_fields(&session.segment) {
            Ok(fields) => changed = session.show_fields(fields),
            Err(error) => warn!(%error, "segment bounds could not be formatted"),
        }
    }

    if initializing {
        if decision == Reconciliation::Retain {
            return unchanged(SessionState::Initializing(session));
        }
        session.flags.is_initializing = false;
        return Transition {
            state: SessionState::Editing(session),
            effects: vec![SessionEffect::FormChanged],
        };
    }

    Transition {
        state: SessionState::Editing(session),
        effects: if changed {
            vec![SessionEffect::FormChanged]
        } else {
            Vec::new()
        },
    }
}

fn on_type(mut session: EditSession, field: FormField, value: String) -> Transition {
    session.flags.is_typing = true;
    session.flags.is_initializing = false;
    *session.live_form.field_mut(field) = value;

    session.segment = apply_form_bounds(
        &session.segment,
        &session.live_form.begin_time,
        &session.live_form.end_time,
        session.track_duration,
    );

    Transition {
        effects: vec![
            SessionEffect::Dispatch(StoreAction::UpdateSegment {
                segment: session.segment.clone(),
            }),
            SessionEffect::FormChanged,
        ],
        state: SessionState::Editing(session),
    }
}

fn on_drag(mut session: EditSession, start_time: f64, end_time: f64) -> Transition {
    let (start, end, clamped) = clamp_bounds(start_time, end_time, session.track_duration);
    if clamped {
        warn!(start_time, end_time, start, end, "drag bounds clamped");
    }
    session.segment.start_time = start;
    session.segment.end_time = end;
    session.flags.is_dragging = true;

    // A drag supersedes initialization; only pending typed text survives it,
    // and only for this first drag.
    let drag_flags = InputModeFlags {
        is_initializing: false,
        ..session.flags
    };
    let mut changed = false;
    if reconcile_decision(drag_flags, &session.segment) == Reconciliation::Reformat {
        match to_span_fields(&session.segment) {
            Ok(fields) => changed = session.show_fields(fields),
            Err(error) => warn!(%error, "segment bounds could not be formatted"),
        }
    }
    session.flags.is_typing = false;
    session.flags.is_initializing = false;

    let mut effects = Vec::new();
    if clamped {
        effects.push(SessionEffect::Dispatch(StoreAction::UpdateSegment {
            segment: session.segment.clone(),
        }));
    }
    if changed {
        effects.push(SessionEffect::FormChanged);
    }
    Transition {
        state: SessionState::Editing(session),
        effects,
    }
}

fn on_save(session: EditSession, reopen: impl Fn(EditSession) -> SessionState) -> Transition {
    let validation = session.validation();
    let begin = parse_hhmmss(&session.live_form.begin_time);
    let end = parse_hhmmss(&session.live_form.end_time);

    let (start_time, end_time) = match (begin, end) {
        (Ok(begin), Ok(end)) if validation.is_valid() => (begin, end),
        _ => {
            warn!(
                span_id = %session.target_span_id,
                reasons = ?validation.reasons,
                "save rejected"
            );
            return Transition {
                state: reopen(session),
                effects: vec![SessionEffect::SaveRejected(validation)],
            };
        }
    };

    let segment = Segment {
        id: session.target_span_id.clone(),
        start_time,
        end_time,
        editable: false,
    };
    let commit = SpanCommit {
        span_id: session.target_span_id.clone(),
        begin_time: session.live_form.begin_time.trim().to_string(),
        end_time: session.live_form.end_time.trim().to_string(),
        title: session.live_form.title.trim().to_string(),
    };
    info!(
        span_id = %commit.span_id,
        begin = %commit.begin_time,
        end = %commit.end_time,
        "edit session committed"
    );

    Transition {
        state: SessionState::Committing(session),
        effects: vec![
            SessionEffect::Dispatch(StoreAction::SaveSegment { segment }),
            SessionEffect::Commit(commit),
        ],
    }
}

fn on_cancel(session: EditSession) -> Transition {
    info!(span_id = %session.target_span_id, "edit session cancelled");
    Transition {
        effects: vec![
            SessionEffect::Dispatch(StoreAction::RevertSegment {
                segment: session.original_segment.clone(),
            }),
            SessionEffect::Cancelled {
                span_id: session.target_span_id.clone(),
            },
        ],
        state: SessionState::Cancelling(session),
    }
}

/// Mutable holder around [`transition`].
///
/// Committing and cancelling sessions are finished within the same call, so
/// callers only ever observe `Idle`, `Initializing` or `Editing`.
#[derive(Debug, Default)]
pub struct SessionMachine {
    state: SessionState,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.state.session()
    }

    /// Applies `event` and returns the effects to carry out.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionEffect>> {
        let state = std::mem::take(&mut self.state);
        let step = match transition(state, event) {
            Ok(step) => step,
            Err(rejected) => {
                self.state = rejected.state;
                return Err(rejected.error);
            }
        };

        let mut effects = step.effects;
        self.state = step.state;
        if matches!(
            self.state.phase(),
            SessionPhase::Committing | SessionPhase::Cancelling
        ) {
            let state = std::mem::take(&mut self.state);
            match transition(state, SessionEvent::Finish) {
                Ok(finished) => {
                    effects.extend(finished.effects);
                    self.state = finished.state;
                }
                Err(rejected) => {
                    self.state = rejected.state;
                    return Err(rejected.error);
                }
            }
        }
        Ok(effects)
    }
}
