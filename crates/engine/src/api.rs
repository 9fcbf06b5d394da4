use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bridge::StoreBridge;
use crate::error::{EngineError, Result};
use crate::session::{
    EditSession, FormView, SessionEffect, SessionEvent, SessionMachine, SessionPhase,
};
use crate::span::{SpanCommit, SpanId, Structure};
use crate::validate::{FormField, ValidationReason};

/// Commands accepted by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Opens an edit session for `span_id`.
    ///
    /// # Example
    /// ```
    /// use span_engine::bridge::SegmentStore;
    /// use span_engine::span::Structure;
    /// use span_engine::{Command, Editor, EditorSettings, Event};
    ///
    /// let structure = Structure::from_json_str(
    ///     r#"{"type":"root","label":"Talk","items":[
    ///         {"type":"span","id":"intro","label":"Intro","begin":"00:00:00","end":"00:00:30"}
    ///     ]}"#,
    /// )
    /// .expect("valid structure");
    /// let mut editor = Editor::new(
    ///     structure,
    ///     EditorSettings { track_duration: 600.0 },
    ///     SegmentStore::default(),
    /// );
    ///
    /// let events = editor
    ///     .handle_command(Command::BeginEdit {
    ///         span_id: "intro".to_string(),
    ///     })
    ///     .expect("span exists");
    /// assert!(matches!(events[0], Event::SessionStarted { .. }));
    /// assert!(editor.editing_disabled());
    /// ```
    BeginEdit { span_id: SpanId },
    /// A render pass of the form.
    Reconcile,
    /// Raw text typed into one field.
    Type { field: FormField, value: String },
    /// New bounds reported by the waveform widget for segment `id`.
    Drag {
        id: SpanId,
        start_time: f64,
        end_time: f64,
    },
    DragEnd,
    Save,
    Cancel,
}

/// Events emitted by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    SessionStarted { span_id: SpanId },
    FormChanged(FormView),
    SaveRejected { reasons: Vec<ValidationReason> },
    Committed(SpanCommit),
    Cancelled { span_id: SpanId },
    StructureChanged,
    Error(EngineErrorEvent),
}

/// User-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    NoActiveSession,
    SessionAlreadyOpen,
    SpanNotFound,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::NoActiveSession => Self::NoActiveSession,
            EngineError::SessionAlreadyOpen { .. } => Self::SessionAlreadyOpen,
            EngineError::SpanNotFound { .. } => Self::SpanNotFound,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Editor-wide settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorSettings {
    /// Media duration in seconds; the upper bound for every span.
    pub track_duration: f64,
}

/// Timespan editor: structure document, one session at a time, and the store
/// the waveform widget listens to.
#[derive(Debug)]
pub struct Editor<B> {
    structure: Structure,
    settings: EditorSettings,
    machine: SessionMachine,
    bridge: B,
}

impl<B> Editor<B>
where
    B: StoreBridge,
{
    pub fn new(structure: Structure, settings: EditorSettings, bridge: B) -> Self {
        Self {
            structure,
            settings,
            machine: SessionMachine::new(),
            bridge,
        }
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        let event = match command {
            Command::BeginEdit { span_id } => self.begin_edit_event(span_id)?,
            Command::Reconcile => SessionEvent::Reconcile,
            Command::Type { field, value } => SessionEvent::Type { field, value },
            Command::Drag {
                id,
                start_time,
                end_time,
            } => {
                let target = self
                    .machine
                    .session()
                    .map(|session| session.target_span_id.as_str())
                    .ok_or(EngineError::NoActiveSession)?;
                if target != id {
                    warn!(
                        segment_id = %id,
                        active_span = target,
                        "drag of non-editable segment ignored"
                    );
                    return Ok(Vec::new());
                }
                SessionEvent::Drag {
                    start_time,
                    end_time,
                }
            }
            Command::DragEnd => SessionEvent::DragEnd,
            Command::Save => SessionEvent::Save,
            Command::Cancel => SessionEvent::Cancel,
        };

        let effects = self.machine.handle(event)?;
        self.apply_effects(effects)
    }

    /// True while a session is open; other list items must not start editing.
    pub fn editing_disabled(&self) -> bool {
        self.machine.phase() != SessionPhase::Idle
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.machine.session()
    }

    pub fn form_view(&self) -> Option<FormView> {
        self.machine.session().map(EditSession::form_view)
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    fn begin_edit_event(&self, span_id: SpanId) -> Result<SessionEvent> {
        let span = self
            .structure
            .span(&span_id)?
            .ok_or_else(|| EngineError::SpanNotFound {
                span_id: span_id.clone(),
            })?;
        let siblings = self.structure.siblings_of(&span_id)?;
        Ok(SessionEvent::BeginEdit {
            span,
            siblings,
            track_duration: self.settings.track_duration,
        })
    }

    fn apply_effects(&mut self, effects: Vec<SessionEffect>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for effect in effects {
            match effect {
                SessionEffect::Started { span_id } => {
                    events.push(Event::SessionStarted { span_id });
                }
                SessionEffect::Dispatch(action) => self.bridge.dispatch(action),
                SessionEffect::FormChanged => {
                    if let Some(view) = self.form_view() {
                        events.push(Event::FormChanged(view));
                    }
                }
                SessionEffect::SaveRejected(validation) => {
                    events.push(Event::SaveRejected {
                        reasons: validation.reasons,
                    });
                }
                SessionEffect::Commit(commit) => {
                    self.structure.apply_commit(&commit)?;
                    events.push(Event::Committed(commit));
                    events.push(Event::StructureChanged);
                }
                SessionEffect::Cancelled { span_id } => {
                    events.push(Event::Cancelled { span_id });
                }
            }
        }

        debug!(events = events.len(), phase = ?self.machine.phase(), "command applied");
        Ok(events)
    }
}
