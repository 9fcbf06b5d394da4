//! Timespan editing engine: keeps a draggable waveform segment, a begin/end/title
//! form and the sibling spans of a structure document consistent.

pub mod api;
pub mod bridge;
pub mod error;
pub mod segment;
pub mod session;
pub mod span;
pub mod time;
pub mod validate;

pub use api::{Command, Editor, EditorSettings, EngineErrorEvent, EngineErrorKind, Event};
pub use bridge::{SegmentStore, StoreAction, StoreBridge};
pub use error::{EngineError, Result};
pub use segment::{Segment, SegmentSet};
pub use session::{FormView, InputModeFlags, SessionPhase};
pub use span::{Span, SpanCommit, SpanId, Structure};
pub use time::{format_hhmmss, parse_hhmmss};
pub use validate::{FieldState, FormField, Validation, ValidationReason};
