use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::span::SpanId;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the time codec, the structure document and the editor.
///
/// Parse and validation problems met while a user is typing are not reported
/// through this type; they become field states on the live form instead.
#[derive(Debug)]
pub enum EngineError {
    InvalidSeconds(f64),
    TimeParse {
        value: String,
        reason: TimeParseReason,
    },
    NoActiveSession,
    SessionAlreadyOpen {
        span_id: SpanId,
    },
    SpanNotFound {
        span_id: SpanId,
    },
    SegmentNotFound {
        segment_id: SpanId,
    },
    StructureIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    StructureSerialization {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidStructure {
        reason: String,
    },
}

/// Why a time text failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeParseReason {
    Empty,
    NotNumeric,
    TooManyComponents,
    ComponentOutOfRange,
}

impl Display for TimeParseReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::NotNumeric => write!(f, "not numeric"),
            Self::TooManyComponents => write!(f, "too many components"),
            Self::ComponentOutOfRange => write!(f, "minutes or seconds out of range"),
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSeconds(value) => write!(f, "invalid seconds value: {value}"),
            Self::TimeParse { value, reason } => {
                write!(f, "cannot parse time {value:?}: {reason}")
            }
            Self::NoActiveSession => write!(f, "no edit session is open"),
            Self::SessionAlreadyOpen { span_id } => {
                write!(f, "an edit session is already open for span {span_id}")
            }
            Self::SpanNotFound { span_id } => write!(f, "span not found: {span_id}"),
            Self::SegmentNotFound { segment_id } => {
                write!(f, "segment not found: {segment_id}")
            }
            Self::StructureIo {
                context,
                path,
                source,
            } => write!(f, "{context}: {} ({source})", path.display()),
            Self::StructureSerialization { path, source } => {
                write!(
                    f,
                    "structure serialization/deserialization failed at {} ({source})",
                    path.display()
                )
            }
            Self::InvalidStructure { reason } => write!(f, "invalid structure: {reason}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StructureIo { source, .. } => Some(source),
            Self::StructureSerialization { source, .. } => Some(source),
            _ => None,
        }
    }
}
