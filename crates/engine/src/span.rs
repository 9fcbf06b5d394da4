use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::time::{format_hhmmss, parse_hhmmss, seconds_to_millis};

/// Opaque identifier shared by a span and its waveform segment.
pub type SpanId = String;

/// A titled time interval over the media track, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: SpanId,
    pub title: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl Span {
    /// Returns the half-open interval `[start, end)` in whole milliseconds.
    pub fn interval_ms(&self) -> (i64, i64) {
        (
            seconds_to_millis(self.start_time),
            seconds_to_millis(self.end_time),
        )
    }
}

/// Values emitted when an edit session commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanCommit {
    pub span_id: SpanId,
    pub begin_time: String,
    pub end_time: String,
    pub title: String,
}

/// One node of the structure document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StructureItem {
    Root {
        #[serde(default)]
        id: String,
        label: String,
        #[serde(default)]
        items: Vec<StructureItem>,
    },
    Div {
        #[serde(default)]
        id: String,
        label: String,
        #[serde(default)]
        items: Vec<StructureItem>,
    },
    Span {
        #[serde(default)]
        id: String,
        label: String,
        begin: String,
        end: String,
    },
}

impl StructureItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Root { id, .. } | Self::Div { id, .. } | Self::Span { id, .. } => id,
        }
    }

    fn id_mut(&mut self) -> &mut String {
        match self {
            Self::Root { id, .. } | Self::Div { id, .. } | Self::Span { id, .. } => id,
        }
    }

    fn children(&self) -> &[StructureItem] {
        match self {
            Self::Root { items, .. } | Self::Div { items, .. } => items,
            Self::Span { .. } => &[],
        }
    }

    fn children_mut(&mut self) -> &mut [StructureItem] {
        match self {
            Self::Root { items, .. } | Self::Div { items, .. } => items,
            Self::Span { .. } => &mut [],
        }
    }
}

/// Structural metadata document: a tree of headings (`div`) and timed spans.
///
/// Every span in the tree holds parseable begin/end text with `begin < end`;
/// construction and [`Structure::apply_commit`] both enforce this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structure {
    root: StructureItem,
}

impl Structure {
    /// Wraps a document tree, assigning `item-<n>` ids where they are missing.
    pub fn new(mut root: StructureItem) -> Result<Self> {
        let mut counter = 0_usize;
        assign_missing_ids(&mut root, &mut counter);

        let mut seen = HashSet::new();
        check_items(&root, &mut seen)?;

        Ok(Self { root })
    }

    /// Parses a JSON document.
    ///
    /// # Example
    /// ```
    /// use span_engine::span::Structure;
    ///
    /// let structure = Structure::from_json_str(
    ///     r#"{"type":"root","label":"Concert","items":[
    ///         {"type":"span","label":"Overture","begin":"00:00:00","end":"00:01:30"}
    ///     ]}"#,
    /// )
    /// .expect("valid structure");
    ///
    /// let spans = structure.spans().expect("spans parse");
    /// assert_eq!(spans[0].end_time, 90.0);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let root: StructureItem =
            serde_json::from_str(json).map_err(|error| EngineError::InvalidStructure {
                reason: error.to_string(),
            })?;
        Self::new(root)
    }

    /// Loads a JSON document from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::StructureIo {
            context: "failed to read structure",
            path: path.to_path_buf(),
            source,
        })?;
        let root: StructureItem =
            serde_json::from_str(&text).map_err(|source| EngineError::StructureSerialization {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(root)
    }

    /// Writes the document to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.root).map_err(|source| {
            EngineError::StructureSerialization {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(path, text).map_err(|source| EngineError::StructureIo {
            context: "failed to write structure",
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn root(&self) -> &StructureItem {
        &self.root
    }

    /// Returns every span in document order.
    pub fn spans(&self) -> Result<Vec<Span>> {
        let mut spans = Vec::new();
        collect_spans(&self.root, &mut spans)?;
        Ok(spans)
    }

    /// Returns the span with `span_id`, if any.
    pub fn span(&self, span_id: &str) -> Result<Option<Span>> {
        Ok(self.spans()?.into_iter().find(|span| span.id == span_id))
    }

    /// Returns every span except `span_id`; the domain an edit validates against.
    pub fn siblings_of(&self, span_id: &str) -> Result<Vec<Span>> {
        Ok(self
            .spans()?
            .into_iter()
            .filter(|span| span.id != span_id)
            .collect())
    }

    /// Writes committed values back into the matching span item.
    ///
    /// Times are stored in canonical `HH:MM:SS(.fff)` form.
    pub fn apply_commit(&mut self, commit: &SpanCommit) -> Result<()> {
        let begin = parse_hhmmss(&commit.begin_time)?;
        let end = parse_hhmmss(&commit.end_time)?;
        if begin >= end {
            return Err(EngineError::InvalidStructure {
                reason: format!(
                    "span {} would end before it begins: {} >= {}",
                    commit.span_id, commit.begin_time, commit.end_time
                ),
            });
        }

        let Some(item) = find_item_mut(&mut self.root, &commit.span_id) else {
            return Err(EngineError::SpanNotFound {
                span_id: commit.span_id.clone(),
            });
        };
        let StructureItem::Span {
            label,
            begin: begin_text,
            end: end_text,
            ..
        } = item
        else {
            return Err(EngineError::SpanNotFound {
                span_id: commit.span_id.clone(),
            });
        };

        *label = commit.title.trim().to_string();
        *begin_text = format_hhmmss(begin)?;
        *end_text = format_hhmmss(end)?;

        debug!(
            span_id = %commit.span_id,
            begin = %begin_text,
            end = %end_text,
            "structure span updated"
        );
        Ok(())
    }
}

fn assign_missing_ids(item: &mut StructureItem, counter: &mut usize) {
    *counter += 1;
    if item.id().is_empty() {
        *item.id_mut() = format!("item-{counter}");
    }
    for child in item.children_mut() {
        assign_missing_ids(child, counter);
    }
}

fn check_items(item: &StructureItem, seen: &mut HashSet<String>) -> Result<()> {
    if !seen.insert(item.id().to_string()) {
        return Err(EngineError::InvalidStructure {
            reason: format!("duplicate item id {}", item.id()),
        });
    }
    if let StructureItem::Span { .. } = item {
        span_from_item(item)?;
    }
    for child in item.children() {
        check_items(child, seen)?;
    }
    Ok(())
}

fn collect_spans(item: &StructureItem, spans: &mut Vec<Span>) -> Result<()> {
    if let Some(span) = span_from_item(item)? {
        spans.push(span);
    }
    for child in item.children() {
        collect_spans(child, spans)?;
    }
    Ok(())
}

fn span_from_item(item: &StructureItem) -> Result<Option<Span>> {
    let StructureItem::Span {
        id,
        label,
        begin,
        end,
    } = item
    else {
        return Ok(None);
    };

    let invalid = |detail: String| EngineError::InvalidStructure {
        reason: format!("span {id}: {detail}"),
    };
    let start_time = parse_hhmmss(begin).map_err(|error| invalid(error.to_string()))?;
    let end_time = parse_hhmmss(end).map_err(|error| invalid(error.to_string()))?;
    if start_time >= end_time {
        return Err(invalid(format!("begin {begin} is not before end {end}")));
    }

    Ok(Some(Span {
        id: id.clone(),
        title: label.clone(),
        start_time,
        end_time,
    }))
}

fn find_item_mut<'a>(item: &'a mut StructureItem, id: &str) -> Option<&'a mut StructureItem> {
    if item.id() == id {
        return Some(item);
    }
    item.children_mut()
        .iter_mut()
        .find_map(|child| find_item_mut(child, id))
}
