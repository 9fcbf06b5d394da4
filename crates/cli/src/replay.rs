use std::path::Path;
use std::sync::mpsc::Receiver;

use anyhow::{Context, Result};
use span_engine::bridge::drain_actions;
use span_engine::{Command, Editor, EngineErrorEvent, Event, StoreAction, StoreBridge};
use tracing::warn;

/// Reads a JSON array of commands.
pub fn load_script(path: &Path) -> Result<Vec<Command>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing script {}", path.display()))
}

/// Runs every command and renders the store actions and events it produced as
/// JSON lines, actions first.
///
/// A failing command becomes an `error` event; the replay continues.
pub fn replay<B>(
    editor: &mut Editor<B>,
    actions: &Receiver<StoreAction>,
    commands: Vec<Command>,
) -> Result<Vec<String>>
where
    B: StoreBridge,
{
    let mut lines = Vec::new();
    for command in commands {
        let events = match editor.handle_command(command) {
            Ok(events) => events,
            Err(error) => {
                warn!(%error, "command failed");
                vec![Event::Error(EngineErrorEvent::from_error(&error))]
            }
        };

        for action in drain_actions(actions) {
            lines.push(serde_json::to_string(&action).context("serializing store action")?);
        }
        for event in events {
            lines.push(serde_json::to_string(&event).context("serializing event")?);
        }
    }
    Ok(lines)
}
