mod replay;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use span_engine::segment::SegmentSet;
use span_engine::{Editor, EditorSettings, SegmentStore, Structure};
use tracing::info;

/// Replays timespan editing commands against a structure document.
#[derive(Parser, Debug)]
#[command(name = "span-edit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Structure document (JSON)
    #[arg(short, long)]
    structure: PathBuf,

    /// JSON array of editor commands
    #[arg(long)]
    script: PathBuf,

    /// Media duration in seconds
    #[arg(short, long)]
    duration: f64,

    /// Write the structure here after the replay
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if !cli.duration.is_finite() || cli.duration <= 0.0 {
        anyhow::bail!(
            "duration must be a positive number of seconds, got {}",
            cli.duration
        );
    }

    let structure = Structure::load(&cli.structure)
        .with_context(|| format!("loading {}", cli.structure.display()))?;
    let commands = replay::load_script(&cli.script)?;

    let mut store = SegmentStore::new(SegmentSet::from_spans(&structure.spans()?));
    let actions = store.subscribe();
    let mut editor = Editor::new(
        structure,
        EditorSettings {
            track_duration: cli.duration,
        },
        store,
    );

    info!(commands = commands.len(), "replaying script");
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for line in replay::replay(&mut editor, &actions, commands)? {
        writeln!(out, "{line}").context("writing output")?;
    }

    if let Some(path) = &cli.output {
        editor
            .structure()
            .save(path)
            .with_context(|| format!("saving {}", path.display()))?;
        info!(path = %path.display(), "structure saved");
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init();
}
