//! Expression Analyser v0.3 - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use expression_analyser::{
    batch::{BatchHistory, BatchProcessor, MediaItem},
    cli::{display::Terminal, Args, Commands, SettingsCommand},
    config::{DetectionRate, Settings},
    export::{ExportArtifact, ExportFormat, ExportSerializer},
    inference::{Frame, MockInference},
    session::{
        demo::with_demo_fallback,
        run_detection, ArchiveOverview, DetectionConfig, SessionArchive, SessionRecorder,
        TimeRange, MIN_DASHBOARD_SESSIONS,
    },
    storage::{FileBackend, KeyValueStore},
    AnalyserError,
};

/// Shared state for one CLI invocation
struct App {
    store: Arc<KeyValueStore>,
    settings: Settings,
    terminal: Terminal,
}

impl App {
    fn open(args: &Args) -> Result<Self> {
        let data_dir = args.data_dir();
        let backend = FileBackend::new(data_dir.join("store"))
            .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;
        let store = Arc::new(KeyValueStore::new(Arc::new(backend)));

        let settings = match &args.config {
            Some(path) => Settings::load_from_file(path)?,
            None => Settings::load(&store),
        };
        debug!("Loaded settings: {:?}", settings);

        Ok(Self {
            store,
            settings,
            terminal: Terminal::new(args.verbosity()),
        })
    }

    fn archive(&self) -> SessionArchive {
        SessionArchive::new(Arc::clone(&self.store))
    }

    fn batch_history(&self) -> BatchHistory {
        BatchHistory::new(Arc::clone(&self.store))
    }

    /// Apply history retention when enabled
    fn apply_retention(&self) {
        if self.settings.auto_clear_history {
            let removed = self
                .archive()
                .prune_older_than(self.settings.history_retention);
            if removed > 0 {
                info!(
                    "Removed {} sessions older than {} days",
                    removed, self.settings.history_retention
                );
            }
        }
    }
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.verbosity().log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Write an artifact under `dir` (current directory by default)
fn write_artifact(artifact: &ExportArtifact, dir: Option<&Path>) -> Result<PathBuf> {
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(&artifact.filename);
    std::fs::write(&path, &artifact.content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

async fn record(
    app: &App,
    samples: usize,
    rate: Option<DetectionRate>,
    latency_ms: u64,
) -> Result<()> {
    app.apply_retention();

    let mut settings = app.settings.clone();
    if let Some(rate) = rate {
        settings.default_detection_rate = rate;
    }
    let config = DetectionConfig::from_settings(&settings, samples);
    let engine = MockInference::with_latency(Duration::from_millis(latency_ms));

    let mut recorder = SessionRecorder::new(app.archive());
    recorder.set_auto_archive(settings.auto_save);
    let session_id = recorder.start()?.to_string();
    app.terminal.show_info(&format!(
        "Recording {} at {} ms",
        session_id,
        config.period.as_millis()
    ));

    let pb = app.terminal.progress_bar(samples as u64, "Detecting");
    let report = {
        let pb = pb.clone();
        let mut frames = 0u64;
        run_detection(&mut recorder, &engine, config, move || {
            pb.set_position(frames);
            frames += 1;
            Frame::empty()
        })
        .await
    };
    pb.finish_and_clear();

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            // Keep whatever was recorded before the failure
            recorder.stop();
            return Err(e.into());
        }
    };

    let Some(outcome) = recorder.stop() else {
        return Ok(());
    };

    if report.failed > 0 {
        app.terminal
            .show_warning(&format!("{} detections failed and were skipped", report.failed));
    }
    if settings.notify_low_confidence && report.low_confidence > 0 {
        app.terminal.show_warning(&format!(
            "{} detections below {}% confidence",
            report.low_confidence, settings.min_confidence
        ));
    }

    app.terminal.show_session(&outcome.summary);
    if settings.notify_complete {
        if outcome.archived {
            app.terminal.show_success("Session saved");
        } else if outcome.summary.frame_count == 0 {
            app.terminal.show_warning("No detections recorded, session not saved");
        } else {
            app.terminal.show_info("Auto-save is off, session not saved");
        }
    }
    Ok(())
}

fn export(
    app: &App,
    session: Option<String>,
    all: bool,
    range: Option<TimeRange>,
    format: Option<ExportFormat>,
    out: Option<PathBuf>,
) -> Result<()> {
    let mut serializer = ExportSerializer::from_settings(&app.settings);
    if let Some(format) = format {
        serializer = serializer.with_format(format);
    }

    let artifact = match (session, all) {
        (Some(id), _) => {
            let summary = app
                .archive()
                .get(&id)
                .ok_or_else(|| anyhow::anyhow!("Session not found: {}", id))?;
            serializer.export_session(&summary)
        }
        (None, true) => serializer.export_sessions(&app.archive().list(range)),
        (None, false) => {
            anyhow::bail!("Specify --session <ID> or --all");
        }
    };

    match artifact {
        Ok(artifact) => {
            let path = write_artifact(&artifact, out.as_deref())?;
            app.terminal
                .show_success(&format!("Exported {}", path.display()));
            Ok(())
        }
        Err(AnalyserError::NothingToExport) => {
            app.terminal.show_warning("No data to export");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn batch(
    app: &App,
    files: Vec<PathBuf>,
    sampling: u32,
    save: bool,
    export: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let mut processor = BatchProcessor::with_video_sampling(sampling);
    for file in &files {
        match MediaItem::from_path(file) {
            Ok(item) => processor.add(item),
            Err(e) => app.terminal.show_warning(&format!("Skipping {}: {}", file.display(), e)),
        }
    }

    let engine = MockInference::new();
    let pb = app.terminal.progress_bar(processor.items().len() as u64, "Analysing");
    let mut processed = 0usize;
    while let Some(index) = processor.process_next(&engine).await {
        processed += 1;
        pb.set_position(processed as u64);
        pb.set_message(processor.items()[index].filename.clone());
    }
    pb.finish_and_clear();

    if processed == 0 {
        return Err(AnalyserError::NothingToProcess.into());
    }

    app.terminal.show_batch_stats(&processor.stats());

    if save {
        if processor.save(&app.batch_history()) {
            app.terminal.show_success("Batch saved");
        } else {
            app.terminal.show_warning("Failed to save batch");
        }
    }

    if export {
        match ExportSerializer::from_settings(&app.settings).export_batch(processor.results()) {
            Ok(artifact) => {
                let path = write_artifact(&artifact, out.as_deref())?;
                app.terminal
                    .show_success(&format!("Exported {}", path.display()));
            }
            Err(AnalyserError::NothingToExport) => app.terminal.show_warning("No results to export"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn settings(app: &mut App, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => app.terminal.show_settings(&app.settings),
        SettingsCommand::Set { key, value } => {
            // Accept bare strings as well as JSON literals
            let value = serde_json::from_str(&value)
                .unwrap_or(serde_json::Value::String(value));
            app.settings.set(&key, value)?;
            if !app.settings.save(&app.store) {
                anyhow::bail!("Failed to persist settings");
            }
            app.terminal.show_success(&format!("Updated {}", key));
        }
        SettingsCommand::Reset => {
            if !app.settings.reset(&app.store) {
                anyhow::bail!("Failed to persist settings");
            }
            app.terminal.show_success("Settings restored to defaults");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let mut app = App::open(&args)?;

    match args.command {
        Commands::Record {
            samples,
            rate,
            latency_ms,
        } => record(&app, samples, rate, latency_ms).await?,

        Commands::Sessions { range } => {
            app.apply_retention();
            app.terminal.show_session_table(&app.archive().list(range));
        }

        Commands::Show { session_id } => match app.archive().get(&session_id) {
            Some(session) => app.terminal.show_session(&session),
            None => anyhow::bail!("Session not found: {}", session_id),
        },

        Commands::Overview { range, demo } => {
            app.apply_retention();
            let sessions = app.archive().list(Some(range));
            let (sessions, is_demo) = if demo {
                with_demo_fallback(sessions, MIN_DASHBOARD_SESSIONS)
            } else {
                (sessions, false)
            };
            app.terminal
                .show_overview(&ArchiveOverview::from_sessions(&sessions), is_demo);
        }

        Commands::Export {
            session,
            all,
            range,
            format,
            out,
        } => export(&app, session, all, range, format, out)?,

        Commands::Batch {
            files,
            sampling,
            save,
            export,
            out,
        } => batch(&app, files, sampling, save, export, out).await?,

        Commands::Batches => app.terminal.show_batches(&app.batch_history().list()),

        Commands::Settings { command } => settings(&mut app, command)?,

        Commands::Backup { out } => {
            let artifact = ExportSerializer::from_settings(&app.settings).backup(
                &app.settings,
                app.archive().list(None),
                app.batch_history().list(),
            )?;
            let path = write_artifact(&artifact, out.as_deref())?;
            app.terminal
                .show_success(&format!("Backup written to {}", path.display()));
        }

        Commands::Clear { yes } => {
            if !yes {
                app.terminal
                    .show_warning("This deletes all sessions, batches and settings. Re-run with --yes");
                return Ok(());
            }
            app.store.clear();
            app.terminal.show_success("All data cleared");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_artifact_creates_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("exports");
        let artifact = ExportArtifact {
            content: b"a,b\n1,2".to_vec(),
            filename: "rows.csv".to_string(),
            mime_type: "text/csv".to_string(),
        };

        let path = write_artifact(&artifact, Some(&dir)).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a,b\n1,2");
    }
}
