//! Terminal output for the CLI
//!
//! Colored tables, progress bars and the value formatters they use.

use chrono::{DateTime, Local, Utc};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::batch::{BatchRecord, BatchStats};
use crate::cli::Verbosity;
use crate::config::Settings;
use crate::session::{ArchiveOverview, SessionSummary};
use crate::types::{Emotion, LabelScores};

/// Width of score bars in characters
const BAR_WIDTH: u32 = 30;

/// Format seconds as `HH:MM:SS`
pub fn format_duration(seconds: u64) -> String {
    let hrs = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hrs, mins, secs)
}

/// Human-readable size with up to two decimals, e.g. `1.5 KB`
pub fn format_file_size(bytes: u64) -> String {
    const SIZES: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < SIZES.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZES[unit])
}

/// Local date and time, e.g. `Mar 04, 2026 14:05`
pub fn format_date(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%b %d, %Y %H:%M").to_string()
}

/// Label name in its display color
pub fn colorize_emotion(emotion: Emotion) -> ColoredString {
    let name = emotion.as_str();
    match emotion {
        Emotion::Happy => name.yellow(),
        Emotion::Sad => name.blue(),
        Emotion::Angry => name.red(),
        Emotion::Surprised => name.bright_magenta(),
        Emotion::Fear => name.magenta(),
        Emotion::Disgust => name.green(),
        Emotion::Neutral => name.white(),
    }
}

fn score_bar(score: u32) -> String {
    let filled = (score.min(100) * BAR_WIDTH / 100) as usize;
    format!(
        "{}{}",
        "=".repeat(filled),
        " ".repeat(BAR_WIDTH as usize - filled)
    )
}

/// Display manager for CLI output
pub struct Terminal {
    verbosity: Verbosity,
}

impl Terminal {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Progress bar with `len` steps, hidden in quiet mode
    pub fn progress_bar(&self, len: u64, label: &str) -> ProgressBar {
        if !self.verbosity.show_progress() {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        let template = format!("{{spinner:.cyan}} {} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} | {{msg}}", label);
        if let Ok(style) = ProgressStyle::default_bar().template(&template) {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn show_success(&self, message: &str) {
        if self.verbosity.show_progress() {
            println!("{} {}", "✓".green().bold(), message.green());
        }
    }

    pub fn show_warning(&self, warning: &str) {
        if self.verbosity.show_progress() {
            println!("{} {}", "Warning:".yellow().bold(), warning.yellow());
        }
    }

    pub fn show_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error.red());
    }

    pub fn show_info(&self, info: &str) {
        if self.verbosity.show_progress() {
            println!("{} {}", "Info:".cyan(), info);
        }
    }

    pub fn show_section(&self, title: &str) {
        println!("\n{}", title.bold().cyan());
        println!("{}", "-".repeat(60).cyan());
    }

    /// One row per session, newest first
    pub fn show_session_table(&self, sessions: &[SessionSummary]) {
        self.show_section(&format!("Sessions ({})", sessions.len()));
        if sessions.is_empty() {
            println!("  {}", "No sessions recorded".dimmed());
            return;
        }

        println!(
            "  {:<44} {:<19} {:>8} {:>6} {:<10} {:>5}",
            "ID".bold(),
            "Started".bold(),
            "Duration".bold(),
            "Frames".bold(),
            "Dominant".bold(),
            "Conf".bold()
        );
        for session in sessions {
            println!(
                "  {:<44} {:<19} {:>8} {:>6} {:<10} {:>4}%",
                session.session_id,
                format_date(session.start_time),
                format_duration(session.duration),
                session.frame_count,
                colorize_emotion(session.stats.dominant),
                session.stats.avg_confidence
            );
        }
    }

    /// Session details with per-label averages
    pub fn show_session(&self, session: &SessionSummary) {
        self.show_section(&format!("Session {}", session.session_id));
        println!("  Start:      {}", format_date(session.start_time));
        println!("  Duration:   {}", format_duration(session.duration));
        println!("  Frames:     {}", session.frame_count);
        println!("  Dominant:   {}", colorize_emotion(session.stats.dominant));
        println!("  Confidence: {}%", session.stats.avg_confidence);
        if session.frame_count > 0 {
            self.show_scores("Average scores", &session.emotion_averages());
        }
    }

    pub fn show_scores(&self, title: &str, scores: &LabelScores) {
        println!("\n  {}", title.bold());
        for (emotion, score) in scores.iter() {
            println!(
                "  {:<10} [{}] {:>3}%",
                colorize_emotion(emotion),
                score_bar(score).cyan(),
                score
            );
        }
    }

    pub fn show_overview(&self, overview: &ArchiveOverview, demo: bool) {
        let title = if demo { "Overview (demo data)" } else { "Overview" };
        self.show_section(title);
        println!("  Sessions:        {}", overview.total_sessions);
        println!("  Frames:          {}", overview.total_frames);
        println!("  Avg duration:    {} min", overview.avg_duration_minutes);
        println!("  Dominant:        {}", colorize_emotion(overview.dominant_emotion));

        if !overview.distribution.is_empty() {
            println!("\n  {}", "Distribution".bold());
            for (emotion, count) in &overview.distribution {
                let confidence = overview.confidence_by_emotion.get(emotion).copied().unwrap_or(0);
                println!(
                    "  {:<10} {:>3} sessions, avg confidence {}%",
                    colorize_emotion(*emotion),
                    count,
                    confidence
                );
            }
        }

        if !overview.confidence_trend.is_empty() {
            println!("\n  {}", "Confidence trend".bold());
            for point in &overview.confidence_trend {
                println!(
                    "  {:<19} [{}] {:>3}%",
                    format_date(point.start_time),
                    score_bar(point.avg_confidence).cyan(),
                    point.avg_confidence
                );
            }
        }
    }

    pub fn show_batch_stats(&self, stats: &BatchStats) {
        self.show_section("Batch results");
        println!("  Files:     {}", stats.total_files);
        println!("  Processed: {}", stats.processed_files.to_string().green());
        if stats.failed_files > 0 {
            println!("  Failed:    {}", stats.failed_files.to_string().red());
        }
        if let Some(dominant) = stats.dominant {
            println!("  Dominant:  {}", colorize_emotion(dominant));
        }
        for (emotion, count) in &stats.distribution {
            println!("  {:<10} {}", colorize_emotion(*emotion), count);
        }
    }

    pub fn show_batches(&self, batches: &[BatchRecord]) {
        self.show_section(&format!("Saved batches ({})", batches.len()));
        for batch in batches {
            println!(
                "  {:<44} {:<19} {:>3} files, {:>3} results",
                batch.id,
                format_date(batch.timestamp),
                batch.file_count,
                batch.results.len()
            );
        }
    }

    pub fn show_settings(&self, settings: &Settings) {
        self.show_section("Settings");
        if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(settings) {
            for (key, value) in map {
                println!("  {:<24} {}", key.cyan(), value);
            }
        }
    }
}
