//! Export serializer
//!
//! Produces downloadable content blobs in one of two representations:
//!
//! - **Structured**: pretty-printed JSON, lossless
//! - **Tabular**: CSV with the header taken from the first row
//!
//! Nothing here touches the filesystem. Callers get an [`ExportArtifact`]
//! with the bytes, a suggested filename and a MIME type.

pub mod rows;
pub mod tabular;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::batch::{BatchRecord, BatchResult};
use crate::config::Settings;
use crate::errors::{AnalyserError, Result};
use crate::session::SessionSummary;

pub use rows::{batch_rows, session_rows, summary_rows};
pub use tabular::{render_csv, Row};

/// Output representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFormat {
    #[serde(rename = "json", alias = "structured")]
    Structured,
    #[serde(rename = "csv", alias = "tabular")]
    Tabular,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Structured => "json",
            ExportFormat::Tabular => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Structured => "application/json",
            ExportFormat::Tabular => "text/csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = AnalyserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "structured" => Ok(ExportFormat::Structured),
            "csv" | "tabular" => Ok(ExportFormat::Tabular),
            other => Err(AnalyserError::ConfigError(format!("Unknown export format: {}", other))),
        }
    }
}

/// Export content ready to be written or downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub content: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

impl ExportArtifact {
    /// Content as UTF-8 text
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Pretty-printed JSON of any serializable value
///
/// An empty JSON array counts as nothing to export.
pub fn to_structured<T: Serialize + ?Sized>(value: &T, basename: &str) -> Result<ExportArtifact> {
    let value = serde_json::to_value(value)?;
    if matches!(&value, Value::Array(items) if items.is_empty()) {
        return Err(AnalyserError::NothingToExport);
    }

    Ok(ExportArtifact {
        content: serde_json::to_string_pretty(&value)?.into_bytes(),
        filename: format!("{}.{}", basename, ExportFormat::Structured.extension()),
        mime_type: ExportFormat::Structured.mime_type().to_string(),
    })
}

/// CSV of flat rows
pub fn to_tabular(rows: &[Row], basename: &str) -> Result<ExportArtifact> {
    let csv = render_csv(rows)?.ok_or(AnalyserError::NothingToExport)?;

    Ok(ExportArtifact {
        content: csv.into_bytes(),
        filename: format!("{}.{}", basename, ExportFormat::Tabular.extension()),
        mime_type: ExportFormat::Tabular.mime_type().to_string(),
    })
}

/// Full data backup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub settings: Settings,
    pub sessions: Vec<SessionSummary>,
    pub batches: Vec<BatchRecord>,
    pub exported_at: DateTime<Utc>,
}

/// Settings-driven export of sessions, batches and backups
#[derive(Debug, Clone, Copy)]
pub struct ExportSerializer {
    format: ExportFormat,
    include_timestamp: bool,
}

impl ExportSerializer {
    pub fn new(format: ExportFormat, include_timestamp: bool) -> Self {
        Self {
            format,
            include_timestamp,
        }
    }

    /// Use `exportFormat` and `includeTimestamp` from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.export_format, settings.include_timestamp)
    }

    /// Same settings, different format
    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    fn basename(&self, stem: &str) -> String {
        if self.include_timestamp {
            format!("{}_{}", stem, Utc::now().timestamp_millis())
        } else {
            stem.to_string()
        }
    }

    /// One session: full summary as JSON, or one row per sample as CSV
    pub fn export_session(&self, summary: &SessionSummary) -> Result<ExportArtifact> {
        if summary.data.is_empty() {
            return Err(AnalyserError::NothingToExport);
        }

        let basename = self.basename(&summary.session_id);
        match self.format {
            ExportFormat::Structured => to_structured(summary, &basename),
            ExportFormat::Tabular => to_tabular(&session_rows(summary), &basename),
        }
    }

    /// Many sessions: full list as JSON, or one summary row each as CSV
    pub fn export_sessions(&self, sessions: &[SessionSummary]) -> Result<ExportArtifact> {
        let basename = self.basename("sessions_summary");
        match self.format {
            ExportFormat::Structured => to_structured(sessions, &basename),
            ExportFormat::Tabular => to_tabular(&summary_rows(sessions), &basename),
        }
    }

    /// Batch results
    pub fn export_batch(&self, results: &[BatchResult]) -> Result<ExportArtifact> {
        let basename = self.basename("batch_results");
        match self.format {
            ExportFormat::Structured => to_structured(results, &basename),
            ExportFormat::Tabular => to_tabular(&batch_rows(results), &basename),
        }
    }

    /// Everything persisted, always JSON and always timestamped
    pub fn backup(
        &self,
        settings: &Settings,
        sessions: Vec<SessionSummary>,
        batches: Vec<BatchRecord>,
    ) -> Result<ExportArtifact> {
        let exported_at = Utc::now();
        let document = BackupDocument {
            settings: settings.clone(),
            sessions,
            batches,
            exported_at,
        };
        to_structured(
            &document,
            &format!("expression_analyser_backup_{}", exported_at.timestamp_millis()),
        )
    }
}

impl Default for ExportSerializer {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
