//! Settings for the expression analyser
//!
//! A flat, typed snapshot of user options. Stored values are merged over
//! the defaults, so a partial or older settings map still loads. Settings
//! persist in the key-value store under `settings` and can also be read
//! from a TOML file.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::errors::{AnalyserError, Result};
use crate::export::ExportFormat;
use crate::storage::{KeyValueStore, SETTINGS_KEY};

/// Name of the data directory under the user's home
pub const DATA_DIR_NAME: &str = ".expression_analyser";

/// How often the detection loop samples a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DetectionRate {
    /// As fast as inference allows
    Realtime,
    /// Fixed interval in milliseconds
    Interval(u64),
}

impl DetectionRate {
    /// Delay between detections; zero for realtime
    pub fn period(&self) -> Duration {
        match self {
            DetectionRate::Realtime => Duration::ZERO,
            DetectionRate::Interval(ms) => Duration::from_millis(*ms),
        }
    }
}

impl fmt::Display for DetectionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionRate::Realtime => f.write_str("realtime"),
            DetectionRate::Interval(ms) => write!(f, "{}", ms),
        }
    }
}

impl FromStr for DetectionRate {
    type Err = AnalyserError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("realtime") {
            return Ok(DetectionRate::Realtime);
        }
        match s.parse::<u64>() {
            Ok(ms) if ms > 0 => Ok(DetectionRate::Interval(ms)),
            _ => Err(AnalyserError::ConfigError(format!(
                "Invalid detection rate: {} (expected milliseconds or \"realtime\")",
                s
            ))),
        }
    }
}

impl TryFrom<String> for DetectionRate {
    type Error = AnalyserError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DetectionRate> for String {
    fn from(rate: DetectionRate) -> Self {
        rate.to_string()
    }
}

/// User settings with defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub default_detection_rate: DetectionRate,
    /// Results below this confidence are reported as low-confidence
    pub min_confidence: u32,
    pub sensitivity: u32,
    /// Archive sessions when they stop
    pub auto_save: bool,
    pub export_format: ExportFormat,
    /// Append `_<millis>` to export filenames
    pub include_timestamp: bool,
    pub auto_clear_history: bool,
    /// Days of history kept when `auto_clear_history` is set
    #[serde(deserialize_with = "days_from_number_or_string")]
    pub history_retention: u32,
    pub notify_complete: bool,
    pub notify_low_confidence: bool,
}

/// Accept `7` as well as `"7"`; older settings stored the select value as text
fn days_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Days {
        Number(u32),
        Text(String),
    }

    match Days::deserialize(deserializer)? {
        Days::Number(days) => Ok(days),
        Days::Text(text) => text.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("invalid day count: {:?}", text))
        }),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_detection_rate: DetectionRate::Interval(1000),
            min_confidence: 50,
            sensitivity: 70,
            auto_save: true,
            export_format: ExportFormat::Tabular,
            include_timestamp: true,
            auto_clear_history: false,
            history_retention: 7,
            notify_complete: true,
            notify_low_confidence: false,
        }
    }
}

impl Settings {
    /// Load from the store, falling back to defaults
    pub fn load(store: &KeyValueStore) -> Self {
        match store.load::<Settings>(SETTINGS_KEY) {
            Some(settings) if settings.validate().is_ok() => settings,
            Some(_) => {
                debug!("Stored settings failed validation, using defaults");
                Settings::default()
            }
            None => Settings::default(),
        }
    }

    /// Persist to the store; returns `false` when storage fails
    pub fn save(&self, store: &KeyValueStore) -> bool {
        store.save(SETTINGS_KEY, self)
    }

    /// Restore defaults and persist them
    pub fn reset(&mut self, store: &KeyValueStore) -> bool {
        *self = Settings::default();
        self.save(store)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AnalyserError::ConfigError(format!("Failed to read config: {}", e)))?;

        let settings: Settings = toml::from_str(&contents)
            .map_err(|e| AnalyserError::ConfigError(format!("Failed to parse config: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AnalyserError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AnalyserError::ConfigError(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| AnalyserError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.min_confidence > 100 {
            return Err(AnalyserError::ConfigError(
                "minConfidence must be between 0 and 100".to_string(),
            ));
        }

        if self.sensitivity > 100 {
            return Err(AnalyserError::ConfigError(
                "sensitivity must be between 0 and 100".to_string(),
            ));
        }

        if self.auto_clear_history && self.history_retention == 0 {
            return Err(AnalyserError::ConfigError(
                "historyRetention must be at least 1 day".to_string(),
            ));
        }

        Ok(())
    }

    /// Look up an option by its persisted (camelCase) name
    pub fn get(&self, key: &str) -> Option<Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.get(key).cloned(),
            _ => None,
        }
    }

    /// Set an option by name; the result must still validate
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let mut map = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => return Err(AnalyserError::ConfigError("settings are not a map".to_string())),
        };

        if !map.contains_key(key) {
            return Err(AnalyserError::ConfigError(format!("Unknown setting: {}", key)));
        }
        map.insert(key.to_string(), value);

        let updated: Settings = serde_json::from_value(Value::Object(map))
            .map_err(|e| AnalyserError::ConfigError(format!("Invalid value for {}: {}", key, e)))?;
        updated.validate()?;

        *self = updated;
        Ok(())
    }

    /// Default data directory (`~/.expression_analyser`)
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DATA_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.default_detection_rate, DetectionRate::Interval(1000));
        assert_eq!(settings.min_confidence, 50);
        assert_eq!(settings.export_format, ExportFormat::Tabular);
        assert!(settings.include_timestamp);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_detection_rate_parse() {
        assert_eq!("realtime".parse::<DetectionRate>().unwrap(), DetectionRate::Realtime);
        assert_eq!("500".parse::<DetectionRate>().unwrap(), DetectionRate::Interval(500));
        assert!("0".parse::<DetectionRate>().is_err());
        assert!("fast".parse::<DetectionRate>().is_err());
        assert_eq!(DetectionRate::Realtime.period(), Duration::ZERO);
    }

    #[test]
    fn test_stored_values_merge_over_defaults() {
        let store = KeyValueStore::in_memory();
        store.save(SETTINGS_KEY, &json!({ "minConfidence": 65, "exportFormat": "json" }));

        let settings = Settings::load(&store);
        assert_eq!(settings.min_confidence, 65);
        assert_eq!(settings.export_format, ExportFormat::Structured);
        assert_eq!(settings.sensitivity, 70);
    }

    #[test]
    fn test_retention_stored_as_text() {
        let store = KeyValueStore::in_memory();
        store.save(
            SETTINGS_KEY,
            &json!({ "historyRetention": "30", "autoClearHistory": true, "minConfidence": 65 }),
        );

        let settings = Settings::load(&store);
        assert_eq!(settings.history_retention, 30);
        assert!(settings.auto_clear_history);
        assert_eq!(settings.min_confidence, 65);

        let mut settings = Settings::default();
        settings.set("historyRetention", json!("14")).unwrap();
        assert_eq!(settings.history_retention, 14);
        assert!(settings.set("historyRetention", json!("two weeks")).is_err());
    }

    #[test]
    fn test_invalid_stored_settings_fall_back() {
        let store = KeyValueStore::in_memory();
        store.save(SETTINGS_KEY, &json!({ "minConfidence": 250 }));
        assert_eq!(Settings::load(&store), Settings::default());
    }

    #[test]
    fn test_save_and_reset() {
        let store = KeyValueStore::in_memory();
        let mut settings = Settings::default();
        settings.include_timestamp = false;
        assert!(settings.save(&store));
        assert!(!Settings::load(&store).include_timestamp);

        assert!(settings.reset(&store));
        assert!(Settings::load(&store).include_timestamp);
    }

    #[test]
    fn test_get_and_set_by_name() {
        let mut settings = Settings::default();
        assert_eq!(settings.get("exportFormat"), Some(json!("csv")));
        assert_eq!(settings.get("defaultDetectionRate"), Some(json!("1000")));
        assert_eq!(settings.get("nope"), None);

        settings.set("defaultDetectionRate", json!("realtime")).unwrap();
        assert_eq!(settings.default_detection_rate, DetectionRate::Realtime);

        assert!(settings.set("minConfidence", json!(101)).is_err());
        assert!(settings.set("unknown", json!(1)).is_err());
        assert_eq!(settings.min_confidence, 50);
    }

    #[test]
    fn test_toml_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut settings = Settings::default();
        settings.sensitivity = 30;
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Settings::load_from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, AnalyserError::ConfigError(_)));
    }
}
