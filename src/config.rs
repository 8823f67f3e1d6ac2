// Configuration management for Encore

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::playback::{OutputChannel, DEFAULT_CHUNK_THRESHOLD_MS, DEFAULT_PROGRESS_INTERVAL_MS};
use crate::recording::{DEFAULT_PRE_ROLL_MS, DEFAULT_QUIET_INTERVAL_MS, MAX_PRE_ROLL_MS};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Start recording on the first note and stop after silence
    #[serde(default = "default_true")]
    pub auto_record: bool,

    /// Channel playback is forced onto ("default" keeps each event's own)
    #[serde(default)]
    pub output_channel: OutputChannel,

    /// Pre-roll window in milliseconds (0-5000)
    /// When recording starts, include events received this long before
    #[serde(default = "default_pre_roll_ms")]
    pub pre_roll_ms: f64,

    /// Quiet interval after the last note before an auto recording stops
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: f64,

    /// Events due within this many ms are sent in the current playback chunk
    #[serde(default = "default_chunk_threshold_ms")]
    pub chunk_threshold_ms: f64,

    /// How often playback progress is reported
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: f64,

    /// Forward live input to the output while a recording is playing
    #[serde(default = "default_true")]
    pub passthrough_during_playback: bool,

    /// Selected MIDI input port id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_input: Option<String>,

    /// Selected MIDI output port id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_output: Option<String>,

    /// SQLite file holding saved recordings
    #[serde(default = "default_library_path")]
    pub library_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_record: true,
            output_channel: OutputChannel::Default,
            pre_roll_ms: DEFAULT_PRE_ROLL_MS,
            silence_timeout_ms: DEFAULT_QUIET_INTERVAL_MS,
            chunk_threshold_ms: DEFAULT_CHUNK_THRESHOLD_MS,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            passthrough_during_playback: true,
            selected_input: None,
            selected_output: None,
            library_path: default_library_path(),
        }
    }
}

impl Config {
    /// Load config from disk or return default
    pub fn load_or_default(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(config) => return config.sanitized(),
                    Err(e) => {
                        log::warn!("Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Save config to disk
    pub fn save(&self, config_path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    /// Clamp timing values into usable ranges
    pub fn sanitized(mut self) -> Self {
        self.pre_roll_ms = clamp_or(self.pre_roll_ms, 0.0, MAX_PRE_ROLL_MS, DEFAULT_PRE_ROLL_MS);
        self.silence_timeout_ms = clamp_or(self.silence_timeout_ms, 100.0, 600_000.0, DEFAULT_QUIET_INTERVAL_MS);
        self.chunk_threshold_ms = clamp_or(self.chunk_threshold_ms, 1.0, 1_000.0, DEFAULT_CHUNK_THRESHOLD_MS);
        self.progress_interval_ms =
            clamp_or(self.progress_interval_ms, 10.0, 10_000.0, DEFAULT_PROGRESS_INTERVAL_MS);
        self
    }
}

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Get the config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("encore")
        .join("config.toml")
}

/// Get the default location of the recording library
fn default_library_path() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("encore")
        .join("recordings.db")
}

/// Default pre-roll duration (for serde)
fn default_pre_roll_ms() -> f64 {
    DEFAULT_PRE_ROLL_MS
}

fn default_silence_timeout_ms() -> f64 {
    DEFAULT_QUIET_INTERVAL_MS
}

fn default_chunk_threshold_ms() -> f64 {
    DEFAULT_CHUNK_THRESHOLD_MS
}

fn default_progress_interval_ms() -> f64 {
    DEFAULT_PROGRESS_INTERVAL_MS
}

/// Default true value (for serde)
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: Config = toml::from_str("auto_record = false\noutput_channel = \"9\"\n").unwrap();
        assert!(!config.auto_record);
        assert_eq!(config.output_channel, OutputChannel::Channel(9));
        assert_eq!(config.pre_roll_ms, 500.0);
        assert_eq!(config.silence_timeout_ms, 3000.0);
        assert!(config.passthrough_during_playback);
        assert!(config.selected_input.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            output_channel: OutputChannel::Channel(3),
            selected_output: Some("Synth".to_string()),
            library_path: dir.path().join("lib.db"),
            ..Config::default()
        };
        config.save(&path).unwrap();

        assert_eq!(Config::load_or_default(&path), config);
    }

    #[test]
    fn test_unreadable_config_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "output_channel = \"42\"").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.output_channel, OutputChannel::Default);
    }

    #[test]
    fn test_sanitized_clamps_pre_roll() {
        let config = Config {
            pre_roll_ms: 60_000.0,
            chunk_threshold_ms: f64::NAN,
            ..Config::default()
        }
        .sanitized();
        assert_eq!(config.pre_roll_ms, MAX_PRE_ROLL_MS);
        assert_eq!(config.chunk_threshold_ms, DEFAULT_CHUNK_THRESHOLD_MS);
    }
}
