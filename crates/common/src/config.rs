//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MotionError, MotionResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Detector thresholds and timings.
    pub motion: MotionConfig,

    /// Capture helper settings.
    pub capture: CaptureConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Detector parameters. Immutable once an engine is built from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Number of per-frame deltas averaged before the state machine sees them.
    pub history_len: usize,

    /// Smoothed delta above which a frame counts as "moving".
    pub active_threshold: f64,

    /// Consecutive moving frames needed to start.
    pub start_frames: u32,

    /// Lower bound of the partial low run that enables resume hysteresis.
    pub prestop_low_min: u32,

    /// Upper bound of the partial low run that enables resume hysteresis.
    pub prestop_low_max: u32,

    /// Consecutive still frames that arm prestop outright.
    pub prestop_low_full: u32,

    /// Moving frames tolerated inside a partial low run before it is abandoned.
    pub prestop_high_max: u32,

    /// Consecutive moving frames that cancel an armed prestop.
    pub cancel_prestop_frames: u32,

    /// Seconds an armed prestop must last before STOP.
    pub full_stop_delay_secs: f64,

    /// Let a briefly interrupted low run resume instead of restarting.
    pub resume_hysteresis: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            history_len: 10,
            active_threshold: 0.002,
            start_frames: 15,
            prestop_low_min: 10,
            prestop_low_max: 19,
            prestop_low_full: 20,
            prestop_high_max: 20,
            cancel_prestop_frames: 15,
            full_stop_delay_secs: 4.0,
            resume_hysteresis: true,
        }
    }
}

impl MotionConfig {
    /// Number of bytes in one frame.
    ///
    /// Only meaningful after [`MotionConfig::validate`] succeeded.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check that the configuration describes a usable detector.
    pub fn validate(&self) -> MotionResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MotionError::config(format!(
                "frame dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if (self.width as usize).checked_mul(self.height as usize).is_none() {
            return Err(MotionError::config(format!(
                "frame {}x{} is too large to address",
                self.width, self.height
            )));
        }
        if self.history_len == 0 {
            return Err(MotionError::config("history_len must be at least 1"));
        }
        if !self.active_threshold.is_finite() || self.active_threshold < 0.0 {
            return Err(MotionError::config(format!(
                "active_threshold must be a finite non-negative number, got {}",
                self.active_threshold
            )));
        }
        if !self.full_stop_delay_secs.is_finite() || self.full_stop_delay_secs < 0.0 {
            return Err(MotionError::config(format!(
                "full_stop_delay_secs must be a finite non-negative number, got {}",
                self.full_stop_delay_secs
            )));
        }
        for (name, value) in [
            ("start_frames", self.start_frames),
            ("prestop_low_full", self.prestop_low_full),
            ("cancel_prestop_frames", self.cancel_prestop_frames),
        ] {
            if value == 0 {
                return Err(MotionError::config(format!("{name} must be at least 1")));
            }
        }
        if self.prestop_low_min > self.prestop_low_max {
            return Err(MotionError::config(format!(
                "prestop_low_min ({}) must not exceed prestop_low_max ({})",
                self.prestop_low_min, self.prestop_low_max
            )));
        }
        Ok(())
    }
}

/// Capture helper settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Helper argv; its stdout must carry raw grayscale frames.
    pub command: Vec<String>,

    /// Pass the helper's stderr through instead of discarding it.
    pub show_helper_stderr: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            show_helper_stderr: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "motiongate_core=trace,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> MotionResult<Self> {
        if !path.exists() {
            return Err(MotionError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> MotionResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> MotionResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("motiongate").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("motiongate-config-{}-{name}", std::process::id()))
            .join("config.json")
    }

    #[test]
    fn defaults_are_valid() {
        let config = MotionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.frame_len(), 1280 * 720);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "motion": { "width": 64, "height": 48 } }"#).unwrap();
        assert_eq!(config.motion.width, 64);
        assert_eq!(config.motion.height, 48);
        assert_eq!(config.motion.start_frames, 15);
        assert!(config.motion.resume_hysteresis);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn save_and_load_roundtrip() {
        let path = temp_path("roundtrip");
        let mut config = AppConfig::default();
        config.motion.full_stop_delay_secs = 1.25;
        config.capture.command = vec!["cat".into(), "frames.raw".into()];
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_is_reported() {
        let path = temp_path("missing");
        match AppConfig::load_from(&path) {
            Err(MotionError::FileNotFound { path: p }) => assert_eq!(p, path),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_bad_values() {
        let zero_width = MotionConfig {
            width: 0,
            ..MotionConfig::default()
        };
        assert!(matches!(
            zero_width.validate(),
            Err(MotionError::Config { .. })
        ));

        let no_history = MotionConfig {
            history_len: 0,
            ..MotionConfig::default()
        };
        assert!(no_history.validate().is_err());

        let inverted = MotionConfig {
            prestop_low_min: 12,
            prestop_low_max: 11,
            ..MotionConfig::default()
        };
        assert!(inverted.validate().is_err());

        let nan_threshold = MotionConfig {
            active_threshold: f64::NAN,
            ..MotionConfig::default()
        };
        assert!(nan_threshold.validate().is_err());

        let no_start = MotionConfig {
            start_frames: 0,
            ..MotionConfig::default()
        };
        assert!(no_start.validate().is_err());
    }
}
