//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{SteadyError, SteadyResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default stabilization settings.
    pub stabilization: StabilizationDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default stabilization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationDefaults {
    /// Half-width of the trajectory smoothing window, in frames.
    ///
    /// Signed so that a malformed config file is reported instead of
    /// silently wrapping.
    pub smoothing_window: i64,

    /// Maximum number of corners tracked between consecutive frames.
    pub max_corners: usize,

    /// Minimum corner response, relative to the strongest corner.
    pub quality_level: f32,

    /// Minimum distance between two tracked corners (pixels).
    pub min_distance: f32,

    /// Fewest surviving correspondences needed to fit a rigid transform.
    pub min_correspondences: usize,

    /// Zoom applied after the corrective warp to hide exposed borders.
    pub zoom: f32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "steadyframe=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for StabilizationDefaults {
    fn default() -> Self {
        Self {
            smoothing_window: 30,
            max_corners: 200,
            quality_level: 0.01,
            min_distance: 30.0,
            min_correspondences: 3,
            zoom: 1.04,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl StabilizationDefaults {
    /// Reject values no stabilization run can work with.
    pub fn validate(&self) -> SteadyResult<()> {
        if self.smoothing_window < 0 {
            return Err(SteadyError::config(format!(
                "smoothing window must be >= 0, got {}",
                self.smoothing_window
            )));
        }
        if self.max_corners == 0 {
            return Err(SteadyError::config("max_corners must be at least 1"));
        }
        if !(self.quality_level > 0.0 && self.quality_level <= 1.0) {
            return Err(SteadyError::config(format!(
                "quality_level must be in (0, 1], got {}",
                self.quality_level
            )));
        }
        if self.min_distance < 0.0 {
            return Err(SteadyError::config("min_distance must be >= 0"));
        }
        if self.min_correspondences < 2 {
            return Err(SteadyError::config(
                "min_correspondences must be at least 2 to fit a rigid transform",
            ));
        }
        if !(self.zoom >= 1.0 && self.zoom.is_finite()) {
            return Err(SteadyError::config(format!(
                "zoom must be a finite value >= 1.0, got {}",
                self.zoom
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("steadyframe").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let defaults = StabilizationDefaults::default();
        assert_eq!(defaults.smoothing_window, 30);
        assert_eq!(defaults.max_corners, 200);
        assert!((defaults.zoom - 1.04).abs() < 1e-6);
        assert!(defaults.validate().is_ok());
    }

    #[test]
    fn test_negative_window_rejected() {
        let defaults = StabilizationDefaults {
            smoothing_window: -1,
            ..Default::default()
        };
        assert!(matches!(
            defaults.validate(),
            Err(SteadyError::Config { .. })
        ));
    }

    #[test]
    fn test_shrinking_zoom_rejected() {
        let defaults = StabilizationDefaults {
            zoom: 0.9,
            ..Default::default()
        };
        assert!(defaults.validate().is_err());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"stabilization":{"smoothing_window":12}}"#).unwrap();
        assert_eq!(config.stabilization.smoothing_window, 12);
        assert_eq!(config.stabilization.max_corners, 200);
        assert_eq!(config.logging.level, "info");
    }
}
