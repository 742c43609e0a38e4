//! Viewer configuration.
//!
//! Settings can be created programmatically, loaded from a TOML file, or read
//! from environment variables. Missing keys keep their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::visibility::DEFAULT_THRESHOLDS;
use crate::window::{DEFAULT_PAGE_HEIGHT, DEFAULT_WINDOW};
use crate::zoom::{DEFAULT_MAX_SCALE, DEFAULT_MIN_SCALE, DEFAULT_SCALE, DEFAULT_ZOOM_STEP};

/// Configuration for a [`PdfViewer`](crate::PdfViewer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Pages on each side of the visible page that are fully rendered
    pub window: u32,
    /// Placeholder height used before any page has been measured
    pub default_page_height: f32,
    /// Visibility ratios at which the observer reports a page
    pub thresholds: Vec<f32>,
    /// Scale a freshly opened viewer starts with
    pub initial_scale: f32,
    /// Scale increment for one zoom step
    pub zoom_step: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// Vertical gap between pages in the scroll container
    pub page_spacing: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            default_page_height: DEFAULT_PAGE_HEIGHT,
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            initial_scale: DEFAULT_SCALE,
            zoom_step: DEFAULT_ZOOM_STEP,
            min_scale: DEFAULT_MIN_SCALE,
            max_scale: DEFAULT_MAX_SCALE,
            page_spacing: 16.0,
        }
    }
}

impl ViewerConfig {
    /// Sets the render window radius.
    pub fn with_window(mut self, window: u32) -> Self {
        self.window = window;
        self
    }

    /// Sets the initial scale.
    pub fn with_initial_scale(mut self, scale: f32) -> Self {
        self.initial_scale = scale;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KBVIEW_WINDOW`: render window radius in pages (default: 2)
    /// - `KBVIEW_DEFAULT_PAGE_HEIGHT`: placeholder height before measurement (default: 800)
    /// - `KBVIEW_INITIAL_SCALE`: starting zoom factor (default: 1.2)
    /// - `KBVIEW_PAGE_SPACING`: gap between pages (default: 16)
    ///
    /// # Errors
    /// Returns an error if any variable holds an unparsable or out-of-range value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("KBVIEW_WINDOW") {
            config.window = parse_var("KBVIEW_WINDOW", &val)?;
        }

        if let Some(val) = lookup("KBVIEW_DEFAULT_PAGE_HEIGHT") {
            config.default_page_height = parse_var("KBVIEW_DEFAULT_PAGE_HEIGHT", &val)?;
        }

        if let Some(val) = lookup("KBVIEW_INITIAL_SCALE") {
            config.initial_scale = parse_var("KBVIEW_INITIAL_SCALE", &val)?;
        }

        if let Some(val) = lookup("KBVIEW_PAGE_SPACING") {
            config.page_spacing = parse_var("KBVIEW_PAGE_SPACING", &val)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format:
    /// ```toml
    /// window = 2
    /// default_page_height = 800.0
    /// thresholds = [0.1, 0.5, 0.9]
    /// initial_scale = 1.2
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), toml)?;
        Ok(())
    }

    /// Checks that the settings describe a usable viewer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.default_page_height.is_finite() && self.default_page_height > 0.0) {
            return Err(ConfigError::Invalid("default_page_height must be positive".into()));
        }

        if self.thresholds.is_empty() {
            return Err(ConfigError::Invalid("thresholds must not be empty".into()));
        }

        if self.thresholds.iter().any(|t| !(*t > 0.0 && *t <= 1.0)) {
            return Err(ConfigError::Invalid("thresholds must lie in (0, 1]".into()));
        }

        if self.thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::Invalid("thresholds must be strictly ascending".into()));
        }

        if !(self.zoom_step.is_finite() && self.zoom_step > 0.0) {
            return Err(ConfigError::Invalid("zoom_step must be positive".into()));
        }

        if !(self.min_scale > 0.0
            && self.min_scale <= self.initial_scale
            && self.initial_scale <= self.max_scale
            && self.max_scale.is_finite())
        {
            return Err(ConfigError::Invalid(
                "scales must satisfy 0 < min_scale <= initial_scale <= max_scale".into(),
            ));
        }

        if !(self.page_spacing.is_finite() && self.page_spacing >= 0.0) {
            return Err(ConfigError::Invalid("page_spacing must not be negative".into()));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ViewerConfig::default();
        assert_eq!(config.window, 2);
        assert_eq!(config.default_page_height, 800.0);
        assert_eq!(config.thresholds, vec![0.1, 0.5, 0.9]);
        assert_eq!(config.initial_scale, 1.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ViewerConfig::from_lookup(lookup_from(&[
            ("KBVIEW_WINDOW", "3"),
            ("KBVIEW_DEFAULT_PAGE_HEIGHT", "640"),
            ("KBVIEW_INITIAL_SCALE", "1.0"),
        ]))
        .unwrap();

        assert_eq!(config.window, 3);
        assert_eq!(config.default_page_height, 640.0);
        assert_eq!(config.initial_scale, 1.0);
        assert_eq!(config.page_spacing, 16.0);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ViewerConfig::from_lookup(lookup_from(&[("KBVIEW_WINDOW", "two")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "KBVIEW_WINDOW"));
    }

    #[test]
    fn test_from_lookup_validates_range() {
        let err =
            ViewerConfig::from_lookup(lookup_from(&[("KBVIEW_INITIAL_SCALE", "9.0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ViewerConfig::from_toml("window = 4\n").unwrap();
        assert_eq!(config.window, 4);
        assert_eq!(config.default_page_height, 800.0);
        assert_eq!(config.thresholds, vec![0.1, 0.5, 0.9]);
    }

    #[test]
    fn test_toml_rejects_unsorted_thresholds() {
        let err = ViewerConfig::from_toml("thresholds = [0.5, 0.1]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_save_and_load_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("viewer.toml");

        let config = ViewerConfig::default().with_window(1).with_initial_scale(2.0);
        config.save_to_file(&path).unwrap();

        let loaded = ViewerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let err = ViewerConfig::from_file("/nonexistent/kbview.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
