use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compositor::{FrameCompositor, OverlayLayout};
use crate::error::ConfigError;
use crate::tracker::DEFAULT_CADENCE;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MimicConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub device_index: i32,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    #[serde(default = "default_true")]
    pub bootstrap: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_cadence")]
    pub cadence: u64,
    #[serde(default = "default_detector_backend")]
    pub detector_backend: String,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    #[serde(default)]
    pub background: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_window_title")]
    pub window_title: String,
    #[serde(default = "default_layout")]
    pub layout: OverlayLayout,
    #[serde(default = "default_bar_height")]
    pub bar_height: i32,
    #[serde(default)]
    pub gap: i32,
    #[serde(default = "default_placeholder_width_ratio")]
    pub placeholder_width_ratio: f64,
    #[serde(default = "default_true")]
    pub shadow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_output_prefix")]
    pub prefix: String,
}

fn default_frame_width() -> u32 { 640 }
fn default_frame_height() -> u32 { 480 }
fn default_mapping_file() -> PathBuf { PathBuf::from("expressions.json") }
fn default_image_dir() -> PathBuf { PathBuf::from("images") }
fn default_true() -> bool { true }
fn default_endpoint() -> String { "http://127.0.0.1:5005".to_string() }
fn default_cadence() -> u64 { DEFAULT_CADENCE }
fn default_detector_backend() -> String { "opencv".to_string() }
fn default_window_title() -> String { "Expression Matcher".to_string() }
fn default_layout() -> OverlayLayout { OverlayLayout::BottomBar }
fn default_bar_height() -> i32 { 50 }
fn default_placeholder_width_ratio() -> f64 { 0.75 }
fn default_output_dir() -> PathBuf { PathBuf::from("output") }
fn default_output_prefix() -> String { "expression".to_string() }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            mapping_file: default_mapping_file(),
            image_dir: default_image_dir(),
            bootstrap: default_true(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            cadence: default_cadence(),
            detector_backend: default_detector_backend(),
            timeout_secs: None,
            background: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_title: default_window_title(),
            layout: default_layout(),
            bar_height: default_bar_height(),
            gap: 0,
            placeholder_width_ratio: default_placeholder_width_ratio(),
            shadow: default_true(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            prefix: default_output_prefix(),
        }
    }
}

impl MimicConfig {
    /// Reads `path`, or returns the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// `~/.config/mimic/config.json`, or `config.json` when there is no
    /// config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("mimic").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classifier.cadence == 0 {
            return Err(invalid("classifier.cadence", "must be at least 1"));
        }
        if self.capture.frame_width == 0 || self.capture.frame_height == 0 {
            return Err(invalid("capture.frame_width/frame_height", "must be positive"));
        }
        if self.display.bar_height < 0 {
            return Err(invalid("display.bar_height", "must not be negative"));
        }
        if self.display.gap < 0 {
            return Err(invalid("display.gap", "must not be negative"));
        }
        let ratio = self.display.placeholder_width_ratio;
        if !(ratio > 0.0 && ratio <= 4.0) {
            return Err(invalid("display.placeholder_width_ratio", "must be in (0, 4]"));
        }
        if let Some(t) = self.classifier.timeout_secs {
            if !(t > 0.0) || Duration::try_from_secs_f64(t).is_err() {
                return Err(invalid("classifier.timeout_secs", "must be a positive, representable number of seconds"));
            }
        }
        if self.output.prefix.trim().is_empty() {
            return Err(invalid("output.prefix", "must not be empty"));
        }
        Ok(())
    }

    pub fn classifier_timeout(&self) -> Option<Duration> {
        self.classifier
            .timeout_secs
            .and_then(|t| Duration::try_from_secs_f64(t).ok())
    }

    pub fn compositor(&self) -> FrameCompositor {
        FrameCompositor {
            layout: self.display.layout,
            bar_height: self.display.bar_height,
            gap: self.display.gap,
            placeholder_width_ratio: self.display.placeholder_width_ratio,
            shadow: self.display.shadow,
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = MimicConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.classifier.cadence, 10);
        assert_eq!(config.display.layout, OverlayLayout::BottomBar);
        assert_eq!(config.catalog.mapping_file, PathBuf::from("expressions.json"));
        assert!(config.classifier_timeout().is_none());
    }

    #[test]
    fn oversized_timeout_never_panics() {
        let mut config = MimicConfig::default();
        config.classifier.timeout_secs = Some(1e30);
        assert!(config.validate().is_err());
        assert_eq!(config.classifier_timeout(), None);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"classifier": {"cadence": 5, "timeout_secs": 2.5}, "display": {"layout": "inline", "gap": 8}}"#,
        )
        .unwrap();

        let config = MimicConfig::load(&path).unwrap();
        assert_eq!(config.classifier.cadence, 5);
        assert_eq!(config.classifier.endpoint, "http://127.0.0.1:5005");
        assert_eq!(config.classifier_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.display.bar_height, 50);

        let compositor = config.compositor();
        assert_eq!(compositor.layout, OverlayLayout::Inline);
        assert_eq!(compositor.gap, 8);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{"classifier": {"cadence": 0}}"#).unwrap();
        assert!(matches!(MimicConfig::load(&path), Err(ConfigError::Invalid { .. })));

        fs::write(&path, r#"{"display": {"placeholder_width_ratio": 0}}"#).unwrap();
        assert!(matches!(MimicConfig::load(&path), Err(ConfigError::Invalid { .. })));

        fs::write(&path, r#"{"classifier": {"timeout_secs": 1e30}}"#).unwrap();
        assert!(matches!(MimicConfig::load(&path), Err(ConfigError::Invalid { .. })));

        fs::write(&path, r#"{"classifier": {"timeout_secs": -1}}"#).unwrap();
        assert!(matches!(MimicConfig::load(&path), Err(ConfigError::Invalid { .. })));

        fs::write(&path, r#"{"display": {"layout": "diagonal"}}"#).unwrap();
        assert!(matches!(MimicConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
