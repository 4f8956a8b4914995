use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Where recognized text comes from: the whole normalized image, or the
/// crops produced by one of the two detector variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionSource {
    WholeImage,
    Layout,
    Object,
}

impl RegionSource {
    /// Detector confidence cutoff used when the config leaves it unset.
    /// The layout model is run permissively, the object detector less so.
    pub fn default_threshold(self) -> f32 {
        match self {
            RegionSource::WholeImage | RegionSource::Layout => 0.25,
            RegionSource::Object => 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// OCR sidecar endpoint; receives the normalized PNG, returns the raw
    /// engine payload as JSON.
    pub endpoint: String,
    pub lang: String,
    pub textline_orientation: bool,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8868/ocr".into(),
            lang: "en".into(),
            textline_orientation: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub endpoint: String,
    /// Unset means use the region source's default.
    pub confidence_threshold: Option<f32>,
    /// Integer class labels to keep; everything else is dropped before OCR.
    pub allowed_labels: Vec<u32>,
    /// When set, each retained crop is written here as `region_<i>.png`.
    pub debug_crop_dir: Option<PathBuf>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8868/layout".into(),
            confidence_threshold: None,
            // text / title / list
            allowed_labels: vec![0, 1, 2],
            debug_crop_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".into(),
            model: "llama2:7b".into(),
            temperature: 0.1,
            timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

/// Top-level pipeline settings, loadable from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fixed width the receipt image is normalized to before OCR.
    pub target_width: u32,
    /// Directory for the normalized temp image; system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub region_source: RegionSource,
    pub ocr: OcrSettings,
    pub detector: DetectorSettings,
    pub model: ModelSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_width: 1000,
            temp_dir: None,
            output_dir: PathBuf::from("outputs"),
            region_source: RegionSource::WholeImage,
            ocr: OcrSettings::default(),
            detector: DetectorSettings::default(),
            model: ModelSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Effective detector threshold for the configured region source.
    pub fn detector_threshold(&self) -> f32 {
        self.detector
            .confidence_threshold
            .unwrap_or_else(|| self.region_source.default_threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_baseline() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.target_width, 1000);
        assert_eq!(cfg.region_source, RegionSource::WholeImage);
        assert_eq!(cfg.model.model, "llama2:7b");
        assert!((cfg.model.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(cfg.output_dir, PathBuf::from("outputs"));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
            region_source = "layout"

            [model]
            model = "mistral:7b"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.region_source, RegionSource::Layout);
        assert_eq!(cfg.model.model, "mistral:7b");
        // Untouched sections keep their defaults.
        assert_eq!(cfg.target_width, 1000);
        assert_eq!(cfg.model.base_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn threshold_defaults_per_source() {
        let mut cfg = PipelineConfig::default();
        cfg.region_source = RegionSource::Layout;
        assert_eq!(cfg.detector_threshold(), 0.25);
        cfg.region_source = RegionSource::Object;
        assert_eq!(cfg.detector_threshold(), 0.5);
        cfg.detector.confidence_threshold = Some(0.8);
        assert_eq!(cfg.detector_threshold(), 0.8);
    }

    #[test]
    fn load_reads_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "target_width = 1200").unwrap();
        let cfg = PipelineConfig::load(f.path()).unwrap();
        assert_eq!(cfg.target_width, 1200);
    }

    #[test]
    fn load_rejects_bad_toml() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "target_width = [not toml").unwrap();
        assert!(matches!(
            PipelineConfig::load(f.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
