use async_trait::async_trait;
use recibo_core::{DetectorSettings, OcrSettings};
use serde_json::Value;

use crate::recognizer::{OcrEngine, OcrError};
use crate::segment::{DetectError, Region, RegionDetector};

/// OCR sidecar reached over HTTP: PNG bytes in, raw engine JSON out.
/// Language/orientation configuration rides along as query parameters.
pub struct HttpOcrEngine {
    http: reqwest::Client,
    endpoint: String,
    lang: String,
    textline_orientation: bool,
}

impl HttpOcrEngine {
    pub fn new(settings: &OcrSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: settings.endpoint.clone(),
            lang: settings.lang.clone(),
            textline_orientation: settings.textline_orientation,
        }
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn recognize(&self, image_png: &[u8]) -> Result<Value, OcrError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[
                ("lang", self.lang.as_str()),
                ("orientation", if self.textline_orientation { "1" } else { "0" }),
            ])
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(image_png.to_vec())
            .send()
            .await
            .map_err(|e| OcrError::Engine(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OcrError::Engine(format!(
                "OCR sidecar returned status {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| OcrError::Engine(format!("invalid OCR payload: {e}")))
    }
}

/// Layout/object detector sidecar: PNG bytes and a confidence threshold in,
/// a JSON list of labelled boxes out.
pub struct HttpRegionDetector {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpRegionDetector {
    pub fn new(settings: &DetectorSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: settings.endpoint.clone(),
        }
    }
}

#[async_trait]
impl RegionDetector for HttpRegionDetector {
    async fn detect(&self, image_png: &[u8], threshold: f32) -> Result<Vec<Region>, DetectError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("threshold", threshold.to_string())])
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(image_png.to_vec())
            .send()
            .await
            .map_err(|e| DetectError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DetectError::Request(format!(
                "detector returned status {}",
                response.status()
            )));
        }

        response
            .json::<Vec<Region>>()
            .await
            .map_err(|e| DetectError::Malformed(e.to_string()))
    }
}
