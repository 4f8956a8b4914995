use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
}

/// Abstraction over an OCR engine.
///
/// Implementations accept PNG bytes and return the engine's result payload
/// as raw JSON — the shape varies across engine versions, so normalization
/// into text lines happens in [`collect_text`], not at the boundary.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image_png: &[u8]) -> Result<Value, OcrError>;
}

/// Flatten a raw engine payload into newline-joined text.
///
/// Two payload shapes are handled:
/// - per-page objects carrying a `rec_texts` list of strings;
/// - per-line triples where the text sits at `line[1][0]`.
///
/// Anything unexpected degrades to an empty contribution with a warning —
/// partial OCR degradation is recoverable at the concatenation level and
/// must never abort the run. Returns an empty string when nothing was
/// recognized; the caller decides whether that is fatal.
pub fn collect_text(result: &Value) -> String {
    let Some(pages) = result.as_array() else {
        tracing::warn!("OCR payload is not a list; treating as empty");
        return String::new();
    };
    if pages.is_empty() {
        tracing::warn!("OCR payload contained no pages");
        return String::new();
    }

    let mut lines: Vec<String> = Vec::new();
    for page in pages {
        match page {
            Value::Object(fields) => match fields.get("rec_texts") {
                Some(Value::Array(texts)) => {
                    for text in texts {
                        if let Value::String(s) = text {
                            lines.push(s.clone());
                        }
                        // Non-string entries are skipped, not fatal.
                    }
                }
                _ => tracing::warn!("'rec_texts' missing or not a list in OCR page result"),
            },
            Value::Array(entries) => {
                for line in entries {
                    match line.get(1).and_then(|pair| pair.get(0)).and_then(Value::as_str) {
                        Some(s) => lines.push(s.to_string()),
                        None => tracing::warn!("OCR line entry missing nested text field"),
                    }
                }
            }
            _ => tracing::warn!("Unexpected OCR page shape; skipping"),
        }
    }

    lines.join("\n").trim().to_string()
}

/// Run the engine over each crop in order and concatenate the recognized
/// text, one region after another. Empty contributions are dropped so a
/// blank region does not leave a hole in the prompt text.
pub async fn recognize_all<E: OcrEngine>(
    engine: &E,
    crops: &[Vec<u8>],
) -> Result<String, OcrError> {
    let mut parts: Vec<String> = Vec::new();
    for crop in crops {
        let payload = engine.recognize(crop).await?;
        let text = collect_text(&payload);
        if !text.is_empty() {
            parts.push(text);
        }
    }
    Ok(parts.join("\n").trim().to_string())
}

/// Wrap plain recognizer output into the `rec_texts` payload shape, for
/// backends that only produce flat text.
pub fn wrap_plain_text(text: &str) -> Value {
    let lines: Vec<Value> = text
        .lines()
        .map(|l| Value::String(l.to_string()))
        .collect();
    serde_json::json!([{ "rec_texts": lines }])
}

// ── Mock engine (always available, used for tests) ────────────────────────────

/// Returns a pre-set payload — useful for unit testing the pipeline without
/// a live OCR sidecar.
pub struct MockEngine {
    pub payload: Value,
}

impl MockEngine {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Shape-(a) payload from a list of lines.
    pub fn with_texts(texts: &[&str]) -> Self {
        Self { payload: serde_json::json!([{ "rec_texts": texts }]) }
    }
}

#[async_trait]
impl OcrEngine for MockEngine {
    async fn recognize(&self, _image_png: &[u8]) -> Result<Value, OcrError> {
        Ok(self.payload.clone())
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{wrap_plain_text, OcrEngine, OcrError};
    use async_trait::async_trait;
    use leptess::LepTess;
    use serde_json::Value;

    pub struct TesseractEngine {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractEngine {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    #[async_trait]
    impl OcrEngine for TesseractEngine {
        async fn recognize(&self, image_png: &[u8]) -> Result<Value, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_png)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let text = lt
                .get_utf8_text()
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(wrap_plain_text(&text))
        }
    }
}
