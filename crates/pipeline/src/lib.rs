pub mod persist;

use std::path::{Path, PathBuf};

use thiserror::Error;

use recibo_core::{PipelineConfig, ReceiptRecord, RegionSource};
use recibo_llm::{build_prompt, parse_record, ChatModel, ExtractionError, LlmError};
use recibo_ocr::preprocess::{encode_png, normalize, NormalizedImage, PreprocessError};
use recibo_ocr::recognizer::{collect_text, recognize_all, OcrEngine, OcrError};
use recibo_ocr::segment::{
    crop_regions, dump_debug_crops, filter_regions, sort_reading_order, DetectError,
    RegionDetector,
};

pub use persist::{persist_record, PersistError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Image preprocessing failed: {0}")]
    ImageLoad(#[from] PreprocessError),
    #[error("Region source {0:?} requires a detector handle")]
    MissingDetector(RegionSource),
    #[error("Region detection failed: {0}")]
    Detect(#[from] DetectError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("OCR produced no text — check image quality and OCR configuration")]
    EmptyOcr,
    #[error("Model communication failed: {0}")]
    Model(#[from] LlmError),
    #[error("Extraction failed: {0}")]
    Extraction(ExtractionError),
    #[error("Failed to persist record: {0}")]
    Persist(#[from] PersistError),
}

/// The result of one full extraction run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Newline-joined recognized text fed to the model.
    pub ocr_text: String,
    pub record: ReceiptRecord,
    /// Where the record was persisted.
    pub output_path: PathBuf,
}

/// Orchestrates: normalize → (segment) → recognize → prompt → extract → persist.
///
/// Engine handles are constructed by the caller and passed in; one pipeline
/// instance is reusable across invocations. The detector is only consulted
/// for the layout/object region sources.
pub struct ReceiptPipeline<E, D, M> {
    engine: E,
    detector: Option<D>,
    model: M,
    config: PipelineConfig,
}

impl<E, D, M> ReceiptPipeline<E, D, M>
where
    E: OcrEngine,
    D: RegionDetector,
    M: ChatModel,
{
    pub fn new(engine: E, detector: Option<D>, model: M, config: PipelineConfig) -> Self {
        Self { engine, detector, model, config }
    }

    /// Process one receipt image from disk.
    ///
    /// Empty recognized text short-circuits before any model call; an
    /// unusable model response surfaces as `Extraction` carrying the raw
    /// text. Nothing is persisted on any failure path.
    pub async fn process(&self, image_path: &Path) -> Result<PipelineOutcome, PipelineError> {
        tracing::info!("Processing receipt: {}", image_path.display());
        let normalized = normalize(
            image_path,
            self.config.target_width,
            self.config.temp_dir.as_deref(),
        )?;

        let ocr_text = self.recognize(&normalized).await;
        // Normalized temp image is per-invocation; no reason to keep it.
        let _ = std::fs::remove_file(&normalized.path);
        let ocr_text = ocr_text?;

        if ocr_text.is_empty() {
            return Err(PipelineError::EmptyOcr);
        }
        tracing::debug!("Recognized {} chars of receipt text", ocr_text.len());

        let prompt = build_prompt(&ocr_text);
        let raw = self.model.chat(&prompt).await?;
        let record = parse_record(&raw).map_err(PipelineError::Extraction)?;

        let output_path = persist_record(&self.config.output_dir, &record)?;
        tracing::info!("Record persisted: {}", output_path.display());

        Ok(PipelineOutcome { ocr_text, record, output_path })
    }

    async fn recognize(&self, normalized: &NormalizedImage) -> Result<String, PipelineError> {
        let png = normalized.png_bytes()?;

        if self.config.region_source == RegionSource::WholeImage {
            let payload = self.engine.recognize(&png).await?;
            return Ok(collect_text(&payload));
        }

        let Some(detector) = &self.detector else {
            return Err(PipelineError::MissingDetector(self.config.region_source));
        };

        let regions = detector.detect(&png, self.config.detector_threshold()).await?;
        let mut regions = filter_regions(regions, &self.config.detector.allowed_labels);
        sort_reading_order(&mut regions);
        tracing::debug!("Detector produced {} text-bearing regions", regions.len());

        let crops = crop_regions(&normalized.image, &regions);
        if let Some(dir) = &self.config.detector.debug_crop_dir {
            dump_debug_crops(dir, &crops);
        }

        let mut crop_pngs = Vec::with_capacity(crops.len());
        for crop in &crops {
            crop_pngs.push(encode_png(crop)?);
        }
        Ok(recognize_all(&self.engine, &crop_pngs).await?)
    }
}
