use std::path::Path;

use async_trait::async_trait;
use image::{imageops, GrayImage};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Detector request failed: {0}")]
    Request(String),
    #[error("Detector returned malformed regions: {0}")]
    Malformed(String),
}

/// Layout classes, by the detector's integer label convention
/// (0 = text, 1 = title, 2 = list, 3 = table, 4 = figure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionClass {
    Text,
    Title,
    List,
    Table,
    Figure,
    Other(u32),
}

impl RegionClass {
    pub fn from_label(label: u32) -> Self {
        match label {
            0 => RegionClass::Text,
            1 => RegionClass::Title,
            2 => RegionClass::List,
            3 => RegionClass::Table,
            4 => RegionClass::Figure,
            other => RegionClass::Other(other),
        }
    }
}

/// A candidate rectangle from the layout/object detector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Region {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub label: u32,
    pub confidence: f32,
}

impl Region {
    pub fn class(&self) -> RegionClass {
        RegionClass::from_label(self.label)
    }
}

/// Abstraction over a layout/object detector. Implementations take PNG bytes
/// and a confidence threshold and return candidate regions in detector order.
#[async_trait]
pub trait RegionDetector: Send + Sync {
    async fn detect(&self, image_png: &[u8], threshold: f32) -> Result<Vec<Region>, DetectError>;
}

/// Keep only regions whose label is allow-listed (text-bearing classes by
/// default); tables, figures, and unknown classes carry no usable line text.
pub fn filter_regions(regions: Vec<Region>, allowed_labels: &[u32]) -> Vec<Region> {
    regions
        .into_iter()
        .filter(|r| allowed_labels.contains(&r.label))
        .collect()
}

/// Sort regions into reading order: top-to-bottom, then left-to-right.
/// Detector return order is arbitrary and feeding it to the model as-is
/// scrambles multi-column receipts.
pub fn sort_reading_order(regions: &mut [Region]) {
    regions.sort_by(|a, b| a.y1.total_cmp(&b.y1).then(a.x1.total_cmp(&b.x1)));
}

/// Crop each region out of the normalized image. Coordinates are clamped to
/// the image bounds; boxes that collapse to zero area after clamping are
/// skipped.
pub fn crop_regions(image: &GrayImage, regions: &[Region]) -> Vec<GrayImage> {
    let (w, h) = (image.width(), image.height());
    let mut crops = Vec::with_capacity(regions.len());
    for region in regions {
        let x1 = (region.x1.max(0.0).round() as u32).min(w);
        let y1 = (region.y1.max(0.0).round() as u32).min(h);
        let x2 = (region.x2.max(0.0).round() as u32).min(w);
        let y2 = (region.y2.max(0.0).round() as u32).min(h);
        if x2 <= x1 || y2 <= y1 {
            tracing::warn!(?region, "Skipping degenerate region");
            continue;
        }
        crops.push(imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image());
    }
    crops
}

/// Write each crop to `dir` as `region_<i>.png` for inspection. Failures are
/// logged, never propagated — debug output must not break the run.
pub fn dump_debug_crops(dir: &Path, crops: &[GrayImage]) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        tracing::warn!("Could not create debug crop dir {}: {e}", dir.display());
        return;
    }
    for (i, crop) in crops.iter().enumerate() {
        let path = dir.join(format!("region_{i}.png"));
        if let Err(e) = crop.save(&path) {
            tracing::warn!("Could not save debug crop {}: {e}", path.display());
        }
    }
}

// ── Mock detector (used for tests) ────────────────────────────────────────────

pub struct MockDetector {
    pub regions: Vec<Region>,
}

impl MockDetector {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }
}

#[async_trait]
impl RegionDetector for MockDetector {
    async fn detect(
        &self,
        _image_png: &[u8],
        threshold: f32,
    ) -> Result<Vec<Region>, DetectError> {
        Ok(self
            .regions
            .iter()
            .filter(|r| r.confidence >= threshold)
            .cloned()
            .collect())
    }
}
