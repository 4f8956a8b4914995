pub mod http;
pub mod preprocess;
pub mod recognizer;
pub mod segment;

pub use http::{HttpOcrEngine, HttpRegionDetector};
pub use preprocess::{encode_png, normalize, NormalizedImage, PreprocessError};
pub use recognizer::{collect_text, recognize_all, MockEngine, OcrEngine, OcrError};
pub use segment::{
    crop_regions, dump_debug_crops, filter_regions, sort_reading_order, DetectError, MockDetector,
    Region, RegionClass, RegionDetector,
};
