pub mod config;
pub mod record;

pub use config::{
    ConfigError, DetectorSettings, ModelSettings, OcrSettings, PipelineConfig, RegionSource,
};
pub use record::{LineItem, ReceiptRecord, TotalAmount};
