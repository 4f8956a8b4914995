use std::path::{Path, PathBuf};

use chrono::Local;
use recibo_core::ReceiptRecord;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Write a successfully extracted record as pretty-printed JSON under
/// `output_dir`, named `receipt_<YYYYMMDD_HHMMSS>_<uuid8>.json`. The uuid
/// suffix keeps repeated same-second runs from clobbering each other.
pub fn persist_record(output_dir: &Path, record: &ReceiptRecord) -> Result<PathBuf, PersistError> {
    std::fs::create_dir_all(output_dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let uid = Uuid::new_v4().simple().to_string();
    let path = output_dir.join(format!("receipt_{stamp}_{}.json", &uid[..8]));
    std::fs::write(&path, serde_json::to_string_pretty(record)?)?;
    Ok(path)
}
