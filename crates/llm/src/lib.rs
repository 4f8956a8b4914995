pub mod client;
pub mod extract;
pub mod prompt;

pub use client::{ChatModel, LlmError, MockChat, OllamaClient};
pub use extract::{find_json_block, parse_record, ExtractionError, ExtractionErrorKind};
pub use prompt::build_prompt;
