//! Document analysis pipeline: type gate, size gate, extraction, truncation, summarization.

pub mod extract;
mod pipeline;
pub mod text;
pub mod types;

pub use extract::DocumentFormat;
pub use pipeline::{SUMMARY_TEMPERATURE, analyze_document, ensure_supported, ensure_within_limit};
pub use types::{AnalysisError, AnalysisResult, ExtractionError, MAX_FILE_SIZE, UploadedFile};
