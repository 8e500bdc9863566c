//! Data types and error definitions for the document analysis pipeline.

use crate::completion::CompletionError;
use serde::Serialize;
use thiserror::Error;

use super::extract::DocumentFormat;

/// Largest accepted upload, in bytes.
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Errors raised while turning document bytes into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// PDF structure could not be decoded.
    #[error("PDF parsing failed, check the file is intact")]
    Pdf(String),
    /// DOCX container or document XML could not be decoded.
    #[error("Word document parsing failed")]
    Docx(String),
}

impl ExtractionError {
    /// Underlying decoder diagnostic, kept out of the client-facing message.
    pub fn cause(&self) -> &str {
        match self {
            Self::Pdf(cause) | Self::Docx(cause) => cause,
        }
    }
}

/// Errors emitted by the document analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Declared content type is not one of the supported formats.
    #[error("Unsupported file type, allowed: {:?}", DocumentFormat::allowed_extensions())]
    UnsupportedType {
        /// Content type the client declared, if any.
        content_type: Option<String>,
    },
    /// Upload exceeded [`MAX_FILE_SIZE`].
    #[error("File exceeds the {}MB limit", MAX_FILE_SIZE / 1024 / 1024)]
    TooLarge,
    /// Multipart body carried no `file` field.
    #[error("No file uploaded, expected a multipart field named \"file\"")]
    MissingFile,
    /// Multipart body could not be decoded.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
    /// Format-specific extraction failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Extraction succeeded but produced only whitespace.
    #[error("File is empty or contains no parseable text")]
    NoText,
    /// Completion provider failed while summarizing.
    #[error("File processing failed: {0}")]
    Summarization(#[from] CompletionError),
    /// Any other failure inside the pipeline.
    #[error("File processing failed: {0}")]
    Unexpected(String),
}

impl AnalysisError {
    /// Whether the failure was caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Summarization(_) | Self::Unexpected(_))
    }
}

/// An uploaded document held in memory for the duration of one request.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    /// Original filename supplied by the client.
    pub filename: Option<String>,
    /// Declared MIME type of the upload.
    pub content_type: Option<String>,
    /// Raw payload.
    pub bytes: Vec<u8>,
}

/// Analysis outcome returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Filename echoed back from the upload (empty when none was supplied).
    pub filename: String,
    /// Summary produced by the completion provider.
    pub summary: String,
    /// Leading slice of the analysed text followed by `...`.
    pub content_preview: String,
}
