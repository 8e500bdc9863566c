//! Format-specific text extraction for uploaded documents.

use quick_xml::{
    NsReader,
    events::Event,
    name::{Namespace, ResolveResult},
};
use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};

use super::types::ExtractionError;

const DOCX_DOCUMENT_PART: &str = "word/document.xml";
const WORD_NAMESPACE: &[u8] = b"http://schemas.openxmlformats.org/wordprocessingml/2006/main";
/// Ceiling on the decompressed size of `word/document.xml`.
const MAX_DOCUMENT_PART_BYTES: u64 = 64 * 1024 * 1024;

/// Document formats accepted by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// UTF-8 (best effort) plain text.
    PlainText,
    /// Office Open XML word-processing document.
    Docx,
}

impl DocumentFormat {
    /// Every supported format, in the order they are advertised to clients.
    pub const ALL: [Self; 3] = [Self::Pdf, Self::PlainText, Self::Docx];

    /// MIME type a client must declare for this format.
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::PlainText => "text/plain",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    /// Conventional file extension for this format.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PlainText => "txt",
            Self::Docx => "docx",
        }
    }

    /// Resolve a declared content type. Matching is exact.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.mime_type() == content_type)
    }

    /// Extensions listed in "unsupported type" errors.
    pub fn allowed_extensions() -> [&'static str; 3] {
        Self::ALL.map(Self::extension)
    }

    /// Convert `bytes` into plain text according to this format.
    pub fn extract(self, bytes: &[u8]) -> Result<String, ExtractionError> {
        match self {
            Self::Pdf => extract_pdf(bytes),
            Self::Docx => extract_docx(bytes),
            Self::PlainText => Ok(decode_lossy(bytes)),
        }
    }
}

/// Decode UTF-8, dropping any invalid byte sequences instead of replacing them.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    // The decoder panics on some malformed inputs; treat that as a parse failure.
    let pages = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }))
    .map_err(|payload| ExtractionError::Pdf(panic_message(payload.as_ref())))?
    .map_err(|error| ExtractionError::Pdf(error.to_string()))?;
    Ok(join_pages(pages))
}

/// Join per-page text with newlines; blank pages contribute an empty line.
fn join_pages(pages: Vec<String>) -> String {
    pages.join("\n")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("decoder panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("decoder panicked: {message}")
    } else {
        "decoder panicked".to_string()
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|error| ExtractionError::Docx(format!("invalid container: {error}")))?;
    let part = archive
        .by_name(DOCX_DOCUMENT_PART)
        .map_err(|error| {
            ExtractionError::Docx(format!("missing {DOCX_DOCUMENT_PART}: {error}"))
        })?;
    let xml = read_capped(part, MAX_DOCUMENT_PART_BYTES)?;
    let xml = String::from_utf8(xml).map_err(|error| {
        ExtractionError::Docx(format!("{DOCX_DOCUMENT_PART} is not UTF-8: {error}"))
    })?;

    let paragraphs = body_paragraphs(&xml)?;
    Ok(paragraphs
        .into_iter()
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Read at most `limit` bytes of a decompressed part; anything longer is rejected.
fn read_capped(part: impl Read, limit: u64) -> Result<Vec<u8>, ExtractionError> {
    let mut buf = Vec::new();
    part.take(limit + 1)
        .read_to_end(&mut buf)
        .map_err(|error| {
            ExtractionError::Docx(format!("unreadable {DOCX_DOCUMENT_PART}: {error}"))
        })?;
    if buf.len() as u64 > limit {
        return Err(ExtractionError::Docx("document part too large".into()));
    }
    Ok(buf)
}

/// An open element, tagged with whether it lives in the WordprocessingML namespace.
struct Element {
    word: bool,
    local: Vec<u8>,
}

impl Element {
    fn is(&self, local: &[u8]) -> bool {
        self.word && self.local == local
    }
}

/// Collect the text of each top-level `w:p` under `w:body`.
///
/// Only runs that sit directly in the paragraph, or in a `w:hyperlink` directly in it, are
/// read. Tables, tracked insertions, text boxes, and math are skipped. Inside a run, `w:tab`
/// becomes a tab and `w:br`/`w:cr` a newline.
fn body_paragraphs(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut paragraphs = Vec::new();
    // Stack index of the open body paragraph and the text it has collected so far.
    let mut current: Option<(usize, String)> = None;
    let mut in_text = false;

    loop {
        let (namespace, event) = reader
            .read_resolved_event()
            .map_err(|error| ExtractionError::Docx(format!("malformed document XML: {error}")))?;
        let word = matches!(
            namespace,
            ResolveResult::Bound(Namespace(ns)) if ns == WORD_NAMESPACE
        );
        match event {
            Event::Start(element) => {
                let element = Element {
                    word,
                    local: element.local_name().as_ref().to_vec(),
                };
                if element.is(b"p") && stack.last().is_some_and(|parent| parent.is(b"body")) {
                    current = Some((stack.len(), String::new()));
                } else if element.is(b"t") {
                    in_text = current
                        .as_ref()
                        .is_some_and(|(index, _)| in_paragraph_run(&stack[index + 1..]));
                }
                stack.push(element);
            }
            Event::Empty(element) => {
                if let Some((index, paragraph)) = current.as_mut() {
                    if word && in_paragraph_run(&stack[*index + 1..]) {
                        match element.local_name().as_ref() {
                            b"tab" => paragraph.push('\t'),
                            b"br" | b"cr" => paragraph.push('\n'),
                            _ => {}
                        }
                    }
                }
            }
            Event::Text(text) if in_text => {
                if let Some((_, paragraph)) = current.as_mut() {
                    let unescaped = text.unescape().map_err(|error| {
                        ExtractionError::Docx(format!("malformed text run: {error}"))
                    })?;
                    paragraph.push_str(&unescaped);
                }
            }
            Event::End(_) => {
                let closed = stack.pop();
                if closed.as_ref().is_some_and(|element| element.is(b"t")) {
                    in_text = false;
                }
                if current
                    .as_ref()
                    .is_some_and(|(index, _)| *index == stack.len())
                {
                    if let Some((_, paragraph)) = current.take() {
                        paragraphs.push(paragraph);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Whether the elements between a paragraph and the current position form `w:r` or
/// `w:hyperlink/w:r`.
fn in_paragraph_run(path: &[Element]) -> bool {
    match path {
        [run] => run.is(b"r"),
        [link, run] => link.is(b"hyperlink") && run.is(b"r"),
        _ => false,
    }
}
