//! Truncation, preview, and prompt shaping for extracted text.

/// Maximum number of characters forwarded to the summarizer.
pub const MAX_SUMMARY_INPUT_CHARS: usize = 5000;
/// Number of characters of analysed text echoed back as a preview.
pub const PREVIEW_CHARS: usize = 300;
/// Marker appended to every preview.
pub const PREVIEW_SUFFIX: &str = "...";

/// Keep the first [`MAX_SUMMARY_INPUT_CHARS`] characters and trim surrounding whitespace.
///
/// Counting is by Unicode scalar value, never by byte, so multi-byte text is never split.
pub fn truncate_for_summary(text: &str) -> &str {
    take_chars(text, MAX_SUMMARY_INPUT_CHARS).trim()
}

/// First [`PREVIEW_CHARS`] characters of `text` followed by [`PREVIEW_SUFFIX`].
pub fn content_preview(text: &str) -> String {
    let head = take_chars(text, PREVIEW_CHARS);
    let mut preview = String::with_capacity(head.len() + PREVIEW_SUFFIX.len());
    preview.push_str(head);
    preview.push_str(PREVIEW_SUFFIX);
    preview
}

/// Instruction asking for a Chinese summary of at most 200 characters.
pub fn summary_prompt(text: &str) -> String {
    format!("请用中文总结以下内容（200字内）：\n{text}")
}

fn take_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
