//! Request-scoped orchestration of the analysis stages.

use crate::completion::{CompletionClient, CompletionRequest, user_message};

use super::{
    extract::DocumentFormat,
    text::{content_preview, summary_prompt, truncate_for_summary},
    types::{AnalysisError, AnalysisResult, MAX_FILE_SIZE, UploadedFile},
};

/// Sampling temperature used for summaries.
pub const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Resolve the declared content type to a supported format.
///
/// Callers that stream uploads run this before reading the body.
pub fn ensure_supported(content_type: Option<&str>) -> Result<DocumentFormat, AnalysisError> {
    content_type
        .and_then(DocumentFormat::from_mime)
        .ok_or_else(|| AnalysisError::UnsupportedType {
            content_type: content_type.map(str::to_string),
        })
}

/// Reject payloads larger than [`MAX_FILE_SIZE`].
pub fn ensure_within_limit(len: usize) -> Result<(), AnalysisError> {
    if len > MAX_FILE_SIZE {
        Err(AnalysisError::TooLarge)
    } else {
        Ok(())
    }
}

/// Run the full analysis pipeline for one upload.
///
/// Stages run in order and the first failure ends the request: type gate, size gate,
/// extraction (on the blocking pool), truncation and emptiness check, then one summary call.
pub async fn analyze_document<C>(
    client: &C,
    file: UploadedFile,
    summary_model: &str,
) -> Result<AnalysisResult, AnalysisError>
where
    C: CompletionClient + ?Sized,
{
    let UploadedFile {
        filename,
        content_type,
        bytes,
    } = file;
    let format = ensure_supported(content_type.as_deref())?;
    ensure_within_limit(bytes.len())?;

    let byte_count = bytes.len();
    let extracted = tokio::task::spawn_blocking(move || format.extract(&bytes))
        .await
        .map_err(|error| AnalysisError::Unexpected(error.to_string()))?
        .inspect_err(|error| {
            tracing::warn!(
                filename = ?filename,
                ?format,
                cause = error.cause(),
                "Document extraction failed"
            );
        })?;

    let text = summarizable_text(&extracted)?;
    tracing::debug!(
        filename = ?filename,
        ?format,
        bytes = byte_count,
        extracted_chars = extracted.chars().count(),
        "Extracted document text"
    );

    let completion = client
        .complete(CompletionRequest {
            model: summary_model.to_string(),
            messages: vec![user_message(summary_prompt(text))],
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: None,
        })
        .await?;

    Ok(AnalysisResult {
        filename: filename.unwrap_or_default(),
        summary: completion.content,
        content_preview: content_preview(text),
    })
}

fn summarizable_text(extracted: &str) -> Result<&str, AnalysisError> {
    let text = truncate_for_summary(extracted);
    if text.is_empty() {
        Err(AnalysisError::NoText)
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::extract::tests::{docx_fixture, pdf_fixture};
    use crate::analysis::text::MAX_SUMMARY_INPUT_CHARS;
    use crate::completion::{Completion, CompletionError};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    #[derive(Default)]
    struct RecordingClient {
        calls: Arc<Mutex<Vec<CompletionRequest>>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for RecordingClient {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<Completion, CompletionError> {
            self.calls.lock().await.push(request);
            if self.fail {
                return Err(CompletionError::Rejected {
                    status: StatusCode::UNAUTHORIZED,
                    message: "invalid api key".into(),
                });
            }
            Ok(Completion {
                content: "这是一个摘要".into(),
                model: None,
            })
        }
    }

    fn upload(filename: &str, content_type: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn plain_text_upload_is_summarized() {
        let client = RecordingClient::default();
        let result = analyze_document(
            &client,
            upload("notes.txt", "text/plain", b"Hello world"),
            "gpt-4-turbo",
        )
        .await
        .expect("analysis");

        assert_eq!(result.filename, "notes.txt");
        assert_eq!(result.summary, "这是一个摘要");
        assert_eq!(result.content_preview, "Hello world...");

        let calls = client.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "gpt-4-turbo");
        assert_eq!(calls[0].temperature, SUMMARY_TEMPERATURE);
        assert_eq!(calls[0].max_tokens, None);
        assert_eq!(calls[0].messages[0]["role"], "user");
        assert_eq!(
            calls[0].messages[0]["content"],
            summary_prompt("Hello world")
        );
    }

    #[tokio::test]
    async fn docx_upload_is_summarized() {
        let client = RecordingClient::default();
        let bytes = docx_fixture(
            "<w:p><w:r><w:t>First</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p>",
        );
        let result = analyze_document(&client, upload("memo.docx", DOCX_MIME, &bytes), "m")
            .await
            .expect("analysis");

        assert_eq!(result.content_preview, "First\nSecond...");
    }

    #[tokio::test]
    async fn unsupported_type_rejected_without_outbound_call() {
        let client = RecordingClient::default();
        let error = analyze_document(&client, upload("a.png", "image/png", b"\x89PNG"), "m")
            .await
            .expect_err("unsupported");

        assert!(matches!(error, AnalysisError::UnsupportedType { .. }));
        assert!(client.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_content_type_is_unsupported() {
        let client = RecordingClient::default();
        let file = UploadedFile {
            filename: Some("notes.txt".into()),
            content_type: None,
            bytes: b"Hello".to_vec(),
        };
        let error = analyze_document(&client, file, "m").await.expect_err("no type");
        assert!(matches!(
            error,
            AnalysisError::UnsupportedType { content_type: None }
        ));
    }

    #[tokio::test]
    async fn oversize_upload_rejected() {
        let client = RecordingClient::default();
        let bytes = vec![b'a'; MAX_FILE_SIZE + 1];
        let error = analyze_document(&client, upload("big.txt", "text/plain", &bytes), "m")
            .await
            .expect_err("too large");

        assert!(matches!(error, AnalysisError::TooLarge));
        assert!(client.calls.lock().await.is_empty());
    }

    #[test]
    fn size_gate_accepts_exact_limit() {
        assert!(ensure_within_limit(MAX_FILE_SIZE).is_ok());
        assert!(matches!(
            ensure_within_limit(MAX_FILE_SIZE + 1),
            Err(AnalysisError::TooLarge)
        ));
    }

    #[tokio::test]
    async fn whitespace_only_text_has_nothing_to_summarize() {
        let client = RecordingClient::default();
        let error = analyze_document(&client, upload("blank.txt", "text/plain", b" \n\t "), "m")
            .await
            .expect_err("no text");

        assert!(matches!(error, AnalysisError::NoText));
        assert!(client.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_is_dropped_not_fatal() {
        let client = RecordingClient::default();
        let result = analyze_document(
            &client,
            upload("mixed.txt", "text/plain", b"\xffvalid\xfe text\xc3"),
            "m",
        )
        .await
        .expect("analysis");

        assert_eq!(result.content_preview, "valid text...");
    }

    #[tokio::test]
    async fn summarizer_sees_at_most_the_truncation_limit() {
        let client = RecordingClient::default();
        let body = "字".repeat(MAX_SUMMARY_INPUT_CHARS * 2);
        let result = analyze_document(
            &client,
            upload("long.txt", "text/plain", body.as_bytes()),
            "m",
        )
        .await
        .expect("analysis");

        assert_eq!(result.content_preview.chars().count(), 303);
        let calls = client.calls.lock().await;
        let prompt = calls[0].messages[0]["content"].as_str().expect("prompt");
        let prefix_chars = summary_prompt("").chars().count();
        assert_eq!(prompt.chars().count() - prefix_chars, MAX_SUMMARY_INPUT_CHARS);
    }

    #[tokio::test]
    async fn pdf_upload_is_summarized() {
        let client = RecordingClient::default();
        let bytes = pdf_fixture(&[Some("Hello"), None, Some("World")]);
        let result = analyze_document(&client, upload("report.pdf", "application/pdf", &bytes), "m")
            .await
            .expect("analysis");

        let preview = result.content_preview.strip_suffix("...").expect("preview suffix");
        assert_eq!(preview.split_whitespace().collect::<Vec<_>>(), ["Hello", "World"]);
        let calls = client.calls.lock().await;
        let prompt = calls[0].messages[0]["content"].as_str().expect("prompt");
        assert!(prompt.contains("Hello") && prompt.contains("World"));
    }

    #[tokio::test]
    async fn pdf_without_extractable_text_has_nothing_to_summarize() {
        let client = RecordingClient::default();
        let bytes = pdf_fixture(&[None, None, None]);
        let error = analyze_document(&client, upload("scan.pdf", "application/pdf", &bytes), "m")
            .await
            .expect_err("no text");

        assert!(matches!(error, AnalysisError::NoText));
        assert_eq!(error.to_string(), "File is empty or contains no parseable text");
        assert!(client.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_docx_is_a_client_error() {
        let client = RecordingClient::default();
        let error = analyze_document(&client, upload("x.docx", DOCX_MIME, b"nope"), "m")
            .await
            .expect_err("corrupt");

        assert!(matches!(error, AnalysisError::Extraction(_)));
        assert!(error.is_client_error());
        assert!(client.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn summarization_failure_is_a_server_error() {
        let client = RecordingClient {
            fail: true,
            ..Default::default()
        };
        let error = analyze_document(&client, upload("n.txt", "text/plain", b"Hello"), "m")
            .await
            .expect_err("upstream");

        assert!(!error.is_client_error());
        assert!(error.to_string().starts_with("File processing failed: "));
        assert!(error.to_string().contains("invalid api key"));
    }

    #[tokio::test]
    async fn missing_filename_echoes_empty_string() {
        let client = RecordingClient::default();
        let file = UploadedFile {
            filename: None,
            content_type: Some("text/plain".into()),
            bytes: b"Hello".to_vec(),
        };
        let result = analyze_document(&client, file, "m").await.expect("analysis");
        assert_eq!(result.filename, "");
    }
}
