use std::collections::BTreeMap;
use std::path::Path;

use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::extraction::pdf;
use crate::extraction::service::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_RETRIES};
use crate::models::resume::ResumeProfile;
use crate::state::AppState;

/// Multipart field name carrying the uploaded resumes.
const UPLOAD_FIELD: &str = "pdf_doc";

const NO_FILES_ERROR: &str = "No files were selected. Please select at least one PDF file.";
const EMPTY_TEXT_ERROR: &str =
    "Failed to extract text from PDF file. The file may be corrupted or empty.";

/// Result of one batch: per-filename extracted profiles and per-filename
/// error strings. A filename lands in exactly one of the two maps.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub results: BTreeMap<String, ResumeProfile>,
    pub errors: BTreeMap<String, String>,
}

/// POST /process
///
/// Accepts one or more PDFs under the `pdf_doc` multipart field and returns a
/// `BatchReport`. Per-document failures are reported in the body; only a
/// broken multipart stream produces a non-200 response.
pub async fn handle_process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchReport>, AppError> {
    let mut uploads: Vec<(String, Bytes)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Upload(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;
        uploads.push((filename, content));
    }

    Ok(Json(process_batch(&state, uploads).await))
}

/// Processes a batch of uploaded documents strictly sequentially. One
/// document's failure never aborts the rest of the batch.
pub(crate) async fn process_batch(state: &AppState, uploads: Vec<(String, Bytes)>) -> BatchReport {
    let mut report = BatchReport::default();

    if uploads.iter().all(|(filename, _)| filename.is_empty()) {
        report
            .errors
            .insert("_general".to_string(), NO_FILES_ERROR.to_string());
        return report;
    }

    for (filename, content) in uploads {
        if filename.is_empty() {
            continue;
        }
        match process_document(state, &filename, &content).await {
            DocumentOutcome::Extracted(profile) => {
                info!("Extracted structured fields from {filename}");
                report.results.insert(filename, profile);
            }
            DocumentOutcome::Failed(message) => {
                report.errors.insert(filename, message);
            }
        }
    }

    report
}

enum DocumentOutcome {
    Extracted(ResumeProfile),
    Failed(String),
}

async fn process_document(state: &AppState, filename: &str, content: &Bytes) -> DocumentOutcome {
    // Client-supplied names may carry path components; store under the final
    // component only so an upload cannot land outside the upload directory.
    let stored_name = match Path::new(filename).file_name() {
        Some(name) => name,
        None => {
            return DocumentOutcome::Failed(
                "An error occurred while processing: invalid filename".to_string(),
            )
        }
    };
    let path = state.config.upload_dir.join(stored_name);
    if let Err(e) = tokio::fs::write(&path, content).await {
        return DocumentOutcome::Failed(format!("An error occurred while processing: {e}"));
    }

    let text = pdf::extract_text(&path);
    if text.trim().is_empty() {
        return DocumentOutcome::Failed(EMPTY_TEXT_ERROR.to_string());
    }

    let payload = state
        .extractor
        .extract_structured(&text, DEFAULT_MAX_RETRIES, DEFAULT_INITIAL_DELAY)
        .await;
    classify_payload(&payload)
}

/// Classifies the extraction service's JSON payload: an object carrying an
/// `"error"` key is a per-document failure; anything else must fit the
/// `ResumeProfile` contract.
fn classify_payload(payload: &str) -> DocumentOutcome {
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => return DocumentOutcome::Failed(format!("Failed to parse response: {e}")),
    };

    if let Some(object) = value.as_object() {
        if object.contains_key("error") {
            let message = object
                .get("message")
                .and_then(|v| v.as_str())
                .or_else(|| object.get("error").and_then(|v| v.as_str()))
                .unwrap_or("Unknown error occurred");
            return DocumentOutcome::Failed(message.to_string());
        }
    }

    match serde_json::from_value::<ResumeProfile>(value) {
        Ok(profile) => DocumentOutcome::Extracted(profile),
        Err(e) => DocumentOutcome::Failed(format!("Failed to parse response: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extraction::pdf::build_pdf;
    use crate::extraction::service::AtsExtractor;
    use crate::llm_client::{BackendError, GenerativeBackend};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<String, BackendError>>>,
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, BackendError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("backend called more times than scripted")
        }
    }

    fn test_state(
        upload_dir: &std::path::Path,
        script: Vec<Result<String, BackendError>>,
    ) -> AppState {
        let backend = Arc::new(ScriptedBackend {
            script: Mutex::new(script.into()),
        });
        AppState {
            config: Config {
                gemini_api_key: "test-key".to_string(),
                upload_dir: upload_dir.to_path_buf(),
                port: 8080,
                rust_log: "info".to_string(),
            },
            extractor: AtsExtractor::new(backend),
        }
    }

    #[tokio::test]
    async fn test_batch_isolates_per_document_failures() {
        let dir = tempfile::tempdir().unwrap();
        // doc 2 never reaches the backend, so the script covers docs 1 and 3.
        let state = test_state(
            dir.path(),
            vec![
                Ok("{\"full_name\": \"Jane Doe\"}".to_string()),
                Err(BackendError::Api {
                    status: 500,
                    message: "backend exploded".to_string(),
                }),
            ],
        );

        let uploads = vec![
            ("one.pdf".to_string(), Bytes::from(build_pdf(&["Jane Doe, engineer"]))),
            ("two.pdf".to_string(), Bytes::from_static(b"not a pdf at all")),
            ("three.pdf".to_string(), Bytes::from(build_pdf(&["John Roe, analyst"]))),
        ];

        let report = process_batch(&state, uploads).await;

        assert_eq!(
            report.results["one.pdf"].full_name.as_deref(),
            Some("Jane Doe")
        );
        assert_eq!(report.errors["two.pdf"], EMPTY_TEXT_ERROR);
        assert!(report.errors["three.pdf"]
            .starts_with("An error occurred while processing the resume: "));
        assert!(report.errors["three.pdf"].contains("backend exploded"));

        // A filename never appears in both maps.
        assert!(report.results.keys().all(|k| !report.errors.contains_key(k)));
        assert_eq!(report.results.len() + report.errors.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_batch_reports_general_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), vec![]);

        let report = process_batch(&state, vec![]).await;

        assert!(report.results.is_empty());
        assert_eq!(report.errors["_general"], NO_FILES_ERROR);
    }

    #[tokio::test]
    async fn test_all_unnamed_parts_report_general_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), vec![]);

        let uploads = vec![(String::new(), Bytes::from_static(b"orphan bytes"))];
        let report = process_batch(&state, uploads).await;

        assert_eq!(report.errors["_general"], NO_FILES_ERROR);
    }

    #[tokio::test]
    async fn test_unnamed_part_is_skipped_next_to_named_one() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(
            dir.path(),
            vec![Ok("{\"full_name\": \"Jane Doe\"}".to_string())],
        );

        let uploads = vec![
            (String::new(), Bytes::from_static(b"orphan bytes")),
            ("one.pdf".to_string(), Bytes::from(build_pdf(&["Jane Doe"]))),
        ];
        let report = process_batch(&state, uploads).await;

        assert_eq!(report.results.len(), 1);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_filename_is_stored_inside_upload_dir() {
        let outer = tempfile::tempdir().unwrap();
        let upload_dir = outer.path().join("uploads");
        tokio::fs::create_dir_all(&upload_dir).await.unwrap();
        let state = test_state(
            &upload_dir,
            vec![Ok("{\"full_name\": \"Jane Doe\"}".to_string())],
        );

        let uploads = vec![(
            "../escape.pdf".to_string(),
            Bytes::from(build_pdf(&["Jane Doe, engineer"])),
        )];
        let report = process_batch(&state, uploads).await;

        // The report stays keyed by the submitted name; only storage is tamed.
        assert!(report.results.contains_key("../escape.pdf"));
        assert!(upload_dir.join("escape.pdf").exists());
        assert!(!outer.path().join("escape.pdf").exists());
    }

    #[tokio::test]
    async fn test_filename_without_final_component_fails_that_document_only() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(
            dir.path(),
            vec![Ok("{\"full_name\": \"Jane Doe\"}".to_string())],
        );

        let uploads = vec![
            ("..".to_string(), Bytes::from_static(b"whatever")),
            ("one.pdf".to_string(), Bytes::from(build_pdf(&["Jane Doe"]))),
        ];
        let report = process_batch(&state, uploads).await;

        assert!(report.errors[".."].starts_with("An error occurred while processing:"));
        assert_eq!(
            report.results["one.pdf"].full_name.as_deref(),
            Some("Jane Doe")
        );
    }

    #[test]
    fn test_classify_payload_success() {
        let payload = r#"{"full_name": "Jane Doe", "technical_skills": ["Rust"]}"#;
        match classify_payload(payload) {
            DocumentOutcome::Extracted(profile) => {
                assert_eq!(profile.full_name.as_deref(), Some("Jane Doe"));
                assert_eq!(profile.technical_skills, Some(vec!["Rust".to_string()]));
            }
            DocumentOutcome::Failed(message) => panic!("unexpected failure: {message}"),
        }
    }

    #[test]
    fn test_classify_payload_error_object_prefers_message() {
        let payload = r#"{"error": "Rate limit exceeded", "message": "quota is gone"}"#;
        match classify_payload(payload) {
            DocumentOutcome::Failed(message) => assert_eq!(message, "quota is gone"),
            DocumentOutcome::Extracted(_) => panic!("error payload classified as success"),
        }
    }

    #[test]
    fn test_classify_payload_error_object_falls_back_to_error_field() {
        let payload = r#"{"error": "Failed to parse resume data", "raw_response": "not json"}"#;
        match classify_payload(payload) {
            DocumentOutcome::Failed(message) => {
                assert_eq!(message, "Failed to parse resume data")
            }
            DocumentOutcome::Extracted(_) => panic!("error payload classified as success"),
        }
    }

    #[test]
    fn test_classify_payload_invalid_json() {
        match classify_payload("not json") {
            DocumentOutcome::Failed(message) => {
                assert!(message.starts_with("Failed to parse response: "))
            }
            DocumentOutcome::Extracted(_) => panic!("invalid payload classified as success"),
        }
    }

    #[test]
    fn test_classify_payload_shape_mismatch_reports_parse_failure() {
        // Valid JSON that cannot fit the profile contract.
        match classify_payload(r#"{"technical_skills": "Rust, not a list"}"#) {
            DocumentOutcome::Failed(message) => {
                assert!(message.starts_with("Failed to parse response: "))
            }
            DocumentOutcome::Extracted(_) => panic!("mismatched payload classified as success"),
        }
    }
}
