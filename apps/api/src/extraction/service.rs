//! ATS extraction service — prompt construction, response sanitization, and
//! the bounded fail-fast retry policy for rate-limited backend calls.
//!
//! `extract_structured` is total: every failure mode is converted into a
//! structured JSON error payload, so callers never see an `Err`.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::extraction::prompts::ATS_EXTRACTION_PROMPT;
use crate::llm_client::{BackendError, GenerativeBackend};

/// Default number of additional attempts beyond the first.
pub const DEFAULT_MAX_RETRIES: u32 = 1;
/// Default advisory initial delay (see `extract_structured` on why it is
/// advisory rather than an actual backoff seed).
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// A retry is only worth taking when the backend advertises a short wait.
/// Anything at or above this bound fails fast instead of blocking the caller.
const MAX_RETRYABLE_DELAY_SECS: f64 = 10.0;

const RATE_LIMIT_MESSAGE: &str = "API rate limit exceeded. You have reached the free tier quota limit (20 requests per minute). Please wait a few minutes before trying again, or upgrade your API plan.";
const RATE_LIMIT_SUGGESTION: &str = "Please wait a few minutes and try again, or check your API quota at https://ai.dev/usage?tab=rate-limit";

/// Matches the delay the backend embeds in quota errors, e.g. "Please retry in 3.5s".
static RETRY_DELAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)retry in ([\d.]+)s").expect("valid retry-delay regex"));

/// The extraction service. Wraps the generative backend behind its capability
/// trait so the retry and cleaning logic runs against a scripted backend in
/// tests.
#[derive(Clone)]
pub struct AtsExtractor {
    backend: Arc<dyn GenerativeBackend>,
}

impl AtsExtractor {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    /// Extracts structured applicant data from `resume_text`, returning a
    /// JSON string: either the backend's cleaned JSON object or a structured
    /// error object. Never fails.
    ///
    /// `max_retries` bounds additional attempts beyond the first, taken only
    /// when the backend advertises a wait shorter than 10 seconds; the actual
    /// sleep is that advertised delay plus a flat 1-second buffer.
    ///
    /// NOTE: `initial_delay` is accepted for signature compatibility but does
    /// not seed the wait — a latent inconsistency inherited from the original
    /// design, kept visible here rather than silently reinterpreted.
    pub async fn extract_structured(
        &self,
        resume_text: &str,
        max_retries: u32,
        initial_delay: Duration,
    ) -> String {
        let _ = initial_delay;

        let full_prompt = format!("{ATS_EXTRACTION_PROMPT}\n\nResume Content:\n{resume_text}");

        for attempt in 0..=max_retries {
            match self.backend.generate(&full_prompt).await {
                // Payload-shape problems are terminal: a malformed reply is
                // not a quota issue, so retrying cannot help.
                Ok(raw) => return sanitize_response(&raw),

                Err(BackendError::RateLimited(detail)) => {
                    match parse_retry_delay(&detail) {
                        Some(delay)
                            if delay < MAX_RETRYABLE_DELAY_SECS && attempt < max_retries =>
                        {
                            let wait = delay + 1.0;
                            warn!(
                                "Rate limit exceeded. Retrying in {wait:.2} seconds... (attempt {}/{})",
                                attempt + 1,
                                max_retries + 1
                            );
                            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                        }
                        _ => {
                            // No usable short delay, or retries exhausted:
                            // fail fast instead of parking the request.
                            warn!("Rate limit exceeded, failing fast: {detail}");
                            return json!({
                                "error": "Rate limit exceeded",
                                "message": RATE_LIMIT_MESSAGE,
                                "suggestion": RATE_LIMIT_SUGGESTION,
                            })
                            .to_string();
                        }
                    }
                }

                Err(e) => {
                    let message = format!("An error occurred while processing the resume: {e}");
                    error!("{message}");
                    return json!({
                        "error": "Processing error",
                        "message": message,
                    })
                    .to_string();
                }
            }
        }

        // Unreachable in normal operation: every loop arm either returns or
        // sleeps into another attempt.
        json!({
            "error": "Unknown error",
            "message": "Failed to process resume after multiple attempts",
        })
        .to_string()
    }
}

/// Cleans the backend's text payload and validates it as JSON.
///
/// On success the cleaned string itself is the canonical result; on parse
/// failure the original (trimmed) text is preserved for diagnosis.
fn sanitize_response(raw: &str) -> String {
    let trimmed = raw.trim();
    let cleaned = clean_json_response(trimmed);

    match serde_json::from_str::<serde_json::Value>(cleaned) {
        Ok(_) => cleaned.to_string(),
        Err(e) => {
            warn!("Error parsing JSON response: {e}");
            debug!("Raw response: {trimmed}");
            json!({
                "error": "Failed to parse resume data",
                "raw_response": trimmed,
            })
            .to_string()
        }
    }
}

/// Strips an anchored leading ```json fence and an anchored trailing ```
/// fence, then trims. The two fences are stripped independently; a bare
/// leading ``` (without the json tag) is left alone.
fn clean_json_response(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Pulls the advertised retry delay (seconds) out of a quota error body.
fn parse_retry_delay(error_text: &str) -> Option<f64> {
    RETRY_DELAY_RE
        .captures(error_text)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}
