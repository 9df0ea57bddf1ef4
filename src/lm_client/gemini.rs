//! Gemini `generateContent` backend over HTTPS.
use super::TextGenerator;
use crate::error::GenerationError;
use crate::util::truncate_string;
use serde::Deserialize;
use std::time::{Duration, Instant};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Bytes of an error body kept in error messages.
const ERROR_BODY_PREVIEW: usize = 500;

pub struct GeminiGenerator {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Self {
        // Status codes are classified by hand, so keep 4xx/5xx as responses.
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

impl TextGenerator for GeminiGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        let start = Instant::now();
        let mut response = self
            .agent
            .post(self.endpoint().as_str())
            .header("x-goog-api-key", self.api_key.as_str())
            .send_json(&body)
            .map_err(|err| GenerationError::Network(err.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|err| GenerationError::Network(format!("read response body: {err}")))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis(),
            status,
            prompt_bytes = prompt.len(),
            response_bytes = text.len(),
            model = %self.model,
            "gemini request complete"
        );

        if !(200..300).contains(&status) {
            return Err(classify_status(status, &text));
        }
        parse_generate_response(&text)
    }

    fn describe(&self) -> String {
        format!("gemini model {}", self.model)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Join the text parts of the first candidate.
fn parse_generate_response(text: &str) -> Result<String, GenerationError> {
    let response: GenerateContentResponse = serde_json::from_str(text).map_err(|err| {
        GenerationError::Backend(format!(
            "parse Gemini response: {err}: {}",
            truncate_string(text, ERROR_BODY_PREVIEW)
        ))
    })?;
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(GenerationError::Backend(format!(
            "Gemini returned no completion ({reason})"
        )));
    };
    let completion = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();
    if completion.trim().is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "empty text".to_string());
        return Err(GenerationError::Backend(format!(
            "Gemini returned an empty completion ({reason})"
        )));
    }
    Ok(completion)
}

/// Map a non-2xx response onto the error taxonomy.
fn classify_status(status: u16, body: &str) -> GenerationError {
    let api_error = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);
    let detail = match &api_error {
        Some(err) if !err.message.is_empty() => format!("HTTP {status}: {}", err.message),
        _ => format!("HTTP {status}: {}", truncate_string(body.trim(), ERROR_BODY_PREVIEW)),
    };
    let api_status = api_error
        .as_ref()
        .map(|err| err.status.as_str())
        .unwrap_or_default();
    match status {
        401 | 403 => GenerationError::Auth(detail),
        429 => GenerationError::Quota(detail),
        // Gemini reports malformed keys as a 400 with API_KEY_INVALID.
        400 if body.contains("API_KEY_INVALID") => GenerationError::Auth(detail),
        _ if api_status == "RESOURCE_EXHAUSTED" => GenerationError::Quota(detail),
        _ if api_status == "UNAUTHENTICATED" || api_status == "PERMISSION_DENIED" => {
            GenerationError::Auth(detail)
        }
        _ => GenerationError::Backend(detail),
    }
}
