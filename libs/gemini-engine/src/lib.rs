use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

/// Public Gemini endpoint, overridable for tests and proxies
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const JSON_MIME_TYPE: &str = "application/json";

// --- Shared Utilities ---

/// Extract the domain/host from a URL string safely.
/// Returns "unknown" if the URL cannot be parsed.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

// --- Shared Logging ---

/// Initialize structured logging with JSON format in production (when RUST_LOG is set),
/// or pretty format for local development.
pub fn init_logging() {
    let is_production = std::env::var("RUST_LOG").is_ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if is_production {
        let _ = fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}

// --- Errors ---

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    #[error("rate limited by Gemini API (HTTP 429)")]
    RateLimited,

    #[error("Gemini API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Gemini API error: {0}")]
    Upstream(String),

    #[error("no content returned from Gemini")]
    Empty,
}

// The request URL carries the API key, so it never travels with the error.
impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Transport(e.without_url())
    }
}

impl EngineError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, EngineError::RateLimited)
    }

    /// Network hiccups, throttling and 5xx responses; everything else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Transport(e) => e.is_timeout() || e.is_connect(),
            EngineError::RateLimited => true,
            EngineError::Api { status, .. } => *status >= 500,
            EngineError::Upstream(_) | EngineError::Empty => false,
        }
    }
}

// --- Gemini Structs ---
#[derive(Serialize, Deserialize, Debug)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug, Default)]
pub struct GoogleSearch {}

#[derive(Serialize, Debug)]
pub struct GeminiTool {
    pub google_search: GoogleSearch,
}

#[derive(Serialize, Debug)]
pub struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    pub response_mime_type: String,
}

#[derive(Serialize, Debug)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GeminiRequest {
    /// Build a single-turn request. The API refuses a JSON response hint when a
    /// search tool is attached, so the two are mutually exclusive.
    pub fn new(prompt: String, search: bool) -> Self {
        let (tools, generation_config) = if search {
            (Some(vec![GeminiTool { google_search: GoogleSearch::default() }]), None)
        } else {
            (None, Some(GenerationConfig { response_mime_type: JSON_MIME_TYPE.to_string() }))
        };

        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            tools,
            generation_config,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct GeminiCandidate {
    pub content: GeminiContent,
}

#[derive(Deserialize, Debug)]
pub struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
    pub error: Option<GeminiApiError>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate. Grounded replies are split across parts.
    pub fn first_text(&self) -> Option<String> {
        let first = self.candidates.as_ref()?.first()?;
        let text: String = first.content.parts.iter().map(|p| p.text.as_str()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct GeminiApiError {
    pub message: String,
}

// --- Client ---

/// Which model to call and whether to ground it with Google Search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions<'a> {
    pub model: &'a str,
    pub search: bool,
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// One `generateContent` call, no retries.
    #[instrument(skip(self, prompt), fields(model = options.model, search = options.search, prompt_len = prompt.len()))]
    pub async fn generate(&self, options: GenerateOptions<'_>, prompt: String) -> Result<String, EngineError> {
        // Note: API key in URL is required by Gemini API - never log `url`
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, options.model, self.api_key
        );

        let request = GeminiRequest::new(prompt, options.search);

        debug!("Sending request to Gemini API");

        let res = self.http.post(&url)
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        debug!(status = %status, "Gemini API response received");

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EngineError::RateLimited);
        }

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(EngineError::Api { status: status.as_u16(), body });
        }

        let resp: GeminiResponse = res.json().await?;

        if let Some(error) = resp.error {
            return Err(EngineError::Upstream(error.message));
        }

        resp.first_text().ok_or(EngineError::Empty)
    }
}
