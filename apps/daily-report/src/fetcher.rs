use std::time::Duration;

use chrono::NaiveDate;
use gemini_engine::{EngineError, GeminiClient, GenerateOptions};
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::report::ReportRecord;

/// Longest error text written to the log for a failed attempt
const MAX_LOGGED_ERROR_CHARS: usize = 200;

/// One fallback candidate: a model, with or without Google Search grounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    pub model: &'static str,
    pub search: bool,
}

impl Strategy {
    pub const fn new(model: &'static str, search: bool) -> Self {
        Self { model, search }
    }

    fn options(&self) -> GenerateOptions<'static> {
        GenerateOptions { model: self.model, search: self.search }
    }
}

/// Tried in order until one yields a usable record.
pub const STRATEGIES: &[Strategy] = &[
    Strategy::new("gemini-2.5-flash", true),
    Strategy::new("gemini-2.0-flash", true),
    Strategy::new("gemini-2.0-flash", false),
    Strategy::new("gemini-2.0-flash-lite", false),
];

#[derive(thiserror::Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("response is not valid report JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("response JSON has none of the report fields")]
    EmptyRecord,
}

impl AttemptError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AttemptError::Engine(e) if e.is_rate_limited())
    }

    /// Whether the same strategy could succeed on another try. A bad reply is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, AttemptError::Engine(e) if e.is_transient())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// No API key configured; nothing was sent upstream.
    MissingApiKey(ReportRecord),
    Generated { record: ReportRecord, strategy: Strategy },
    /// Every strategy failed.
    Fallback(ReportRecord),
}

impl FetchOutcome {
    pub fn record(&self) -> &ReportRecord {
        match self {
            FetchOutcome::MissingApiKey(record)
            | FetchOutcome::Generated { record, .. }
            | FetchOutcome::Fallback(record) => record,
        }
    }

    pub fn into_record(self) -> ReportRecord {
        match self {
            FetchOutcome::MissingApiKey(record)
            | FetchOutcome::Generated { record, .. }
            | FetchOutcome::Fallback(record) => record,
        }
    }
}

pub struct ContentFetcher {
    engine: Option<GeminiClient>,
    strategies: &'static [Strategy],
    rate_limit_delay: Duration,
}

impl ContentFetcher {
    pub fn new(engine: Option<GeminiClient>, rate_limit_delay: Duration) -> Self {
        Self {
            engine,
            strategies: STRATEGIES,
            rate_limit_delay,
        }
    }

    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        let engine = config
            .gemini_api_key
            .as_ref()
            .map(|key| GeminiClient::new(http, key.clone(), config.gemini_base_url.clone()));
        Self::new(engine, config.rate_limit_delay)
    }

    pub fn with_strategies(mut self, strategies: &'static [Strategy]) -> Self {
        self.strategies = strategies;
        self
    }

    /// Produce today's record. Never fails: degraded outcomes carry placeholder or fallback text.
    #[instrument(skip(self), fields(strategies = self.strategies.len()))]
    pub async fn fetch(&self, today: NaiveDate) -> FetchOutcome {
        let Some(engine) = &self.engine else {
            error!("GEMINI_API_KEY not set, skipping generation");
            return FetchOutcome::MissingApiKey(ReportRecord::missing_api_key());
        };

        let yesterday = today.pred_opt().unwrap_or(today);
        let prompt = build_prompt(yesterday);

        for strategy in self.strategies {
            info!(model = strategy.model, search = strategy.search, "Requesting report");
            match attempt(engine, *strategy, prompt.clone()).await {
                Ok(record) => {
                    info!(model = strategy.model, search = strategy.search, "Report generated");
                    return FetchOutcome::Generated { record, strategy: *strategy };
                }
                Err(e) => {
                    let message: String = e.to_string().chars().take(MAX_LOGGED_ERROR_CHARS).collect();
                    warn!(
                        model = strategy.model,
                        search = strategy.search,
                        retryable = e.is_transient(),
                        error = %message,
                        "Strategy failed"
                    );
                    if e.is_rate_limited() && !self.rate_limit_delay.is_zero() {
                        info!(delay_secs = self.rate_limit_delay.as_secs(), "Rate limited, pausing before next strategy");
                        tokio::time::sleep(self.rate_limit_delay).await;
                    }
                }
            }
        }

        error!("All strategies failed, using fallback report");
        FetchOutcome::Fallback(ReportRecord::fallback())
    }
}

async fn attempt(engine: &GeminiClient, strategy: Strategy, prompt: String) -> Result<ReportRecord, AttemptError> {
    let text = engine.generate(strategy.options(), prompt).await?;
    parse_record(&text)
}

pub fn build_prompt(date: NaiveDate) -> String {
    format!(
        "你是一名资深的 AI 与金融行业分析师。请检索并总结 {date} 的重要资讯，为投资者写一份深度早报。\n\
         要求：\n\
         1. summary：一句话概括当天最重要的信号。\n\
         2. ai：AI 圈动态，3 条左右，每条一行，以序号开头。\n\
         3. finance：金融全市场分析（A 股、美股、黄金、加密货币等），3 条左右，关键结论加粗。\n\
         4. b_side：对 B 端业务（券商、金融科技）的启示，1-2 句。\n\
         只返回一个严格的 JSON 对象，不要任何解释或 Markdown，格式为：\n\
         {{\"summary\": \"...\", \"ai\": \"...\", \"finance\": \"...\", \"b_side\": \"...\"}}",
        date = date.format("%Y-%m-%d")
    )
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // drop the info string ("json") up to the end of the opening line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// The outermost `{...}` of a reply, dropping chatter such as a trailing source list.
pub fn json_object_slice(text: &str) -> &str {
    let text = strip_code_fences(text);
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

pub fn parse_record(text: &str) -> Result<ReportRecord, AttemptError> {
    let record: ReportRecord = serde_json::from_str(json_object_slice(text))?;
    if record.is_empty() {
        return Err(AttemptError::EmptyRecord);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"summary": "s", "ai": "a", "finance": "f", "b_side": "b"}"#;

    #[test]
    fn test_strip_plain_text_untouched() {
        assert_eq!(strip_code_fences(BODY), BODY);
        assert_eq!(strip_code_fences(&format!("\n  {}  \n", BODY)), BODY);
    }

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_code_fences(&format!("```json\n{}\n```", BODY)), BODY);
        assert_eq!(strip_code_fences(&format!("```\n{}\n```\n", BODY)), BODY);
    }

    #[test]
    fn test_strip_single_line_fence() {
        assert_eq!(strip_code_fences(&format!("```json{}```", BODY)), BODY);
    }

    #[test]
    fn test_strip_unterminated_fence() {
        assert_eq!(strip_code_fences(&format!("```json\n{}", BODY)), BODY);
    }

    #[test]
    fn test_parse_record_fenced_equals_plain() {
        let plain = parse_record(BODY).unwrap();
        let fenced = parse_record(&format!("```json\n{}\n```", BODY)).unwrap();
        assert_eq!(plain, fenced);
        assert_eq!(plain, ReportRecord::new("s", "a", "f", "b"));
    }

    #[test]
    fn test_parse_record_ignores_text_around_object() {
        let grounded = format!("```json\n{}\n```\nSources: https://example.com/a", BODY);
        assert_eq!(parse_record(&grounded).unwrap(), ReportRecord::new("s", "a", "f", "b"));

        let chatty = format!("好的，以下是今日早报：\n{}\n希望对你有帮助。", BODY);
        assert_eq!(parse_record(&chatty).unwrap(), ReportRecord::new("s", "a", "f", "b"));
    }

    #[test]
    fn test_json_object_slice_without_braces() {
        assert_eq!(json_object_slice("```\nno json\n```"), "no json");
    }

    #[test]
    fn test_parse_record_rejects_garbage() {
        assert!(matches!(parse_record("今天没有新闻"), Err(AttemptError::Parse(_))));
        assert!(matches!(parse_record("{}"), Err(AttemptError::EmptyRecord)));
    }

    #[test]
    fn test_prompt_mentions_date_and_fields() {
        let prompt = build_prompt(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert!(prompt.contains("2026-10-18"));
        for field in ["summary", "ai", "finance", "b_side"] {
            assert!(prompt.contains(field));
        }
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(AttemptError::Engine(EngineError::RateLimited).is_rate_limited());
        assert!(!AttemptError::EmptyRecord.is_rate_limited());
        assert!(AttemptError::Engine(EngineError::Api { status: 503, body: String::new() }).is_transient());
        assert!(!AttemptError::EmptyRecord.is_transient());
    }

    #[test]
    fn test_outcome_record_accessors() {
        let outcome = FetchOutcome::Fallback(ReportRecord::fallback());
        assert_eq!(outcome.record(), &ReportRecord::fallback());
        assert_eq!(outcome.into_record(), ReportRecord::fallback());
    }

    #[tokio::test]
    async fn test_missing_key_short_circuits() {
        let fetcher = ContentFetcher::new(None, Duration::ZERO);
        let outcome = fetcher.fetch(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()).await;
        assert_eq!(outcome, FetchOutcome::MissingApiKey(ReportRecord::missing_api_key()));
    }
}
