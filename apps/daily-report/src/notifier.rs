use chrono::NaiveDate;
use gemini_engine::extract_domain;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::report::{field_or_placeholder, ReportRecord};

const CARD_TITLE: &str = "📅 豆包的投资笔记 · 深度早报";
const CARD_TEMPLATE: &str = "blue";
const FOOTER_NOTE: &str = "数据源：豆瓜、雪球、GitHub、海内外主流媒体";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// No webhook configured, nothing sent.
    Skipped,
    Delivered { status: u16 },
}

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Transport(reqwest::Error),

    #[error("webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

// The hook URL embeds the bot token; keep it out of error text.
impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Transport(e.without_url())
    }
}

fn section(heading: &str, field: &Option<String>) -> Value {
    json!({
        "tag": "div",
        "text": {
            "tag": "lark_md",
            "content": format!("**{}**\n{}", heading, field_or_placeholder(field))
        }
    })
}

/// Feishu interactive card for one report.
pub fn build_card(record: &ReportRecord, date: NaiveDate) -> Value {
    let divider = json!({"tag": "hr"});

    json!({
        "msg_type": "interactive",
        "card": {
            "header": {
                "title": {
                    "tag": "plain_text",
                    "content": format!("{} · {}", CARD_TITLE, date.format("%Y-%m-%d"))
                },
                "template": CARD_TEMPLATE
            },
            "elements": [
                section("📌 今日摘要", &record.summary),
                divider.clone(),
                section("🤖 AI 圈动态", &record.ai),
                divider.clone(),
                section("💰 金融全市场分析", &record.finance),
                divider,
                section("💡 B 端业务启示", &record.b_side),
                {
                    "tag": "note",
                    "elements": [{"tag": "plain_text", "content": FOOTER_NOTE}]
                }
            ]
        }
    })
}

pub struct Notifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(http: reqwest::Client, webhook_url: Option<String>) -> Self {
        Self { http, webhook_url }
    }

    /// Post the card once. No retries.
    #[instrument(skip(self, record))]
    pub async fn send(&self, record: &ReportRecord, date: NaiveDate) -> Result<Delivery, NotifyError> {
        let Some(url) = &self.webhook_url else {
            error!("FEISHU_WEBHOOK_URL not set, skipping notification");
            return Ok(Delivery::Skipped);
        };

        let payload = build_card(record, date);
        info!(host = %extract_domain(url), "Posting report card");

        let res = self.http.post(url).json(&payload).send().await?;
        let status = res.status();
        let body = res.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(NotifyError::Status { status: status.as_u16(), body });
        }

        // Feishu answers 200 with a non-zero `code` for things like bad signatures
        if let Ok(reply) = serde_json::from_str::<Value>(&body) {
            if let Some(code) = reply.get("code").and_then(Value::as_i64).filter(|c| *c != 0) {
                warn!(code, msg = reply["msg"].as_str().unwrap_or_default(), "Feishu rejected the card");
            }
        }

        info!(status = status.as_u16(), "Report card delivered");
        Ok(Delivery::Delivered { status: status.as_u16() })
    }
}
