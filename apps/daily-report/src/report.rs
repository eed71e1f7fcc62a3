use serde::{Deserialize, Serialize};

/// Shown in a card section when the record has nothing for it
pub const SECTION_PLACEHOLDER: &str = "暂无内容";

pub const MISSING_KEY_SUMMARY: &str = "⚠️ 未配置 GEMINI_API_KEY，今日早报未生成";
pub const MISSING_KEY_AI: &str = "AI 动态暂不可用：缺少 API Key";
pub const MISSING_KEY_FINANCE: &str = "金融分析暂不可用：缺少 API Key";
pub const MISSING_KEY_B_SIDE: &str = "B 端启示暂不可用：缺少 API Key";

const FALLBACK_SUMMARY: &str = "今日所有模型均不可用，以下为备用内容。";
const FALLBACK_AI: &str = "1. 本地化 Agent 与小参数模型持续升温，关注开源社区新项目。\n2. 大模型推理能力与成本仍是行业讨论焦点。";
const FALLBACK_FINANCE: &str = "1. 市场数据暂未获取，请以交易所与主流财经媒体公告为准。\n2. 关注宏观政策与美联储利率动向。";
const FALLBACK_B_SIDE: &str = "关注本地化小参数模型在券商私域的应用，降低合规压力。";

/// The daily summary. Fields the model leaves out stay `None`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b_side: Option<String>,
}

impl ReportRecord {
    pub fn new(summary: &str, ai: &str, finance: &str, b_side: &str) -> Self {
        Self {
            summary: Some(summary.to_string()),
            ai: Some(ai.to_string()),
            finance: Some(finance.to_string()),
            b_side: Some(b_side.to_string()),
        }
    }

    pub fn missing_api_key() -> Self {
        Self::new(MISSING_KEY_SUMMARY, MISSING_KEY_AI, MISSING_KEY_FINANCE, MISSING_KEY_B_SIDE)
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_SUMMARY, FALLBACK_AI, FALLBACK_FINANCE, FALLBACK_B_SIDE)
    }

    pub fn is_empty(&self) -> bool {
        [&self.summary, &self.ai, &self.finance, &self.b_side]
            .iter()
            .all(|f| f.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

/// Field text, or the placeholder when it is missing or blank.
pub fn field_or_placeholder(field: &Option<String>) -> &str {
    match field.as_deref() {
        Some(s) if !s.trim().is_empty() => s,
        _ => SECTION_PLACEHOLDER,
    }
}
