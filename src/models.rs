use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single accepted line of a transcript, normalized by the parser.
///
/// `cleaned_text` feeds the statistics engine's word counter and the sampler's
/// eligibility filters; `original_text` is kept around only for emoji extraction,
/// which must see punctuation and case exactly as typed.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub timestamp: DateTime<Utc>,
    pub source_date: String,
    pub sender: String,
    pub cleaned_text: String,
    pub original_text: String,
}

/// `{user, count}` pair used for both the first-text champion and the
/// longest-monologue champion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCount {
    pub user: String,
    pub count: u32,
}

/// One point in a per-sender monthly activity series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyPoint {
    pub x: String,
    pub y: u32,
}

/// A single sender's monthly activity series, dense over the observed month range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlySeries {
    pub id: String,
    pub data: Vec<MonthlyPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeekdayVsWeekend {
    pub average_weekday_messages: f64,
    pub average_weekend_messages: f64,
    pub difference: f64,
    pub percentage_difference: f64,
}

/// The interaction matrix as a header-prefixed 2-D list: row 0 / column 0 carry
/// sender names, cell `[i][j]` for `i,j >= 1` is the raw count of messages sent
/// by sender `i-1` immediately followed by a reply from sender `j-1`.
pub type InteractionMatrix = Vec<Vec<serde_json::Value>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatStatistics {
    pub total_messages: u32,
    pub days_active: u32,
    pub user_message_count: std::collections::BTreeMap<String, u32>,
    pub most_active_users_pct: std::collections::BTreeMap<String, f64>,
    pub conversation_starters_pct: std::collections::BTreeMap<String, f64>,
    pub most_ignored_users_pct: std::collections::BTreeMap<String, f64>,
    pub first_text_champion: Option<UserCount>,
    pub longest_monologue: Option<UserCount>,
    pub common_words: Vec<(String, u32)>,
    pub common_emojis: Vec<(String, u32)>,
    pub average_response_time_minutes: f64,
    pub peak_hour: Option<u8>,
    pub user_monthly_activity: Vec<MonthlySeries>,
    pub weekday_vs_weekend_avg: WeekdayVsWeekend,
    pub user_interaction_matrix: Option<InteractionMatrix>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub chat_name: String,
    pub total_messages: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ChatStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn empty(chat_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            chat_name: chat_name.into(),
            total_messages: 0,
            stats: None,
            ai_analysis: None,
            error: Some(error.into()),
        }
    }

    /// Append a non-fatal subsystem error, joining with the existing text.
    pub fn push_error(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            return;
        }
        match &mut self.error {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(text);
            }
            None => self.error = Some(text.to_string()),
        }
    }
}
