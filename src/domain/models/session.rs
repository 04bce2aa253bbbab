#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::RoleName;
use super::Turn;
use super::TurnRole;

pub const PLACEHOLDER_TITLE: &str = "New Chat Session";
pub const UNKNOWN_MODEL: &str = "Unknown";
const TITLE_MAX_CHARS: usize = 50;

/// Sampling parameters and role that were active when a session was saved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_name: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_tokens: u32,
    pub role: String,
}

impl Default for ModelConfig {
    fn default() -> ModelConfig {
        return ModelConfig {
            model_name: "".to_string(),
            temperature: 1.0,
            top_p: 1.0,
            top_k: 500,
            max_tokens: 4096,
            role: RoleName::Default.to_string(),
        };
    }
}

impl ModelConfig {
    pub fn role_name(&self) -> RoleName {
        return RoleName::parse(&self.role);
    }

    pub fn model_name_or_unknown(&self) -> String {
        if self.model_name.trim().is_empty() {
            return UNKNOWN_MODEL.to_string();
        }

        return self.model_name.to_string();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// Assigned on first save.
    pub session_id: Option<String>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub model_config: ModelConfig,
    pub messages: Vec<Turn>,
}

impl Session {
    /// Starts a conversation holding only the role's greeting.
    pub fn new(greeting: &str, model_config: ModelConfig) -> Session {
        let now = Utc::now();
        return Session {
            session_id: None,
            title: "".to_string(),
            created_at: now,
            updated_at: now,
            message_count: 1,
            model_config,
            messages: vec![Turn::greeting(greeting)],
        };
    }

    /// True once anything beyond the greeting has been said.
    pub fn has_conversation(&self) -> bool {
        return self.messages.len() > 1;
    }

    /// Title derived from the first user turn, truncated to 50 characters.
    pub fn derive_title(&self) -> String {
        let first_user = self
            .messages
            .iter()
            .find(|turn| return turn.role == TurnRole::User);

        let Some(turn) = first_user else {
            return PLACEHOLDER_TITLE.to_string();
        };

        if turn.content.chars().count() > TITLE_MAX_CHARS {
            let truncated = turn.content.chars().take(TITLE_MAX_CHARS).collect::<String>();
            return format!("{truncated}...");
        }

        return turn.content.to_string();
    }

    /// Prepares the record for writing: refreshes `updated_at` and
    /// `message_count`, and derives a title if none was chosen.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.message_count = self.messages.len();
        if self.title.trim().is_empty() || self.title == PLACEHOLDER_TITLE {
            self.title = self.derive_title();
        }
    }

    pub fn summary(&self) -> SessionSummary {
        return SessionSummary {
            session_id: self.session_id.clone().unwrap_or_default(),
            title: self.title.to_string(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.message_count,
            model_config: self.model_config.clone(),
        };
    }

    pub fn to_markdown(&self) -> String {
        let title = if self.title.is_empty() {
            "Chat Session".to_string()
        } else {
            self.title.to_string()
        };

        let mut res = format!("# {title}\n\n");
        res += &format!(
            "**Created:** {}\n",
            self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        res += &format!(
            "**Model:** {}\n\n",
            self.model_config.model_name_or_unknown()
        );
        res += "---\n\n";

        for turn in self.messages.iter() {
            res += &format!("## {}\n\n{}\n\n", turn.role, turn.content);
        }

        return res;
    }
}

/// A session without its turns, used for listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub model_config: ModelConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub total_messages: usize,
    pub model_usage: BTreeMap<String, usize>,
    pub recent: Vec<SessionSummary>,
}

impl SessionStats {
    pub fn from_summaries(summaries: &[SessionSummary]) -> SessionStats {
        let mut model_usage: BTreeMap<String, usize> = BTreeMap::new();
        for summary in summaries {
            *model_usage
                .entry(summary.model_config.model_name_or_unknown())
                .or_insert(0) += 1;
        }

        return SessionStats {
            total_sessions: summaries.len(),
            total_messages: summaries.iter().map(|e| return e.message_count).sum(),
            model_usage,
            recent: summaries.iter().take(5).cloned().collect(),
        };
    }
}
