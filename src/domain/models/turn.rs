#[cfg(test)]
#[path = "turn_test.rs"]
mod tests;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Opens a reasoning block inside displayed assistant content.
pub const THINKING_OPEN: &str = "```thinking\n";
/// Closes a reasoning block when answer text follows it.
pub const THINKING_CLOSE: &str = "\n```\n";
/// Closes a reasoning block that was still open when the response ended.
pub const THINKING_CLOSE_FINAL: &str = "\n```";

const THINKING_MARKER: &str = "```thinking";

static THINKING_BLOCK: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(r"(?s)```thinking.*?```").unwrap();
});

/// Removes every fenced reasoning block from `text`. An opening fence with no
/// closing fence swallows the rest of the text.
pub fn strip_reasoning(text: &str) -> String {
    let mut res = THINKING_BLOCK.replace_all(text, "").to_string();
    if let Some(idx) = res.find(THINKING_MARKER) {
        res.truncate(idx);
    }

    return res;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    #[default]
    User,
    Assistant,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Turn {
    pub role: TurnRole,
    /// What the user sees, reasoning blocks included.
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_content: Option<String>,
}

impl Turn {
    pub fn user(text: &str) -> Turn {
        return Turn {
            role: TurnRole::User,
            content: text.to_string(),
            model_content: Some(strip_reasoning(text)),
        };
    }

    pub fn assistant(display: &str, canonical: &str) -> Turn {
        return Turn {
            role: TurnRole::Assistant,
            content: display.to_string(),
            model_content: Some(strip_reasoning(canonical)),
        };
    }

    pub fn greeting(text: &str) -> Turn {
        return Turn::assistant(text, text);
    }

    /// The text this turn contributes when the conversation is replayed to a
    /// model, or `None` if nothing is left once reasoning is removed.
    pub fn replay_content(&self) -> Option<String> {
        match self.role {
            TurnRole::User => {
                return Some(self.content.to_string());
            }
            TurnRole::Assistant => {
                let cleaned = strip_reasoning(&self.content).trim().to_string();
                if cleaned.is_empty() {
                    return None;
                }

                return Some(cleaned);
            }
        }
    }
}
