#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::sync::mpsc;

use super::Event;
use super::ModelConfig;
use super::TurnRole;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BackendName {
    Anthropic,
    #[strum(serialize = "openai")]
    OpenAI,
}

impl BackendName {
    pub fn parse(text: &str) -> Result<BackendName> {
        if let Some(name) = BackendName::iter().find(|e| return e.to_string() == text) {
            return Ok(name);
        }

        bail!(format!("No backend named {text}"));
    }
}

/// One incremental piece of a streamed model response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    Reasoning(String),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_tokens: u32,
}

impl From<&ModelConfig> for SamplingParams {
    fn from(config: &ModelConfig) -> SamplingParams {
        return SamplingParams {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_tokens: config.max_tokens,
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendMessage {
    pub role: TurnRole,
    pub content: String,
}

impl BackendMessage {
    pub fn new(role: TurnRole, content: &str) -> BackendMessage {
        return BackendMessage {
            role,
            content: content.to_string(),
        };
    }
}

/// Everything a backend needs for one completion: the role's system prompt,
/// the replayed history, and the new question.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendPrompt {
    pub model: String,
    pub system_prompt: String,
    pub history: Vec<BackendMessage>,
    pub query: BackendMessage,
    pub sampling: SamplingParams,
}

impl BackendPrompt {
    /// History followed by the query, in request order.
    pub fn messages(&self) -> Vec<BackendMessage> {
        let mut messages = self.history.to_vec();
        messages.push(self.query.clone());
        return messages;
    }
}

#[async_trait]
pub trait Backend {
    fn name(&self) -> BackendName;

    /// Used at startup to verify all configurations are available to work with
    /// the backend.
    async fn health_check(&self) -> Result<()>;

    /// Provides all available models for the backend.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Requests a completion from the backend. Fragments are streamed back to
    /// the chat loop through the channel as `Event::BackendFragments`, in the
    /// order the backend produced them.
    ///
    /// Upon receiving all results, `Event::BackendDone` is sent as the last
    /// message to the channel.
    async fn get_completion<'a>(
        &self,
        prompt: BackendPrompt,
        tx: &'a mpsc::UnboundedSender<Event>,
    ) -> Result<()>;
}

pub type BackendBox = Box<dyn Backend + Send + Sync>;
