#[cfg(test)]
#[path = "context_test.rs"]
mod tests;

use crate::domain::models::strip_reasoning;
use crate::domain::models::BackendMessage;
use crate::domain::models::BackendPrompt;
use crate::domain::models::ModelPreset;
use crate::domain::models::Passage;
use crate::domain::models::RetrieverBox;
use crate::domain::models::RoleProfile;
use crate::domain::models::SamplingParams;
use crate::domain::models::Session;
use crate::domain::models::Turn;
use crate::domain::models::TurnRole;

pub const MAX_PASSAGES: usize = 3;

/// Rebuilds the history a backend sees from stored turns. The greeting at
/// index 0 is never replayed, and a trailing user turn is left out since it is
/// sent separately as the query.
pub fn replay_history(turns: &[Turn]) -> Vec<BackendMessage> {
    let mut end = turns.len();
    if turns.len() > 1 && turns[end - 1].role == TurnRole::User {
        end -= 1;
    }

    return turns[..end]
        .iter()
        .skip(1)
        .filter_map(|turn| {
            let content = turn.replay_content()?;
            return Some(BackendMessage::new(turn.role, &content));
        })
        .collect();
}

/// Wraps a question with retrieved passages. Returns `None` when no passage
/// has any text.
pub fn augment_with_passages(input: &str, passages: &[Passage]) -> Option<String> {
    let context = passages
        .iter()
        .map(|passage| return passage.text.trim())
        .filter(|text| return !text.is_empty())
        .take(MAX_PASSAGES)
        .collect::<Vec<&str>>();

    if context.is_empty() {
        return None;
    }

    return Some(format!(
        "Use the following context to answer the question. If the context does not contain enough information to answer it, say so and ask the user to clarify.\n\nContext:\n{}\n\nQuestion: {input}",
        context.join("\n\n")
    ));
}

pub struct ContextBuilder {
    retriever: Option<RetrieverBox>,
    min_score: f64,
}

impl ContextBuilder {
    pub fn new(retriever: Option<RetrieverBox>, min_score: f64) -> ContextBuilder {
        return ContextBuilder {
            retriever,
            min_score,
        };
    }

    async fn query_for(&self, input: &str, profile: &RoleProfile) -> String {
        if !profile.retrieval {
            return input.to_string();
        }

        let Some(retriever) = &self.retriever else {
            tracing::debug!(role = %profile.name, "No retriever configured, skipping augmentation");
            return input.to_string();
        };

        let passages = match retriever.retrieve(input).await {
            Ok(passages) => passages,
            Err(err) => {
                tracing::warn!(error = ?err, "Retrieval failed, continuing without context");
                return input.to_string();
            }
        };

        let relevant = passages
            .into_iter()
            .filter(|passage| return passage.score >= self.min_score)
            .collect::<Vec<Passage>>();

        tracing::debug!(passages = relevant.len(), "Retrieved passages");
        return augment_with_passages(input, &relevant).unwrap_or_else(|| return input.to_string());
    }

    /// Builds the request for the newest user turn in `session`. `input` is
    /// the raw text the user just submitted.
    pub async fn build(
        &self,
        session: &Session,
        input: &str,
        profile: &RoleProfile,
    ) -> BackendPrompt {
        let history = replay_history(&session.messages);
        let cleaned = strip_reasoning(input);
        let query = self.query_for(&cleaned, profile).await;

        return BackendPrompt {
            model: ModelPreset::resolve_model_id(&session.model_config.model_name),
            system_prompt: profile.system_prompt.to_string(),
            history,
            query: BackendMessage::new(TurnRole::User, &query),
            sampling: SamplingParams::from(&session.model_config),
        };
    }
}
