#[cfg(test)]
#[path = "role_test.rs"]
mod tests;

use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

const DEFAULT_PROMPT: &str = "You are a helpful, thoughtful, and knowledgeable assistant. Your job is to carefully analyze the user's questions, understand their underlying needs, and provide clear, accurate, and useful answers. You always ask clarifying questions if something is ambiguous, and you aim to make complex topics easy to understand. Your responses should be practical, well-structured, and tailored to the user's context whenever possible.\n\nStay professional but friendly, and ensure that your explanations are grounded in facts and logic. If a task requires multiple steps, break it down clearly. When appropriate, offer examples, comparisons, or step-by-step instructions to enhance clarity and usefulness.";

const TRANSLATOR_PROMPT: &str = "You are a professional translator. Please identify the source language and translate to the target language while preserving meaning, tone, and nuance. Ensure proper grammar and formatting.";

const WRITING_ASSISTANT_PROMPT: &str = "You are an AI writing assistant. Your task is to improve written content by:\n1. Fixing grammar, punctuation, spelling, and style issues\n2. Providing specific improvement suggestions\n3. Offering better word choices and phrasing\n4. Ensuring consistent tone and voice\n5. Improving flow and organization\n6. Providing overall feedback\n7. Outputting a fully edited version\n\nKeep feedback constructive and insightful.";

const ADTECH_STRATEGIST_PROMPT: &str = "You are a senior advertising technology strategist. You advise on programmatic buying, supply path optimization, identity, measurement and privacy regulation. Ground recommendations in how the ad tech ecosystem actually works and call out trade-offs explicitly.";

const PERFORMANCE_ANALYST_PROMPT: &str = "You are a marketing performance analyst. You interpret campaign metrics, design experiments, diagnose changes in KPIs and explain findings with clear numbers. State your assumptions and suggest the next analysis when data is incomplete.";

const AD_OPERATIONS_PROMPT: &str = "You are an ad operations expert. You help with trafficking, ad server setup, creative QA, pacing and delivery troubleshooting. Give concrete, step-by-step operational guidance.";

const TENSORFLOW_PROMPT: &str = "You are a TensorFlow and machine learning engineering expert. You help design, debug and optimize models and input pipelines. Provide runnable code in markdown code blocks with the language attached.";

const SNOWFLAKE_PROMPT: &str = "You are a Snowflake SQL expert. You write correct, efficient Snowflake SQL, explain query plans, and suggest warehouse and clustering improvements. Always return SQL in markdown code blocks with the language attached.";

const KNOWLEDGE_BASE_PROMPT: &str = "You are a knowledge base assistant. Answer using the context supplied with each question. When the context does not cover the question, say so plainly instead of guessing.";

/// Prompt roles a conversation can be started in. Display names double as the
/// names stored in a session's model configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
pub enum RoleName {
    #[default]
    Default,
    #[strum(serialize = "AdTech Strategist")]
    AdTechStrategist,
    #[strum(serialize = "Performance Analyst")]
    PerformanceAnalyst,
    #[strum(serialize = "Ad Operations Expert")]
    AdOperationsExpert,
    #[strum(serialize = "TensorFlow Expert")]
    TensorFlowExpert,
    #[strum(serialize = "Snowflake SQL Expert")]
    SnowflakeSqlExpert,
    Translator,
    #[strum(serialize = "Writing Assistant")]
    WritingAssistant,
    #[strum(serialize = "Knowledge Base")]
    KnowledgeBase,
    Custom,
}

fn normalize(name: &str) -> String {
    return name
        .chars()
        .filter(|c| return c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
}

impl RoleName {
    /// Resolves a role by display name, ignoring case, spaces and dashes.
    /// Unknown names fall back to `RoleName::Default`.
    pub fn parse(name: &str) -> RoleName {
        let wanted = normalize(name);
        return RoleName::iter()
            .find(|role| return normalize(&role.to_string()) == wanted)
            .unwrap_or_default();
    }

    pub fn profile(&self) -> RoleProfile {
        let (system_prompt, retrieval) = match self {
            RoleName::Default => (DEFAULT_PROMPT, false),
            RoleName::AdTechStrategist => (ADTECH_STRATEGIST_PROMPT, false),
            RoleName::PerformanceAnalyst => (PERFORMANCE_ANALYST_PROMPT, false),
            RoleName::AdOperationsExpert => (AD_OPERATIONS_PROMPT, false),
            RoleName::TensorFlowExpert => (TENSORFLOW_PROMPT, false),
            RoleName::SnowflakeSqlExpert => (SNOWFLAKE_PROMPT, false),
            RoleName::Translator => (TRANSLATOR_PROMPT, false),
            RoleName::WritingAssistant => (WRITING_ASSISTANT_PROMPT, false),
            RoleName::KnowledgeBase => (KNOWLEDGE_BASE_PROMPT, true),
            RoleName::Custom => ("", false),
        };

        let greeting = match self {
            RoleName::Default => {
                "Hello! I'm your AI assistant. How can I help you today?".to_string()
            }
            role => format!("Hello! I'm your {role} AI assistant. How can I help you today?"),
        };

        return RoleProfile {
            name: *self,
            system_prompt: system_prompt.to_string(),
            greeting,
            retrieval,
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleProfile {
    pub name: RoleName,
    pub system_prompt: String,
    pub greeting: String,
    /// Whether questions asked in this role are augmented with passages from
    /// the retriever.
    pub retrieval: bool,
}

impl RoleProfile {
    /// Replaces the built-in system prompt when `prompt` is non-empty.
    pub fn with_system_prompt(mut self, prompt: &str) -> RoleProfile {
        if !prompt.trim().is_empty() {
            self.system_prompt = prompt.to_string();
        }

        return self;
    }
}
