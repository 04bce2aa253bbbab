use anyhow::Result;
use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;

/// A ranked text passage returned by a retriever.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub score: f64,
}

#[async_trait]
pub trait Retriever {
    /// Returns passages relevant to `query`, best first. An empty list means
    /// nothing relevant was found.
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>>;
}

pub type RetrieverBox = Box<dyn Retriever + Send + Sync>;
