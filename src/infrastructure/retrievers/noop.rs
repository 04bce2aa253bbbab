use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::Passage;
use crate::domain::models::Retriever;

#[derive(Default)]
pub struct Noop {}

#[async_trait]
impl Retriever for Noop {
    #[allow(clippy::implicit_return)]
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>> {
        tracing::debug!(query = query, "No retriever url set, skipping retrieval");
        return Ok(vec![]);
    }
}
