#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::domain::models::Passage;
use crate::domain::models::Retriever;
use crate::domain::services::MAX_PASSAGES;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RetrieveRequest {
    query: String,
    top_k: usize,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    passages: Vec<Passage>,
}

/// Knowledge base reachable over HTTP. Posts the question to `{url}/retrieve`
/// and expects ranked passages back.
pub struct HttpRetriever {
    url: String,
}

impl HttpRetriever {
    pub fn new(url: &str) -> HttpRetriever {
        return HttpRetriever {
            url: url.trim_end_matches('/').to_string(),
        };
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    #[allow(clippy::implicit_return)]
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>> {
        let req = RetrieveRequest {
            query: query.to_string(),
            top_k: MAX_PASSAGES,
        };

        let res = reqwest::Client::new()
            .post(format!("{url}/retrieve", url = self.url))
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to retrieve passages"
            );
            bail!(format!(
                "Failed to retrieve passages: status {}",
                res.status().as_u16()
            ));
        }

        let mut passages = res.json::<RetrieveResponse>().await?.passages;
        passages.sort_by(|a, b| return b.score.total_cmp(&a.score));
        passages.truncate(MAX_PASSAGES);

        return Ok(passages);
    }
}
