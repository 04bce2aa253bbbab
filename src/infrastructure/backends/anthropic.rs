#[cfg(test)]
#[path = "anthropic_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::models::BackendMessage;
use crate::domain::models::BackendName;
use crate::domain::models::BackendPrompt;
use crate::domain::models::Event;
use crate::domain::models::Fragment;
use crate::domain::models::ModelPreset;
use crate::domain::models::MODEL_PRESETS;

const OFFICIAL_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

fn convert_err(err: reqwest::Error) -> std::io::Error {
    let err_msg = err.to_string();
    return std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg);
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Model {
    id: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ModelListResponse {
    data: Vec<Model>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompletionRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<BackendMessage>,
    temperature: f64,
    top_p: f64,
    top_k: u32,
    stream: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionDelta {
    #[serde(rename = "type")]
    _type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    thinking: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionResponse {
    #[serde(rename = "type")]
    _type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delta: Option<CompletionDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<StreamError>,
}

impl CompletionResponse {
    fn fragment(&self) -> Option<Fragment> {
        let delta = self.delta.as_ref()?;
        return match delta._type.as_str() {
            "thinking_delta" if !delta.thinking.is_empty() => {
                Some(Fragment::Reasoning(delta.thinking.to_string()))
            }
            "text_delta" if !delta.text.is_empty() => Some(Fragment::Text(delta.text.to_string())),
            _ => None,
        };
    }
}

pub struct Anthropic {
    url: String,
    token: String,
    timeout: String,
}

impl Default for Anthropic {
    fn default() -> Anthropic {
        return Anthropic {
            url: Config::get(ConfigKey::AnthropicURL),
            token: Config::get(ConfigKey::AnthropicToken),
            timeout: Config::get(ConfigKey::BackendHealthCheckTimeout),
        };
    }
}

#[async_trait]
impl Backend for Anthropic {
    fn name(&self) -> BackendName {
        return BackendName::Anthropic;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("Anthropic URL is not defined");
        }
        if self.token.is_empty() {
            bail!("Anthropic token is not defined");
        }

        // The official API has no unauthenticated index route to ping.
        if self.url == OFFICIAL_URL {
            return Ok(());
        }

        let res = reqwest::Client::new()
            .get(&self.url)
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await;

        let result = match res {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = ?err, "Anthropic is not reachable");
                bail!("Anthropic is not reachable");
            }
        };

        let status = result.status().as_u16();
        if status >= 400 {
            tracing::error!(status = status, "Anthropic health check failed");
            bail!("Anthropic health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_models(&self) -> Result<Vec<String>> {
        let res = reqwest::Client::new()
            .get(format!("{url}/v1/models", url = self.url))
            .header("x-api-key", &self.token)
            .header("anthropic-version", API_VERSION)
            .send()
            .await;

        let fallback = MODEL_PRESETS
            .iter()
            .map(|preset| return preset.model_id.to_string())
            .collect::<Vec<String>>();

        let Ok(res) = res else {
            return Ok(fallback);
        };
        if !res.status().is_success() {
            tracing::warn!(
                status = res.status().as_u16(),
                "Listing Anthropic models failed, using presets"
            );
            return Ok(fallback);
        }

        let mut models: Vec<String> = res
            .json::<ModelListResponse>()
            .await?
            .data
            .iter()
            .map(|model| {
                return model.id.to_string();
            })
            .collect();

        models.sort();

        return Ok(models);
    }

    #[allow(clippy::implicit_return)]
    async fn get_completion<'a>(
        &self,
        prompt: BackendPrompt,
        tx: &'a mpsc::UnboundedSender<Event>,
    ) -> Result<()> {
        let req = CompletionRequest {
            model: ModelPreset::resolve_model_id(&prompt.model),
            max_tokens: prompt.sampling.max_tokens,
            system: prompt.system_prompt.to_string(),
            messages: prompt.messages(),
            temperature: prompt.sampling.temperature,
            top_p: prompt.sampling.top_p,
            top_k: prompt.sampling.top_k,
            stream: true,
        };

        let res = reqwest::Client::new()
            .post(format!("{url}/v1/messages", url = self.url))
            .header("x-api-key", &self.token)
            .header("content-type", "application/json")
            .header("anthropic-version", API_VERSION)
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to make completion request to Anthropic"
            );
            bail!(format!(
                "Failed to make completion request to Anthropic: status {}",
                res.status().as_u16()
            ));
        }

        let stream = res.bytes_stream().map_err(convert_err);
        let mut lines_reader = StreamReader::new(stream).lines();

        while let Some(line) = lines_reader.next_line().await? {
            let mut cleaned_line = line.trim().to_string();
            if cleaned_line.starts_with("data:") {
                cleaned_line = cleaned_line.split_off(5).trim().to_string();
            }
            if cleaned_line.is_empty() || cleaned_line.starts_with("event:") {
                continue;
            }

            let ores = match serde_json::from_str::<CompletionResponse>(&cleaned_line) {
                Ok(ores) => ores,
                Err(err) => {
                    tracing::warn!(error = ?err, line = cleaned_line, "Skipping unparsable stream line");
                    continue;
                }
            };
            tracing::debug!(body = ?ores, "Completion response");

            if ores._type == "error" {
                let message = ores.error.map(|e| return e.message).unwrap_or_default();
                bail!(format!("Anthropic stream failed: {message}"));
            }
            if ores._type == "message_stop" {
                break;
            }

            if let Some(fragment) = ores.fragment() {
                tx.send(Event::BackendFragments(vec![fragment]))?;
            }
        }

        tx.send(Event::BackendDone())?;

        return Ok(());
    }
}
