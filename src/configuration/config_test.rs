use std::collections::HashMap;

use anyhow::Result;

use super::build_model_config;
use super::Config;
use super::ConfigKey;
use crate::application::cli;
use crate::domain::models::RoleName;

fn lookup(values: Vec<(ConfigKey, &str)>) -> impl Fn(ConfigKey) -> String {
    let map = values
        .into_iter()
        .map(|(key, val)| return (key.to_string(), val.to_string()))
        .collect::<HashMap<String, String>>();

    return move |key: ConfigKey| {
        return map.get(&key.to_string()).cloned().unwrap_or_default();
    };
}

#[test]
fn it_serializes_to_valid_toml() {
    let res = Config::serialize_default(cli::build());
    let toml_res = res.parse::<toml_edit::Document>();
    assert!(toml_res.is_ok());

    assert!(res.contains("backend = \"anthropic\""));
    assert!(res.contains("backend-health-check-timeout = 1000"));
    assert!(res.contains("retriever-min-score = 0"));
    assert!(res.contains("# anthropic-token = \"\""));
    assert!(!res.contains("session-id"));
    assert!(!res.contains("config-file ="));
}

#[test]
fn it_builds_model_config_from_preset_defaults() {
    let config = build_model_config(lookup(vec![]));
    assert_eq!(config.model_name, "Claude 4 Sonnet");
    assert_eq!(config.max_tokens, 32000);
    assert_eq!(config.role, RoleName::Default.to_string());
}

#[test]
fn it_builds_model_config_with_overrides() {
    let config = build_model_config(lookup(vec![
        (ConfigKey::Model, "Claude 3.5 Sonnet"),
        (ConfigKey::Temperature, "0.2"),
        (ConfigKey::TopK, "not-a-number"),
        (ConfigKey::Role, "knowledge base"),
    ]));

    assert_eq!(config.model_name, "Claude 3.5 Sonnet");
    assert_eq!(config.temperature, 0.2);
    assert_eq!(config.top_k, 500);
    assert_eq!(config.max_tokens, 4096);
    assert_eq!(config.role, "Knowledge Base");
}

#[test]
fn it_keeps_unknown_model_names() {
    let config = build_model_config(lookup(vec![(ConfigKey::Model, "gpt-4o")]));
    assert_eq!(config.model_name, "gpt-4o");
    assert_eq!(config.max_tokens, 32000);
}

#[tokio::test]
async fn it_loads_config_from_file() -> Result<()> {
    let matches =
        cli::build().try_get_matches_from(vec!["palaver", "-c", "./test/fixtures/config.toml"])?;
    Config::load(cli::build(), vec![&matches]).await?;

    assert_eq!(Config::get(ConfigKey::Backend), "openai");
    assert_eq!(Config::get(ConfigKey::Model), "gpt-4o");
    assert_eq!(Config::get(ConfigKey::Temperature), "0.4");
    assert_eq!(Config::get(ConfigKey::TopK), "40");
    assert_eq!(Config::get(ConfigKey::RetrieverMinScore), "0.25");
    assert_eq!(
        Config::get(ConfigKey::AnthropicURL),
        "https://api.anthropic.com"
    );

    let matches = cli::build().try_get_matches_from(vec![
        "palaver",
        "-c",
        "./test/fixtures/bad-config.toml",
    ])?;
    let res = Config::load(cli::build(), vec![&matches]).await;
    assert!(res.is_err());

    return Ok(());
}
