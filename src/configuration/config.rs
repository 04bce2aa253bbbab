#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::env;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

use crate::domain::models::BackendName;
use crate::domain::models::ModelConfig;
use crate::domain::models::ModelPreset;
use crate::domain::models::RoleName;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    Backend,
    BackendHealthCheckTimeout,
    ConfigFile,
    Model,
    Role,
    SystemPrompt,
    Temperature,
    TopP,
    TopK,
    MaxTokens,
    AnthropicToken,
    AnthropicURL,
    OpenaiToken,
    OpenaiURL,
    RetrieverURL,
    RetrieverMinScore,
    SessionsDir,
    SessionID,
}

fn parse_or<T: std::str::FromStr>(key: ConfigKey, val: &str, fallback: T) -> T {
    if val.trim().is_empty() {
        return fallback;
    }

    match val.trim().parse::<T>() {
        Ok(parsed) => return parsed,
        Err(_) => {
            tracing::warn!(key = %key, value = val, "Ignoring invalid config value");
            return fallback;
        }
    }
}

/// Builds the sampling configuration from config values, filling anything
/// unset from the selected model preset.
pub fn build_model_config<F>(get: F) -> ModelConfig
where
    F: Fn(ConfigKey) -> String,
{
    let model_name = get(ConfigKey::Model);
    let preset = ModelPreset::find(&model_name).unwrap_or(ModelPreset::default_preset());

    return ModelConfig {
        model_name: if model_name.is_empty() {
            preset.name.to_string()
        } else {
            model_name
        },
        temperature: parse_or(
            ConfigKey::Temperature,
            &get(ConfigKey::Temperature),
            preset.temperature,
        ),
        top_p: parse_or(ConfigKey::TopP, &get(ConfigKey::TopP), preset.top_p),
        top_k: parse_or(ConfigKey::TopK, &get(ConfigKey::TopK), preset.top_k),
        max_tokens: parse_or(
            ConfigKey::MaxTokens,
            &get(ConfigKey::MaxTokens),
            preset.max_tokens,
        ),
        role: RoleName::parse(&get(ConfigKey::Role)).to_string(),
    };
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn model_config() -> ModelConfig {
        return build_model_config(Config::get);
    }

    pub fn default(key: ConfigKey) -> String {
        let default_backend = BackendName::Anthropic.to_string();
        let default_model = ModelPreset::default_preset().name.to_string();
        let default_role = RoleName::Default.to_string();

        let config_path = dirs::config_dir()
            .unwrap_or_else(env::temp_dir)
            .join("palaver/config.toml")
            .to_string_lossy()
            .to_string();

        let res = match key {
            ConfigKey::Backend => &default_backend,
            ConfigKey::BackendHealthCheckTimeout => "1000",
            ConfigKey::Model => &default_model,
            ConfigKey::Role => &default_role,
            ConfigKey::SystemPrompt => "",
            ConfigKey::Temperature => "",
            ConfigKey::TopP => "",
            ConfigKey::TopK => "",
            ConfigKey::MaxTokens => "",
            ConfigKey::AnthropicToken => "",
            ConfigKey::AnthropicURL => "https://api.anthropic.com",
            ConfigKey::OpenaiToken => "",
            ConfigKey::OpenaiURL => "https://api.openai.com",
            ConfigKey::RetrieverURL => "",
            ConfigKey::RetrieverMinScore => "0",
            ConfigKey::SessionsDir => "",

            // Special
            ConfigKey::ConfigFile => &config_path,
            ConfigKey::SessionID => "",
        };

        return res.to_string();
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if let Some(val) = doc.get(&key.to_string()) {
                    // Use clap value parsers to do validation.
                    let mut possible_values = vec![];
                    if let Some(arg) = cmd
                        .get_arguments()
                        .find(|e| return e.get_long() == Some(key.to_string().as_str()))
                    {
                        if !arg.get_possible_values().is_empty() {
                            possible_values = arg
                                .get_possible_values()
                                .iter()
                                .map(|e| return e.get_name().to_string())
                                .collect::<Vec<String>>();
                        }
                    }

                    if let Some(val_int) = val.as_integer() {
                        Config::set(key, &val_int.to_string());
                    } else if let Some(val_float) = val.as_float() {
                        Config::set(key, &val_float.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        if !possible_values.is_empty()
                            && !possible_values.contains(&val_str.to_string())
                        {
                            bail!(format!("config.toml has an invalid value for key '{key}': {val_str}\nPossible values are: {}", possible_values.join(", ")));
                        }
                        Config::set(key, val_str);
                    }
                }
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        tracing::debug!(
            backend = Config::get(ConfigKey::Backend),
            model = Config::get(ConfigKey::Model),
            role = Config::get(ConfigKey::Role),
            sessions_dir = Config::get(ConfigKey::SessionsDir),
            retriever_url = Config::get(ConfigKey::RetrieverURL),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::SessionID || key == ConfigKey::ConfigFile {
                    return None;
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))?;

                let mut description = arg.get_help()?.to_string();

                description = description
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                if !arg.get_possible_values().is_empty() {
                    let possible_values = arg
                        .get_possible_values()
                        .iter()
                        .map(|e| return e.get_name().to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    description = format!("{description} [possible values: {}]", possible_values);
                }

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<f64>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
