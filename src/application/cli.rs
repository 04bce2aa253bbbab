#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgGroup;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use strum::IntoEnumIterator;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use crate::application::repl::help_text;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendName;
use crate::domain::models::RoleName;
use crate::domain::models::SessionStats;
use crate::domain::models::SessionSummary;
use crate::domain::services::Sessions;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

pub fn format_summary(summary: &SessionSummary) -> String {
    return format!(
        "- (ID: {}) {}, Model: {}, Messages: {}, {}",
        summary.session_id,
        summary.updated_at.format("%Y-%m-%d %H:%M"),
        summary.model_config.model_name_or_unknown(),
        summary.message_count,
        summary.title
    );
}

pub fn format_stats(stats: &SessionStats) -> String {
    let mut lines = vec![
        format!("Total sessions: {}", stats.total_sessions),
        format!("Total messages: {}", stats.total_messages),
    ];

    if !stats.model_usage.is_empty() {
        lines.push("".to_string());
        lines.push("Models:".to_string());
        for (model, count) in stats.model_usage.iter() {
            lines.push(format!("- {model}: {count}"));
        }
    }

    if !stats.recent.is_empty() {
        lines.push("".to_string());
        lines.push("Recent:".to_string());
        for summary in stats.recent.iter() {
            lines.push(format_summary(summary));
        }
    }

    return lines.join("\n");
}

async fn print_sessions_list(search: Option<&String>) -> Result<()> {
    let summaries = match search {
        Some(term) => Sessions::default().search(term).await,
        None => Sessions::default().list().await,
    };

    if summaries.is_empty() {
        println!("There are no sessions available. You should start your first one!");
    } else {
        let lines = summaries
            .iter()
            .map(format_summary)
            .collect::<Vec<String>>();
        println!("{}", lines.join("\n"));
    }

    return Ok(());
}

async fn export_session(session_id: &str, output: Option<&String>) -> Result<()> {
    let Some(markdown) = Sessions::default().export_markdown(session_id).await else {
        bail!(format!("Failed to export session {session_id}"));
    };

    match output {
        Some(output) => {
            fs::write(output, markdown).await?;
            println!("Exported session {session_id} to {output}");
        }
        None => {
            println!("{markdown}");
        }
    }

    return Ok(());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(config_file_path.clone()).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

async fn load_config_from_session(session_id: &str) -> Result<()> {
    if Sessions::default().load(session_id).await.is_none() {
        bail!(format!("Session {session_id} could not be loaded"));
    }
    Config::set(ConfigKey::SessionID, session_id);

    return Ok(());
}

async fn load_config_from_session_interactive() -> Result<bool> {
    let summaries = Sessions::default().list().await;

    if summaries.is_empty() {
        println!("There are no sessions available. You should start your first one!");
        return Ok(false);
    }

    let session_options = summaries
        .iter()
        .map(format_summary)
        .collect::<Vec<String>>();

    let selected = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Which session would you like to load?")
        .default(0)
        .items(&session_options)
        .interact_opt()?;

    let Some(idx) = selected else {
        return Ok(false);
    };

    load_config_from_session(&summaries[idx].session_id).await?;

    return Ok(true);
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn arg_session_id(required: bool) -> Arg {
    return clap::Arg::new(ConfigKey::SessionID.to_string())
        .short('i')
        .long("id")
        .help("Session ID")
        .num_args(1)
        .required(required);
}

fn subcommand_sessions_delete() -> Command {
    return Command::new("delete")
        .about("Delete one or all sessions.")
        .arg(arg_session_id(false))
        .arg(
            clap::Arg::new("all")
                .long("all")
                .help("Delete all sessions.")
                .action(ArgAction::SetTrue),
        )
        .group(
            ArgGroup::new("delete-args")
                .args([ConfigKey::SessionID.to_string(), "all".to_string()])
                .required(true),
        );
}

fn subcommand_sessions() -> Command {
    return Command::new("sessions")
        .about("Manage past chat sessions.")
        .arg_required_else_help(true)
        .subcommand(Command::new("dir").about("Print the sessions directory path."))
        .subcommand(
            Command::new("list")
                .about("List all previous sessions, newest first.")
                .arg(
                    clap::Arg::new("search")
                        .short('s')
                        .long("search")
                        .help("Only list sessions whose title contains this text, ignoring case.")
                        .num_args(1),
                ),
        )
        .subcommand(
            Command::new("open")
                .about("Open a previous session by ID. Omit passing any session ID to load an interactive selection.")
                .arg(arg_session_id(false)),
        )
        .subcommand(subcommand_sessions_delete())
        .subcommand(
            Command::new("rename")
                .about("Rename a session.")
                .arg(arg_session_id(true))
                .arg(
                    clap::Arg::new("title")
                        .short('t')
                        .long("title")
                        .help("New title")
                        .num_args(1)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export a session as markdown.")
                .arg(arg_session_id(true))
                .arg(
                    clap::Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("File to write to. Prints to stdout when omitted.")
                        .num_args(1),
                ),
        )
        .subcommand(
            Command::new("stats").about("Show totals, model usage, and the most recent sessions."),
        );
}

fn arg_backend() -> Arg {
    return Arg::new(ConfigKey::Backend.to_string())
        .short('b')
        .long(ConfigKey::Backend.to_string())
        .env("PALAVER_BACKEND")
        .num_args(1)
        .help(format!(
            "The backend hosting the model to chat with. [default: {}]",
            Config::default(ConfigKey::Backend)
        ))
        .value_parser(PossibleValuesParser::new(BackendName::VARIANTS));
}

fn arg_backend_health_check_timeout() -> Arg {
    return Arg::new(ConfigKey::BackendHealthCheckTimeout.to_string())
        .long(ConfigKey::BackendHealthCheckTimeout.to_string())
        .env("PALAVER_BACKEND_HEALTH_CHECK_TIMEOUT")
        .num_args(1)
        .help(
            format!("Time to wait in milliseconds before timing out when doing a healthcheck for a backend. [default: {}]", Config::default(ConfigKey::BackendHealthCheckTimeout)),
        );
}

fn arg_model() -> Arg {
    return Arg::new(ConfigKey::Model.to_string())
        .short('m')
        .long(ConfigKey::Model.to_string())
        .env("PALAVER_MODEL")
        .num_args(1)
        .help(format!(
            "Model preset name or backend model id. Presets fill in sampling defaults. [default: {}]",
            Config::default(ConfigKey::Model)
        ));
}

fn arg_role() -> Arg {
    let roles = RoleName::iter()
        .map(|role| return role.to_string())
        .collect::<Vec<String>>()
        .join(", ");

    return Arg::new(ConfigKey::Role.to_string())
        .short('r')
        .long(ConfigKey::Role.to_string())
        .env("PALAVER_ROLE")
        .num_args(1)
        .help(format!(
            "Assistant role, one of: {roles}. Unknown names fall back to Default. [default: {}]",
            Config::default(ConfigKey::Role)
        ));
}

fn arg_system_prompt() -> Arg {
    return Arg::new(ConfigKey::SystemPrompt.to_string())
        .long(ConfigKey::SystemPrompt.to_string())
        .env("PALAVER_SYSTEM_PROMPT")
        .num_args(1)
        .help("Replaces the role's system prompt.");
}

fn arg_sampling(key: ConfigKey, env: &'static str, help: &'static str) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env)
        .num_args(1)
        .help(help);
}

fn chat_args() -> Vec<Arg> {
    return vec![
        arg_backend(),
        arg_backend_health_check_timeout(),
        arg_model(),
        arg_role(),
        arg_system_prompt(),
        arg_sampling(
            ConfigKey::Temperature,
            "PALAVER_TEMPERATURE",
            "Sampling temperature. Defaults to the model preset's value.",
        ),
        arg_sampling(
            ConfigKey::TopP,
            "PALAVER_TOP_P",
            "Nucleus sampling cutoff. Defaults to the model preset's value.",
        ),
        arg_sampling(
            ConfigKey::TopK,
            "PALAVER_TOP_K",
            "Only sample from the top K tokens. Not sent to OpenAI. Defaults to the model preset's value.",
        ),
        arg_sampling(
            ConfigKey::MaxTokens,
            "PALAVER_MAX_TOKENS",
            "Maximum tokens to generate. Defaults to the model preset's value.",
        ),
    ];
}

fn subcommand_chat() -> Command {
    return Command::new("chat")
        .about("Start a new chat session.")
        .args(chat_args());
}

pub fn build() -> Command {
    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") || line.starts_with("HOTKEYS:") {
                return Paint::new(format!("CHAT {line}"))
                    .underline()
                    .bold()
                    .to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("palaver")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_chat())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_sessions())
        .args(chat_args())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("PALAVER_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::SessionsDir.to_string())
                .long(ConfigKey::SessionsDir.to_string())
                .env("PALAVER_SESSIONS_DIR")
                .num_args(1)
                .help("Directory holding saved sessions. Defaults to palaver/sessions in the user cache directory.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::AnthropicURL.to_string())
                .long(ConfigKey::AnthropicURL.to_string())
                .env("PALAVER_ANTHROPIC_URL")
                .num_args(1)
                .help(format!("Anthropic API URL when using the Anthropic backend. Can be swapped to a compatible proxy. [default: {}]", Config::default(ConfigKey::AnthropicURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::AnthropicToken.to_string())
                .long(ConfigKey::AnthropicToken.to_string())
                .env("PALAVER_ANTHROPIC_TOKEN")
                .num_args(1)
                .help("Anthropic API token when using the Anthropic backend.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OpenaiURL.to_string())
                .long(ConfigKey::OpenaiURL.to_string())
                .env("PALAVER_OPENAI_URL")
                .num_args(1)
                .help(format!("OpenAI API URL when using the OpenAI backend. Can be swapped to a compatible proxy. [default: {}]", Config::default(ConfigKey::OpenaiURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OpenaiToken.to_string())
                .long(ConfigKey::OpenaiToken.to_string())
                .env("PALAVER_OPENAI_TOKEN")
                .num_args(1)
                .help("OpenAI API token when using the OpenAI backend.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::RetrieverURL.to_string())
                .long(ConfigKey::RetrieverURL.to_string())
                .env("PALAVER_RETRIEVER_URL")
                .num_args(1)
                .help("Knowledge base service used by roles that answer from retrieved passages. Retrieval is skipped when unset.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::RetrieverMinScore.to_string())
                .long(ConfigKey::RetrieverMinScore.to_string())
                .env("PALAVER_RETRIEVER_MIN_SCORE")
                .num_args(1)
                .help(format!("Passages scoring below this are ignored. [default: {}]", Config::default(ConfigKey::RetrieverMinScore)))
                .global(true),
        );
}

pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("chat", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("sessions", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let session_id_key = ConfigKey::SessionID.to_string();

            match subcmd_matches.subcommand() {
                Some(("dir", _)) => {
                    let dir = Sessions::default().dir().to_string_lossy().to_string();
                    println!("{dir}");
                    return Ok(false);
                }
                Some(("list", list_matches)) => {
                    print_sessions_list(list_matches.get_one::<String>("search")).await?;
                    return Ok(false);
                }
                Some(("open", open_matches)) => {
                    if let Some(session_id) = open_matches.get_one::<String>(&session_id_key) {
                        load_config_from_session(session_id).await?;
                    } else if !load_config_from_session_interactive().await? {
                        return Ok(false);
                    }
                }
                Some(("delete", delete_matches)) => {
                    if let Some(session_id) = delete_matches.get_one::<String>(&session_id_key) {
                        if !Sessions::default().delete(session_id).await {
                            bail!(format!("Session {session_id} could not be deleted"));
                        }
                        println!("Deleted session {session_id}");
                    } else if delete_matches.get_flag("all") {
                        if !Sessions::default().delete_all().await {
                            bail!("Failed to delete all sessions");
                        }
                        println!("Deleted all sessions");
                    } else {
                        subcommand_sessions_delete().print_long_help()?;
                    }
                    return Ok(false);
                }
                Some(("rename", rename_matches)) => {
                    let session_id = rename_matches
                        .get_one::<String>(&session_id_key)
                        .cloned()
                        .unwrap_or_default();
                    let title = rename_matches
                        .get_one::<String>("title")
                        .cloned()
                        .unwrap_or_default();
                    if !Sessions::default().rename(&session_id, &title).await {
                        bail!(format!("Session {session_id} could not be renamed"));
                    }
                    println!("Renamed session {session_id} to {title}");
                    return Ok(false);
                }
                Some(("export", export_matches)) => {
                    let session_id = export_matches
                        .get_one::<String>(&session_id_key)
                        .cloned()
                        .unwrap_or_default();
                    export_session(&session_id, export_matches.get_one::<String>("output"))
                        .await?;
                    return Ok(false);
                }
                Some(("stats", _)) => {
                    println!("{}", format_stats(&Sessions::default().stats().await));
                    return Ok(false);
                }
                _ => {
                    subcommand_sessions().print_long_help()?;
                    return Ok(false);
                }
            }
        }
        _ => {
            Config::load(build(), vec![&matches]).await?;
        }
    }

    return Ok(true);
}
