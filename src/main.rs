#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::bail;
use anyhow::Error;
use anyhow::Result;
use yansi::Paint;

use crate::application::cli;
use crate::application::repl::Repl;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendName;
use crate::domain::services::ContextBuilder;
use crate::domain::services::Conversation;
use crate::domain::services::Sessions;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::retrievers::RetrieverManager;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        Paint::red(format!(
            "Oh no! Palaver has failed with the following app version and error.\n\nVersion: {}\nError: {}",
            env!("CARGO_PKG_VERSION"),
            err
        ))
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

async fn start_chat() -> Result<()> {
    let backend = BackendManager::get(BackendName::parse(&Config::get(ConfigKey::Backend))?)?;

    let min_score = Config::get(ConfigKey::RetrieverMinScore).parse::<f64>()?;
    let retriever = RetrieverManager::get(&Config::get(ConfigKey::RetrieverURL));
    let context = ContextBuilder::new(Some(retriever), min_score);

    let mut conversation = Conversation::new(
        Sessions::default(),
        Config::model_config(),
        &Config::get(ConfigKey::SystemPrompt),
    );

    let session_id = Config::get(ConfigKey::SessionID);
    if !session_id.is_empty() && !conversation.load(&session_id).await {
        bail!(format!("Session {session_id} could not be loaded"));
    }

    return Repl::new(conversation, context, backend).start().await;
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let debug_log_dir = env::var("PALAVER_LOG_DIR").unwrap_or_else(|_| {
        return dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("palaver")
            .to_string_lossy()
            .to_string();
    });

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("palaver")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    match cli::parse().await {
        Ok(true) => {}
        Ok(false) => {
            drop(guard);
            process::exit(0);
        }
        Err(err) => {
            drop(guard);
            handle_error(err);
            return;
        }
    }

    if let Err(err) = start_chat().await {
        drop(guard);
        handle_error(err);
        return;
    }

    // Stdin reads hold up runtime shutdown, so exit directly.
    drop(guard);
    process::exit(0);
}
