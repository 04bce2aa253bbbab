#[cfg(test)]
#[path = "repl_test.rs"]
mod tests;

use std::future::Future;
use std::io;
use std::io::Write;
use std::path;
use std::sync::Arc;

use anyhow::Result;
use strum::IntoEnumIterator;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::mpsc;
use yansi::Paint;

use crate::application::cli::format_summary;
use crate::domain::models::BackendBox;
use crate::domain::models::Event;
use crate::domain::models::RoleName;
use crate::domain::models::Session;
use crate::domain::models::SlashCommand;
use crate::domain::models::TurnRole;
use crate::domain::services::AssembledResponse;
use crate::domain::services::ContextBuilder;
use crate::domain::services::Conversation;
use crate::domain::services::ResponseAssembler;

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /save (/s) - Saves the active session, assigning it an id on first save.
- /new (/n) - Starts a new session with the role's greeting.
- /load (/l) [ID] - Loads a saved session, saving the active one first.
- /sessions (/ls) [TERM] - Lists saved sessions, newest first. Filters by title when TERM is given.
- /role [NAME] - Switches to a role and starts a new session. Lists roles without NAME.
- /roles - Lists available roles.
- /rename [TITLE] - Renames the active session.
- /delete [ID] - Deletes a saved session. Defaults to the active session.
- /export [PATH] - Writes the active session as markdown. Defaults to chat_<ID>.md.
- /help (/h) - Provides this help menu.
- /quit (/q) - Exits the chat.

HOTKEYS:
- CTRL+C - Stops a reply while it streams. Exits when idle.
    "#;

    return text.trim().to_string();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed(AssembledResponse),
    Failed(String),
    Cancelled,
}

/// Renders every turn of a session, greeting included.
pub fn render_transcript(session: &Session) -> String {
    return session
        .messages
        .iter()
        .map(|turn| {
            let label = match turn.role {
                TurnRole::User => Paint::cyan("You").bold().to_string(),
                TurnRole::Assistant => Paint::magenta("Assistant").bold().to_string(),
            };
            return format!("{label}: {}", turn.content);
        })
        .collect::<Vec<String>>()
        .join("\n\n");
}

/// Drains backend events into `out` as they arrive, until the backend
/// finishes, fails, or `cancel` resolves.
pub async fn consume_events<W, F>(
    rx: &mut mpsc::UnboundedReceiver<Event>,
    out: &mut W,
    cancel: F,
) -> Result<StreamOutcome>
where
    W: Write,
    F: Future,
{
    let mut assembler = ResponseAssembler::default();
    tokio::pin!(cancel);

    loop {
        tokio::select! {
            _ = &mut cancel => {
                writeln!(out)?;
                out.flush()?;
                return Ok(StreamOutcome::Cancelled);
            }
            event = rx.recv() => {
                match event {
                    Some(Event::BackendFragments(fragments)) => {
                        for piece in assembler.push_all(fragments) {
                            write!(out, "{piece}")?;
                        }
                        out.flush()?;
                    }
                    Some(Event::BackendError(message)) => {
                        writeln!(out)?;
                        out.flush()?;
                        return Ok(StreamOutcome::Failed(message));
                    }
                    Some(Event::BackendDone()) | None => break,
                }
            }
        }
    }

    for piece in assembler.finish() {
        write!(out, "{piece}")?;
    }
    writeln!(out)?;
    out.flush()?;

    return Ok(StreamOutcome::Completed(assembler.into_response()));
}

pub struct Repl {
    pub conversation: Conversation,
    context: ContextBuilder,
    backend: Arc<BackendBox>,
}

impl Repl {
    pub fn new(conversation: Conversation, context: ContextBuilder, backend: BackendBox) -> Repl {
        return Repl {
            conversation,
            context,
            backend: Arc::new(backend),
        };
    }

    fn list_roles(&self) -> String {
        let active = self.conversation.role();
        return RoleName::iter()
            .map(|role| {
                if role == active {
                    return format!("- {role} (active)");
                }
                return format!("- {role}");
            })
            .collect::<Vec<String>>()
            .join("\n");
    }

    async fn list_sessions(&self, term: &str) -> String {
        let summaries = if term.is_empty() {
            self.conversation.sessions.list().await
        } else {
            self.conversation.sessions.search(term).await
        };

        if summaries.is_empty() {
            if term.is_empty() {
                return "There are no sessions available. You should start your first one!"
                    .to_string();
            }
            return format!("No sessions match '{term}'.");
        }

        return summaries
            .iter()
            .map(format_summary)
            .collect::<Vec<String>>()
            .join("\n");
    }

    async fn export(&self, target: &str) -> String {
        let Some(id) = self.conversation.session.session_id.clone() else {
            return "Save the session before exporting it.".to_string();
        };

        let Some(markdown) = self.conversation.sessions.export_markdown(&id).await else {
            return format!("Failed to export session {id}.");
        };

        let mut output = path::PathBuf::from(format!("chat_{id}.md"));
        if !target.is_empty() {
            output = path::PathBuf::from(target);
        }

        if let Err(err) = tokio::fs::write(&output, markdown).await {
            tracing::error!(error = ?err, path = ?output, "Failed to write export");
            return format!("Failed to write {}.", output.to_string_lossy());
        }

        return format!("Exported session {id} to {}", output.to_string_lossy());
    }

    /// Runs a slash command against the active conversation and returns the
    /// text to show the user.
    pub async fn run_command(&mut self, command: &SlashCommand) -> (Flow, String) {
        if command.is_quit() {
            return (Flow::Quit, "Bye!".to_string());
        }

        if command.is_help() {
            return (Flow::Continue, help_text());
        }

        if command.is_save() {
            let res = match self.conversation.save().await {
                Some(id) => format!("Saved session {id}"),
                None if !self.conversation.session.has_conversation() => {
                    "There is no conversation to save yet.".to_string()
                }
                None => "Failed to save the session.".to_string(),
            };
            return (Flow::Continue, res);
        }

        if command.is_new() {
            self.conversation.start_new().await;
            return (Flow::Continue, render_transcript(&self.conversation.session));
        }

        if command.is_load() {
            let id = command.rest();
            if id.is_empty() {
                return (Flow::Continue, "Usage: /load ID".to_string());
            }
            if !self.conversation.load(&id).await {
                return (Flow::Continue, format!("Failed to load session {id}."));
            }

            let res = format!(
                "Loaded session: {}\n\n{}",
                self.conversation.session.title,
                render_transcript(&self.conversation.session)
            );
            return (Flow::Continue, res);
        }

        if command.is_sessions() {
            return (Flow::Continue, self.list_sessions(&command.rest()).await);
        }

        if command.is_role_list() {
            return (Flow::Continue, self.list_roles());
        }

        if command.is_role_set() {
            let role = RoleName::parse(&command.rest());
            self.conversation.switch_role(role);
            let res = format!(
                "Switched to role {role}.\n\n{}",
                render_transcript(&self.conversation.session)
            );
            return (Flow::Continue, res);
        }

        if command.is_rename() {
            let title = command.rest();
            if !self.conversation.rename(&title).await {
                return (Flow::Continue, "Failed to rename the session.".to_string());
            }
            return (Flow::Continue, format!("Renamed session to {title}"));
        }

        if command.is_delete() {
            let mut id = command.rest();
            if id.is_empty() {
                id = self
                    .conversation
                    .session
                    .session_id
                    .clone()
                    .unwrap_or_default();
            }
            if id.is_empty() {
                return (
                    Flow::Continue,
                    "The active session has not been saved yet.".to_string(),
                );
            }
            if !self.conversation.delete(&id).await {
                return (Flow::Continue, format!("Failed to delete session {id}."));
            }
            return (Flow::Continue, format!("Deleted session {id}"));
        }

        if command.is_export() {
            return (Flow::Continue, self.export(&command.rest()).await);
        }

        return (Flow::Continue, help_text());
    }

    /// Sends `input` to the backend and streams the reply to stdout. Failed or
    /// cancelled replies leave no trace in the session.
    pub async fn ask(&mut self, input: &str) -> Result<()> {
        let profile = self.conversation.profile();
        self.conversation.push_user(input);
        let prompt = self
            .context
            .build(&self.conversation.session, input, &profile)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let backend = Arc::clone(&self.backend);
        let worker = tokio::spawn(async move {
            if let Err(err) = backend.get_completion(prompt, &tx).await {
                tracing::error!(error = ?err, "Completion failed");
                if tx.send(Event::BackendError(err.to_string())).is_err() {
                    tracing::debug!("Chat loop stopped listening before the error arrived");
                }
            }
        });

        let mut stdout = io::stdout();
        let outcome = consume_events(&mut rx, &mut stdout, signal::ctrl_c()).await?;

        match outcome {
            StreamOutcome::Completed(response) => {
                if response.display.trim().is_empty() {
                    self.conversation.discard_pending_user();
                    println!("{}", Paint::yellow("The model returned an empty reply."));
                } else {
                    self.conversation.push_assistant(&response);
                }
            }
            StreamOutcome::Failed(message) => {
                self.conversation.discard_pending_user();
                println!("{}", Paint::yellow(format!("Warning: {message}")));
            }
            StreamOutcome::Cancelled => {
                worker.abort();
                self.conversation.discard_pending_user();
                println!("{}", Paint::yellow("Reply cancelled."));
            }
        }

        return Ok(());
    }

    pub async fn start(&mut self) -> Result<()> {
        if let Err(err) = self.backend.health_check().await {
            tracing::warn!(error = ?err, backend = %self.backend.name(), "Backend health check failed");
            println!(
                "{}",
                Paint::yellow(format!(
                    "Warning: {} backend is not ready: {err}",
                    self.backend.name()
                ))
            );
        }

        println!("{}\n", render_transcript(&self.conversation.session));

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{} ", Paint::cyan(">").bold());
            io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                println!();
                break;
            };

            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            if input.starts_with('/') {
                let Some(command) = SlashCommand::parse(input) else {
                    println!("Unknown command. Type /help for a list of commands.");
                    continue;
                };
                let (flow, text) = self.run_command(&command).await;
                println!("{text}\n");
                if flow == Flow::Quit {
                    break;
                }
                continue;
            }

            self.ask(input).await?;
            println!();
        }

        return Ok(());
    }
}
