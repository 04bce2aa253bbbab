#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use super::AssembledResponse;
use super::Sessions;
use crate::domain::models::ModelConfig;
use crate::domain::models::RoleName;
use crate::domain::models::RoleProfile;
use crate::domain::models::Session;
use crate::domain::models::Turn;
use crate::domain::models::TurnRole;

/// Owns the single active session of a chat and keeps it in step with the
/// session store.
pub struct Conversation {
    pub session: Session,
    pub sessions: Sessions,
    system_prompt: String,
}

impl Conversation {
    pub fn new(sessions: Sessions, model_config: ModelConfig, system_prompt: &str) -> Conversation {
        let greeting = model_config.role_name().profile().greeting;
        return Conversation {
            session: Session::new(&greeting, model_config),
            sessions,
            system_prompt: system_prompt.to_string(),
        };
    }

    pub fn role(&self) -> RoleName {
        return self.session.model_config.role_name();
    }

    /// Active role profile, with the user's system prompt override applied.
    pub fn profile(&self) -> RoleProfile {
        return self.role().profile().with_system_prompt(&self.system_prompt);
    }

    /// Discards the active session in favour of a fresh one holding only the
    /// role's greeting. Sampling settings carry over.
    pub fn new_session(&mut self) {
        let model_config = self.session.model_config.clone();
        self.session = Session::new(&self.role().profile().greeting, model_config);
    }

    /// Starts a fresh session, first saving the active one when it is already
    /// stored so turns added since the last save are kept.
    pub async fn start_new(&mut self) {
        if self.session.session_id.is_some()
            && self.session.has_conversation()
            && self.save().await.is_none()
        {
            tracing::warn!("Could not save the active session before starting a new one");
        }

        self.new_session();
    }

    /// Switching roles always starts over so the greeting matches the role.
    pub fn switch_role(&mut self, role: RoleName) {
        self.session.model_config.role = role.to_string();
        self.new_session();
    }

    pub fn push_user(&mut self, input: &str) {
        self.session.messages.push(Turn::user(input));
    }

    pub fn push_assistant(&mut self, response: &AssembledResponse) {
        self.session
            .messages
            .push(Turn::assistant(&response.display, &response.canonical));
    }

    /// Drops the newest turn if it is an unanswered user turn.
    pub fn discard_pending_user(&mut self) -> bool {
        if !self.session.has_conversation() {
            return false;
        }

        if let Some(last) = self.session.messages.last() {
            if last.role == TurnRole::User {
                self.session.messages.pop();
                return true;
            }
        }

        return false;
    }

    /// Persists the active session. Returns `None` when there is nothing
    /// beyond the greeting to save, or the write failed.
    pub async fn save(&mut self) -> Option<String> {
        if !self.session.has_conversation() {
            return None;
        }

        return self.sessions.save(&mut self.session, None).await;
    }

    /// Replaces the active session with a stored one, saving the current
    /// conversation first if it holds more than the greeting. Nothing is
    /// written and the active session stays in place when `id` cannot be
    /// loaded.
    pub async fn load(&mut self, id: &str) -> bool {
        let Some(loaded) = self.sessions.load(id).await else {
            return false;
        };

        if self.session.has_conversation() && self.save().await.is_none() {
            tracing::warn!(
                session_id = id,
                "Could not save the active session before switching"
            );
        }

        self.session = loaded;
        return true;
    }

    /// Deletes a stored session. Deleting the active one also starts a new
    /// session.
    pub async fn delete(&mut self, id: &str) -> bool {
        if !self.sessions.delete(id).await {
            return false;
        }

        if self.session.session_id.as_deref() == Some(id) {
            self.new_session();
        }

        return true;
    }

    /// Renames the active session, and its stored copy when it has one.
    pub async fn rename(&mut self, title: &str) -> bool {
        self.session.title = title.to_string();
        let Some(id) = self.session.session_id.clone() else {
            return true;
        };

        return self.sessions.rename(&id, title).await;
    }
}
