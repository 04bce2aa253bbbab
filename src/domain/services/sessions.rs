#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;

use std::env;
use std::path;

use anyhow::bail;
use anyhow::Result;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Session;
use crate::domain::models::SessionStats;
use crate::domain::models::SessionSummary;

const SESSION_EXTENSION: &str = "yaml";

/// File-per-session store. Every operation reports failure as `false` or
/// `None` after logging; nothing here returns an error to the caller.
pub struct Sessions {
    pub cache_dir: path::PathBuf,
}

impl Default for Sessions {
    fn default() -> Sessions {
        let configured = Config::get(ConfigKey::SessionsDir);
        if !configured.is_empty() {
            return Sessions::new(path::PathBuf::from(configured));
        }

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("palaver/sessions");

        return Sessions::new(cache_dir);
    }
}

impl Sessions {
    pub fn new(cache_dir: path::PathBuf) -> Sessions {
        return Sessions { cache_dir };
    }

    pub fn dir(&self) -> &path::Path {
        return &self.cache_dir;
    }

    /// Sortable, practically unique id: UTC time to the second plus 8 hex
    /// characters.
    pub fn create_id() -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        return format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &suffix[..8]);
    }

    /// Ids name a file directly inside the store, so separators and parent
    /// references are refused.
    pub fn is_valid_id(id: &str) -> bool {
        return !id.is_empty() && !id.contains('/') && !id.contains('\\') && !id.contains("..");
    }

    fn get_file_path(&self, id: &str) -> Option<path::PathBuf> {
        if !Sessions::is_valid_id(id) {
            tracing::warn!(session_id = id, "Rejected invalid session id");
            return None;
        }

        return Some(self.cache_dir.join(format!("{id}.{SESSION_EXTENSION}")));
    }

    async fn write(&self, id: &str, session: &Session) -> Result<()> {
        let Some(file_path) = self.get_file_path(id) else {
            bail!("Invalid session id {id}");
        };
        let payload = serde_yaml::to_string(session)?;

        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir).await?;
        }

        let mut file = fs::File::create(file_path).await?;
        file.write_all(payload.as_bytes()).await?;
        file.flush().await?;

        return Ok(());
    }

    async fn read(&self, file_path: &path::Path) -> Result<Session> {
        let payload = fs::read_to_string(file_path).await?;
        let session: Session = serde_yaml::from_str(&payload)?;
        return Ok(session);
    }

    /// Writes `session`, overwriting any previous version. The id is taken
    /// from `explicit_id`, then the session itself, and generated otherwise.
    /// `updated_at`, `message_count` and an unset title are refreshed before
    /// writing.
    pub async fn save(&self, session: &mut Session, explicit_id: Option<&str>) -> Option<String> {
        let id = explicit_id
            .map(|e| return e.to_string())
            .or_else(|| return session.session_id.clone())
            .filter(|e| return !e.is_empty())
            .unwrap_or_else(Sessions::create_id);

        if !Sessions::is_valid_id(&id) {
            tracing::error!(session_id = id, "Refusing to save under an invalid id");
            return None;
        }

        session.session_id = Some(id.to_string());
        session.touch();

        if let Err(err) = self.write(&id, session).await {
            tracing::error!(error = ?err, session_id = id, "Failed to save session");
            return None;
        }

        tracing::debug!(
            session_id = id,
            message_count = session.message_count,
            "Saved session"
        );
        return Some(id);
    }

    pub async fn load(&self, id: &str) -> Option<Session> {
        let file_path = self.get_file_path(id)?;
        if !file_path.exists() {
            tracing::debug!(session_id = id, "No session found");
            return None;
        }

        match self.read(&file_path).await {
            Ok(mut session) => {
                if session.session_id.is_none() {
                    session.session_id = Some(id.to_string());
                }
                return Some(session);
            }
            Err(err) => {
                tracing::warn!(error = ?err, session_id = id, "Failed to read session");
                return None;
            }
        }
    }

    async fn read_summaries(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries: Vec<SessionSummary> = vec![];
        if !self.cache_dir.exists() {
            return Ok(summaries);
        }

        let mut dir = fs::read_dir(&self.cache_dir).await?;
        while let Some(file) = dir.next_entry().await? {
            let file_path = file.path();
            if file_path.extension().and_then(|e| return e.to_str()) != Some(SESSION_EXTENSION) {
                continue;
            }

            let Some(id) = file_path.file_stem().and_then(|e| return e.to_str()) else {
                continue;
            };

            match self.read(&file_path).await {
                Ok(mut session) => {
                    session.session_id = Some(id.to_string());
                    summaries.push(session.summary());
                }
                Err(err) => {
                    tracing::warn!(error = ?err, path = ?file_path, "Skipping unreadable session");
                }
            }
        }

        summaries.sort_by(|a, b| return b.updated_at.cmp(&a.updated_at));
        return Ok(summaries);
    }

    /// Summaries of every readable session, most recently updated first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        match self.read_summaries().await {
            Ok(summaries) => return summaries,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to list sessions");
                return vec![];
            }
        }
    }

    /// Sessions whose title contains `term`, ignoring case.
    pub async fn search(&self, term: &str) -> Vec<SessionSummary> {
        let needle = term.trim().to_lowercase();
        return self
            .list()
            .await
            .into_iter()
            .filter(|summary| return summary.title.to_lowercase().contains(&needle))
            .collect();
    }

    /// Returns true only if a session file existed and was removed.
    pub async fn delete(&self, id: &str) -> bool {
        let Some(file_path) = self.get_file_path(id) else {
            return false;
        };
        if !file_path.exists() {
            return false;
        }

        if let Err(err) = fs::remove_file(file_path).await {
            tracing::error!(error = ?err, session_id = id, "Failed to delete session");
            return false;
        }

        return true;
    }

    async fn remove_session_files(&self) -> Result<usize> {
        let mut removed = 0;
        if !self.cache_dir.exists() {
            return Ok(removed);
        }

        let mut dir = fs::read_dir(&self.cache_dir).await?;
        while let Some(file) = dir.next_entry().await? {
            let file_path = file.path();
            if file_path.extension().and_then(|e| return e.to_str()) != Some(SESSION_EXTENSION) {
                continue;
            }

            fs::remove_file(file_path).await?;
            removed += 1;
        }

        return Ok(removed);
    }

    /// Removes every session file. Other files in the directory are left alone.
    pub async fn delete_all(&self) -> bool {
        match self.remove_session_files().await {
            Ok(removed) => {
                tracing::debug!(removed = removed, "Deleted all sessions");
                return true;
            }
            Err(err) => {
                tracing::error!(error = ?err, "Failed to delete sessions");
                return false;
            }
        }
    }

    pub async fn rename(&self, id: &str, title: &str) -> bool {
        let Some(mut session) = self.load(id).await else {
            return false;
        };

        session.title = title.to_string();
        session.updated_at = Utc::now();

        if let Err(err) = self.write(id, &session).await {
            tracing::error!(error = ?err, session_id = id, "Failed to rename session");
            return false;
        }

        return true;
    }

    pub async fn export_markdown(&self, id: &str) -> Option<String> {
        let session = self.load(id).await?;
        return Some(session.to_markdown());
    }

    pub async fn stats(&self) -> SessionStats {
        return SessionStats::from_summaries(&self.list().await);
    }
}
