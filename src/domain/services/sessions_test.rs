use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;
use test_utils::corrupted_session_fixture;
use test_utils::sparse_session_fixture;
use test_utils::thinking_fixture;
use tokio::fs;

use super::Sessions;
use crate::domain::models::ModelConfig;
use crate::domain::models::Session;
use crate::domain::models::Turn;

fn store() -> (TempDir, Sessions) {
    let dir = TempDir::new().unwrap();
    let sessions = Sessions::new(dir.path().join("sessions"));
    return (dir, sessions);
}

fn session_fixture(model_name: &str, question: &str) -> Session {
    let config = ModelConfig {
        model_name: model_name.to_string(),
        temperature: 0.7,
        top_p: 0.95,
        top_k: 250,
        max_tokens: 2048,
        role: "Writing Assistant".to_string(),
    };
    let mut session = Session::new("Hello! How can I help you?", config);
    session.messages.push(Turn::user(question));
    session
        .messages
        .push(Turn::assistant(thinking_fixture(), "The answer is 42."));
    return session;
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[test]
fn it_creates_sortable_ids() {
    let id = Sessions::create_id();
    let parts = id.split('_').collect::<Vec<&str>>();

    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].len(), 8);
    assert_eq!(parts[1].len(), 6);
    assert_eq!(parts[2].len(), 8);
    assert!(parts[2].chars().all(|c| return c.is_ascii_hexdigit()));
    assert_ne!(Sessions::create_id(), id);
}

#[tokio::test]
async fn it_round_trips_sessions() {
    let (_dir, sessions) = store();
    let mut session = session_fixture("Claude 4 Sonnet", "What is Python?");

    let id = sessions.save(&mut session, None).await.unwrap();
    assert_eq!(session.session_id, Some(id.to_string()));
    assert_eq!(session.message_count, 3);
    assert_eq!(session.title, "What is Python?");

    let loaded = sessions.load(&id).await.unwrap();
    assert_eq!(loaded.messages, session.messages);
    assert_eq!(loaded.model_config, session.model_config);
    assert_eq!(loaded, session);
}

#[tokio::test]
async fn it_creates_storage_dir_lazily() {
    let (_dir, sessions) = store();
    assert!(!sessions.cache_dir.exists());

    let mut session = session_fixture("m", "q");
    sessions.save(&mut session, None).await.unwrap();
    assert!(sessions.cache_dir.exists());
}

#[tokio::test]
async fn it_saves_with_explicit_id_and_overwrites() {
    let (_dir, sessions) = store();
    let mut session = session_fixture("m", "first");

    let id = sessions.save(&mut session, Some("fixed-id")).await.unwrap();
    assert_eq!(id, "fixed-id");

    session.messages.push(Turn::user("second"));
    let again = sessions.save(&mut session, None).await.unwrap();
    assert_eq!(again, "fixed-id");

    let loaded = sessions.load("fixed-id").await.unwrap();
    assert_eq!(loaded.message_count, 4);
    assert_eq!(sessions.list().await.len(), 1);
}

#[tokio::test]
async fn it_returns_none_for_missing_session() {
    let (_dir, sessions) = store();
    assert!(sessions.load("nope").await.is_none());
    assert!(sessions.export_markdown("nope").await.is_none());
}

#[tokio::test]
async fn it_deletes_once() {
    let (_dir, sessions) = store();
    let mut session = session_fixture("m", "q");
    let id = sessions.save(&mut session, None).await.unwrap();

    assert!(sessions.delete(&id).await);
    assert!(!sessions.delete(&id).await);
    assert!(sessions.load(&id).await.is_none());
}

#[tokio::test]
async fn it_rejects_ids_outside_the_store() -> Result<()> {
    let (dir, sessions) = store();
    let outside = dir.path().join("outside.yaml");
    let mut session = session_fixture("m", "q");
    fs::write(&outside, serde_yaml::to_string(&session)?).await?;

    assert!(sessions.load("../outside").await.is_none());
    assert!(!sessions.delete("../outside").await);
    assert!(!sessions.rename("../outside", "moved").await);
    assert!(sessions.save(&mut session, Some("../outside")).await.is_none());
    assert!(sessions.load("..\\outside").await.is_none());
    assert!(outside.exists());
    assert_eq!(session.session_id, None);

    assert!(Sessions::is_valid_id("20240101_120000_abcdef12"));
    assert!(!Sessions::is_valid_id("a/b"));
    assert!(!Sessions::is_valid_id(""));

    return Ok(());
}

#[tokio::test]
async fn it_deletes_all() {
    let (_dir, sessions) = store();
    sessions.save(&mut session_fixture("m", "a"), None).await.unwrap();
    sessions.save(&mut session_fixture("m", "b"), None).await.unwrap();

    fs::write(sessions.cache_dir.join("notes.txt"), "keep me")
        .await
        .unwrap();

    assert!(sessions.delete_all().await);
    assert!(sessions.list().await.is_empty());
    assert!(sessions.cache_dir.join("notes.txt").exists());
    assert!(sessions.delete_all().await);
}

#[tokio::test]
async fn it_lists_most_recent_first() {
    let (_dir, sessions) = store();
    let mut ids: Vec<String> = vec![];
    for question in ["oldest", "middle", "newest"] {
        let id = sessions
            .save(&mut session_fixture("m", question), None)
            .await
            .unwrap();
        ids.push(id);
        settle().await;
    }

    let summaries = sessions.list().await;
    let titles = summaries
        .iter()
        .map(|e| return e.title.to_string())
        .collect::<Vec<String>>();
    assert_eq!(titles, vec!["newest", "middle", "oldest"]);
    assert!(summaries[0].updated_at > summaries[1].updated_at);
    assert!(summaries[1].updated_at > summaries[2].updated_at);
    assert_eq!(summaries[0].session_id, ids[2]);
}

#[tokio::test]
async fn it_lists_nothing_without_storage_dir() {
    let (_dir, sessions) = store();
    assert!(sessions.list().await.is_empty());
}

#[tokio::test]
async fn it_skips_corrupted_files() -> Result<()> {
    let (_dir, sessions) = store();
    let id = sessions
        .save(&mut session_fixture("m", "good"), None)
        .await
        .unwrap();

    fs::write(
        sessions.cache_dir.join("broken.yaml"),
        corrupted_session_fixture(),
    )
    .await?;
    fs::write(sessions.cache_dir.join("notes.txt"), "not a session").await?;

    let summaries = sessions.list().await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].session_id, id);
    assert!(sessions.load("broken").await.is_none());

    return Ok(());
}

#[tokio::test]
async fn it_loads_sparse_documents() -> Result<()> {
    let (_dir, sessions) = store();
    fs::create_dir_all(&sessions.cache_dir).await?;
    fs::write(
        sessions.cache_dir.join("20240101_120000_abcdef12.yaml"),
        sparse_session_fixture(),
    )
    .await?;

    let loaded = sessions.load("20240101_120000_abcdef12").await.unwrap();
    assert_eq!(loaded.title, "Sparse");
    assert_eq!(loaded.model_config, ModelConfig::default());

    let summaries = sessions.list().await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].model_config.model_name_or_unknown(), "Unknown");

    return Ok(());
}

#[tokio::test]
async fn it_renames_sessions() {
    let (_dir, sessions) = store();
    let mut session = session_fixture("m", "What is Python?");
    let id = sessions.save(&mut session, None).await.unwrap();

    assert!(sessions.rename(&id, "Updated Python Discussion").await);
    let loaded = sessions.load(&id).await.unwrap();
    assert_eq!(loaded.title, "Updated Python Discussion");
    assert!(loaded.updated_at >= session.updated_at);
    assert_eq!(loaded.messages, session.messages);

    assert!(!sessions.rename("missing", "x").await);
}

#[tokio::test]
async fn it_searches_titles() {
    let (_dir, sessions) = store();
    sessions
        .save(&mut session_fixture("m", "Python decorators"), None)
        .await
        .unwrap();
    sessions
        .save(&mut session_fixture("m", "Rust lifetimes"), None)
        .await
        .unwrap();

    let res = sessions.search("PYTHON").await;
    assert_eq!(res.len(), 1);
    assert_eq!(res[0].title, "Python decorators");

    assert_eq!(sessions.search("").await.len(), 2);
    assert!(sessions.search("haskell").await.is_empty());
}

#[tokio::test]
async fn it_exports_markdown() {
    let (_dir, sessions) = store();
    let mut session = session_fixture("Claude 4 Sonnet", "What is Python?");
    let id = sessions.save(&mut session, None).await.unwrap();
    sessions.rename(&id, "Updated Python Discussion").await;

    let markdown = sessions.export_markdown(&id).await.unwrap();
    assert!(markdown.starts_with("# Updated Python Discussion\n\n**Created:** "));
    assert!(markdown.contains("**Model:** Claude 4 Sonnet\n\n---\n\n"));
    assert!(markdown.contains("## User\n\nWhat is Python?\n\n"));
    assert!(markdown.ends_with(&format!("## Assistant\n\n{}\n\n", thinking_fixture())));
}

#[tokio::test]
async fn it_computes_stats() {
    let (_dir, sessions) = store();
    let models = [
        "Claude 4 Sonnet",
        "Claude 3.7 Sonnet",
        "Claude 4 Sonnet",
        "Claude 3.5 Sonnet",
        "Claude 4 Sonnet",
        "Claude 3.7 Sonnet",
    ];
    for (idx, model) in models.iter().enumerate() {
        sessions
            .save(&mut session_fixture(model, &format!("q{idx}")), None)
            .await
            .unwrap();
        settle().await;
    }

    let stats = sessions.stats().await;
    assert_eq!(stats.total_sessions, 6);
    assert_eq!(stats.total_messages, 18);
    assert_eq!(stats.model_usage.values().sum::<usize>(), 6);
    assert_eq!(stats.model_usage["Claude 4 Sonnet"], 3);
    assert_eq!(stats.model_usage["Claude 3.7 Sonnet"], 2);
    assert_eq!(stats.model_usage["Claude 3.5 Sonnet"], 1);
    assert_eq!(stats.recent.len(), 5);
    assert_eq!(stats.recent[0].title, "q5");
}
