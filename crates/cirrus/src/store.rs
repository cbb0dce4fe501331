//! JSON-file session store.
//!
//! One file per session under a state directory. Suitable for a single
//! operator host; a server deployment swaps in a database-backed
//! implementation of the same trait.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use deploy::{ConfigDocument, DeployError, SessionState, SessionStateStore};

/// Persisted per-session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    state: SessionState,
    config: Option<ConfigDocument>,
    updated_at: DateTime<Utc>,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            state: SessionState::NotQueried,
            config: None,
            updated_at: Utc::now(),
        }
    }
}

/// Session store backed by one JSON file per session.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`. The directory is created on
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    async fn load(&self, session_id: &str) -> Result<SessionRecord, DeployError> {
        let path = self.path(session_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let record = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt session record at {}", path.display()))?;
                Ok(record)
            }
            // A session nobody has touched yet starts NotQueried.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(SessionRecord::default())
            }
            Err(err) => Err(anyhow::Error::from(err)
                .context(format!("failed to read {}", path.display()))
                .into()),
        }
    }

    async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), DeployError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create state dir {}", self.dir.display()))?;
        let raw = serde_json::to_string_pretty(record).context("failed to encode session record")?;
        tokio::fs::write(self.path(session_id), raw)
            .await
            .with_context(|| format!("failed to write session {session_id}"))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStateStore for JsonFileStore {
    async fn get_state(&self, session_id: &str) -> Result<SessionState, DeployError> {
        Ok(self.load(session_id).await?.state)
    }

    async fn set_state(&self, session_id: &str, state: SessionState) -> Result<(), DeployError> {
        let mut record = self.load(session_id).await?;
        record.state = state;
        record.updated_at = Utc::now();
        self.save(session_id, &record).await
    }

    async fn get_config(&self, session_id: &str) -> Result<ConfigDocument, DeployError> {
        let record = self.load(session_id).await?;
        let mut config = record
            .config
            .ok_or_else(|| anyhow::anyhow!("no configuration stored for session {session_id}"))?;
        // Older records can carry unnamed documents; derive a stable
        // name from the session id instead of failing.
        if config.name.is_empty() {
            config = ConfigDocument::new(derived_name(session_id), config.body);
            self.set_config(session_id, &config).await?;
        }
        Ok(config)
    }

    async fn set_config(
        &self,
        session_id: &str,
        config: &ConfigDocument,
    ) -> Result<(), DeployError> {
        let mut record = self.load(session_id).await?;
        record.config = Some(config.clone());
        record.updated_at = Utc::now();
        self.save(session_id, &record).await
    }
}

/// Stable configuration name derived from the session id.
fn derived_name(session_id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    session_id.hash(&mut hasher);
    format!("stack-{:x}", hasher.finish())
}

/// List session ids present in a state directory.
pub fn list_sessions(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut sessions = vec![];
    if !dir.exists() {
        return Ok(sessions);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                sessions.push(stem.to_string());
            }
        }
    }
    sessions.sort();
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_session_starts_not_queried() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let state = store.get_state("fresh").await.unwrap();
        assert_eq!(state, SessionState::NotQueried);
    }

    #[tokio::test]
    async fn test_state_and_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let doc = ConfigDocument::new("load-test", "resource \"a\" {}");
        store.set_config("sess", &doc).await.unwrap();
        store
            .set_state("sess", SessionState::Queried)
            .await
            .unwrap();

        assert_eq!(store.get_state("sess").await.unwrap(), SessionState::Queried);
        assert_eq!(store.get_config("sess").await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_unnamed_config_gets_derived_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store
            .set_config("sess", &ConfigDocument::new("", "resource \"a\" {}"))
            .await
            .unwrap();

        let config = store.get_config("sess").await.unwrap();
        assert!(config.name.starts_with("stack-"));
        // The derived name is persisted, not recomputed.
        assert_eq!(store.get_config("sess").await.unwrap().name, config.name);
    }

    #[tokio::test]
    async fn test_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.get_config("empty").await.is_err());
    }

    #[test]
    fn test_list_sessions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert_eq!(list_sessions(dir.path()).unwrap(), vec!["a", "b"]);
    }
}
