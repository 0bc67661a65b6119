//! Session persistence collaborators.
//!
//! A store holds one snapshot: the latest saved [`Session`]. Loading yields a
//! [`SessionPatch`] so callers merge it over defaults and never trust it blindly.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::PersistenceError;
use crate::session::{Session, SessionPatch};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The saved snapshot, or `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<SessionPatch>, PersistenceError>;

    /// Replace the saved snapshot with `session`.
    async fn save(&self, session: &Session) -> Result<(), PersistenceError>;

    /// Merge `patch` over the saved snapshot and save the result.
    async fn merge(&self, patch: SessionPatch) -> Result<Session, PersistenceError> {
        let current = match self.load().await? {
            Some(saved) => Session::restore(saved)?,
            None => Session::default(),
        };
        let merged = current.merge(patch)?;
        self.save(&merged).await?;
        Ok(merged)
    }

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// In-process store; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RwLock<Option<SessionPatch>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self) -> Result<Option<SessionPatch>, PersistenceError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        *self.snapshot.write().await = Some(SessionPatch::from(session));
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Stores the snapshot as a JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn load(&self) -> Result<Option<SessionPatch>, PersistenceError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&contents)?)
    }

    async fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(&SessionPatch::from(session))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write beside the target then rename, so readers never see half a file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Talks to a remote persistence endpoint: `GET` loads, `POST` saves.
///
/// The endpoint answers `GET` with a snapshot or `null`.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    url: String,
}

impl HttpStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SessionStore for HttpStore {
    async fn load(&self) -> Result<Option<SessionPatch>, PersistenceError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(PersistenceError::Status(response.status().as_u16()));
        }
        Ok(response.json::<Option<SessionPatch>>().await?)
    }

    async fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SessionPatch::from(session))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PersistenceError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("http:{}", self.url)
    }
}
