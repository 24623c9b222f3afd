//! Session storage — Load/Save capability keyed by an identity token.
//!
//! Backends never interpret session bytes. The file backend lays out one
//! file per identity, named by the BLAKE3 hash of the identity so that bot
//! tokens never appear on disk:
//!   {root}/{hash[0..2]}/{full_hash}.session

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;

use courier_core::Session;

#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// `Ok(None)` when nothing has been saved for `identity`.
    async fn load(&self, identity: &str) -> Result<Option<Session>>;

    async fn save(&self, identity: &str, session: &Session) -> Result<()>;
}

pub type SharedStorage = Arc<dyn SessionStorage>;

/// Storage key for `token` under a namespace, e.g. `botsession:<token>`.
pub fn session_key(prefix: &str, token: &str) -> String {
    format!("{prefix}:{token}")
}

/// A storage backend bound to one identity.
#[derive(Clone)]
pub struct SessionStore {
    storage: SharedStorage,
    key: String,
}

impl SessionStore {
    pub fn new(storage: SharedStorage, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn load(&self) -> Result<Option<Session>> {
        self.storage.load(&self.key).await
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        self.storage.save(&self.key, session).await
    }
}

// ── In-memory ─────────────────────────────────────────────────────────────────

/// Process-local storage. Clones share the same table.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn load(&self, identity: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(identity).map(|s| s.value().clone()))
    }

    async fn save(&self, identity: &str, session: &Session) -> Result<()> {
        self.sessions.insert(identity.to_string(), session.clone());
        Ok(())
    }
}

// ── File-backed ───────────────────────────────────────────────────────────────

/// Distinguishes temp files of concurrent writes within this process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create session root: {}", root.display()))?;
        Ok(Self { root })
    }

    fn session_path(&self, identity: &str) -> PathBuf {
        let hex = hex::encode(blake3::hash(identity.as_bytes()).as_bytes());
        self.root.join(&hex[0..2]).join(format!("{hex}.session"))
    }
}

#[async_trait]
impl SessionStorage for FileStorage {
    async fn load(&self, identity: &str) -> Result<Option<Session>> {
        let path = self.session_path(identity);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Session::new(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read session: {}", path.display()))
            }
        }
    }

    /// Writes are atomic: temp file, sync, rename. Concurrent saves for one
    /// identity each use their own temp file; the last rename wins.
    async fn save(&self, identity: &str, session: &Session) -> Result<()> {
        let path = self.session_path(identity);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create session dir: {}", parent.display()))?;
        }

        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!("{}.{seq}.tmp", std::process::id()));
        {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::File::create(&tmp_path)
                .await
                .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
            file.write_all(session.as_bytes())
                .await
                .context("failed to write session data")?;
            file.sync_all().await.context("failed to sync session to disk")?;
        }

        tokio::fs::rename(&tmp_path, &path).await.with_context(|| {
            format!("failed to rename {} to {}", tmp_path.display(), path.display())
        })?;

        tracing::debug!(path = %path.display(), len = session.len(), "session saved");
        Ok(())
    }
}
