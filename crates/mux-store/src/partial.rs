//! Single-slot partial-message snapshot, written on every stream delta so a
//! crash mid-stream leaves a resumable in-progress message instead of nothing.

use crate::error::Result;
use crate::error::StoreError;
use crate::history::HistoryStore;
use async_trait::async_trait;
use mux_protocol::Message;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[async_trait]
pub trait PartialStore: Send + Sync {
    async fn write(&self, message: &Message) -> Result<()>;
    async fn read(&self) -> Result<Option<Message>>;
    async fn delete(&self) -> Result<()>;

    /// Atomically moves whatever partial snapshot exists into `history` and
    /// clears the slot. No-op if there is nothing to commit.
    async fn commit_to_history(&self, history: &dyn HistoryStore) -> Result<()>;
}

pub struct FilePartialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FilePartialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_locked(&self) -> Result<Option<Message>> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let message = serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                    path: self.path.clone(),
                    source,
                })?;
                Ok(Some(message))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[async_trait]
impl PartialStore for FilePartialStore {
    async fn write(&self, message: &Message) -> Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec(message).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        file.write_all(&body).await.map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        file.sync_all().await.map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }

    async fn read(&self) -> Result<Option<Message>> {
        let _guard = self.lock.lock().await;
        self.read_locked().await
    }

    async fn delete(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn commit_to_history(&self, history: &dyn HistoryStore) -> Result<()> {
        let _guard = self.lock.lock().await;
        let Some(message) = self.read_locked().await? else {
            return Ok(());
        };
        history.append(message).await?;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
