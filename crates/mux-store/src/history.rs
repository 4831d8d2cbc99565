//! Append-only per-workspace history log. `append` never rewrites the file;
//! `truncate_after` and `replace_all` do, but always via write-temp-then-rename
//! so a crash mid-write leaves either the old file or the new one, never a
//! half-written one.

use crate::error::Result;
use crate::error::StoreError;
use async_trait::async_trait;
use mux_protocol::Message;
use mux_protocol::MessageId;
use std::path::Path;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Assigns the next `history_sequence` and appends. Returns the assigned sequence.
    async fn append(&self, message: Message) -> Result<u64>;

    async fn read(&self) -> Result<Vec<Message>>;

    /// Drops every message with `history_sequence` greater than the one belonging
    /// to `id`, inclusive of nothing after it. Used by edit-then-send.
    async fn truncate_after(&self, id: MessageId) -> Result<()>;

    /// Replaces the entire log with `messages`, renumbering `history_sequence`
    /// from zero. Used by compaction's atomic history replace.
    async fn replace_all(&self, messages: Vec<Message>) -> Result<()>;
}

pub struct FileHistoryStore {
    path: PathBuf,
    next_sequence: Mutex<u64>,
}

impl FileHistoryStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let next_sequence = match fs::read_to_string(&path).await {
            Ok(contents) => {
                let mut max_seq: Option<u64> = None;
                for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                    let message: Message =
                        serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
                            path: path.clone(),
                            source,
                        })?;
                    max_seq = Some(max_seq.map_or(message.history_sequence, |m| {
                        m.max(message.history_sequence)
                    }));
                }
                max_seq.map_or(0, |m| m + 1)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self {
            path,
            next_sequence: Mutex::new(next_sequence),
        })
    }

    async fn read_lines(path: &Path) -> Result<Vec<Message>> {
        match fs::read_to_string(path).await {
            Ok(contents) => contents
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|line| {
                    serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
                        path: path.to_path_buf(),
                        source,
                    })
                })
                .collect(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn atomic_rewrite(&self, messages: &[Message]) -> Result<()> {
        let tmp_path = self.path.with_extension("jsonl.tmp");
        let mut buf = String::new();
        for message in messages {
            buf.push_str(&serde_json::to_string(message).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?);
            buf.push('\n');
        }
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|source| StoreError::Io {
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
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(&self, mut message: Message) -> Result<u64> {
        let mut next = self.next_sequence.lock().await;
        message.history_sequence = *next;
        let line = serde_json::to_string(&message).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;
        file.write_all(b"\n").await.map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        file.sync_all().await.map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        *next += 1;
        Ok(message.history_sequence)
    }

    async fn read(&self) -> Result<Vec<Message>> {
        Self::read_lines(&self.path).await
    }

    async fn truncate_after(&self, id: MessageId) -> Result<()> {
        let mut next = self.next_sequence.lock().await;
        let existing = Self::read_lines(&self.path).await?;
        let cut = existing
            .iter()
            .position(|m| m.id == id)
            .ok_or(StoreError::MessageNotFound(id))?;
        let kept: Vec<Message> = existing.into_iter().take(cut + 1).collect();
        *next = kept
            .last()
            .map_or(0, |m| m.history_sequence + 1);
        self.atomic_rewrite(&kept).await
    }

    async fn replace_all(&self, mut messages: Vec<Message>) -> Result<()> {
        let mut next = self.next_sequence.lock().await;
        for (seq, message) in messages.iter_mut().enumerate() {
            message.history_sequence = seq as u64;
        }
        *next = messages.len() as u64;
        self.atomic_rewrite(&messages).await
    }
}
