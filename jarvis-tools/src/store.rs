//! Flat JSON documents on disk.
//!
//! Each store is one file, rewritten in full on every save. Clones of a store
//! share one async mutex, so every front end in the process goes through a
//! single writer for read-modify-write. Separate processes writing the same
//! file still race; the last write wins.
//!
//! List documents load entry by entry: a malformed entry is skipped and the
//! original file is backed up, while the remaining entries stay usable.

use crate::error::{Result, ToolError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A value that can live in a [`JsonStore`].
pub trait Document: Serialize + DeserializeOwned + Default {
    /// Decode a parsed file, returning the document and how many entries were dropped.
    fn decode(value: Value) -> serde_json::Result<(Self, usize)> {
        serde_json::from_value(value).map(|doc| (doc, 0))
    }
}

impl<E> Document for Vec<E>
where
    E: Serialize + DeserializeOwned,
{
    fn decode(value: Value) -> serde_json::Result<(Self, usize)> {
        let Value::Array(items) = value else {
            return serde_json::from_value(value).map(|doc| (doc, 0));
        };
        let mut doc = Vec::with_capacity(items.len());
        let mut dropped = 0;
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value(item) {
                Ok(entry) => doc.push(entry),
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping malformed store entry");
                    dropped += 1;
                }
            }
        }
        Ok((doc, dropped))
    }
}

pub struct JsonStore<T> {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    _doc: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonStore<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            lock: self.lock.clone(),
            _doc: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for JsonStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore").field("path", &self.path).finish()
    }
}

impl<T: Document> JsonStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents. Missing or unreadable files load as the empty document.
    pub async fn load(&self) -> T {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    /// Overwrite the file with `value`.
    pub async fn save(&self, value: &T) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_unlocked(value).await
    }

    /// Load, mutate and save while holding the store lock. Nothing is written if `f` fails.
    pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_unlocked().await;
        let out = f(&mut doc)?;
        self.write_unlocked(&doc).await?;
        Ok(out)
    }

    async fn read_unlocked(&self) -> T {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "store unreadable; using empty state");
                return T::default();
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return T::default();
        }
        let decoded = serde_json::from_slice::<Value>(&bytes).and_then(T::decode);
        match decoded {
            Ok((doc, 0)) => doc,
            Ok((doc, dropped)) => {
                let backup = self.backup_corrupt().await;
                tracing::warn!(
                    path = %self.path.display(),
                    backup = ?backup,
                    dropped,
                    "store has malformed entries; keeping the rest"
                );
                doc
            }
            Err(e) => {
                let backup = self.backup_corrupt().await;
                tracing::warn!(
                    path = %self.path.display(),
                    backup = ?backup,
                    error = %e,
                    "store is corrupted; using empty state"
                );
                T::default()
            }
        }
    }

    async fn backup_corrupt(&self) -> Option<PathBuf> {
        let ts = chrono::Utc::now().timestamp();
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".corrupt.{ts}"));
        let backup = PathBuf::from(name);
        match tokio::fs::copy(&self.path, &backup).await {
            Ok(_) => Some(backup),
            Err(e) => {
                tracing::warn!(error = %e, "could not back up corrupted store");
                None
            }
        }
    }

    async fn write_unlocked(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_vec_pretty(value)
            .map_err(|e| ToolError::ExecutionFailed(format!("serialize store: {e}")))?;
        tokio::fs::write(&self.path, body).await?;
        tracing::debug!(path = %self.path.display(), "store saved");
        Ok(())
    }
}
