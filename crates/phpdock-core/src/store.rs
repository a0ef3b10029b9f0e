//! Versioned JSON document store.
//!
//! Each persisted map (projects, services) lives in its own JSON document
//! carrying a schema-version string and a last-updated timestamp. Saves
//! write to a temp path and atomically rename over the target, which
//! prevents partial-write corruption. This does not provide cross-process
//! locking; in-process writers serialize because each save is awaited
//! behind a mutex before the next begins.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Schema version written by this build.
const SCHEMA_VERSION: &str = "1";

#[derive(Debug, Deserialize)]
struct Document<T> {
    schema_version: String,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
    data: T,
}

#[derive(Serialize)]
struct DocumentRef<'a, T> {
    schema_version: &'a str,
    updated_at: DateTime<Utc>,
    data: &'a T,
}

/// A single JSON document persisted atomically.
pub struct JsonStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Creates a store backed by the given file path. The file need not
    /// exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()), _marker: PhantomData }
    }

    /// Returns the backing path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document, or returns `T::default()` if the file does not
    /// exist yet.
    pub async fn load_or_default(&self) -> Result<T, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let doc: Document<T> = serde_json::from_slice(&bytes)?;
                if doc.schema_version != SCHEMA_VERSION {
                    return Err(StoreError::SchemaVersion {
                        found: doc.schema_version,
                        expected: SCHEMA_VERSION.to_string(),
                    });
                }
                Ok(doc.data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Saves the document atomically: write to `<path>.tmp`, then rename.
    pub async fn save(&self, data: &T) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let doc = DocumentRef { schema_version: SCHEMA_VERSION, updated_at: Utc::now(), data };
        let json = serde_json::to_vec_pretty(&doc)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &json).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
