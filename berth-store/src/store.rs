use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;
use tracing::trace;

use super::fs::safe_write_all;

/// The error type for store operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// The requested key has no stored record.
    #[error("no record for key `{key}`")]
    NotFound { key: String },

    #[error("key must be a plain name without path separators")]
    InvalidKey,
}

impl Error {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A specialized [`Result`] type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A filesystem backed store for JSON records.
///
/// See the crate documentation for more info.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    // Constructs the full path for a given key. Keys are plain names;
    // anything that would escape the root directory is rejected.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(Error::InvalidKey);
        }
        Ok(self.root.join(key).with_extension("json"))
    }

    /// Create or update the record stored under the given key.
    ///
    /// Note that while writes are atomic, concurrent usage of a store may
    /// result in data loss. Same with two different stores on the same
    /// root path.
    pub async fn write<V: Serialize>(&self, key: &str, value: &V) -> Result<()> {
        let full_path = self.path_for(key)?;

        // ensure the root exists, this will fail if the root
        // exists but is not a directory
        fs::create_dir_all(&self.root).await?;

        let buf = serde_json::to_vec(value)?;
        trace!("writing {}", full_path.display());
        safe_write_all(full_path, &buf).await?;
        Ok(())
    }

    /// Read the record stored under the given key.
    ///
    /// A missing record surfaces as [`Error::NotFound`] so that callers
    /// can branch on [`Error::is_not_found`] rather than probing message
    /// text.
    pub async fn read<V: DeserializeOwned>(&self, key: &str) -> Result<V> {
        let full_path = self.path_for(key)?;
        trace!("reading {}", full_path.display());

        match fs::read_to_string(&full_path).await {
            Ok(contents) => {
                let value = serde_json::from_str::<V>(&contents)?;
                Ok(value)
            }
            Err(err) => match err.kind() {
                io::ErrorKind::NotFound => Err(Error::NotFound {
                    key: key.to_owned(),
                }),
                _ => Err(err.into()),
            },
        }
    }

    /// Delete the record stored under the given key.
    ///
    /// This operation is idempotent - deleting a non-existent record
    /// succeeds. Returns whether a record was actually deleted.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full_path = self.path_for(key)?;
        trace!("removing {}", full_path.display());
        match fs::remove_file(full_path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// List the keys of all stored records.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut dir_entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) => match err.kind() {
                io::ErrorKind::NotFound => return Ok(Vec::new()),
                _ => return Err(err.into()),
            },
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir_entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            // ignore non-unicode names
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_owned());
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
    struct Record {
        name: String,
        tag: String,
    }

    fn record(name: &str) -> Record {
        Record {
            name: name.to_owned(),
            tag: "latest".to_owned(),
        }
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        store.write("redis", &record("redis")).await.unwrap();
        let loaded: Record = store.read("redis").await.unwrap();

        assert_eq!(loaded, record("redis"));
    }

    #[tokio::test]
    async fn read_of_missing_key_is_typed_not_found() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        let err = store.read::<Record>("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn write_overwrites_existing_record() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        store.write("redis", &record("redis")).await.unwrap();
        let updated = Record {
            name: "redis".to_owned(),
            tag: "7.2".to_owned(),
        };
        store.write("redis", &updated).await.unwrap();

        let loaded: Record = store.read("redis").await.unwrap();
        assert_eq!(loaded.tag, "7.2");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        store.write("redis", &record("redis")).await.unwrap();
        assert!(store.delete("redis").await.unwrap());
        assert!(!store.delete("redis").await.unwrap());

        let err = store.read::<Record>("redis").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_returns_sorted_keys() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        store.write("web", &record("web")).await.unwrap();
        store.write("db", &record("db")).await.unwrap();

        let keys = store.list().await.unwrap();
        assert_eq!(keys, vec!["db".to_owned(), "web".to_owned()]);
    }

    #[tokio::test]
    async fn list_of_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().join("nested"));

        let keys = store.list().await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn keys_with_path_separators_are_rejected() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        let err = store.write("../escape", &record("x")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidKey));

        let err = store.read::<Record>("a/b").await.unwrap_err();
        assert!(matches!(err, Error::InvalidKey));
    }

    #[tokio::test]
    async fn forward_compat_ignores_unknown_fields() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        // a record written by a newer version with extra fields
        let value = serde_json::json!({
            "name": "redis",
            "tag": "latest",
            "added_later": { "nested": true },
        });
        store.write("redis", &value).await.unwrap();

        let loaded: Record = store.read("redis").await.unwrap();
        assert_eq!(loaded, record("redis"));
    }
}
