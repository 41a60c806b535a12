//! Write-once persistence of validated subjects.
//!
//! One file per subject id at `{dir}/{id}.json`. A file that already
//! exists is never rewritten, so re-running a sweep over the same range is
//! cheap and cannot clobber earlier results.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::catalog::Subject;

/// Errors that can occur while persisting a subject.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to serialize the subject.
    #[error("failed to serialize subject {id}")]
    Serialize {
        id: u32,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to create the output directory.
    #[error("failed to create directory {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the subject file.
    #[error("failed to write {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a persist call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// A new file was written, carrying this many bytes.
    Written(u64),
    /// The target file already existed and was left untouched.
    AlreadyExists,
}

impl PersistOutcome {
    /// Bytes written by this call; zero for a skip.
    pub fn bytes_written(&self) -> u64 {
        match self {
            Self::Written(bytes) => *bytes,
            Self::AlreadyExists => 0,
        }
    }
}

/// File-system store for validated subjects.
pub struct SubjectStore {
    dir: PathBuf,
}

impl SubjectStore {
    /// Creates a store rooted at the given directory. The directory is
    /// created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store's root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The target path for a subject id.
    pub fn path_for(&self, id: u32) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Persists a subject to its id-keyed file.
    ///
    /// Returns [`PersistOutcome::AlreadyExists`] without touching the file
    /// when the target is already present. Creation is atomic per file
    /// (`create_new`), so two writers racing on the same id cannot corrupt
    /// each other.
    pub async fn persist(&self, subject: &Subject) -> Result<PersistOutcome, StoreError> {
        let path = self.path_for(subject.id);

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::DirectoryCreationFailed {
                path: self.dir.clone(),
                source: e,
            })?;

        let bytes = subject
            .to_pretty_json()
            .map_err(|e| StoreError::Serialize {
                id: subject.id,
                source: e,
            })?;

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(
                    "Subject {} {:?} already exists at {}, skipping",
                    subject.id,
                    subject.display_name(),
                    path.display()
                );
                return Ok(PersistOutcome::AlreadyExists);
            }
            Err(e) => {
                return Err(StoreError::WriteFailed { path, source: e });
            }
        };

        file.write_all(&bytes)
            .await
            .map_err(|e| StoreError::WriteFailed {
                path: path.clone(),
                source: e,
            })?;

        Ok(PersistOutcome::Written(bytes.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SubjectType;
    use tempfile::TempDir;

    fn subject(id: u32, name: &str) -> Subject {
        Subject {
            id,
            kind: SubjectType::Anime,
            name: name.to_string(),
            name_cn: None,
            summary: None,
            air_date: None,
            eps: vec![],
        }
    }

    #[tokio::test]
    async fn test_persist_writes_file() {
        let temp = TempDir::new().unwrap();
        let store = SubjectStore::new(temp.path().join("data"));

        let outcome = store.persist(&subject(10, "A")).await.unwrap();
        let bytes = match outcome {
            PersistOutcome::Written(bytes) => bytes,
            other => panic!("unexpected outcome {:?}", other),
        };

        let path = store.path_for(10);
        assert!(path.exists());
        let content = fs::read(&path).await.unwrap();
        assert_eq!(content.len() as u64, bytes);
    }

    #[tokio::test]
    async fn test_persist_is_write_once() {
        let temp = TempDir::new().unwrap();
        let store = SubjectStore::new(temp.path());

        let first = store.persist(&subject(10, "original")).await.unwrap();
        assert!(matches!(first, PersistOutcome::Written(_)));
        let original = fs::read(store.path_for(10)).await.unwrap();

        let second = store.persist(&subject(10, "changed")).await.unwrap();
        assert_eq!(second, PersistOutcome::AlreadyExists);
        assert_eq!(second.bytes_written(), 0);

        // The original bytes must be untouched.
        let after = fs::read(store.path_for(10)).await.unwrap();
        assert_eq!(original, after);
    }

    #[tokio::test]
    async fn test_persist_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let store = SubjectStore::new(temp.path().join("a").join("b"));

        store.persist(&subject(1, "nested")).await.unwrap();
        assert!(store.path_for(1).exists());
    }

    #[tokio::test]
    async fn test_persisted_content_preserves_non_ascii() {
        let temp = TempDir::new().unwrap();
        let store = SubjectStore::new(temp.path());

        let mut s = subject(42, "カウボーイビバップ");
        s.name_cn = Some("星际牛仔".to_string());
        store.persist(&s).await.unwrap();

        let text = fs::read_to_string(store.path_for(42)).await.unwrap();
        assert!(text.contains("カウボーイビバップ"));
        assert!(text.contains("星际牛仔"));
        assert!(!text.contains("\\u"));
    }
}
