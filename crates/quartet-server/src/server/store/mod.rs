//! Document stores and the entity store adapter.
//!
//! A [`DocumentStore`] is a single collection of blog documents addressed by
//! [`ObjectId`]. Two backends are provided, selected by [`StoreUri`]:
//!
//! - `memory://` - [`MemoryStore`], lost on exit.
//! - `file://<path>` - [`FileStore`], a JSON snapshot on disk.
//!
//! Services never talk to a store directly; they go through
//! [`EntityStore`], which validates identifiers and turns [`StoreError`]s
//! into domain errors.

pub mod adapter;
mod collection;
mod file;
mod memory;
pub mod object_id;

pub use adapter::EntityStore;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use object_id::{ObjectId, ParseObjectIdError};

use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};

/// Failures raised by a [`DocumentStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store is closed")]
    Closed,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid store URI `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("background write failed: {0}")]
    Background(String),
}

/// The stored fields of a blog post. The id is the collection key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogDocument {
    pub author_id: String,
    pub title: String,
    pub content: String,
}

/// A single collection of blog documents.
#[tonic::async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Stores a new document and returns its freshly assigned id.
    async fn insert_one(&self, document: BlogDocument) -> Result<ObjectId, StoreError>;

    async fn find_one(&self, id: ObjectId) -> Result<Option<BlogDocument>, StoreError>;

    /// Replaces the whole document. Returns how many documents were
    /// modified.
    async fn replace_one(&self, id: ObjectId, document: BlogDocument) -> Result<u64, StoreError>;

    /// Returns how many documents were deleted.
    async fn delete_one(&self, id: ObjectId) -> Result<u64, StoreError>;

    /// Releases the store. Every later operation fails with
    /// [`StoreError::Closed`]; closing twice is a no-op.
    async fn close(&self) -> Result<(), StoreError>;
}

/// Connection URI selecting a store backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreUri {
    Memory,
    File(PathBuf),
}

impl FromStr for StoreUri {
    type Err = StoreError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| StoreError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        if uri == "memory://" || uri == "memory" {
            return Ok(Self::Memory);
        }
        match uri.strip_prefix("file://") {
            Some("") => Err(invalid("missing file path")),
            Some(path) => Ok(Self::File(PathBuf::from(path))),
            None => Err(invalid("expected memory:// or file://<path>")),
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory://"),
            Self::File(path) => write!(f, "file://{}", path.display()),
        }
    }
}

/// Opens the store named by `uri`. Called once at startup; the handle is
/// shared by every service.
pub async fn open(uri: &StoreUri) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match uri {
        StoreUri::Memory => Arc::new(MemoryStore::new()),
        StoreUri::File(path) => Arc::new(FileStore::open(path.clone()).await?),
    };
    #[cfg(feature = "tracing")]
    tracing::info!("Document store ready at {uri}");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_schemes() {
        assert_eq!("memory://".parse::<StoreUri>().unwrap(), StoreUri::Memory);
        assert_eq!(
            "file://./data/blogs.json".parse::<StoreUri>().unwrap(),
            StoreUri::File(PathBuf::from("./data/blogs.json"))
        );
        assert_eq!(
            StoreUri::File(PathBuf::from("/var/blogs.json")).to_string(),
            "file:///var/blogs.json"
        );
    }

    #[test]
    fn rejects_unknown_schemes() {
        for uri in ["mongodb://localhost:27017", "file://", "blogs.json"] {
            assert!(
                matches!(uri.parse::<StoreUri>(), Err(StoreError::InvalidUri { .. })),
                "{uri}"
            );
        }
    }

    #[tokio::test]
    async fn open_memory_store() {
        let store = open(&StoreUri::Memory).await.unwrap();
        let id = store.insert_one(BlogDocument::default()).await.unwrap();
        assert_eq!(store.delete_one(id).await.unwrap(), 1);
    }
}
