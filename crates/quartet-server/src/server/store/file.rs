use super::{BlogDocument, DocumentStore, ObjectId, StoreError, collection::Collection};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;

/// Store selected by `file://<path>`.
///
/// The whole collection is kept in memory and written out as a JSON
/// snapshot after every mutation. The snapshot is written to a temp file in
/// the same directory and renamed over the old one, so a crash leaves
/// either the previous or the new snapshot on disk. A mutation only takes
/// effect once its snapshot has been persisted, and once started it runs to
/// completion even if the caller goes away.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // `None` once closed. A tokio mutex because it is held across the
    // snapshot write; shared so a commit task can own the guard.
    state: Arc<Mutex<Option<Collection>>>,
}

impl FileStore {
    /// Opens the snapshot at `path`. A missing file is an empty collection.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let collection = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Collection::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Collection::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Opened file store at {} with {} documents",
            path.display(),
            collection.len()
        );

        Ok(Self {
            path,
            state: Arc::new(Mutex::new(Some(collection))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `mutate` to a copy of the collection, persists the copy, and
    /// only then swaps it in.
    ///
    /// The commit runs on its own task holding the lock, so disk and memory
    /// never disagree when the calling future is dropped mid-write.
    async fn mutate<T: Send + 'static>(
        &self,
        mutate: impl FnOnce(&mut Collection) -> T + Send + 'static,
    ) -> Result<T, StoreError> {
        let mut state = Arc::clone(&self.state).lock_owned().await;
        let path = self.path.clone();

        tokio::spawn(async move {
            let current = state.as_ref().ok_or(StoreError::Closed)?;
            let mut next = current.clone();
            let out = mutate(&mut next);
            persist(path, &next).await?;
            *state = Some(next);
            Ok::<_, StoreError>(out)
        })
        .await
        .map_err(|e| StoreError::Background(e.to_string()))?
    }
}

async fn persist(path: PathBuf, collection: &Collection) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(collection)?;
    tokio::task::spawn_blocking(move || atomic_write(&path, &bytes))
        .await
        .map_err(|e| StoreError::Background(e.to_string()))?
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(io_err)?;
    let temp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    std::fs::write(temp.path(), data).map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[tonic::async_trait]
impl DocumentStore for FileStore {
    async fn insert_one(&self, document: BlogDocument) -> Result<ObjectId, StoreError> {
        self.mutate(move |collection| collection.insert(document))
            .await
    }

    async fn find_one(&self, id: ObjectId) -> Result<Option<BlogDocument>, StoreError> {
        let state = self.state.lock().await;
        let collection = state.as_ref().ok_or(StoreError::Closed)?;
        Ok(collection.find(&id))
    }

    async fn replace_one(&self, id: ObjectId, document: BlogDocument) -> Result<u64, StoreError> {
        self.mutate(move |collection| collection.replace(&id, document))
            .await
    }

    async fn delete_one(&self, id: ObjectId) -> Result<u64, StoreError> {
        self.mutate(move |collection| collection.remove(&id)).await
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(collection) = state.take() {
            // Every mutation is already on disk; this just leaves a final
            // snapshot behind even if the file was removed underneath us.
            persist(self.path.clone(), &collection).await?;
            #[cfg(feature = "tracing")]
            tracing::info!("Closed file store at {}", self.path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str) -> BlogDocument {
        BlogDocument {
            author_id: "linus".into(),
            title: title.into(),
            content: "git".into(),
        }
    }

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blogs.json");

        let store = FileStore::open(&path).await.unwrap();
        let kept = store.insert_one(doc("kept")).await.unwrap();
        let dropped = store.insert_one(doc("dropped")).await.unwrap();
        assert_eq!(store.delete_one(dropped).await.unwrap(), 1);
        assert_eq!(store.replace_one(kept, doc("edited")).await.unwrap(), 1);
        store.close().await.unwrap();

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.find_one(kept).await.unwrap(), Some(doc("edited")));
        assert_eq!(reopened.find_one(dropped).await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nested/new.json"))
            .await
            .unwrap();
        assert_eq!(store.find_one(ObjectId::new()).await.unwrap(), None);
        store.insert_one(doc("first")).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blogs.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            FileStore::open(&path).await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn abandoned_write_still_commits_before_the_next_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blogs.json");
        let store = FileStore::open(&path).await.unwrap();

        // Drop the insert after its first poll, while the snapshot write is
        // still in flight.
        tokio::select! {
            biased;
            _ = store.insert_one(doc("abandoned")) => {}
            () = std::future::ready(()) => {}
        }
        let kept = store.insert_one(doc("kept")).await.unwrap();
        store.close().await.unwrap();

        let snapshot: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(snapshot.as_object().unwrap().len(), 2);

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.find_one(kept).await.unwrap(), Some(doc("kept")));
    }

    #[tokio::test]
    async fn closed_store_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("blogs.json")).await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(
            store.insert_one(doc("late")).await,
            Err(StoreError::Closed)
        ));
    }
}
