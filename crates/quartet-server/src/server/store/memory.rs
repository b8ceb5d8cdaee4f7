use super::{BlogDocument, DocumentStore, ObjectId, StoreError, collection::Collection};
use parking_lot::RwLock;

/// In-process store selected by `memory://`. Contents are lost when the
/// process exits.
#[derive(Debug)]
pub struct MemoryStore {
    // `None` once closed.
    state: RwLock<Option<Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Some(Collection::default())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[tonic::async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, document: BlogDocument) -> Result<ObjectId, StoreError> {
        let mut state = self.state.write();
        let collection = state.as_mut().ok_or(StoreError::Closed)?;
        Ok(collection.insert(document))
    }

    async fn find_one(&self, id: ObjectId) -> Result<Option<BlogDocument>, StoreError> {
        let state = self.state.read();
        let collection = state.as_ref().ok_or(StoreError::Closed)?;
        Ok(collection.find(&id))
    }

    async fn replace_one(&self, id: ObjectId, document: BlogDocument) -> Result<u64, StoreError> {
        let mut state = self.state.write();
        let collection = state.as_mut().ok_or(StoreError::Closed)?;
        Ok(collection.replace(&id, document))
    }

    async fn delete_one(&self, id: ObjectId) -> Result<u64, StoreError> {
        let mut state = self.state.write();
        let collection = state.as_mut().ok_or(StoreError::Closed)?;
        Ok(collection.remove(&id))
    }

    async fn close(&self) -> Result<(), StoreError> {
        if let Some(_collection) = self.state.write().take() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Closed memory store with {} documents", _collection.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> BlogDocument {
        BlogDocument {
            author_id: "grace".into(),
            title: "Compilers".into(),
            content: "A-0".into(),
        }
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let store = MemoryStore::new();
        let id = store.insert_one(doc()).await.unwrap();
        assert_eq!(store.find_one(id).await.unwrap(), Some(doc()));

        let updated = BlogDocument {
            title: "COBOL".into(),
            ..doc()
        };
        assert_eq!(store.replace_one(id, updated.clone()).await.unwrap(), 1);
        assert_eq!(store.find_one(id).await.unwrap(), Some(updated));

        assert_eq!(store.delete_one(id).await.unwrap(), 1);
        assert_eq!(store.find_one(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn operations_fail_after_close() {
        let store = MemoryStore::new();
        let id = store.insert_one(doc()).await.unwrap();
        store.close().await.unwrap();
        store.close().await.unwrap();

        assert!(matches!(store.find_one(id).await, Err(StoreError::Closed)));
        assert!(matches!(store.insert_one(doc()).await, Err(StoreError::Closed)));
        assert!(matches!(store.delete_one(id).await, Err(StoreError::Closed)));
    }
}
