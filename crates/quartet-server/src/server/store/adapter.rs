//! Maps CRUD intents onto a [`DocumentStore`].
//!
//! Identifiers are validated here, before the store is touched, so a
//! malformed id is always `InvalidArgument` and never reaches the backend.
//! Store failures are flattened into [`Error::Store`].

use super::{BlogDocument, DocumentStore, ObjectId, StoreError};
use quartet_core::{Error, Result, types::Entity};
use std::sync::Arc;

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::Store {
            context: err.to_string(),
        }
    }
}

/// CRUD over blog entities.
#[derive(Clone)]
pub struct EntityStore {
    store: Arc<dyn DocumentStore>,
}

impl EntityStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persists a new entity. Any id carried by `entity` is ignored; the
    /// returned entity carries the store-assigned one.
    pub async fn create(&self, entity: Entity) -> Result<Entity> {
        let id = self.store.insert_one(to_document(&entity)).await?;
        Ok(entity.with_id(id.to_string()))
    }

    pub async fn read(&self, id: &str) -> Result<Entity> {
        let oid = parse_id(id)?;
        let document = self
            .store
            .find_one(oid)
            .await?
            .ok_or_else(|| Error::not_found(format!("Cannot find blog with id {oid}")))?;
        Ok(from_document(oid, document))
    }

    /// Replaces every field but the id.
    pub async fn update(&self, entity: Entity) -> Result<Entity> {
        let oid = parse_id(entity.id.as_deref().unwrap_or_default())?;
        let modified = self.store.replace_one(oid, to_document(&entity)).await?;
        if modified == 0 {
            return Err(Error::not_found(format!("Cannot find blog with id {oid}")));
        }
        Ok(entity.with_id(oid.to_string()))
    }

    /// Returns the id of the deleted entity.
    pub async fn delete(&self, id: &str) -> Result<String> {
        let oid = parse_id(id)?;
        let deleted = self.store.delete_one(oid).await?;
        if deleted == 0 {
            return Err(Error::not_found(format!("Cannot find blog with id {oid}")));
        }
        Ok(oid.to_string())
    }
}

fn parse_id(id: &str) -> Result<ObjectId> {
    id.parse()
        .map_err(|e| Error::invalid_argument(format!("Cannot parse blog id `{id}`: {e}")))
}

fn to_document(entity: &Entity) -> BlogDocument {
    BlogDocument {
        author_id: entity.author_id.clone(),
        title: entity.title.clone(),
        content: entity.content.clone(),
    }
}

fn from_document(id: ObjectId, document: BlogDocument) -> Entity {
    Entity::new(document.author_id, document.title, document.content).with_id(id.to_string())
}
