//! # Domain Types
//!
//! The generated [`Blog`](crate::proto::Blog) message uses an empty string
//! for "no id". Handlers work with [`Entity`] instead, where the identifier
//! is an `Option<String>` and absence means the entity has not been
//! persisted yet.
//!
//! The identifier is opaque at this layer. Whether a string is a valid
//! identifier is decided by the entity store, never by callers.

use crate::proto::Blog;

/// A blog post as seen by the service handlers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entity {
    /// Store-assigned identifier; `None` until the entity is created.
    pub id: Option<String>,
    pub author_id: String,
    pub title: String,
    pub content: String,
}

impl Entity {
    pub fn new(
        author_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            author_id: author_id.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    /// Returns a copy carrying the given identifier.
    pub fn with_id(self, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..self
        }
    }

    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

impl From<Blog> for Entity {
    fn from(blog: Blog) -> Self {
        Self {
            id: (!blog.id.is_empty()).then_some(blog.id),
            author_id: blog.author_id,
            title: blog.title,
            content: blog.content,
        }
    }
}

impl From<Entity> for Blog {
    fn from(entity: Entity) -> Self {
        Self {
            id: entity.id.unwrap_or_default(),
            author_id: entity.author_id,
            title: entity.title,
            content: entity.content,
        }
    }
}
