use super::{BlogDocument, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The blog collection shared by every store backend. Keyed by id so
/// snapshots come out in creation order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct Collection {
    documents: BTreeMap<ObjectId, BlogDocument>,
}

impl Collection {
    pub(crate) fn insert(&mut self, document: BlogDocument) -> ObjectId {
        let mut id = ObjectId::new();
        while self.documents.contains_key(&id) {
            id = ObjectId::new();
        }
        self.documents.insert(id, document);
        id
    }

    pub(crate) fn find(&self, id: &ObjectId) -> Option<BlogDocument> {
        self.documents.get(id).cloned()
    }

    /// Returns the number of documents replaced (0 or 1).
    pub(crate) fn replace(&mut self, id: &ObjectId, document: BlogDocument) -> u64 {
        match self.documents.get_mut(id) {
            Some(existing) => {
                *existing = document;
                1
            }
            None => 0,
        }
    }

    /// Returns the number of documents removed (0 or 1).
    pub(crate) fn remove(&mut self, id: &ObjectId) -> u64 {
        u64::from(self.documents.remove(id).is_some())
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str) -> BlogDocument {
        BlogDocument {
            author_id: "ada".into(),
            title: title.into(),
            content: "...".into(),
        }
    }

    #[test]
    fn counts_reflect_matches() {
        let mut collection = Collection::default();
        let id = collection.insert(doc("first"));
        let missing = ObjectId::new();

        assert_eq!(collection.replace(&id, doc("second")), 1);
        assert_eq!(collection.replace(&missing, doc("ghost")), 0);
        assert_eq!(collection.find(&id).unwrap().title, "second");

        assert_eq!(collection.remove(&id), 1);
        assert_eq!(collection.remove(&id), 0);
        assert_eq!(collection.len(), 0);
    }
}
