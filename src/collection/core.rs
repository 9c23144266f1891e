use crate::connection::Link;
use crate::types::{CollectionName, DocumentId};
use bson::Document as BsonDocument;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A named set of documents kept in ascending `_id` order.
pub struct Collection {
    pub(crate) name: CollectionName,
    pub(crate) docs: RwLock<BTreeMap<DocumentId, BsonDocument>>,
    pub(crate) link: Arc<Link>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).field("len", &self.docs.read().len()).finish()
    }
}

impl Collection {
    pub(crate) fn new(name: CollectionName, link: Arc<Link>) -> Self {
        Self { name, docs: RwLock::new(BTreeMap::new()), link }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}
