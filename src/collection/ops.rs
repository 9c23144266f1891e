use super::core::Collection;
use crate::errors::DbError;
use crate::journal::{JournalRecord, OpKind};
use crate::query::ID_FIELD;
use crate::types::DocumentId;
use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument};

fn log_audit(op: &str, collection: &str, id: &DocumentId) {
    log::info!(target: "noteful::audit", "op={op} collection={collection} id={}", id.to_hex());
}

/// Rebuild `doc` with `_id` as its first key.
fn with_leading_id(id: DocumentId, doc: BsonDocument) -> BsonDocument {
    let mut out = BsonDocument::new();
    out.insert(ID_FIELD, id);
    for (k, v) in doc {
        if k != ID_FIELD {
            out.insert(k, v);
        }
    }
    out
}

impl Collection {
    /// Insert a document, generating an `_id` when it has none.
    ///
    /// # Errors
    /// `DuplicateKey` if the id is taken, `InvalidQuery` if `_id` is not an object id,
    /// `Connection` if the store is closed or the journal write fails.
    pub fn insert_document(&self, doc: BsonDocument) -> Result<DocumentId, DbError> {
        self.link.ensure_open()?;
        let id = match doc.get(ID_FIELD) {
            None => ObjectId::new(),
            Some(Bson::ObjectId(id)) => *id,
            Some(Bson::String(s)) => crate::types::parse_id(s)?,
            Some(other) => {
                return Err(DbError::InvalidQuery(format!("_id must be an object id, got {other}")));
            }
        };
        let doc = with_leading_id(id, doc);
        let mut docs = self.docs.write();
        if docs.contains_key(&id) {
            return Err(DbError::DuplicateKey(format!("{} _id {}", self.name, id.to_hex())));
        }
        // Persist first, then apply in memory
        self.link.record(&JournalRecord::new(OpKind::Insert, &self.name, &id, Some(&doc))?)?;
        docs.insert(id, doc);
        log_audit("insert", &self.name, &id);
        Ok(id)
    }

    /// # Errors
    /// `Connection` if the store is closed.
    pub fn find_document(&self, id: &DocumentId) -> Result<Option<BsonDocument>, DbError> {
        self.link.ensure_open()?;
        Ok(self.docs.read().get(id).cloned())
    }

    /// Replace the stored document; the stored `_id` always wins over one in `new_doc`.
    ///
    /// # Errors
    /// `Connection` if the store is closed or the journal write fails.
    pub fn update_document(&self, id: &DocumentId, new_doc: BsonDocument) -> Result<bool, DbError> {
        self.link.ensure_open()?;
        let mut docs = self.docs.write();
        if !docs.contains_key(id) {
            return Ok(false);
        }
        let doc = with_leading_id(*id, new_doc);
        self.link.record(&JournalRecord::new(OpKind::Update, &self.name, id, Some(&doc))?)?;
        docs.insert(*id, doc);
        log_audit("update", &self.name, id);
        Ok(true)
    }

    /// # Errors
    /// `Connection` if the store is closed or the journal write fails.
    pub fn delete_document(&self, id: &DocumentId) -> Result<bool, DbError> {
        self.link.ensure_open()?;
        let mut docs = self.docs.write();
        if !docs.contains_key(id) {
            return Ok(false);
        }
        self.link.record(&JournalRecord::new(OpKind::Delete, &self.name, id, None)?)?;
        docs.remove(id);
        log_audit("delete", &self.name, id);
        Ok(true)
    }

    /// Snapshot of every document in natural (`_id`) order.
    ///
    /// # Errors
    /// `Connection` if the store is closed.
    pub fn documents(&self) -> Result<Vec<BsonDocument>, DbError> {
        self.link.ensure_open()?;
        Ok(self.docs.read().values().cloned().collect())
    }

    /// Return only the ids, in natural order.
    ///
    /// # Errors
    /// `Connection` if the store is closed.
    pub fn list_ids(&self) -> Result<Vec<DocumentId>, DbError> {
        self.link.ensure_open()?;
        Ok(self.docs.read().keys().copied().collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Apply a record read back from the journal without re-journaling it.
    pub(crate) fn replay(&self, rec: &JournalRecord) -> Result<(), DbError> {
        let id = crate::types::parse_id(&rec.id).map_err(|e| DbError::Io(e.to_string()))?;
        let mut docs = self.docs.write();
        match rec.op {
            OpKind::Insert | OpKind::Update => {
                let doc = rec
                    .document()?
                    .ok_or_else(|| DbError::Io(format!("journal {:?} record without a document", rec.op)))?;
                docs.insert(id, doc);
            }
            OpKind::Delete => {
                docs.remove(&id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::connection::connect;
    use crate::errors::DbError;
    use crate::types::numbered_id;
    use bson::doc;

    #[test]
    fn insert_generates_id_and_keeps_it_first() {
        let conn = connect("memory://ops").unwrap();
        let col = conn.collection("notes").unwrap();
        let id = col.insert_document(doc! {"title": "a"}).unwrap();
        let stored = col.find_document(&id).unwrap().unwrap();
        assert_eq!(stored.keys().next().map(String::as_str), Some("_id"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let conn = connect("memory://dup").unwrap();
        let col = conn.collection("notes").unwrap();
        col.insert_document(doc! {"_id": numbered_id(1)}).unwrap();
        let err = col.insert_document(doc! {"_id": numbered_id(1)}).unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey(_)));
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn update_cannot_change_id() {
        let conn = connect("memory://upd").unwrap();
        let col = conn.collection("notes").unwrap();
        let id = col.insert_document(doc! {"_id": numbered_id(4), "title": "a"}).unwrap();
        assert!(col.update_document(&id, doc! {"_id": numbered_id(5), "title": "b"}).unwrap());
        let stored = col.find_document(&id).unwrap().unwrap();
        assert_eq!(stored.get("_id"), Some(&bson::Bson::ObjectId(numbered_id(4))));
        assert!(!col.update_document(&numbered_id(99), doc! {}).unwrap());
    }

    #[test]
    fn natural_order_is_id_order() {
        let conn = connect("memory://order").unwrap();
        let col = conn.collection("notes").unwrap();
        for n in [3, 1, 2] {
            col.insert_document(doc! {"_id": numbered_id(n)}).unwrap();
        }
        assert_eq!(col.list_ids().unwrap(), vec![numbered_id(1), numbered_id(2), numbered_id(3)]);
    }
}
