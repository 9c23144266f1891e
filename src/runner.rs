//! Typed query execution over one model's collection.

use crate::collection::Collection;
use crate::connection::Connection;
use crate::document::Model;
use crate::errors::DbError;
use crate::query::{
    self, DeleteReport, Filter, FindOptions, ID_FIELD, MAX_LIMIT, Patch, Projection, UpdateReport,
};
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Return the document as it is after the update instead of an acknowledgement.
    pub return_updated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome<M> {
    Document(M),
    Acknowledged(UpdateReport),
}

/// Normalized result of any operation, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult<M> {
    Documents(Vec<M>),
    Document(Option<M>),
    Count(u64),
    Updated(UpdateReport),
    Deleted(DeleteReport),
}

impl<M> From<UpdateOutcome<M>> for QueryResult<M> {
    fn from(outcome: UpdateOutcome<M>) -> Self {
        match outcome {
            UpdateOutcome::Document(m) => Self::Document(Some(m)),
            UpdateOutcome::Acknowledged(report) => Self::Updated(report),
        }
    }
}

/// One operation with its arguments, executable by [`QueryRunner::execute`].
#[derive(Debug, Clone)]
pub enum Operation {
    FindMany { filter: Filter, options: FindOptions },
    FindOne { filter: Filter, projection: Option<Projection> },
    Count { filter: Filter },
    InsertOne(BsonDocument),
    InsertMany(Vec<BsonDocument>),
    UpdateById { id: DocumentId, patch: Patch, options: UpdateOptions },
    UpdateMany { filter: Filter, patch: Patch },
    DeleteMany { filter: Filter },
    DeleteOne { filter: Filter },
    FindByIdAndRemove { id: DocumentId },
}

/// Executes operations against the collection of model `M`.
///
/// The runner borrows the connection, so it cannot outlive it.
pub struct QueryRunner<'c, M: Model> {
    collection: Arc<Collection>,
    _conn: PhantomData<&'c Connection>,
    _model: PhantomData<M>,
}

impl<M: Model> std::fmt::Debug for QueryRunner<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRunner").field("collection", &self.collection.name()).finish()
    }
}

fn checked_options(options: &FindOptions) -> Result<(), DbError> {
    if let Some(limit) = options.limit
        && limit > MAX_LIMIT
    {
        log::warn!("limit {limit} capped to {MAX_LIMIT}");
    }
    query::validate_find_options(options)
}

impl<'c, M: Model> QueryRunner<'c, M> {
    /// Runner over the model's own collection.
    ///
    /// # Errors
    /// `Connection` if the connection is closed.
    pub fn new(conn: &'c Connection) -> Result<Self, DbError> {
        Self::with_collection(conn, M::COLLECTION)
    }

    /// # Errors
    /// `Connection` if the connection is closed.
    pub fn with_collection(conn: &'c Connection, name: &str) -> Result<Self, DbError> {
        Ok(Self { collection: conn.collection(name)?, _conn: PhantomData, _model: PhantomData })
    }

    #[must_use]
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    fn to_models(docs: Vec<BsonDocument>) -> Result<Vec<M>, DbError> {
        docs.iter().map(M::from_document).collect()
    }

    /// # Errors
    /// `InvalidQuery` for a malformed filter or projection, `Connection` if the store is closed.
    pub fn find_many(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<M>, DbError> {
        query::validate_filter(filter)?;
        checked_options(options)?;
        log::debug!("find_many {}: {}", self.collection.name(), filter.to_json());
        Self::to_models(query::find_docs(&self.collection, filter, options)?)
    }

    /// First match in natural order.
    ///
    /// # Errors
    /// `InvalidQuery` for a malformed filter or projection, `Connection` if the store is closed.
    pub fn find_one(&self, filter: &Filter, projection: Option<&Projection>) -> Result<Option<M>, DbError> {
        let options = FindOptions { projection: projection.cloned(), limit: Some(1), ..FindOptions::default() };
        Ok(self.find_many(filter, &options)?.into_iter().next())
    }

    /// # Errors
    /// `Connection` if the store is closed.
    pub fn find_by_id(&self, id: &DocumentId) -> Result<Option<M>, DbError> {
        self.collection.find_document(id)?.as_ref().map(M::from_document).transpose()
    }

    /// # Errors
    /// `InvalidQuery` for a malformed filter, `Connection` if the store is closed.
    pub fn count(&self, filter: &Filter) -> Result<u64, DbError> {
        query::validate_filter(filter)?;
        log::debug!("count {}: {}", self.collection.name(), filter.to_json());
        query::count_docs(&self.collection, filter)
    }

    fn stored(&self, id: &DocumentId) -> Result<M, DbError> {
        let doc = self
            .collection
            .find_document(id)?
            .ok_or_else(|| DbError::NotFound(format!("{} _id {}", self.collection.name(), id.to_hex())))?;
        M::from_document(&doc)
    }

    /// Validate against the model schema, insert, and return the stored model.
    ///
    /// # Errors
    /// `Validation` on schema violations, `DuplicateKey` if the `_id` is taken,
    /// `Connection` if the store is closed.
    pub fn insert_one(&self, doc: impl Into<BsonDocument>) -> Result<M, DbError> {
        let doc = M::schema().validate_insert(doc.into())?;
        let id = self.collection.insert_document(doc)?;
        self.stored(&id)
    }

    /// Insert several documents. Nothing is written unless every document validates
    /// and no supplied `_id` collides.
    ///
    /// # Errors
    /// As [`Self::insert_one`].
    pub fn insert_many<I, D>(&self, docs: I) -> Result<Vec<M>, DbError>
    where
        I: IntoIterator<Item = D>,
        D: Into<BsonDocument>,
    {
        let docs = docs
            .into_iter()
            .map(|d| M::schema().validate_insert(d.into()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen = HashSet::new();
        for doc in &docs {
            if let Some(Bson::ObjectId(id)) = doc.get(ID_FIELD)
                && (!seen.insert(*id) || self.collection.find_document(id)?.is_some())
            {
                return Err(DbError::DuplicateKey(format!("{} _id {}", self.collection.name(), id.to_hex())));
            }
        }
        let mut inserted = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = self.collection.insert_document(doc)?;
            inserted.push(self.stored(&id)?);
        }
        Ok(inserted)
    }

    /// Patch exactly one document.
    ///
    /// # Errors
    /// `NotFound` if no document has `id`, `InvalidQuery` for an empty patch or one touching `_id`,
    /// `Connection` if the store is closed.
    pub fn update_by_id(
        &self,
        id: &DocumentId,
        patch: &Patch,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome<M>, DbError> {
        query::validate_patch(patch)?;
        let (doc, changed) = query::update_by_id(&self.collection, id, patch)?
            .ok_or_else(|| DbError::NotFound(format!("{} _id {}", self.collection.name(), id.to_hex())))?;
        if options.return_updated {
            return M::from_document(&doc).map(UpdateOutcome::Document);
        }
        Ok(UpdateOutcome::Acknowledged(UpdateReport {
            acknowledged: true,
            matched: 1,
            modified: u64::from(changed),
        }))
    }

    /// # Errors
    /// `InvalidQuery` for a malformed filter or patch, `Connection` if the store is closed.
    pub fn update_many(&self, filter: &Filter, patch: &Patch) -> Result<UpdateReport, DbError> {
        query::validate_filter(filter)?;
        query::validate_patch(patch)?;
        log::debug!("update_many {}: {}", self.collection.name(), filter.to_json());
        query::update_many(&self.collection, filter, patch)
    }

    /// # Errors
    /// `InvalidQuery` for a malformed filter, `Connection` if the store is closed.
    pub fn delete_many(&self, filter: &Filter) -> Result<DeleteReport, DbError> {
        query::validate_filter(filter)?;
        log::debug!("delete_many {}: {}", self.collection.name(), filter.to_json());
        query::delete_many(&self.collection, filter)
    }

    /// # Errors
    /// `InvalidQuery` for a malformed filter, `Connection` if the store is closed.
    pub fn delete_one(&self, filter: &Filter) -> Result<DeleteReport, DbError> {
        query::validate_filter(filter)?;
        query::delete_one(&self.collection, filter)
    }

    /// Remove one document by id and return it as it was.
    ///
    /// # Errors
    /// `Connection` if the store is closed.
    pub fn find_by_id_and_remove(&self, id: &DocumentId) -> Result<Option<M>, DbError> {
        let removed = query::find_one_and_delete(&self.collection, &crate::filter::by_id(*id))?;
        removed.as_ref().map(M::from_document).transpose()
    }

    /// Run `op` and normalize its result.
    ///
    /// # Errors
    /// Whatever the underlying operation returns.
    pub fn execute(&self, op: &Operation) -> Result<QueryResult<M>, DbError> {
        Ok(match op {
            Operation::FindMany { filter, options } => QueryResult::Documents(self.find_many(filter, options)?),
            Operation::FindOne { filter, projection } => {
                QueryResult::Document(self.find_one(filter, projection.as_ref())?)
            }
            Operation::Count { filter } => QueryResult::Count(self.count(filter)?),
            Operation::InsertOne(doc) => QueryResult::Document(Some(self.insert_one(doc.clone())?)),
            Operation::InsertMany(docs) => QueryResult::Documents(self.insert_many(docs.iter().cloned())?),
            Operation::UpdateById { id, patch, options } => self.update_by_id(id, patch, *options)?.into(),
            Operation::UpdateMany { filter, patch } => QueryResult::Updated(self.update_many(filter, patch)?),
            Operation::DeleteMany { filter } => QueryResult::Deleted(self.delete_many(filter)?),
            Operation::DeleteOne { filter } => QueryResult::Deleted(self.delete_one(filter)?),
            Operation::FindByIdAndRemove { id } => QueryResult::Document(self.find_by_id_and_remove(id)?),
        })
    }
}
