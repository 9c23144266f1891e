//! Schemas and the typed-model seam between stored BSON documents and caller types.

use crate::errors::DbError;
use crate::query::ID_FIELD;
use bson::{Bson, Document as BsonDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

/// Field rules checked on insert. Updates are not validated.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub model: &'static str,
    pub fields: &'static [FieldSpec],
    /// Drop fields the schema does not declare.
    pub strict: bool,
}

impl Schema {
    /// Validate a document for insertion and return the normalized form.
    ///
    /// # Errors
    /// Returns `Validation` naming every failing field.
    pub fn validate_insert(&self, doc: BsonDocument) -> Result<BsonDocument, DbError> {
        let mut problems = Vec::new();
        for spec in self.fields {
            match doc.get(spec.name) {
                None | Some(Bson::Null) if spec.required => {
                    problems.push(format!("{}: path `{}` is required", spec.name, spec.name));
                }
                Some(Bson::String(s)) if spec.required && s.is_empty() => {
                    problems.push(format!("{}: path `{}` is required", spec.name, spec.name));
                }
                Some(v) if !matches_kind(v, spec.kind) => {
                    problems.push(format!("{}: expected {:?}, got {v}", spec.name, spec.kind));
                }
                _ => {}
            }
        }
        if !problems.is_empty() {
            return Err(DbError::Validation(format!("{} validation failed: {}", self.model, problems.join(", "))));
        }
        if !self.strict {
            return Ok(doc);
        }
        Ok(doc
            .into_iter()
            .filter(|(k, _)| k == ID_FIELD || self.fields.iter().any(|f| f.name == k))
            .collect())
    }
}

fn matches_kind(v: &Bson, kind: FieldKind) -> bool {
    match kind {
        FieldKind::String => matches!(v, Bson::String(_) | Bson::Null),
    }
}

/// A typed view over documents of one collection.
pub trait Model: Sized {
    const COLLECTION: &'static str;

    fn schema() -> &'static Schema;

    /// Build the model from a stored (possibly projected) document.
    ///
    /// # Errors
    /// Returns `Validation` when a known field has the wrong type.
    fn from_document(doc: &BsonDocument) -> Result<Self, DbError>;
}
