use crate::document::{FieldKind, FieldSpec, Model, Schema};
use crate::errors::DbError;
use crate::query::ID_FIELD;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use std::fmt;

pub const TITLE: &str = "title";
pub const CONTENT: &str = "content";

const FIELDS: &[FieldSpec] = &[
    FieldSpec { name: TITLE, kind: FieldKind::String, required: true },
    FieldSpec { name: CONTENT, kind: FieldKind::String, required: false },
];

static NOTE_SCHEMA: Schema = Schema { model: "Note", fields: FIELDS, strict: true };

/// A stored note. Fields are optional because projections and `$unset` can remove them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Note {
    pub id: Option<DocumentId>,
    pub title: Option<String>,
    pub content: Option<String>,
}

/// A note that has not been inserted yet. Set `id` to choose the identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub id: Option<DocumentId>,
    pub title: Option<String>,
    pub content: Option<String>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: None, title: Some(title.into()), content: Some(content.into()) }
    }

    #[must_use]
    pub const fn with_id(mut self, id: DocumentId) -> Self {
        self.id = Some(id);
        self
    }
}

impl From<NoteDraft> for BsonDocument {
    fn from(draft: NoteDraft) -> Self {
        let mut doc = Self::new();
        if let Some(id) = draft.id {
            doc.insert(ID_FIELD, id);
        }
        if let Some(title) = draft.title {
            doc.insert(TITLE, title);
        }
        if let Some(content) = draft.content {
            doc.insert(CONTENT, content);
        }
        doc
    }
}

impl From<Note> for BsonDocument {
    fn from(note: Note) -> Self {
        NoteDraft { id: note.id, title: note.title, content: note.content }.into()
    }
}

fn text_field(doc: &BsonDocument, key: &str) -> Result<Option<String>, DbError> {
    match doc.get(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DbError::Validation(format!("note field {key} is not text: {other}"))),
    }
}

impl Model for Note {
    const COLLECTION: &'static str = "notes";

    fn schema() -> &'static Schema {
        &NOTE_SCHEMA
    }

    fn from_document(doc: &BsonDocument) -> Result<Self, DbError> {
        let id = match doc.get(ID_FIELD) {
            None => None,
            Some(Bson::ObjectId(id)) => Some(*id),
            Some(other) => return Err(DbError::Validation(format!("note _id is not an object id: {other}"))),
        };
        Ok(Self { id, title: text_field(doc, TITLE)?, content: text_field(doc, CONTENT)? })
    }
}

// Single-quoted text with `\` and `'` escaped, the way a console inspector prints strings.
fn quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// `{ _id: 000000000000000000000001, title: '…', content: '…' }` with absent fields omitted.
impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(3);
        if let Some(id) = &self.id {
            parts.push(format!("{ID_FIELD}: {}", id.to_hex()));
        }
        if let Some(title) = &self.title {
            parts.push(format!("{TITLE}: {}", quoted(title)));
        }
        if let Some(content) = &self.content {
            parts.push(format!("{CONTENT}: {}", quoted(content)));
        }
        if parts.is_empty() { f.write_str("{}") } else { write!(f, "{{ {} }}", parts.join(", ")) }
    }
}
