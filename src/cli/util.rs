use crate::errors::DbError;
use crate::query::{Order, SortSpec};
use bson::{Bson, Document as BsonDocument};

/// `"title,-_id"`: comma-separated fields, `-` for descending, optional `+` for ascending.
#[must_use]
pub fn parse_sort(spec: &str) -> Option<Vec<SortSpec>> {
    let specs: Vec<SortSpec> = spec
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|part| {
            let (order, field) = if let Some(rest) = part.strip_prefix('-') {
                (Order::Desc, rest)
            } else if let Some(rest) = part.strip_prefix('+') {
                (Order::Asc, rest)
            } else {
                (Order::Asc, part)
            };
            SortSpec { field: field.to_string(), order }
        })
        .collect();
    (!specs.is_empty()).then_some(specs)
}

/// Parse a JSON object (extended JSON allowed) into a document.
///
/// # Errors
/// `InvalidQuery` if the text is not a JSON object.
pub fn parse_document_json(json: &str) -> Result<BsonDocument, DbError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| DbError::InvalidQuery(format!("document JSON: {e}")))?;
    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(DbError::InvalidQuery(format!("expected a JSON object, got {other}"))),
        Err(e) => Err(DbError::InvalidQuery(format!("document JSON: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_parsing() {
        let specs = parse_sort("title, -_id").unwrap();
        assert_eq!(specs[0], SortSpec { field: "title".into(), order: Order::Asc });
        assert_eq!(specs[1], SortSpec { field: "_id".into(), order: Order::Desc });
        assert!(parse_sort(" , ").is_none());
    }

    #[test]
    fn document_parsing() {
        let doc = parse_document_json(r#"{"title": "t", "content": "c"}"#).unwrap();
        assert_eq!(doc.get("title"), Some(&Bson::String("t".into())));
        assert!(matches!(parse_document_json("[1]"), Err(DbError::InvalidQuery(_))));
    }
}
