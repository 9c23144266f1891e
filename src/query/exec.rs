use crate::collection::Collection;
use crate::errors::DbError;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use std::time::Instant;

use super::eval::{compare_docs, eval_filter, project_fields};
use super::parse::validate_find_options;
use super::types::{DeleteReport, Filter, FindOptions, ID_FIELD, MAX_LIMIT, Patch, UpdateReport};

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn matching(col: &Collection, filter: &Filter) -> Result<Vec<BsonDocument>, DbError> {
    Ok(col.documents()?.into_iter().filter(|d| eval_filter(d, filter)).collect())
}

fn id_of(doc: &BsonDocument) -> Option<DocumentId> {
    match doc.get(ID_FIELD) {
        Some(Bson::ObjectId(id)) => Some(*id),
        _ => None,
    }
}

/// Matching documents in natural order (or `opts.sort`), then skip, limit and projection.
/// A zero limit means no limit; results are capped at `MAX_LIMIT` either way.
///
/// # Errors
/// `InvalidQuery` for too many sort fields or a bad projection, `Connection` if the store is closed.
pub fn find_docs(col: &Collection, filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>, DbError> {
    let start = Instant::now();
    validate_find_options(opts)?;
    let mut docs = matching(col, filter)?;

    if let Some(sort) = &opts.sort {
        docs.sort_by(|a, b| compare_docs(a, b, sort));
    }

    let skip = opts.skip.unwrap_or(0);
    let limit = opts.limit.filter(|n| *n > 0).unwrap_or(MAX_LIMIT).min(MAX_LIMIT);
    let mut docs: Vec<BsonDocument> = docs.into_iter().skip(skip).take(limit).collect();

    if let Some(projection) = opts.projection.as_ref().filter(|p| !p.is_empty()) {
        for d in &mut docs {
            *d = project_fields(d, projection);
        }
    }

    crate::query_trace!(
        "op" => "find",
        "collection" => col.name(),
        "duration_ms" => elapsed_ms(start),
        "result_count" => to_u64(docs.len()),
        "limit" => opts.limit.map(to_u64),
        "skip" => opts.skip.map(to_u64),
    );
    Ok(docs)
}

/// # Errors
/// `Connection` if the store is closed.
pub fn count_docs(col: &Collection, filter: &Filter) -> Result<u64, DbError> {
    let start = Instant::now();
    let n = to_u64(col.documents()?.iter().filter(|d| eval_filter(d, filter)).count());
    crate::query_trace!(
        "op" => "count",
        "collection" => col.name(),
        "duration_ms" => elapsed_ms(start),
        "result_count" => n,
    );
    Ok(n)
}

/// Apply `patch` to every matching document. Unchanged documents count as matched only.
///
/// # Errors
/// `Connection` if the store is closed or a journal write fails.
pub fn update_many(col: &Collection, filter: &Filter, patch: &Patch) -> Result<UpdateReport, DbError> {
    let start = Instant::now();
    let mut report = UpdateReport { acknowledged: true, ..UpdateReport::default() };
    for mut doc in matching(col, filter)? {
        let Some(id) = id_of(&doc) else { continue };
        report.matched += 1;
        if apply_patch(&mut doc, patch) && col.update_document(&id, doc)? {
            report.modified += 1;
        }
    }
    crate::query_trace!(
        "op" => "update_many",
        "collection" => col.name(),
        "duration_ms" => elapsed_ms(start),
        "matched" => report.matched,
        "modified" => report.modified,
    );
    Ok(report)
}

/// Apply `patch` to the first matching document in natural order.
///
/// # Errors
/// `Connection` if the store is closed or a journal write fails.
pub fn update_one(col: &Collection, filter: &Filter, patch: &Patch) -> Result<UpdateReport, DbError> {
    let mut report = UpdateReport { acknowledged: true, ..UpdateReport::default() };
    if let Some(mut doc) = matching(col, filter)?.into_iter().next()
        && let Some(id) = id_of(&doc)
    {
        report.matched = 1;
        if apply_patch(&mut doc, patch) && col.update_document(&id, doc)? {
            report.modified = 1;
        }
    }
    crate::query_trace!(
        "op" => "update_one",
        "collection" => col.name(),
        "matched" => report.matched,
        "modified" => report.modified,
    );
    Ok(report)
}

/// Patch one document by id and return its new state with whether it changed,
/// or `None` if no such document exists.
///
/// # Errors
/// `Connection` if the store is closed or a journal write fails.
pub fn update_by_id(
    col: &Collection,
    id: &DocumentId,
    patch: &Patch,
) -> Result<Option<(BsonDocument, bool)>, DbError> {
    let Some(mut doc) = col.find_document(id)? else {
        return Ok(None);
    };
    let changed = apply_patch(&mut doc, patch);
    if changed {
        col.update_document(id, doc.clone())?;
    }
    crate::query_trace!(
        "op" => "update_by_id",
        "collection" => col.name(),
        "id" => id.to_hex(),
        "modified" => changed,
    );
    Ok(Some((doc, changed)))
}

/// # Errors
/// `Connection` if the store is closed or a journal write fails.
pub fn delete_many(col: &Collection, filter: &Filter) -> Result<DeleteReport, DbError> {
    let start = Instant::now();
    let mut report = DeleteReport { acknowledged: true, deleted: 0 };
    for id in matching(col, filter)?.iter().filter_map(id_of) {
        if col.delete_document(&id)? {
            report.deleted += 1;
        }
    }
    crate::query_trace!(
        "op" => "delete_many",
        "collection" => col.name(),
        "duration_ms" => elapsed_ms(start),
        "deleted" => report.deleted,
    );
    Ok(report)
}

/// Remove the first matching document in natural order and return it.
///
/// # Errors
/// `Connection` if the store is closed or a journal write fails.
pub fn find_one_and_delete(col: &Collection, filter: &Filter) -> Result<Option<BsonDocument>, DbError> {
    let Some(doc) = matching(col, filter)?.into_iter().next() else {
        return Ok(None);
    };
    let removed = match id_of(&doc) {
        Some(id) if col.delete_document(&id)? => Some(doc),
        _ => None,
    };
    crate::query_trace!(
        "op" => "find_one_and_delete",
        "collection" => col.name(),
        "deleted" => u64::from(removed.is_some()),
    );
    Ok(removed)
}

/// # Errors
/// `Connection` if the store is closed or a journal write fails.
pub fn delete_one(col: &Collection, filter: &Filter) -> Result<DeleteReport, DbError> {
    let deleted = u64::from(find_one_and_delete(col, filter)?.is_some());
    Ok(DeleteReport { acknowledged: true, deleted })
}

/// Apply `$set` then `$unset` on dotted paths. Returns whether the document changed.
pub fn apply_patch(doc: &mut BsonDocument, patch: &Patch) -> bool {
    fn set_path(root: &mut BsonDocument, path: &str, value: &Bson) -> bool {
        match path.split_once('.') {
            None => root.insert(path, value.clone()).as_ref() != Some(value),
            Some((head, rest)) => {
                if !matches!(root.get(head), Some(Bson::Document(_))) {
                    root.insert(head, BsonDocument::new());
                }
                match root.get_mut(head) {
                    Some(Bson::Document(sub)) => set_path(sub, rest, value),
                    _ => false,
                }
            }
        }
    }
    fn unset_path(root: &mut BsonDocument, path: &str) -> bool {
        match path.split_once('.') {
            None => root.remove(path).is_some(),
            Some((head, rest)) => match root.get_mut(head) {
                Some(Bson::Document(sub)) => unset_path(sub, rest),
                _ => false,
            },
        }
    }

    let mut changed = false;
    for (k, v) in &patch.set {
        changed |= set_path(doc, k, v);
    }
    for k in &patch.unset {
        changed |= unset_path(doc, k);
    }
    changed
}
