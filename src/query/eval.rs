use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, ID_FIELD, MAX_PATH_DEPTH, Order, Projection, SortSpec};

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Nin { path, values } => !get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Cmp { path, op, value } => {
            let found = get_path(doc, path);
            match op {
                CmpOp::Eq => values_equal(found, value),
                CmpOp::Ne => !values_equal(found, value),
                _ => found.filter(|v| comparable(v, value)).is_some_and(|v| {
                    let c = compare_bson(v, value);
                    match op {
                        CmpOp::Gt => c == Ordering::Greater,
                        CmpOp::Gte => c != Ordering::Less,
                        CmpOp::Lt => c == Ordering::Less,
                        _ => c != Ordering::Greater,
                    }
                }),
            }
        }
        Filter::Regex { path, regex, .. } => {
            matches!(get_path(doc, path), Some(Bson::String(s)) if regex.is_match(s))
        }
    }
}

// Equality against null also matches a missing field.
fn values_equal(found: Option<&Bson>, value: &Bson) -> bool {
    match (found, value) {
        (None, Bson::Null) => true,
        (None, _) => false,
        (Some(v), _) if is_num(v) && is_num(value) => compare_bson(v, value) == Ordering::Equal,
        (Some(v @ Bson::ObjectId(_)), Bson::String(_))
        | (Some(v @ Bson::String(_)), Bson::ObjectId(_)) => {
            compare_bson(v, value) == Ordering::Equal
        }
        (Some(v), _) => v == value,
    }
}

// Range operators only match values of the same type family.
fn comparable(a: &Bson, b: &Bson) -> bool {
    type_rank(a) == type_rank(b)
        || matches!((a, b), (Bson::ObjectId(_), Bson::String(_)) | (Bson::String(_), Bson::ObjectId(_)))
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().any(|x| values_equal(Some(v), x))
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    let mut segs = 0usize;
    while let Some(part) = parts.next() {
        segs += 1;
        if segs > MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            Bson::Document(d) => cur = d,
            _ => return None,
        }
    }
    None
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        _ => f64::NAN,
    }
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        // ids given as hex text compare as text, which orders the same as the raw bytes
        (Bson::ObjectId(x), Bson::String(y)) => x.to_hex().as_str().cmp(y.as_str()),
        (Bson::String(x), Bson::ObjectId(y)) => x.as_str().cmp(y.to_hex().as_str()),
        (Bson::Null, Bson::Null) => Ordering::Equal,
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 13,
        Bson::MaxKey => 255,
    }
}

/// Apply a projection to a stored document, returning a new document.
pub fn project_fields(doc: &BsonDocument, projection: &Projection) -> BsonDocument {
    let keep_id = !projection.exclude.iter().any(|f| f == ID_FIELD);
    if projection.include.is_empty() {
        let mut out = doc.clone();
        for f in &projection.exclude {
            out.remove(f);
        }
        return out;
    }
    let mut out = BsonDocument::new();
    if keep_id {
        if let Some(id) = doc.get(ID_FIELD) {
            out.insert(ID_FIELD, id.clone());
        }
    }
    for f in &projection.include {
        if f == ID_FIELD {
            continue;
        }
        if let Some(v) = doc.get(f) {
            out.insert(f.clone(), v.clone());
        }
    }
    out
}
