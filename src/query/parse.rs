use crate::errors::DbError;
use bson::Bson;
use serde_json::{Map, Value};

use super::types::{
    CmpOp, Filter, FindOptions, ID_FIELD, MAX_IN_SET, MAX_PATCH_FIELDS, MAX_PATH_DEPTH, MAX_PROJECTION_FIELDS,
    MAX_SORT_FIELDS, Patch, Projection,
};

const MAX_FILTER_NESTING: usize = 64;

fn invalid(msg: impl Into<String>) -> DbError {
    DbError::InvalidQuery(msg.into())
}

/// # Errors
/// Returns `InvalidQuery` if the JSON is malformed or uses an unsupported operator.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    let value: Value = serde_json::from_str(json).map_err(|e| invalid(format!("filter JSON: {e}")))?;
    parse_filter_value(&value)
}

/// # Errors
/// Returns `InvalidQuery` if the value is not a filter object.
pub fn parse_filter_value(value: &Value) -> Result<Filter, DbError> {
    parse_filter_at(value, 0)
}

fn parse_filter_at(value: &Value, depth: usize) -> Result<Filter, DbError> {
    if depth > MAX_FILTER_NESTING {
        return Err(invalid("filter nested too deeply"));
    }
    let obj = value.as_object().ok_or_else(|| invalid("filter must be a JSON object"))?;
    let mut clauses = Vec::with_capacity(obj.len());
    for (key, v) in obj {
        let clause = match key.as_str() {
            "$and" => Filter::And(parse_filter_list(key, v, depth)?),
            "$or" => Filter::Or(parse_filter_list(key, v, depth)?),
            "$nor" => Filter::Not(Box::new(Filter::Or(parse_filter_list(key, v, depth)?))),
            k if k.starts_with('$') => return Err(invalid(format!("unknown top-level operator {k}"))),
            path => parse_field_clause(path, v)?,
        };
        clauses.push(clause);
    }
    Ok(match clauses.len() {
        0 => Filter::True,
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    })
}

fn parse_filter_list(op: &str, v: &Value, depth: usize) -> Result<Vec<Filter>, DbError> {
    let arr = v.as_array().ok_or_else(|| invalid(format!("{op} expects an array")))?;
    if arr.is_empty() {
        return Err(invalid(format!("{op} expects a non-empty array")));
    }
    arr.iter().map(|f| parse_filter_at(f, depth + 1)).collect()
}

fn check_path(path: &str) -> Result<(), DbError> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(invalid(format!("invalid field path {path:?}")));
    }
    if path.split('.').count() > MAX_PATH_DEPTH {
        return Err(invalid(format!("field path too deep: {path}")));
    }
    Ok(())
}

fn parse_field_clause(path: &str, v: &Value) -> Result<Filter, DbError> {
    check_path(path)?;
    match v {
        Value::Object(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
            parse_operator_object(path, ops)
        }
        other => Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: to_bson(path, other)? }),
    }
}

fn parse_operator_object(path: &str, ops: &Map<String, Value>) -> Result<Filter, DbError> {
    let mut clauses = Vec::with_capacity(ops.len());
    let options = match ops.get("$options") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => return Err(invalid("$options must be a string")),
        None => None,
    };
    for (op, v) in ops {
        let clause = match op.as_str() {
            "$eq" => cmp(path, CmpOp::Eq, v)?,
            "$ne" => cmp(path, CmpOp::Ne, v)?,
            "$gt" => cmp(path, CmpOp::Gt, v)?,
            "$gte" => cmp(path, CmpOp::Gte, v)?,
            "$lt" => cmp(path, CmpOp::Lt, v)?,
            "$lte" => cmp(path, CmpOp::Lte, v)?,
            "$in" => Filter::In { path: path.to_string(), values: bson_list(path, op, v)? },
            "$nin" => Filter::Nin { path: path.to_string(), values: bson_list(path, op, v)? },
            "$exists" => {
                let exists = match v {
                    Value::Bool(b) => *b,
                    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                    _ => return Err(invalid("$exists expects a boolean")),
                };
                Filter::Exists { path: path.to_string(), exists }
            }
            "$regex" => {
                let pattern = v.as_str().ok_or_else(|| invalid("$regex expects a string"))?;
                regex_filter(path, pattern, options)?
            }
            "$options" => {
                if !ops.contains_key("$regex") {
                    return Err(invalid("$options without $regex"));
                }
                continue;
            }
            "$not" => {
                let inner = v.as_object().ok_or_else(|| invalid("$not expects an operator object"))?;
                if inner.is_empty() || !inner.keys().all(|k| k.starts_with('$')) {
                    return Err(invalid("$not expects an operator object"));
                }
                Filter::Not(Box::new(parse_operator_object(path, inner)?))
            }
            other => return Err(invalid(format!("unknown operator {other} on {path}"))),
        };
        clauses.push(clause);
    }
    Ok(if clauses.len() == 1 { clauses.remove(0) } else { Filter::And(clauses) })
}

fn cmp(path: &str, op: CmpOp, v: &Value) -> Result<Filter, DbError> {
    Ok(Filter::Cmp { path: path.to_string(), op, value: to_bson(path, v)? })
}

fn bson_list(path: &str, op: &str, v: &Value) -> Result<Vec<Bson>, DbError> {
    let arr = v.as_array().ok_or_else(|| invalid(format!("{op} expects an array")))?;
    check_in_set(path, arr.len())?;
    arr.iter().map(|x| to_bson(path, x)).collect()
}

fn check_in_set(path: &str, len: usize) -> Result<(), DbError> {
    if len > MAX_IN_SET {
        return Err(invalid(format!("{path}: set of {len} values exceeds {MAX_IN_SET}")));
    }
    Ok(())
}

pub(crate) fn regex_filter(path: &str, pattern: &str, options: Option<&str>) -> Result<Filter, DbError> {
    let mut builder = regex::RegexBuilder::new(pattern);
    for flag in options.unwrap_or("").chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(invalid(format!("unsupported regex option {other:?}"))),
        };
    }
    let regex = builder.build().map_err(|e| invalid(format!("bad $regex on {path}: {e}")))?;
    Ok(Filter::Regex { path: path.to_string(), regex, options: options.unwrap_or("").to_string() })
}

// `_id` values given as hex text are cast to object ids.
fn to_bson(path: &str, v: &Value) -> Result<Bson, DbError> {
    if path == ID_FIELD {
        if let Value::String(s) = v {
            return crate::types::parse_id(s).map(Bson::ObjectId);
        }
    }
    Bson::try_from(v.clone()).map_err(|e| invalid(format!("value for {path}: {e}")))
}

impl Filter {
    /// JSON form of the descriptor, as accepted by [`parse_filter_value`].
    #[must_use]
    pub fn to_json(&self) -> Value {
        filter_to_json(self)
    }
}

/// Render a filter back to its JSON form (regexes as `$regex` strings plus their `$options`).
#[must_use]
pub fn filter_to_json(filter: &Filter) -> Value {
    fn list(fs: &[Filter]) -> Value {
        Value::Array(fs.iter().map(filter_to_json).collect())
    }
    fn field(path: &str, body: Value) -> Value {
        let mut m = Map::new();
        m.insert(path.to_string(), body);
        Value::Object(m)
    }
    match filter {
        Filter::True => Value::Object(Map::new()),
        Filter::And(fs) => field("$and", list(fs)),
        Filter::Or(fs) => field("$or", list(fs)),
        Filter::Not(inner) => match inner.as_ref() {
            Filter::Cmp { path, op, value } => {
                field(path, field("$not", field(op.operator(), value.clone().into_relaxed_extjson())))
            }
            Filter::Regex { path, regex, options } => field(path, field("$not", regex_body(regex, options))),
            other => field("$nor", Value::Array(vec![filter_to_json(other)])),
        },
        Filter::Exists { path, exists } => field(path, field("$exists", Value::Bool(*exists))),
        Filter::In { path, values } => field(path, field("$in", bson_values(values))),
        Filter::Nin { path, values } => field(path, field("$nin", bson_values(values))),
        Filter::Cmp { path, op, value } => {
            field(path, field(op.operator(), value.clone().into_relaxed_extjson()))
        }
        Filter::Regex { path, regex, options } => field(path, regex_body(regex, options)),
    }
}

fn regex_body(regex: &regex::Regex, options: &str) -> Value {
    let mut m = Map::new();
    m.insert("$regex".into(), Value::String(regex.as_str().to_string()));
    if !options.is_empty() {
        m.insert("$options".into(), Value::String(options.to_string()));
    }
    Value::Object(m)
}

fn bson_values(values: &[Bson]) -> Value {
    Value::Array(values.iter().cloned().map(Bson::into_relaxed_extjson).collect())
}

/// Parse an update document: `{"$set": {...}, "$unset": {...}}`, or a plain object (implicit `$set`).
///
/// # Errors
/// Returns `InvalidQuery` if the JSON is malformed, targets `_id`, or mixes operators and plain fields.
pub fn parse_patch_json(json: &str) -> Result<Patch, DbError> {
    let value: Value = serde_json::from_str(json).map_err(|e| invalid(format!("patch JSON: {e}")))?;
    let obj = value.as_object().ok_or_else(|| invalid("patch must be a JSON object"))?;
    let has_ops = obj.keys().any(|k| k.starts_with('$'));
    if has_ops && !obj.keys().all(|k| k.starts_with('$')) {
        return Err(invalid("patch mixes update operators and plain fields"));
    }
    let mut patch = Patch::default();
    if !has_ops {
        push_sets(&mut patch, obj)?;
        check_patch_size(&patch)?;
        return Ok(patch);
    }
    for (op, body) in obj {
        match op.as_str() {
            "$set" => {
                let fields = body.as_object().ok_or_else(|| invalid("$set expects an object"))?;
                push_sets(&mut patch, fields)?;
            }
            "$unset" => match body {
                Value::Object(fields) => {
                    for k in fields.keys() {
                        patch.unset.push(checked_patch_path(k)?);
                    }
                }
                Value::Array(fields) => {
                    for f in fields {
                        let k = f.as_str().ok_or_else(|| invalid("$unset list expects strings"))?;
                        patch.unset.push(checked_patch_path(k)?);
                    }
                }
                _ => return Err(invalid("$unset expects an object or array")),
            },
            other => return Err(invalid(format!("unsupported update operator {other}"))),
        }
    }
    check_patch_size(&patch)?;
    Ok(patch)
}

fn check_patch_size(patch: &Patch) -> Result<(), DbError> {
    let n = patch.set.len() + patch.unset.len();
    if n > MAX_PATCH_FIELDS {
        return Err(invalid(format!("patch touches {n} fields, more than {MAX_PATCH_FIELDS}")));
    }
    Ok(())
}

fn push_sets(patch: &mut Patch, fields: &Map<String, Value>) -> Result<(), DbError> {
    for (k, v) in fields {
        let path = checked_patch_path(k)?;
        let value = Bson::try_from(v.clone()).map_err(|e| invalid(format!("value for {k}: {e}")))?;
        patch.set.push((path, value));
    }
    Ok(())
}

fn checked_patch_path(path: &str) -> Result<String, DbError> {
    check_path(path)?;
    if path == ID_FIELD || path.starts_with("_id.") {
        return Err(invalid("_id is immutable"));
    }
    Ok(path.to_string())
}

/// Parse a space- or comma-separated field list; a leading `-` excludes the field.
///
/// # Errors
/// Returns `InvalidQuery` when inclusion and exclusion are mixed (other than `-_id`).
pub fn parse_projection(spec: &str) -> Result<Projection, DbError> {
    let mut projection = Projection::default();
    for token in spec.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty()) {
        match token.strip_prefix('-') {
            Some(field) => {
                check_path(field)?;
                projection.exclude.push(field.to_string());
            }
            None => {
                check_path(token.trim_start_matches('+'))?;
                projection.include.push(token.trim_start_matches('+').to_string());
            }
        }
    }
    validate_projection(&projection)?;
    Ok(projection)
}

/// # Errors
/// Returns `InvalidQuery` for mixed inclusion and exclusion (other than `-_id`), bad paths,
/// or more than the allowed number of fields.
pub fn validate_projection(projection: &Projection) -> Result<(), DbError> {
    if !projection.include.is_empty() && projection.exclude.iter().any(|f| f != ID_FIELD) {
        return Err(invalid("projection cannot mix inclusion and exclusion"));
    }
    let n = projection.include.len() + projection.exclude.len();
    if n > MAX_PROJECTION_FIELDS {
        return Err(invalid(format!("projection lists {n} fields, more than {MAX_PROJECTION_FIELDS}")));
    }
    projection.include.iter().chain(&projection.exclude).try_for_each(|f| check_path(f))
}

/// Check sort and projection of a find before it runs.
///
/// # Errors
/// Returns `InvalidQuery` for too many sort fields or an invalid projection.
pub fn validate_find_options(opts: &FindOptions) -> Result<(), DbError> {
    if let Some(sort) = &opts.sort {
        if sort.len() > MAX_SORT_FIELDS {
            return Err(invalid(format!("sort lists {} fields, more than {MAX_SORT_FIELDS}", sort.len())));
        }
        sort.iter().try_for_each(|s| check_path(&s.field))?;
    }
    match &opts.projection {
        Some(p) => validate_projection(p),
        None => Ok(()),
    }
}

/// Validate a programmatically built filter before execution.
///
/// # Errors
/// Returns `InvalidQuery` for empty or over-deep paths, empty logical operands and oversized `$in` sets.
pub fn validate_filter(filter: &Filter) -> Result<(), DbError> {
    match filter {
        Filter::True => Ok(()),
        Filter::And(fs) | Filter::Or(fs) => {
            if fs.is_empty() {
                return Err(invalid("logical operator with no operands"));
            }
            fs.iter().try_for_each(validate_filter)
        }
        Filter::Not(f) => validate_filter(f),
        Filter::In { path, values } | Filter::Nin { path, values } => {
            check_path(path)?;
            check_in_set(path, values.len())
        }
        Filter::Exists { path, .. } | Filter::Cmp { path, .. } | Filter::Regex { path, .. } => check_path(path),
    }
}

/// Validate a programmatically built patch before execution.
///
/// # Errors
/// Returns `InvalidQuery` for an empty or oversized patch, bad paths, or any path touching `_id`.
pub fn validate_patch(patch: &Patch) -> Result<(), DbError> {
    if patch.is_empty() {
        return Err(invalid("update patch is empty"));
    }
    check_patch_size(patch)?;
    patch.set.iter().map(|(k, _)| k).chain(patch.unset.iter()).try_for_each(|k| checked_patch_path(k).map(drop))
}
