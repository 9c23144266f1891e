use bson::Bson;
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;
pub(crate) const MAX_PATCH_FIELDS: usize = 128;
pub(crate) const MAX_LIMIT: usize = 10_000;

pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// Field selection applied to returned documents.
///
/// `_id` is kept unless it is listed in `exclude`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Projection {
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { include: fields.into_iter().map(Into::into).collect(), exclude: Vec::new() }
    }

    #[must_use]
    pub fn without_id(mut self) -> Self {
        self.exclude.push(ID_FIELD.to_string());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Options for `find_docs`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub projection: Option<Projection>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    #[must_use]
    pub const fn operator(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }
}

/// Filter descriptor. Values are immutable once built; combinators take ownership of their operands.
#[derive(Debug, Clone)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    /// `options` holds the `$options` flags the pattern was compiled with.
    Regex { path: String, regex: regex::Regex, options: String },
}

impl Default for Filter {
    fn default() -> Self {
        Self::True
    }
}

impl Filter {
    /// Field paths referenced anywhere in the descriptor, deduplicated in first-seen order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        fn walk(f: &Filter, out: &mut Vec<String>) {
            match f {
                Filter::True => {}
                Filter::And(fs) | Filter::Or(fs) => fs.iter().for_each(|g| walk(g, out)),
                Filter::Not(g) => walk(g, out),
                Filter::Exists { path, .. }
                | Filter::In { path, .. }
                | Filter::Nin { path, .. }
                | Filter::Cmp { path, .. }
                | Filter::Regex { path, .. } => {
                    if !out.iter().any(|p| p == path) {
                        out.push(path.clone());
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    #[must_use]
    pub const fn is_match_all(&self) -> bool {
        matches!(self, Self::True)
    }
}

/// Partial update: field replacement (`$set`) and field removal (`$unset`).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Patch {
    pub set: Vec<(String, Bson)>,
    pub unset: Vec<String>,
}

impl Patch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    pub acknowledged: bool,
    #[serde(rename = "matchedCount")]
    pub matched: u64,
    #[serde(rename = "modifiedCount")]
    pub modified: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub acknowledged: bool,
    #[serde(rename = "deletedCount")]
    pub deleted: u64,
}
