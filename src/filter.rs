//! Filter builders for note queries.
//!
//! Every builder is pure and leaves a clause out entirely when its input is absent,
//! so a builder fed nothing yields [`Filter::True`].

use crate::errors::DbError;
use crate::note::TITLE;
use crate::query::{CmpOp, Filter, FindOptions, ID_FIELD};
use crate::types::DocumentId;
use bson::Bson;

/// Optional bounds on `_id`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdBounds {
    pub gte: Option<DocumentId>,
    pub lte: Option<DocumentId>,
    pub gt: Option<DocumentId>,
    pub lt: Option<DocumentId>,
}

fn id_cmp(op: CmpOp, id: DocumentId) -> Filter {
    Filter::Cmp { path: ID_FIELD.to_string(), op, value: Bson::ObjectId(id) }
}

fn present(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

#[must_use]
pub fn by_id_range(bounds: IdBounds) -> Filter {
    let clauses = [
        bounds.gte.map(|id| id_cmp(CmpOp::Gte, id)),
        bounds.gt.map(|id| id_cmp(CmpOp::Gt, id)),
        bounds.lte.map(|id| id_cmp(CmpOp::Lte, id)),
        bounds.lt.map(|id| id_cmp(CmpOp::Lt, id)),
    ];
    combine_and(clauses.into_iter().flatten())
}

#[must_use]
pub fn by_id(id: DocumentId) -> Filter {
    id_cmp(CmpOp::Eq, id)
}

#[must_use]
pub fn by_title_exact(term: Option<&str>) -> Filter {
    present(term).map_or(Filter::True, |t| Filter::Cmp {
        path: TITLE.to_string(),
        op: CmpOp::Eq,
        value: Bson::String(t.to_string()),
    })
}

/// Literal substring match on the title.
///
/// # Errors
/// Returns `InvalidQuery` if the escaped literal is too large to compile.
pub fn by_title_contains(substring: Option<&str>) -> Result<Filter, DbError> {
    present(substring).map_or(Ok(Filter::True), |s| crate::query::regex_filter(TITLE, &regex::escape(s), None))
}

/// Raw regular expression on the title.
///
/// # Errors
/// Returns `InvalidQuery` if `pattern` does not compile.
pub fn by_title_pattern(pattern: &str, case_insensitive: bool) -> Result<Filter, DbError> {
    crate::query::regex_filter(TITLE, pattern, case_insensitive.then_some("i"))
}

#[must_use]
pub fn by_title_missing_or_present(present: bool) -> Filter {
    Filter::Exists { path: TITLE.to_string(), exists: present }
}

/// Conjunction that drops match-all operands and flattens nested conjunctions.
#[must_use]
pub fn combine_and<I>(filters: I) -> Filter
where
    I: IntoIterator<Item = Filter>,
{
    let mut parts = Vec::new();
    for f in filters {
        match f {
            Filter::True => {}
            Filter::And(inner) => parts.extend(inner),
            other => parts.push(other),
        }
    }
    match parts.len() {
        0 => Filter::True,
        1 => parts.pop().unwrap_or_default(),
        _ => Filter::And(parts),
    }
}

#[must_use]
pub fn combine_not(filter: Filter) -> Filter {
    match filter {
        Filter::Not(inner) => *inner,
        other => Filter::Not(Box::new(other)),
    }
}

/// Limit/skip pair; zero counts as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl Pagination {
    /// Names of the keys that are set.
    #[must_use]
    pub fn keys(&self) -> Vec<&'static str> {
        [self.limit.map(|_| "limit"), self.skip.map(|_| "skip")].into_iter().flatten().collect()
    }
}

#[must_use]
pub fn paginate(limit: Option<usize>, skip: Option<usize>) -> Pagination {
    Pagination { limit: limit.filter(|n| *n > 0), skip: skip.filter(|n| *n > 0) }
}

impl From<Pagination> for FindOptions {
    fn from(p: Pagination) -> Self {
        Self { limit: p.limit, skip: p.skip, ..Self::default() }
    }
}

/// Collects optional criteria and builds their conjunction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterBuilder {
    bounds: IdBounds,
    title: Option<String>,
    title_contains: Option<String>,
    title_exists: Option<bool>,
}

impl FilterBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn id_gte(mut self, id: Option<DocumentId>) -> Self {
        self.bounds.gte = id;
        self
    }

    #[must_use]
    pub const fn id_lte(mut self, id: Option<DocumentId>) -> Self {
        self.bounds.lte = id;
        self
    }

    #[must_use]
    pub const fn id_gt(mut self, id: Option<DocumentId>) -> Self {
        self.bounds.gt = id;
        self
    }

    #[must_use]
    pub const fn id_lt(mut self, id: Option<DocumentId>) -> Self {
        self.bounds.lt = id;
        self
    }

    #[must_use]
    pub fn title(mut self, term: Option<impl Into<String>>) -> Self {
        self.title = term.map(Into::into);
        self
    }

    #[must_use]
    pub fn title_contains(mut self, substring: Option<impl Into<String>>) -> Self {
        self.title_contains = substring.map(Into::into);
        self
    }

    #[must_use]
    pub const fn title_exists(mut self, present: Option<bool>) -> Self {
        self.title_exists = present;
        self
    }

    /// # Errors
    /// Returns `InvalidQuery` if the title substring cannot be compiled.
    pub fn build(&self) -> Result<Filter, DbError> {
        Ok(combine_and([
            by_id_range(self.bounds),
            by_title_exact(self.title.as_deref()),
            by_title_contains(self.title_contains.as_deref())?,
            self.title_exists.map_or(Filter::True, by_title_missing_or_present),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::eval_filter;
    use crate::types::numbered_id;
    use bson::doc;

    #[test]
    fn no_inputs_match_everything() {
        assert!(by_id_range(IdBounds::default()).is_match_all());
        assert!(by_title_exact(None).is_match_all());
        assert!(by_title_contains(Some("")).unwrap().is_match_all());
        assert!(FilterBuilder::new().build().unwrap().is_match_all());
    }

    #[test]
    fn single_bound_is_a_single_comparison() {
        let f = by_id_range(IdBounds { gt: Some(numbered_id(7)), ..IdBounds::default() });
        assert!(matches!(f, Filter::Cmp { op: CmpOp::Gt, .. }));
    }

    #[test]
    fn closed_range_is_a_conjunction() {
        let f = by_id_range(IdBounds {
            gte: Some(numbered_id(9)),
            lte: Some(numbered_id(17)),
            ..IdBounds::default()
        });
        let Filter::And(parts) = &f else { panic!("expected And, got {f:?}") };
        assert_eq!(parts.len(), 2);
        assert!(eval_filter(&doc! {"_id": numbered_id(9)}, &f));
        assert!(eval_filter(&doc! {"_id": numbered_id(17)}, &f));
        assert!(!eval_filter(&doc! {"_id": numbered_id(18)}, &f));
    }

    #[test]
    fn contains_matches_literally() {
        let f = by_title_contains(Some("cats?")).unwrap();
        assert!(eval_filter(&doc! {"title": "why cats? why"}, &f));
        assert!(!eval_filter(&doc! {"title": "cat"}, &f));
    }

    #[test]
    fn contains_reports_literals_too_large_to_compile() {
        let huge = "dogs".repeat(4 * 1024 * 1024);
        assert!(matches!(by_title_contains(Some(&huge)), Err(DbError::InvalidQuery(_))));
        let built = FilterBuilder::new().id_gte(Some(numbered_id(13))).title_contains(Some(huge)).build();
        assert!(matches!(built, Err(DbError::InvalidQuery(_))));
    }

    #[test]
    fn pattern_reports_bad_regex() {
        assert!(matches!(by_title_pattern("(", false), Err(DbError::InvalidQuery(_))));
        let f = by_title_pattern("^DOGS", true).unwrap();
        assert!(eval_filter(&doc! {"title": "dogs rule"}, &f));
    }

    #[test]
    fn combine_and_flattens_and_drops_match_all() {
        let a = by_title_missing_or_present(true);
        let b = by_id_range(IdBounds { gte: Some(numbered_id(13)), ..IdBounds::default() });
        let nested = combine_and([a.clone(), Filter::True]);
        assert!(matches!(nested, Filter::Exists { .. }));
        let f = combine_and([combine_and([a, b.clone()]), b]);
        assert!(matches!(f, Filter::And(ref parts) if parts.len() == 3));
    }

    #[test]
    fn combine_not_negates() {
        let lt = by_id_range(IdBounds { lt: Some(numbered_id(17)), ..IdBounds::default() });
        let f = combine_not(lt);
        assert!(eval_filter(&doc! {"_id": numbered_id(17)}, &f));
        assert!(!eval_filter(&doc! {"_id": numbered_id(3)}, &f));
    }

    #[test]
    fn paginate_treats_zero_as_absent() {
        assert_eq!(paginate(Some(0), Some(5)), Pagination { limit: None, skip: Some(5) });
        assert_eq!(paginate(Some(5), None).keys(), vec!["limit"]);
        assert!(paginate(None, Some(0)).keys().is_empty());
    }

    #[test]
    fn builder_ignores_empty_text() {
        let f = FilterBuilder::new().title(Some("")).title_exists(Some(true)).build().unwrap();
        assert_eq!(f.paths(), vec!["title".to_string()]);
        assert!(matches!(f, Filter::Exists { exists: true, .. }));
    }
}
