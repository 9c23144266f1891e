use proptest::prelude::*;
use noteful::filter::{FilterBuilder, IdBounds, by_id_range, paginate};
use noteful::numbered_id;

fn opt_id() -> impl Strategy<Value = Option<u32>> {
    proptest::option::of(1u32..=20)
}

fn opt_text() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-z ]{0,8}")
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

    #[test]
    fn prop_builder_only_references_present_inputs(
        gte in opt_id(), lte in opt_id(), gt in opt_id(), lt in opt_id(),
        title in opt_text(), contains in opt_text(), exists in proptest::option::of(any::<bool>()),
    ) {
        let f = FilterBuilder::new()
            .id_gte(gte.map(numbered_id))
            .id_lte(lte.map(numbered_id))
            .id_gt(gt.map(numbered_id))
            .id_lt(lt.map(numbered_id))
            .title(title.clone())
            .title_contains(contains.clone())
            .title_exists(exists)
            .build()
            .unwrap();
        let id_present = gte.is_some() || lte.is_some() || gt.is_some() || lt.is_some();
        let title_present = title.as_deref().is_some_and(|t| !t.is_empty())
            || contains.as_deref().is_some_and(|t| !t.is_empty())
            || exists.is_some();
        for path in f.paths() {
            match path.as_str() {
                "_id" => prop_assert!(id_present),
                "title" => prop_assert!(title_present),
                other => prop_assert!(false, "unexpected path {}", other),
            }
        }
        prop_assert_eq!(f.is_match_all(), !id_present && !title_present);
    }

    #[test]
    fn prop_pagination_keys_follow_nonzero_inputs(limit in proptest::option::of(0usize..50), skip in proptest::option::of(0usize..50)) {
        let p = paginate(limit, skip);
        let keys = p.keys();
        prop_assert_eq!(keys.contains(&"limit"), limit.is_some_and(|n| n > 0));
        prop_assert_eq!(keys.contains(&"skip"), skip.is_some_and(|n| n > 0));
    }

    #[test]
    fn prop_id_range_clause_count(gte in opt_id(), lte in opt_id()) {
        let f = by_id_range(IdBounds { gte: gte.map(numbered_id), lte: lte.map(numbered_id), ..IdBounds::default() });
        let expected = usize::from(gte.is_some()) + usize::from(lte.is_some());
        let actual = match &f {
            noteful::Filter::True => 0,
            noteful::Filter::And(parts) => parts.len(),
            _ => 1,
        };
        prop_assert_eq!(actual, expected);
    }
}
