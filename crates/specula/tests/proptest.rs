//! Property-based tests for specula using proptest.

use proptest::prelude::*;
use specula::memory::MemorySource;
use specula::{apply, parse, Combine, Entity, Predicate, Specification};

// ============================================================================
// Test helpers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Entity)]
struct Item {
    #[entity(key)]
    id: u32,
    value: i64,
    name: String,
    active: bool,
}

// Strategy to generate test items
fn item_strategy() -> impl Strategy<Value = Item> {
    (any::<u32>(), -1000i64..1000, "[a-c]{1,4}", any::<bool>()).prop_map(
        |(id, value, name, active)| Item {
            id,
            value,
            name,
            active,
        },
    )
}

// Strategy for simple leaf predicates over `Item`
fn leaf_strategy() -> impl Strategy<Value = Predicate<Item>> {
    prop_oneof![
        (-1000i64..1000).prop_map(|v| Predicate::gt("value", v).unwrap()),
        (-1000i64..1000).prop_map(|v| Predicate::lte("value", v).unwrap()),
        "[a-c]{1,2}".prop_map(|s| Predicate::eq("name", s).unwrap()),
        any::<bool>().prop_map(|b| Predicate::eq("active", b).unwrap()),
        Just(Predicate::always()),
        Just(Predicate::never()),
    ]
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// AND and OR results do not depend on operand order.
    #[test]
    fn and_or_are_commutative(
        item in item_strategy(),
        p in leaf_strategy(),
        q in leaf_strategy(),
    ) {
        prop_assert_eq!(
            p.clone().and(q.clone()).matches(&item),
            q.clone().and(p.clone()).matches(&item)
        );
        prop_assert_eq!(
            p.clone().or(q.clone()).matches(&item),
            q.or(p).matches(&item)
        );
    }

    /// Grouping does not change the result of chained ANDs or ORs.
    #[test]
    fn and_or_are_associative(
        item in item_strategy(),
        p in leaf_strategy(),
        q in leaf_strategy(),
        r in leaf_strategy(),
    ) {
        prop_assert_eq!(
            p.clone().and(q.clone()).and(r.clone()).matches(&item),
            p.clone().and(q.clone().and(r.clone())).matches(&item)
        );
        prop_assert_eq!(
            p.clone().or(q.clone()).or(r.clone()).matches(&item),
            p.or(q.or(r)).matches(&item)
        );
    }

    /// AND of non-sentinel leaves holds exactly when both hold.
    #[test]
    fn and_is_conjunction(item in item_strategy(), a in -1000i64..1000, b in -1000i64..1000) {
        let p = Predicate::<Item>::gt("value", a).unwrap();
        let q = Predicate::<Item>::lte("value", b).unwrap();
        prop_assert_eq!(
            p.clone().and(q.clone()).matches(&item),
            p.matches(&item) && q.matches(&item)
        );
    }

    /// Double negation is the identity, structurally.
    #[test]
    fn double_negation(p in leaf_strategy()) {
        prop_assert_eq!(p.clone().negate().negate(), p);
    }

    /// Negation flips the result.
    #[test]
    fn negation_flips(item in item_strategy(), p in leaf_strategy()) {
        prop_assert_eq!(p.clone().negate().matches(&item), !p.matches(&item));
    }

    /// The unconstrained predicate is the identity for AND.
    #[test]
    fn always_is_and_identity(p in leaf_strategy()) {
        prop_assert_eq!(Predicate::always().and(p.clone()), p.clone());
        prop_assert_eq!(p.clone().and(Predicate::always()), p);
    }

    /// `range:lo,hi` holds exactly for values within the inclusive bounds.
    #[test]
    fn range_is_inclusive(item in item_strategy(), lo in -1000i64..1000, hi in -1000i64..1000) {
        let p = parse::<Item>("value", &format!("range:{lo},{hi}"), None).unwrap();
        prop_assert_eq!(p.matches(&item), lo <= item.value && item.value <= hi);
    }

    /// `in` and `nin` over the same list are complements.
    #[test]
    fn in_and_nin_are_complements(
        item in item_strategy(),
        values in prop::collection::vec(-5i64..5, 0..5),
    ) {
        let list = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
        let within = parse::<Item>("value", &format!("in:{list}"), None).unwrap();
        let outside = parse::<Item>("value", &format!("nin:{list}"), None).unwrap();
        prop_assert_ne!(within.matches(&item), outside.matches(&item));
        prop_assert_eq!(within.matches(&item), values.contains(&item.value));
    }

    /// Combining nothing is unconstrained, whatever the combinator.
    #[test]
    fn combine_all_empty_is_always(item in item_strategy(), or in any::<bool>()) {
        let combine = if or { Combine::Or } else { Combine::And };
        let p = Predicate::<Item>::combine_all(Vec::new(), combine);
        prop_assert!(p.is_always());
        prop_assert!(p.matches(&item));
    }

    /// Filtering never grows the collection and keeps only matches.
    #[test]
    fn filter_keeps_only_matches(
        items in prop::collection::vec(item_strategy(), 0..50),
        p in leaf_strategy(),
    ) {
        let spec = Specification::<Item>::new().filter(p.clone());
        let out = apply(MemorySource::new(&items), &spec).fetch().unwrap();
        prop_assert!(out.len() <= items.len());
        prop_assert!(out.iter().all(|item| p.matches(item)));
        prop_assert_eq!(out.len(), items.iter().filter(|item| p.matches(item)).count());
    }

    /// Ordering by value then name yields a sorted permutation.
    #[test]
    fn ordering_sorts_by_keys(items in prop::collection::vec(item_strategy(), 0..50)) {
        let spec = Specification::<Item>::new()
            .order_by_descending("value")
            .unwrap()
            .then_by("name")
            .unwrap();
        let out = apply(MemorySource::new(&items), &spec).fetch().unwrap();
        prop_assert_eq!(out.len(), items.len());
        for pair in out.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.value > b.value || (a.value == b.value && a.name <= b.name));
        }
    }
}
