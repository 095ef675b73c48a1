//! Subscription Filter
//!
//! [`filter_multi`] selects the values of a two-way indexed set that match
//! both a first-dimension allow-list (e.g. market IDs) and a second-dimension
//! allow-list (e.g. subaccount IDs).
//!
//! The two maps are indices over the same set of shared values. Identity is
//! pointer identity of the [`Arc`], so equal-looking but distinct values are
//! never merged.
//!
//! Per dimension, an empty list or one containing [`WILDCARD`] matches
//! everything; otherwise the union of the listed keys is taken. The result is
//! the intersection of both dimensions, without duplicates, ordered by first
//! appearance in the first map.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Filter token meaning "match everything under this dimension".
pub const WILDCARD: &str = "*";

/// Filter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// Exactly one of the two indices is empty.
    #[error("invalid parameters")]
    InvalidParameters,
}

fn is_wildcard<S: AsRef<str>>(filter: &[S]) -> bool {
    filter.is_empty() || filter.iter().any(|key| key.as_ref() == WILDCARD)
}

/// Values of `map` selected by `filter`, in map order for wildcards and
/// filter order otherwise.
fn select<'a, K, V, S>(map: &'a BTreeMap<K, Vec<Arc<V>>>, filter: &[S]) -> Vec<&'a Arc<V>>
where
    K: Ord + Borrow<str>,
    S: AsRef<str>,
{
    if is_wildcard(filter) {
        map.values().flatten().collect()
    } else {
        filter
            .iter()
            .filter_map(|key| map.get(key.as_ref()))
            .flatten()
            .collect()
    }
}

/// Values present under both filters.
///
/// # Errors
///
/// Returns [`FilterError::InvalidParameters`] when exactly one of the maps is
/// empty. Two empty maps yield an empty result.
pub fn filter_multi<K, V, S>(
    first_map: &BTreeMap<K, Vec<Arc<V>>>,
    second_map: &BTreeMap<K, Vec<Arc<V>>>,
    first_filter: &[S],
    second_filter: &[S],
) -> Result<Vec<Arc<V>>, FilterError>
where
    K: Ord + Borrow<str>,
    S: AsRef<str>,
{
    match (first_map.is_empty(), second_map.is_empty()) {
        (true, true) => return Ok(Vec::new()),
        (true, false) | (false, true) => return Err(FilterError::InvalidParameters),
        (false, false) => {}
    }

    let second: HashSet<*const V> = select(second_map, second_filter)
        .into_iter()
        .map(Arc::as_ptr)
        .collect();

    let mut seen = HashSet::with_capacity(second.len());
    Ok(select(first_map, first_filter)
        .into_iter()
        .filter(|value| {
            let ptr = Arc::as_ptr(value);
            second.contains(&ptr) && seen.insert(ptr)
        })
        .cloned()
        .collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[derive(Debug, PartialEq, Eq)]
    struct Row {
        market: &'static str,
        subaccount: &'static str,
    }

    type Index = BTreeMap<String, Vec<Arc<Row>>>;

    /// Four rows over markets m1, m2 and subaccounts s1, s2, s3.
    fn indices() -> (Index, Index) {
        let rows = [
            ("m1", "s1"),
            ("m1", "s2"),
            ("m2", "s2"),
            ("m2", "s3"),
        ];
        let mut by_market = Index::new();
        let mut by_subaccount = Index::new();
        for (market, subaccount) in rows {
            let row = Arc::new(Row { market, subaccount });
            by_market
                .entry(market.to_owned())
                .or_default()
                .push(Arc::clone(&row));
            by_subaccount
                .entry(subaccount.to_owned())
                .or_default()
                .push(row);
        }
        (by_market, by_subaccount)
    }

    fn pairs(values: &[Arc<Row>]) -> Vec<(&'static str, &'static str)> {
        let mut out: Vec<_> = values.iter().map(|r| (r.market, r.subaccount)).collect();
        out.sort_unstable();
        out
    }

    #[test_case(&[], &[], &[("m1", "s1"), ("m1", "s2"), ("m2", "s2"), ("m2", "s3")] ; "empty filters match all")]
    #[test_case(&["*"], &["*"], &[("m1", "s1"), ("m1", "s2"), ("m2", "s2"), ("m2", "s3")] ; "wildcards match all")]
    #[test_case(&["m1"], &[], &[("m1", "s1"), ("m1", "s2")] ; "market only")]
    #[test_case(&["*"], &["s2"], &[("m1", "s2"), ("m2", "s2")] ; "subaccount only")]
    #[test_case(&["m2"], &["s2"], &[("m2", "s2")] ; "both dimensions intersect")]
    #[test_case(&["m1", "m2"], &["s1", "s3"], &[("m1", "s1"), ("m2", "s3")] ; "unions per dimension")]
    #[test_case(&["m1"], &["s3"], &[] ; "disjoint selections")]
    #[test_case(&["m9"], &[], &[] ; "unknown market")]
    #[test_case(&["m1", "*"], &["s1"], &[("m1", "s1")] ; "wildcard among keys")]
    fn filters_rows(
        markets: &[&str],
        subaccounts: &[&str],
        expected: &[(&'static str, &'static str)],
    ) {
        let (by_market, by_subaccount) = indices();
        let result = filter_multi(&by_market, &by_subaccount, markets, subaccounts).unwrap();
        assert_eq!(pairs(&result), expected);
    }

    #[test]
    fn repeated_keys_do_not_duplicate() {
        let (by_market, by_subaccount) = indices();
        let result =
            filter_multi(&by_market, &by_subaccount, &["m1", "m1"], &["s1", "s1"]).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn both_maps_empty_is_empty() {
        let empty = Index::new();
        let result = filter_multi::<_, _, &str>(&empty, &empty, &[], &[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn one_map_empty_is_invalid() {
        let (by_market, _) = indices();
        let empty = Index::new();
        assert_eq!(
            filter_multi::<_, _, &str>(&by_market, &empty, &[], &[]),
            Err(FilterError::InvalidParameters)
        );
        assert_eq!(
            filter_multi::<_, _, &str>(&empty, &by_market, &["m1"], &[]),
            Err(FilterError::InvalidParameters)
        );
        assert_eq!(FilterError::InvalidParameters.to_string(), "invalid parameters");
    }

    #[test]
    fn identity_is_by_reference() {
        let a = Arc::new(Row { market: "m1", subaccount: "s1" });
        let b = Arc::new(Row { market: "m1", subaccount: "s1" });
        let mut by_market = Index::new();
        by_market.insert("m1".into(), vec![Arc::clone(&a), Arc::clone(&b)]);
        let mut by_subaccount = Index::new();
        by_subaccount.insert("s1".into(), vec![Arc::clone(&a)]);

        let result = filter_multi::<_, _, &str>(&by_market, &by_subaccount, &[], &[]).unwrap();

        assert_eq!(result.len(), 1);
        assert!(Arc::ptr_eq(&result[0], &a));
    }

    const MARKETS: [&str; 3] = ["m1", "m2", "m3"];
    const SUBACCOUNTS: [&str; 3] = ["s1", "s2", "s3"];

    fn build(rows: &[(usize, usize)]) -> (Index, Index, Vec<Arc<Row>>) {
        let mut by_market = Index::new();
        let mut by_subaccount = Index::new();
        let mut all = Vec::new();
        for &(m, s) in rows {
            let row = Arc::new(Row {
                market: MARKETS[m],
                subaccount: SUBACCOUNTS[s],
            });
            by_market
                .entry(MARKETS[m].to_owned())
                .or_default()
                .push(Arc::clone(&row));
            by_subaccount
                .entry(SUBACCOUNTS[s].to_owned())
                .or_default()
                .push(Arc::clone(&row));
            all.push(row);
        }
        (by_market, by_subaccount, all)
    }

    proptest! {
        #[test]
        fn wildcards_return_every_value(rows in prop::collection::vec((0..3_usize, 0..3_usize), 1..20)) {
            let (by_market, by_subaccount, all) = build(&rows);
            let result = filter_multi(&by_market, &by_subaccount, &[WILDCARD], &[]).unwrap();
            prop_assert_eq!(result.len(), all.len());
        }

        #[test]
        fn concrete_filters_intersect(
            rows in prop::collection::vec((0..3_usize, 0..3_usize), 1..20),
            markets in prop::collection::hash_set(0..3_usize, 1..3),
            subaccounts in prop::collection::hash_set(0..3_usize, 1..3),
        ) {
            let (by_market, by_subaccount, all) = build(&rows);
            let market_filter: Vec<&str> = markets.iter().map(|&m| MARKETS[m]).collect();
            let subaccount_filter: Vec<&str> = subaccounts.iter().map(|&s| SUBACCOUNTS[s]).collect();

            let result = filter_multi(&by_market, &by_subaccount, &market_filter, &subaccount_filter).unwrap();

            let expected = all
                .iter()
                .filter(|row| market_filter.contains(&row.market) && subaccount_filter.contains(&row.subaccount))
                .count();
            prop_assert_eq!(result.len(), expected);
            for row in &result {
                prop_assert!(market_filter.contains(&row.market));
                prop_assert!(subaccount_filter.contains(&row.subaccount));
            }
        }

        #[test]
        fn result_is_stable_for_equal_inputs(rows in prop::collection::vec((0..3_usize, 0..3_usize), 1..20)) {
            let (by_market, by_subaccount, _) = build(&rows);
            let first = filter_multi(&by_market, &by_subaccount, &["m1", "m3"], &[]).unwrap();
            let second = filter_multi(&by_market, &by_subaccount, &["m1", "m3"], &[]).unwrap();
            prop_assert!(first.iter().zip(&second).all(|(a, b)| Arc::ptr_eq(a, b)));
            prop_assert_eq!(first.len(), second.len());
        }
    }
}
