//! Diffs a filtered experiment trace against the golden run: for every
//! section, only rows not present in the golden section are kept.
//!
//! Implemented as a hash multiset (`concat(self, golden, golden);
//! drop_duplicates(keep=none)` would be O(n log n) sort-based pandas
//! idiom; this is the same multiset-difference result computed in O(n)).

use std::collections::HashMap;
use std::hash::Hash;

/// A row survives iff its total multiplicity across `self + golden +
/// golden` is exactly 1 — i.e. it appears exactly once in `rows` and not
/// at all in `golden`. This is the literal multiset arithmetic behind
/// `concat(self, golden, golden); drop_duplicates(keep=none)`: a row
/// duplicated within `self` is, like a golden row, not unique and is
/// dropped too.
pub fn unique_to_self<T>(rows: Vec<T>, golden: &[T]) -> Vec<T>
where
    T: Hash + Eq + Clone,
{
    let mut golden_counts: HashMap<&T, i64> = HashMap::new();
    for row in golden {
        *golden_counts.entry(row).or_insert(0) += 1;
    }

    let mut self_counts: HashMap<&T, i64> = HashMap::new();
    for row in &rows {
        *self_counts.entry(row).or_insert(0) += 1;
    }

    let mut emitted: HashMap<T, ()> = HashMap::new();
    rows.into_iter()
        .filter(|row| {
            let self_count = self_counts.get(row).copied().unwrap_or(0);
            let golden_count = golden_counts.get(row).copied().unwrap_or(0);
            self_count + 2 * golden_count == 1
        })
        .filter(|row| emitted.insert(row.clone(), ()).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Row(u64);

    #[test]
    fn keeps_only_rows_absent_from_golden() {
        let rows = vec![Row(1), Row(2), Row(3)];
        let golden = vec![Row(1), Row(3)];
        let diffed = unique_to_self(rows, &golden);
        assert_eq!(diffed, vec![Row(2)]);
    }

    #[test]
    fn identical_traces_diff_to_empty() {
        let rows = vec![Row(1), Row(2)];
        let golden = vec![Row(1), Row(2)];
        assert!(unique_to_self(rows, &golden).is_empty());
    }

    #[test]
    fn duplicate_rows_within_self_are_dropped_even_without_a_golden_match() {
        let rows = vec![Row(1), Row(1), Row(2)];
        let golden = vec![];
        let diffed = unique_to_self(rows, &golden);
        assert_eq!(diffed, vec![Row(2)]);
    }
}
