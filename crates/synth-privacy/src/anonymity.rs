//! K-anonymity and l-diversity over quasi-identifier equivalence classes.

use std::collections::{BTreeSet, HashMap};

use crate::encoding::{Cell, CellKey, projected_key};

/// Equivalence-class statistics of a record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymityResult {
    /// Size of the smallest equivalence class; 0 for no records.
    pub k: usize,
    pub equivalence_classes: usize,
    /// Records in classes smaller than the floor.
    pub flagged: Vec<usize>,
}

/// Group rows by their full quasi-identifier tuple.
pub fn equivalence_classes(rows: &[Vec<Cell>]) -> HashMap<Vec<CellKey>, Vec<usize>> {
    let columns: Vec<usize> = (0..rows.first().map_or(0, Vec::len)).collect();
    let mut classes: HashMap<Vec<CellKey>, Vec<usize>> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        classes
            .entry(projected_key(row, &columns))
            .or_default()
            .push(index);
    }
    classes
}

pub fn k_anonymity(rows: &[Vec<Cell>], k_floor: usize) -> AnonymityResult {
    let classes = equivalence_classes(rows);
    let k = classes.values().map(Vec::len).min().unwrap_or(0);
    let mut flagged: Vec<usize> = classes
        .values()
        .filter(|members| members.len() < k_floor)
        .flatten()
        .copied()
        .collect();
    flagged.sort_unstable();
    AnonymityResult {
        k,
        equivalence_classes: classes.len(),
        flagged,
    }
}

/// Smallest number of distinct observed sensitive values in any class.
///
/// `sensitive[i]` is the rendered sensitive value of row `i`.
pub fn l_diversity(rows: &[Vec<Cell>], sensitive: &[Option<String>]) -> usize {
    equivalence_classes(rows)
        .values()
        .map(|members| {
            members
                .iter()
                .filter_map(|index| sensitive[*index].as_deref())
                .collect::<BTreeSet<_>>()
                .len()
        })
        .min()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(codes: &[u32]) -> Vec<Vec<Cell>> {
        codes.iter().map(|code| vec![Cell::Cat(*code)]).collect()
    }

    #[test]
    fn smallest_class_sets_k() {
        let result = k_anonymity(&rows(&[0, 0, 0, 1, 1, 2]), 2);
        assert_eq!(result.k, 1);
        assert_eq!(result.equivalence_classes, 3);
        assert_eq!(result.flagged, vec![5]);
    }

    #[test]
    fn empty_input_has_zero_k() {
        assert_eq!(k_anonymity(&[], 5).k, 0);
        assert_eq!(l_diversity(&[], &[]), 0);
    }

    #[test]
    fn l_counts_distinct_values_per_class() {
        let sensitive = ["a", "b", "a", "c", "c"].map(|value| Some(value.to_string()));
        assert_eq!(l_diversity(&rows(&[0, 0, 0, 1, 1]), &sensitive), 1);
        assert_eq!(l_diversity(&rows(&[0, 0, 0, 0, 0]), &sensitive), 3);
    }
}
