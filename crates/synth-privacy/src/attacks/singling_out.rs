use rayon::prelude::*;

use crate::encoding::{EncodedPair, key_counts, projected_key};

/// Leading attributes whose subsets are all tried.
pub const EXHAUSTIVE_LIMIT: usize = 10;

/// Attribute subsets as column lists.
///
/// A subset is tried when it lies within the first [`EXHAUSTIVE_LIMIT`]
/// attributes, has at most two attributes, or is a prefix. None of these
/// conditions depends on the width, so every mask of a narrower width is
/// also a mask of a wider one.
pub fn subset_masks(width: usize) -> Vec<Vec<usize>> {
    let leading = width.min(EXHAUSTIVE_LIMIT);
    let mut masks: Vec<Vec<usize>> = (1u32..(1 << leading))
        .map(|mask| (0..leading).filter(|bit| mask & (1 << bit) != 0).collect())
        .collect();
    for column in leading..width {
        masks.push(vec![column]);
        masks.extend((0..column).map(|other| vec![other, column]));
    }
    masks.extend((leading + 1..=width).map(|len| (0..len).collect()));
    masks
}

/// Fraction of targeted candidate records that some equality predicate
/// isolates in both the candidate and the reference.
///
/// Counts are computed once per subset over whole datasets. Adding an
/// attribute only adds predicates, so the rate never drops.
pub fn singling_out(pair: &EncodedPair, targets: &[usize]) -> Option<f64> {
    if pair.width() == 0 {
        return None;
    }
    if targets.is_empty() {
        return Some(0.0);
    }
    let singled = subset_masks(pair.width())
        .par_iter()
        .map(|columns| {
            let candidate_counts = key_counts(&pair.candidate, columns);
            let reference_counts = key_counts(&pair.reference, columns);
            targets
                .iter()
                .map(|&target| {
                    let key = projected_key(&pair.candidate[target], columns);
                    candidate_counts.get(&key) == Some(&1) && reference_counts.get(&key) == Some(&1)
                })
                .collect::<Vec<bool>>()
        })
        .reduce(
            || vec![false; targets.len()],
            |left, right| left.iter().zip(&right).map(|(a, b)| *a || *b).collect(),
        );
    Some(singled.iter().filter(|hit| **hit).count() as f64 / targets.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Cell, QuasiIdentifier};

    fn pair(reference: Vec<Vec<Cell>>, candidate: Vec<Vec<Cell>>) -> EncodedPair {
        let width = reference.first().map_or(0, Vec::len);
        EncodedPair {
            attributes: (0..width)
                .map(|i| QuasiIdentifier {
                    name: format!("Q{i}"),
                    numeric: false,
                    span: 1.0,
                })
                .collect(),
            reference,
            candidate,
        }
    }

    #[test]
    fn masks_cover_all_subsets_or_prefixes() {
        assert_eq!(subset_masks(2), vec![vec![0], vec![1], vec![0, 1]]);
        assert_eq!(subset_masks(3).len(), 7);
        assert_eq!(subset_masks(10).len(), 1023);
        // 1023 leading subsets, 2 singletons, 21 pairs and 2 long prefixes.
        assert_eq!(subset_masks(12).len(), 1048);
        assert!(subset_masks(12).contains(&(0..12).collect::<Vec<_>>()));
    }

    #[test]
    fn wider_masks_contain_narrower_ones() {
        for width in 1..14 {
            let wider = subset_masks(width + 1);
            assert!(subset_masks(width).iter().all(|mask| wider.contains(mask)), "{width}");
        }
    }

    #[test]
    fn unique_in_both_datasets_is_singled_out() {
        let rows = vec![vec![Cell::Cat(0)], vec![Cell::Cat(1)], vec![Cell::Cat(1)]];
        let rate = singling_out(&pair(rows.clone(), rows), &[0, 1, 2]).expect("determinate");
        assert!((rate - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn no_attributes_is_indeterminate() {
        let empty = pair(vec![vec![]], vec![vec![]]);
        assert_eq!(singling_out(&empty, &[0]), None);
    }
}
