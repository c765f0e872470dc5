use rayon::prelude::*;

use super::BATCH;
use crate::encoding::EncodedPair;

/// Fraction of targeted reference records whose two attribute halves lead
/// to the same candidate record.
///
/// A half links only when its nearest candidate is unique. Needs at least
/// two attributes.
pub fn linkability(pair: &EncodedPair, targets: &[usize]) -> Option<f64> {
    let width = pair.width();
    if width < 2 {
        return None;
    }
    if targets.is_empty() || pair.candidate.is_empty() {
        return Some(0.0);
    }
    let first: Vec<usize> = (0..width / 2).collect();
    let second: Vec<usize> = (width / 2..width).collect();
    let unique = |nearest: Vec<usize>| (nearest.len() == 1).then(|| nearest[0]);

    let linked: usize = targets
        .par_chunks(BATCH)
        .map(|batch| {
            batch
                .iter()
                .filter(|&&target| {
                    let row = &pair.reference[target];
                    let left = unique(pair.nearest_candidates(row, &first));
                    left.is_some() && left == unique(pair.nearest_candidates(row, &second))
                })
                .count()
        })
        .sum();
    Some(linked as f64 / targets.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Cell, QuasiIdentifier};

    fn pair(reference: Vec<Vec<Cell>>, candidate: Vec<Vec<Cell>>) -> EncodedPair {
        EncodedPair {
            attributes: (0..2)
                .map(|i| QuasiIdentifier {
                    name: format!("Q{i}"),
                    numeric: true,
                    span: 10.0,
                })
                .collect(),
            reference,
            candidate,
        }
    }

    #[test]
    fn copied_records_link_completely() {
        let rows: Vec<Vec<Cell>> = (0..5)
            .map(|i| vec![Cell::Num(f64::from(i)), Cell::Num(f64::from(i * 2))])
            .collect();
        let rate = linkability(&pair(rows.clone(), rows), &[0, 1, 2, 3, 4]);
        assert_eq!(rate, Some(1.0));
    }

    #[test]
    fn crossed_halves_do_not_link() {
        let reference = vec![vec![Cell::Num(0.0), Cell::Num(0.0)]];
        let candidate = vec![
            vec![Cell::Num(0.0), Cell::Num(9.0)],
            vec![Cell::Num(9.0), Cell::Num(0.0)],
        ];
        assert_eq!(linkability(&pair(reference, candidate), &[0]), Some(0.0));
    }
}
