//! Pearson correlation matrices over pairwise-complete observations.

use synth_common::linalg::{self, Matrix};
use synth_model::Dataset;

/// Pearson correlation of paired samples; 0 when either side is constant.
pub fn pearson(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return 0.0;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x).powi(2);
        syy += (y - mean_y).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Correlation matrix of `columns`, each pair using the rows where both are observed.
pub fn correlation_matrix(dataset: &Dataset, columns: &[String]) -> Matrix {
    let dim = columns.len();
    let mut matrix = linalg::identity(dim);
    for i in 0..dim {
        for j in 0..i {
            let pairs: Vec<(f64, f64)> = dataset
                .rows()
                .iter()
                .filter_map(|row| Some((row.num(&columns[i])?, row.num(&columns[j])?)))
                .collect();
            let r = pearson(&pairs);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    matrix
}

/// `1 - |dR|_F / (2 sqrt(p(p-1)))`, exactly 1 for fewer than two columns.
pub fn correlation_score(delta: f64, dim: usize) -> f64 {
    if dim < 2 {
        return 1.0;
    }
    let worst = 2.0 * ((dim * (dim - 1)) as f64).sqrt();
    (1.0 - delta / worst).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_model::{Row, Schema, VariableSpec};

    #[test]
    fn pearson_of_a_line_is_one() {
        let pairs: Vec<(f64, f64)> = (0..10).map(|i| (f64::from(i), 3.0 * f64::from(i))).collect();
        assert!((pearson(&pairs) - 1.0).abs() < 1e-12);
        let flipped: Vec<(f64, f64)> = pairs.iter().map(|(x, y)| (*x, -y)).collect();
        assert!((pearson(&flipped) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[(1.0, 2.0), (1.0, 3.0)]), 0.0);
    }

    #[test]
    fn pairwise_complete_rows_are_used() {
        let schema = Schema::new(vec![
            VariableSpec::continuous("A", 0.0, 100.0, 1),
            VariableSpec::continuous("B", 0.0, 100.0, 1),
        ])
        .expect("schema");
        let mut rows: Vec<Row> = (0..10)
            .map(|i| {
                Row::new(format!("S{i}"), "01", "P", "V1")
                    .with_num("A", f64::from(i))
                    .with_num("B", 2.0 * f64::from(i))
            })
            .collect();
        rows.push(Row::new("S10", "01", "P", "V1").with_num("A", 50.0).with_missing("B"));
        let dataset = Dataset::new(schema, rows).expect("dataset");
        let matrix = correlation_matrix(&dataset, &["A".to_string(), "B".to_string()]);
        assert!((matrix[0][1] - 1.0).abs() < 1e-12);
        assert_eq!(matrix[0][0], 1.0);
    }

    #[test]
    fn opposite_matrices_score_zero() {
        assert_eq!(correlation_score(0.0, 1), 1.0);
        assert_eq!(correlation_score(0.0, 3), 1.0);
        // Two off-diagonal cells flipping from 1 to -1.
        let delta = (2.0f64 * 4.0).sqrt();
        assert!(correlation_score(delta, 2).abs() < 1e-12);
    }
}
