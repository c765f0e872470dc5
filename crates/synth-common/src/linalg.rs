//! Small dense linear algebra over row-major `Vec<Vec<f64>>` matrices.
//!
//! Dimensions here are the number of continuous variables in a schema, so
//! straightforward O(p^3) routines are all that is needed.

pub type Matrix = Vec<Vec<f64>>;

pub fn zeros(rows: usize, cols: usize) -> Matrix {
    vec![vec![0.0; cols]; rows]
}

pub fn identity(size: usize) -> Matrix {
    let mut matrix = zeros(size, size);
    for (index, row) in matrix.iter_mut().enumerate() {
        row[index] = 1.0;
    }
    matrix
}

pub fn diagonal(values: &[f64]) -> Matrix {
    let mut matrix = zeros(values.len(), values.len());
    for (index, value) in values.iter().enumerate() {
        matrix[index][index] = *value;
    }
    matrix
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with the n-1 denominator; zero below two values.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let center = mean(values);
    values.iter().map(|value| (value - center).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Column means and n-1 covariance of complete observation vectors.
pub fn mean_and_covariance(observations: &[Vec<f64>], dim: usize) -> (Vec<f64>, Matrix) {
    let mut means = vec![0.0; dim];
    if observations.is_empty() {
        return (means, zeros(dim, dim));
    }
    for observation in observations {
        for (slot, value) in means.iter_mut().zip(observation) {
            *slot += value;
        }
    }
    let count = observations.len() as f64;
    for slot in &mut means {
        *slot /= count;
    }
    let mut covariance = zeros(dim, dim);
    if observations.len() < 2 {
        return (means, covariance);
    }
    for observation in observations {
        for i in 0..dim {
            let di = observation[i] - means[i];
            for j in 0..=i {
                covariance[i][j] += di * (observation[j] - means[j]);
            }
        }
    }
    let denominator = count - 1.0;
    for i in 0..dim {
        for j in 0..=i {
            covariance[i][j] /= denominator;
            covariance[j][i] = covariance[i][j];
        }
    }
    (means, covariance)
}

/// Lower-triangular Cholesky factor, `None` unless `matrix` is positive definite.
pub fn cholesky(matrix: &Matrix) -> Option<Matrix> {
    let size = matrix.len();
    let mut lower = zeros(size, size);
    for i in 0..size {
        for j in 0..=i {
            let mut sum = matrix[i][j];
            for k in 0..j {
                sum -= lower[i][k] * lower[j][k];
            }
            if i == j {
                if !(sum.is_finite() && sum > 0.0) {
                    return None;
                }
                lower[i][i] = sum.sqrt();
            } else {
                lower[i][j] = sum / lower[j][j];
            }
        }
    }
    Some(lower)
}

/// Cholesky after adding the smallest ridge (relative to the mean diagonal)
/// that makes the matrix positive definite. Returns the factor and the ridge used.
pub fn regularized_cholesky(matrix: &Matrix) -> Option<(Matrix, f64)> {
    if let Some(lower) = cholesky(matrix) {
        return Some((lower, 0.0));
    }
    let size = matrix.len();
    let scale = (0..size).map(|i| matrix[i][i].abs()).sum::<f64>() / size.max(1) as f64;
    let scale = if scale > 0.0 { scale } else { 1.0 };
    let mut relative = 1e-10;
    while relative <= 1e-1 {
        let ridge = relative * scale;
        let mut shifted = matrix.clone();
        for (i, row) in shifted.iter_mut().enumerate() {
            row[i] += ridge;
        }
        if let Some(lower) = cholesky(&shifted) {
            return Some((lower, ridge));
        }
        relative *= 10.0;
    }
    None
}

/// Solve `L y = b` for lower-triangular `L`.
pub fn forward_solve(lower: &Matrix, rhs: &[f64]) -> Vec<f64> {
    let mut solution = vec![0.0; rhs.len()];
    for i in 0..rhs.len() {
        let mut sum = rhs[i];
        for k in 0..i {
            sum -= lower[i][k] * solution[k];
        }
        solution[i] = sum / lower[i][i];
    }
    solution
}

/// Solve `L^T x = y` for lower-triangular `L`.
pub fn backward_solve_transposed(lower: &Matrix, rhs: &[f64]) -> Vec<f64> {
    let size = rhs.len();
    let mut solution = vec![0.0; size];
    for i in (0..size).rev() {
        let mut sum = rhs[i];
        for k in i + 1..size {
            sum -= lower[k][i] * solution[k];
        }
        solution[i] = sum / lower[i][i];
    }
    solution
}

/// Solve a symmetric positive-definite system.
pub fn solve_spd(matrix: &Matrix, rhs: &[f64]) -> Option<Vec<f64>> {
    let (lower, _) = regularized_cholesky(matrix)?;
    let intermediate = forward_solve(&lower, rhs);
    Some(backward_solve_transposed(&lower, &intermediate))
}

/// `L z` for lower-triangular `L`.
pub fn lower_mul(lower: &Matrix, vector: &[f64]) -> Vec<f64> {
    lower
        .iter()
        .enumerate()
        .map(|(i, row)| (0..=i).map(|k| row[k] * vector[k]).sum())
        .collect()
}

/// Correlation matrix of a covariance matrix; zero-variance entries get 0 off-diagonal.
pub fn correlation_from_covariance(covariance: &Matrix) -> Matrix {
    let size = covariance.len();
    let sd: Vec<f64> = (0..size).map(|i| covariance[i][i].max(0.0).sqrt()).collect();
    let mut correlation = identity(size);
    for i in 0..size {
        for j in 0..size {
            if i != j && sd[i] > 0.0 && sd[j] > 0.0 {
                correlation[i][j] = (covariance[i][j] / (sd[i] * sd[j])).clamp(-1.0, 1.0);
            }
        }
    }
    correlation
}

pub fn frobenius_distance(left: &Matrix, right: &Matrix) -> f64 {
    left.iter()
        .zip(right)
        .flat_map(|(a, b)| a.iter().zip(b).map(|(x, y)| (x - y).powi(2)))
        .sum::<f64>()
        .sqrt()
}

pub fn frobenius_norm(matrix: &Matrix) -> f64 {
    matrix
        .iter()
        .flatten()
        .map(|value| value * value)
        .sum::<f64>()
        .sqrt()
}

/// Linear-interpolated quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Ascending copy with non-finite values removed.
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}
