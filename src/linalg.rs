use crate::Error;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use ndarray_linalg::{JobSvd, Norm, SVDDC};

/// Singular values below this are treated as zero
///
/// `max(m, n) * eps * sigma_max`, the same cut-off used by LAPACK based pseudo-inverses
fn singular_value_tolerance(shape: (usize, usize), sigma_max: f64) -> f64 {
    return shape.0.max(shape.1) as f64 * f64::EPSILON * sigma_max;
}

/// Thin singular value decomposition, returns `(u, sigma, vt)` with `k = min(m, n)`
fn thin_svd(matrix: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>, Array2<f64>), Error> {
    let (u, sigma, vt) = matrix.svddc(JobSvd::Some)?;
    // `JobSvd::Some` always returns both factors
    let u: Array2<f64> = u.ok_or(Error::Engine("SVD did not return U".to_string()))?;
    let vt: Array2<f64> = vt.ok_or(Error::Engine("SVD did not return V^T".to_string()))?;
    return Ok((u, sigma, vt));
}

/// Moore-Penrose pseudo-inverse
///
/// # Arguments
/// * `matrix` - shape = [m, n]
///
/// # Returns
/// * pseudo-inverse, shape = [n, m]
///
/// # Algorithm
/// `pinv(A) = V * diag(1 / sigma) * U^T`, where singular values below the tolerance are dropped.
pub fn pseudo_inverse(matrix: &Array2<f64>) -> Result<Array2<f64>, Error> {
    let (n_rows, n_columns) = matrix.dim();
    if n_rows == 0 || n_columns == 0 {
        return Ok(Array2::zeros((n_columns, n_rows)));
    }

    let (u, sigma, vt) = thin_svd(matrix)?;
    let sigma_max: f64 = sigma.iter().copied().fold(0.0, f64::max);
    let tolerance: f64 = singular_value_tolerance((n_rows, n_columns), sigma_max);

    // Scale the columns of V by 1 / sigma
    let mut v_scaled: Array2<f64> = vt.t().to_owned(); // shape = [n, k]
    for (i_sigma, mut column) in v_scaled.axis_iter_mut(Axis(1)).enumerate() {
        let inverse_sigma: f64 = if sigma[i_sigma] > tolerance { 1.0 / sigma[i_sigma] } else { 0.0 };
        column *= inverse_sigma;
    }

    let matrix_pinv: Array2<f64> = v_scaled.dot(&u.t());
    return Ok(matrix_pinv);
}

/// Diagonal of the model resolution matrix `pinv(J) * J`
///
/// # Arguments
/// * `jacobian` - sensitivity matrix, shape = [n_configurations, n_cells]
///
/// # Returns
/// * one value per cell, within [0, 1]
///
/// # Algorithm
/// `pinv(J) * J = V_r * V_r^T`, where `V_r` holds the right singular vectors with non-zero singular value.
/// So `diag[i] = sum_k vt[k, i]^2` over the retained singular values; the pseudo-inverse is never formed.
pub fn resolution_diagonal(jacobian: &Array2<f64>) -> Result<Array1<f64>, Error> {
    let (n_rows, n_columns) = jacobian.dim();
    if n_rows == 0 || n_columns == 0 {
        return Ok(Array1::zeros(n_columns));
    }

    let (_u, sigma, vt) = thin_svd(jacobian)?;
    let sigma_max: f64 = sigma.iter().copied().fold(0.0, f64::max);
    let tolerance: f64 = singular_value_tolerance((n_rows, n_columns), sigma_max);

    let mut diagonal: Array1<f64> = Array1::zeros(n_columns);
    for (i_sigma, row) in vt.axis_iter(Axis(0)).enumerate() {
        if sigma[i_sigma] > tolerance {
            diagonal.zip_mut_with(&row, |value: &mut f64, &v: &f64| *value += v.powi(2));
        }
    }

    return Ok(diagonal);
}

/// Absolute cosine of the angle between two vectors; `None` when either vector is zero
pub fn cosine_similarity(vector_a: ArrayView1<f64>, vector_b: ArrayView1<f64>) -> Option<f64> {
    let norm_a: f64 = vector_a.norm_l2();
    let norm_b: f64 = vector_b.norm_l2();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    return Some((vector_a.dot(&vector_b) / (norm_a * norm_b)).abs());
}

#[cfg(test)]
fn random_matrix(n_rows: usize, n_columns: usize, seed: u64) -> Array2<f64> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng: StdRng = StdRng::seed_from_u64(seed);
    return Array2::from_shape_fn((n_rows, n_columns), |_| rng.random_range(-1.0..1.0));
}

#[test]
fn test_pseudo_inverse_properties() {
    use approx::assert_abs_diff_eq;

    // Tall, wide and rank deficient matrices
    let tall: Array2<f64> = random_matrix(12, 5, 1);
    let wide: Array2<f64> = random_matrix(4, 9, 2);
    let mut rank_deficient: Array2<f64> = random_matrix(6, 6, 3);
    let row_0: Array1<f64> = rank_deficient.row(0).to_owned();
    rank_deficient.row_mut(5).assign(&(&row_0 * 2.0));

    for matrix in [tall, wide, rank_deficient] {
        let matrix_pinv: Array2<f64> = pseudo_inverse(&matrix).expect("pseudo-inverse");
        assert_eq!(matrix_pinv.dim(), (matrix.ncols(), matrix.nrows()));

        // A * pinv(A) * A = A
        let reconstructed: Array2<f64> = matrix.dot(&matrix_pinv).dot(&matrix);
        assert_abs_diff_eq!(reconstructed, matrix, epsilon = 1e-10);
        // pinv(A) * A * pinv(A) = pinv(A)
        let reconstructed_pinv: Array2<f64> = matrix_pinv.dot(&matrix).dot(&matrix_pinv);
        assert_abs_diff_eq!(reconstructed_pinv, matrix_pinv, epsilon = 1e-10);
    }
}

#[test]
fn test_resolution_diagonal_matches_pseudo_inverse() {
    use approx::assert_abs_diff_eq;

    for (n_rows, n_columns, seed) in [(20, 8, 10), (5, 15, 11), (9, 9, 12)] {
        let jacobian: Array2<f64> = random_matrix(n_rows, n_columns, seed);

        let diagonal: Array1<f64> = resolution_diagonal(&jacobian).expect("resolution diagonal");
        let resolution_matrix: Array2<f64> = pseudo_inverse(&jacobian).expect("pseudo-inverse").dot(&jacobian);

        assert_abs_diff_eq!(diagonal, resolution_matrix.diag().to_owned(), epsilon = 1e-10);
        for value in diagonal.iter() {
            assert!(*value >= -1e-12 && *value <= 1.0 + 1e-12, "resolution {} outside [0, 1]", value);
        }
    }

    // Tall, full column rank: every cell is perfectly resolved
    let jacobian: Array2<f64> = random_matrix(30, 6, 13);
    let diagonal: Array1<f64> = resolution_diagonal(&jacobian).expect("resolution diagonal");
    assert_abs_diff_eq!(diagonal, Array1::ones(6), epsilon = 1e-10);

    // No configurations: nothing is resolved
    let diagonal: Array1<f64> = resolution_diagonal(&Array2::zeros((0, 4))).expect("resolution diagonal");
    assert_eq!(diagonal, Array1::<f64>::zeros(4));
}

#[test]
fn test_cosine_similarity() {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let a: Array1<f64> = array![1.0, 0.0, 0.0];
    let b: Array1<f64> = array![-2.0, 0.0, 0.0];
    let c: Array1<f64> = array![1.0, 1.0, 0.0];

    assert_abs_diff_eq!(cosine_similarity(a.view(), b.view()).expect("non-zero"), 1.0);
    assert_abs_diff_eq!(cosine_similarity(a.view(), c.view()).expect("non-zero"), 1.0 / 2.0_f64.sqrt(), epsilon = 1e-15);
    assert_eq!(cosine_similarity(a.view(), Array1::zeros(3).view()), None);
}
