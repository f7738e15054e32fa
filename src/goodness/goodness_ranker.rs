use crate::Error;
use crate::linalg::resolution_diagonal;
use crate::scheme::{Scheme, find_duplicate_configurations};
use crate::sensitivity::SensitivityMatrix;
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use ndarray_linalg::Norm;
use rayon::prelude::*;
use std::collections::HashSet;

/// Resolution ratios `r_base / r_compr` are only formed where `r_compr` exceeds this
const RESOLUTION_TOLERANCE: f64 = 1e-12;

/// Selection settings of one update
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionSettings {
    /// Maximum number of configurations added per iteration
    pub addconfig_count: usize,
    /// Share of the budget selected by gradient score, within [0, 1]
    pub gradient_weight: f64,
    /// Candidates with a cosine similarity at or above this against any base row are rejected, within (0, 1]
    pub li_threshold: f64,
}

/// Split the budget into `(grad_count, res_count)`
///
/// `grad_count = floor(addconfig_count * gradient_weight)`, `res_count` is the rest.
pub fn split_budget(addconfig_count: usize, gradient_weight: f64) -> (usize, usize) {
    let grad_count: usize = ((addconfig_count as f64 * gradient_weight).floor() as usize).min(addconfig_count);
    let res_count: usize = addconfig_count - grad_count;
    return (grad_count, res_count);
}

/// Per-cell weight of the resolution score: `(1 - r_base / r_compr) / gj_sum`
///
/// `gj_sum` is the summed absolute comprehensive sensitivity divided by `n (n-1) (n-2) (n-3) / 8`,
/// the number of distinct four-electrode configurations on `n` electrodes.
/// Cells without sensitivity or resolution in the comprehensive set get zero weight.
fn resolution_cell_weights(j_compr: &Array2<f64>, r_base: &Array1<f64>, r_compr: &Array1<f64>, n_electrodes: usize) -> Array1<f64> {
    let n_electrodes: f64 = n_electrodes as f64;
    let n_possible_configs: f64 = (n_electrodes * (n_electrodes - 1.0) * (n_electrodes - 2.0) * (n_electrodes - 3.0) / 8.0).max(1.0);

    let gj_sum: Array1<f64> = j_compr.mapv(f64::abs).sum_axis(Axis(0)) / n_possible_configs;

    let cell_weights: Array1<f64> = Array1::from_shape_fn(gj_sum.len(), |i_cell: usize| {
        if gj_sum[i_cell] > 0.0 && r_compr[i_cell] > RESOLUTION_TOLERANCE {
            return (1.0 - r_base[i_cell] / r_compr[i_cell]) / gj_sum[i_cell];
        }
        return 0.0;
    });
    return cell_weights;
}

/// Positions of `scores` sorted by descending score; ties keep their order
fn ranked(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&i, &j| scores[j].total_cmp(&scores[i]));
    return order;
}

/// Whether `candidate` is sufficiently independent of every base row
///
/// Zero base rows are ignored; a zero candidate carries no information and is rejected.
fn is_linearly_independent(candidate: ArrayView1<f64>, j_base: &Array2<f64>, base_norms: &Array1<f64>, li_threshold: f64) -> bool {
    let candidate_norm: f64 = candidate.norm_l2();
    if candidate_norm == 0.0 {
        return false;
    }
    let inner_products: Array1<f64> = j_base.dot(&candidate);
    let independent: bool = inner_products
        .iter()
        .zip(base_norms.iter())
        .filter(|(_, base_norm)| **base_norm > 0.0)
        .all(|(inner_product, base_norm)| (inner_product / (base_norm * candidate_norm)).abs() < li_threshold);
    return independent;
}

/// Select the configurations to add from the comprehensive scheme
///
/// # Arguments
/// * `scheme_base` - configurations in use, each must be part of `scheme_compr`
/// * `scheme_compr` - candidate pool
/// * `j_base` - Jacobian of the configurations in use, shape = [n_base_rows, n_cells]
/// * `j_compr` - Jacobian of the candidate pool, rows mapped to `scheme_compr` configurations
/// * `cell_gradient` - normalised resistivity gradient per cell, required when `gradient_weight > 0`
/// * `settings` - budget, gradient weight and linear independence threshold
///
/// # Returns
/// * indices into `scheme_compr`, resolution picks first, without duplicates; at most `addconfig_count` long
///
/// # Algorithm
/// 1. Candidates are the comprehensive rows whose configuration is not already in use.
/// 2. Resolution score: `sum_cell |j[cell]| * (1 - r_base[cell] / r_compr[cell]) / gj_sum[cell]`,
///    with the resolution diagonals of both Jacobians.
/// 3. Gradient score: `sum_cell gradient[cell]`, the same for every candidate.
/// 4. Walk the resolution ranking, accepting candidates whose cosine similarity against every base row is below
///    `li_threshold`, until `res_count` are accepted.
/// 5. Fill the rest of the budget from the gradient ranking without the independence test.
pub fn select_configurations(
    scheme_base: &Scheme,
    scheme_compr: &Scheme,
    j_base: &Array2<f64>,
    j_compr: &SensitivityMatrix,
    cell_gradient: Option<&Array1<f64>>,
    settings: &SelectionSettings,
) -> Result<Vec<usize>, Error> {
    let n_cells: usize = j_compr.n_cells();
    if j_compr.values.nrows() != j_compr.rows.len() {
        return Err(Error::DimensionMismatch {
            context: "comprehensive Jacobian row mapping".to_string(),
            expected: j_compr.values.nrows(),
            found: j_compr.rows.len(),
        });
    }
    if j_base.ncols() != n_cells {
        return Err(Error::DimensionMismatch {
            context: "base Jacobian cells".to_string(),
            expected: n_cells,
            found: j_base.ncols(),
        });
    }
    if let Some(&bad_index) = j_compr.rows.iter().find(|&&i_config| i_config >= scheme_compr.len()) {
        return Err(Error::IndexOutOfRange {
            index: bad_index,
            len: scheme_compr.len(),
        });
    }

    // Candidates: rows of configurations not in use
    let duplicates: HashSet<usize> = find_duplicate_configurations(scheme_compr, scheme_base)?.into_iter().collect();
    let candidate_rows: Vec<usize> = (0..j_compr.n_rows()).filter(|&i_row| !duplicates.contains(&j_compr.rows[i_row])).collect();
    info!("{} candidate configurations, {} in use", candidate_rows.len(), duplicates.len());
    if candidate_rows.is_empty() || settings.addconfig_count == 0 {
        return Ok(vec![]);
    }

    // Resolution score
    let r_base: Array1<f64> = resolution_diagonal(j_base)?;
    let r_compr: Array1<f64> = resolution_diagonal(&j_compr.values)?;
    let cell_weights: Array1<f64> = resolution_cell_weights(&j_compr.values, &r_base, &r_compr, scheme_compr.sensor_positions().len());
    let res_gf: Vec<f64> = candidate_rows
        .par_iter()
        .map(|&i_row: &usize| {
            let score: f64 = j_compr
                .values
                .row(i_row)
                .iter()
                .zip(cell_weights.iter())
                .map(|(sensitivity, cell_weight)| sensitivity.abs() * cell_weight)
                .sum();
            return score;
        })
        .collect();
    let res_ranking: Vec<usize> = ranked(&res_gf);

    // Budget
    let (grad_count, res_count) = split_budget(settings.addconfig_count, settings.gradient_weight);
    debug!("Budget: {} by resolution, {} by gradient", res_count, grad_count);

    // Resolution picks, linearly independent of the base configurations
    let base_norms: Array1<f64> = j_base.map_axis(Axis(1), |row| row.norm_l2());
    let mut selected_rows: Vec<usize> = Vec::with_capacity(settings.addconfig_count);
    let mut n_rejected: usize = 0;
    for &i_candidate in &res_ranking {
        if selected_rows.len() >= res_count {
            break;
        }
        let i_row: usize = candidate_rows[i_candidate];
        if is_linearly_independent(j_compr.values.row(i_row), j_base, &base_norms, settings.li_threshold) {
            selected_rows.push(i_row);
        } else {
            n_rejected += 1;
        }
    }
    info!("{} configurations selected by resolution, {} rejected as dependent", selected_rows.len(), n_rejected);

    // Gradient picks fill the rest of the budget
    if settings.gradient_weight > 0.0 {
        let cell_gradient: &Array1<f64> = cell_gradient.ok_or(Error::InvalidState {
            expected: "cell gradient for gradient weighting".to_string(),
            found: "no cell gradient".to_string(),
        })?;
        if cell_gradient.len() != n_cells {
            return Err(Error::DimensionMismatch {
                context: "cell gradient".to_string(),
                expected: n_cells,
                found: cell_gradient.len(),
            });
        }
        // TODO: weight the gradient by the candidate's own sensitivity once the intended score is settled
        let gradient_total: f64 = cell_gradient.sum();
        let grad_gf: Vec<f64> = vec![gradient_total; candidate_rows.len()];
        let grad_ranking: Vec<usize> = ranked(&grad_gf);

        let already_selected: HashSet<usize> = selected_rows.iter().copied().collect();
        let n_by_resolution: usize = selected_rows.len();
        for &i_candidate in &grad_ranking {
            if selected_rows.len() >= settings.addconfig_count {
                break;
            }
            let i_row: usize = candidate_rows[i_candidate];
            if !already_selected.contains(&i_row) {
                selected_rows.push(i_row);
            }
        }
        info!("{} configurations selected by gradient", selected_rows.len() - n_by_resolution);
    }

    // Back to comprehensive numbering, rows never share a configuration but keep the result unique
    let mut seen: HashSet<usize> = HashSet::with_capacity(selected_rows.len());
    let selection: Vec<usize> = selected_rows
        .into_iter()
        .map(|i_row: usize| j_compr.rows[i_row])
        .filter(|i_config: &usize| seen.insert(*i_config))
        .collect();

    return Ok(selection);
}

#[cfg(test)]
struct RankerFixture {
    scheme_base: Scheme,
    scheme_compr: Scheme,
    j_base: Array2<f64>,
    j_compr: SensitivityMatrix,
    base_indices: Vec<usize>,
}

/// Comprehensive pool on 11 electrodes with random sensitivities, dipole-dipole in use
#[cfg(test)]
fn ranker_fixture(n_cells: usize, seed: u64) -> RankerFixture {
    use crate::electrodes::electrode_line;
    use crate::engines::SchemeGenerator;
    use crate::goodness::build_comprehensive_scheme;
    use crate::scheme::StandardSchemeGenerator;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let generator: StandardSchemeGenerator = StandardSchemeGenerator::new();
    let scheme_names: Vec<String> = ["dd", "wa", "wb", "slm", "pd"].iter().map(|name| name.to_string()).collect();
    let scheme_compr: Scheme = build_comprehensive_scheme(&generator, 50.0, 5.0, 0.0, &scheme_names).expect("comprehensive scheme");
    let scheme_base: Scheme = generator.create_scheme(&electrode_line(0.0, 50.0, 11), "dd").expect("base scheme");

    let mut rng: StdRng = StdRng::seed_from_u64(seed);
    let values: Array2<f64> = Array2::from_shape_fn((scheme_compr.len(), n_cells), |_| rng.random_range(-1.0..1.0));
    let j_compr: SensitivityMatrix = SensitivityMatrix {
        values,
        rows: (0..scheme_compr.len()).collect(),
    };

    let base_indices: Vec<usize> = find_duplicate_configurations(&scheme_compr, &scheme_base).expect("base in pool");
    let j_base: Array2<f64> = j_compr.values.select(Axis(0), &base_indices);

    return RankerFixture {
        scheme_base,
        scheme_compr,
        j_base,
        j_compr,
        base_indices,
    };
}

#[test]
fn test_split_budget() {
    assert_eq!(split_budget(100, 0.0), (0, 100));
    assert_eq!(split_budget(50, 1.0), (50, 0));
    assert_eq!(split_budget(10, 0.25), (2, 8));
    assert_eq!(split_budget(0, 0.5), (0, 0));
}

#[test]
fn test_select_configurations_budget_and_independence() {
    use crate::linalg::cosine_similarity;

    let fixture: RankerFixture = ranker_fixture(30, 7);
    let settings: SelectionSettings = SelectionSettings {
        addconfig_count: 20,
        gradient_weight: 0.0,
        li_threshold: 0.5,
    };

    let selection: Vec<usize> = select_configurations(&fixture.scheme_base, &fixture.scheme_compr, &fixture.j_base, &fixture.j_compr, None, &settings).expect("selection");

    assert!(selection.len() <= settings.addconfig_count);
    let unique: HashSet<usize> = selection.iter().copied().collect();
    assert_eq!(unique.len(), selection.len());
    for i_config in &selection {
        assert!(!fixture.base_indices.contains(i_config), "configuration {} is already in use", i_config);
        for base_row in fixture.j_base.outer_iter() {
            let similarity: f64 = cosine_similarity(fixture.j_compr.values.row(*i_config), base_row).expect("non-zero rows");
            assert!(similarity < settings.li_threshold);
        }
    }

    // Random rows are never parallel: the budget is met exactly
    let settings: SelectionSettings = SelectionSettings {
        addconfig_count: 25,
        gradient_weight: 0.0,
        li_threshold: 1.0,
    };
    let selection: Vec<usize> = select_configurations(&fixture.scheme_base, &fixture.scheme_compr, &fixture.j_base, &fixture.j_compr, None, &settings).expect("selection");
    assert_eq!(selection.len(), 25);
}

#[test]
fn test_select_configurations_gradient_only() {
    let fixture: RankerFixture = ranker_fixture(30, 8);
    let settings: SelectionSettings = SelectionSettings {
        addconfig_count: 50,
        gradient_weight: 1.0,
        // Would reject every candidate if it were applied
        li_threshold: 1e-9,
    };
    let cell_gradient: Array1<f64> = Array1::linspace(0.0, 1.0, 30);

    let selection: Vec<usize> = select_configurations(
        &fixture.scheme_base,
        &fixture.scheme_compr,
        &fixture.j_base,
        &fixture.j_compr,
        Some(&cell_gradient),
        &settings,
    )
    .expect("selection");

    // The gradient score is the same for all candidates, so the first 50 unused configurations are taken
    let expected: Vec<usize> = (0..fixture.scheme_compr.len()).filter(|i_config| !fixture.base_indices.contains(i_config)).take(50).collect();
    assert_eq!(selection, expected);

    // Gradient weighting without a gradient
    let missing: Result<Vec<usize>, Error> = select_configurations(&fixture.scheme_base, &fixture.scheme_compr, &fixture.j_base, &fixture.j_compr, None, &settings);
    assert!(matches!(missing, Err(Error::InvalidState { .. })));
}

#[test]
fn test_select_configurations_nothing_to_add() {
    let fixture: RankerFixture = ranker_fixture(10, 9);
    let settings: SelectionSettings = SelectionSettings {
        addconfig_count: 100,
        gradient_weight: 0.0,
        li_threshold: 0.8,
    };

    // The base already holds the whole pool
    let selection: Vec<usize> = select_configurations(
        &fixture.scheme_compr,
        &fixture.scheme_compr,
        &fixture.j_compr.values,
        &fixture.j_compr,
        None,
        &settings,
    )
    .expect("selection");

    assert!(selection.is_empty());
}

#[test]
fn test_select_configurations_prefers_unresolved_cells() {
    use crate::electrodes::electrode_line;
    use crate::engines::SchemeGenerator;
    use crate::scheme::StandardSchemeGenerator;

    // Four cells; the base only sees cells 0 and 1
    let generator: StandardSchemeGenerator = StandardSchemeGenerator::new();
    let scheme_compr: Scheme = generator.create_scheme(&electrode_line(0.0, 25.0, 6), "wa").expect("scheme");
    assert_eq!(scheme_compr.len(), 3);
    let scheme_base: Scheme = crate::scheme::extract_configurations(&scheme_compr, &[0]).expect("base");

    let j_compr: SensitivityMatrix = SensitivityMatrix {
        values: ndarray::array![[1.0, 1.0, 0.0, 0.0], [1.0, 0.5, 0.0, 0.0], [0.0, 0.1, 1.0, 0.5]],
        rows: vec![0, 1, 2],
    };
    let j_base: Array2<f64> = ndarray::array![[1.0, 1.0, 0.0, 0.0]];
    let settings: SelectionSettings = SelectionSettings {
        addconfig_count: 1,
        gradient_weight: 0.0,
        li_threshold: 0.99,
    };

    let selection: Vec<usize> = select_configurations(&scheme_base, &scheme_compr, &j_base, &j_compr, None, &settings).expect("selection");

    assert_eq!(selection, vec![2]);
}

#[test]
fn test_select_configurations_skips_dependent_candidates() {
    use crate::electrodes::electrode_line;
    use crate::engines::SchemeGenerator;
    use crate::scheme::StandardSchemeGenerator;

    // Four cells; configuration 0 is in use, configuration 1 has the same sensitivity pattern as the base
    let generator: StandardSchemeGenerator = StandardSchemeGenerator::new();
    let scheme_compr: Scheme = generator.create_scheme(&electrode_line(0.0, 25.0, 6), "wa").expect("scheme");
    assert_eq!(scheme_compr.len(), 3);
    let scheme_base: Scheme = crate::scheme::extract_configurations(&scheme_compr, &[0]).expect("base");

    let j_compr: SensitivityMatrix = SensitivityMatrix {
        values: ndarray::array![[1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 5.0, 0.0], [0.0, 0.0, 0.0, 0.1]],
        rows: vec![0, 1, 2],
    };
    let j_base: Array2<f64> = ndarray::array![[1.0, 0.0, 5.0, 0.0]];
    let cell_gradient: Array1<f64> = ndarray::array![0.0, 0.25, 1.0, 0.5];

    // Configuration 2 ranks first (score 45 against 23.4), configuration 1 is parallel to the base row
    let settings: SelectionSettings = SelectionSettings {
        addconfig_count: 2,
        gradient_weight: 0.0,
        li_threshold: 0.8,
    };
    let selection: Vec<usize> = select_configurations(&scheme_base, &scheme_compr, &j_base, &j_compr, None, &settings).expect("selection");
    assert_eq!(selection, vec![2]);

    // Half the budget by gradient: the gradient pick is not tested for independence
    let settings: SelectionSettings = SelectionSettings {
        addconfig_count: 2,
        gradient_weight: 0.5,
        li_threshold: 0.8,
    };
    let selection: Vec<usize> =
        select_configurations(&scheme_base, &scheme_compr, &j_base, &j_compr, Some(&cell_gradient), &settings).expect("selection");
    assert_eq!(selection, vec![2, 1]);

    // No gradient budget (floor(2 * 0.1) = 0), the rejected resolution pick is made up from the gradient ranking
    let settings: SelectionSettings = SelectionSettings {
        addconfig_count: 2,
        gradient_weight: 0.1,
        li_threshold: 0.8,
    };
    assert_eq!(split_budget(2, 0.1), (0, 2));
    let selection: Vec<usize> =
        select_configurations(&scheme_base, &scheme_compr, &j_base, &j_compr, Some(&cell_gradient), &settings).expect("selection");
    assert_eq!(selection, vec![2, 1]);
}
