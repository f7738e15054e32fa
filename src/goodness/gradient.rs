use crate::Error;
use crate::mesh::Mesh;
use ndarray::Array1;
use ndarray_stats::QuantileExt;

/// Resistivity gradient magnitude of every cell, normalised to [0, 1]
///
/// # Arguments
/// * `mesh` - parameter mesh
/// * `resistivity` - resistivity per cell, (ohm metre)
///
/// # Returns
/// * per cell: mean over the neighbouring cells of `|rho_cell - rho_neighbour| / distance`, divided by the largest value.
///   Cells without neighbours get zero; a uniform model gives zeros everywhere.
pub fn cell_gradient(mesh: &Mesh, resistivity: &Array1<f64>) -> Result<Array1<f64>, Error> {
    let n_cells: usize = mesh.cell_count();
    if resistivity.len() != n_cells {
        return Err(Error::DimensionMismatch {
            context: "cell gradient resistivities".to_string(),
            expected: n_cells,
            found: resistivity.len(),
        });
    }
    if n_cells == 0 {
        return Ok(Array1::zeros(0));
    }

    let mut gradient: Array1<f64> = Array1::zeros(n_cells);
    for i_cell in 0..n_cells {
        let neighbors: &[usize] = mesh.neighbors_of(i_cell);
        if neighbors.is_empty() {
            continue;
        }
        let mut gradient_sum: f64 = 0.0;
        for &i_neighbor in neighbors {
            let distance: f64 = mesh.center_distance(i_cell, i_neighbor);
            if distance > 0.0 {
                gradient_sum += (resistivity[i_cell] - resistivity[i_neighbor]).abs() / distance;
            }
        }
        gradient[i_cell] = gradient_sum / neighbors.len() as f64;
    }

    let gradient_max: f64 = gradient.max().map_err(|error| Error::Engine(format!("cell gradient: {}", error)))?.to_owned();
    if gradient_max > 0.0 {
        gradient /= gradient_max;
    }

    return Ok(gradient);
}

#[test]
fn test_cell_gradient() {
    use approx::assert_abs_diff_eq;

    // Two columns of three cells, unit spacing; the right column is twice as resistive
    let x_edges: Array1<f64> = Array1::from(vec![0.0, 1.0, 2.0]);
    let y_edges: Array1<f64> = Array1::from(vec![0.0, -1.0, -2.0, -3.0]);
    let mesh: Mesh = Mesh::rectangular_grid(&x_edges, &y_edges, |_x: f64, _y: f64| 1).expect("grid");
    let resistivity: Array1<f64> = Array1::from(vec![10.0, 20.0, 10.0, 20.0, 10.0, 20.0]);

    let gradient: Array1<f64> = cell_gradient(&mesh, &resistivity).expect("gradient");

    // Corner cells: one of two neighbours differs; middle cells: one of three
    assert_abs_diff_eq!(gradient[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(gradient[2], 2.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(gradient[3], 2.0 / 3.0, epsilon = 1e-12);

    // Uniform model
    let gradient: Array1<f64> = cell_gradient(&mesh, &Array1::from_elem(6, 5.0)).expect("gradient");
    assert_eq!(gradient, Array1::<f64>::zeros(6));

    let wrong_length: Result<Array1<f64>, Error> = cell_gradient(&mesh, &Array1::zeros(5));
    assert!(matches!(wrong_length, Err(Error::DimensionMismatch { .. })));
}
