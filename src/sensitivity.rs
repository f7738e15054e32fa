use crate::Error;
use crate::engines::{ForwardEngine, ForwardOperator, InversionEngine, ResistivityModel};
use crate::mesh::Mesh;
use crate::scheme::{Configuration, Scheme, extract_configurations};
use log::{debug, info};
use ndarray::{Array1, Array2};

/// Jacobian of a scheme, restricted to the configurations with physically valid data
#[derive(Clone, Debug, PartialEq)]
pub struct SensitivityMatrix {
    /// shape = [n_rows, n_cells]
    pub values: Array2<f64>,
    /// Configuration index in the source scheme of every row
    pub rows: Vec<usize>,
}

impl SensitivityMatrix {
    pub fn n_rows(&self) -> usize {
        return self.rows.len();
    }

    pub fn n_cells(&self) -> usize {
        return self.values.ncols();
    }
}

/// Sensitivity of `scheme` at the cell resistivities `model` on `mesh`
///
/// # Algorithm
/// 1. Simulate `scheme` without noise.
/// 2. Drop configurations with non-positive apparent resistivity.
/// 3. Ask the inversion engine for a forward operator on `mesh` (background excluded) and its Jacobian at `model`.
///
/// # Returns
/// * Jacobian rows of the surviving configurations, with their index in `scheme`
pub fn compute_jacobian(
    forward_engine: &dyn ForwardEngine,
    inversion_engine: &dyn InversionEngine,
    mesh: &Mesh,
    model: &Array1<f64>,
    scheme: &Scheme,
) -> Result<SensitivityMatrix, Error> {
    info!("Simulating data...");
    let data: Scheme = forward_engine.simulate(mesh, &ResistivityModel::PerCell(model.clone()), scheme, 0.0, 0.0)?;
    if data.len() != scheme.len() {
        return Err(Error::DimensionMismatch {
            context: "simulated configurations".to_string(),
            expected: scheme.len(),
            found: data.len(),
        });
    }

    let rows: Vec<usize> = data
        .configurations()
        .iter()
        .enumerate()
        .filter(|(_, configuration): &(usize, &Configuration)| configuration.rhoa > 0.0)
        .map(|(i_config, _)| i_config)
        .collect();
    debug!("{} of {} configurations have valid data", rows.len(), data.len());

    if rows.is_empty() {
        return Ok(SensitivityMatrix {
            values: Array2::zeros((0, model.len())),
            rows,
        });
    }
    let valid_data: Scheme = extract_configurations(&data, &rows)?;

    info!("Create Jacobian...");
    let mut forward_operator: Box<dyn ForwardOperator + Send + Sync> = inversion_engine.forward_operator(mesh, &valid_data, true)?;
    forward_operator.create_jacobian(model)?;
    let values: Array2<f64> = forward_operator.jacobian().to_owned();

    if values.nrows() != rows.len() {
        return Err(Error::DimensionMismatch {
            context: "Jacobian rows".to_string(),
            expected: rows.len(),
            found: values.nrows(),
        });
    }

    return Ok(SensitivityMatrix { values, rows });
}

#[test]
fn test_compute_jacobian_drops_invalid_data() {
    use crate::electrodes::electrode_line;
    use crate::test_utils::{MockForwardEngine, MockInversionEngine, test_para_mesh};

    let sensors = electrode_line(0.0, 20.0, 5);
    let mesh: Mesh = test_para_mesh(&sensors);
    let model: Array1<f64> = Array1::from_elem(mesh.cell_count(), 100.0);

    // Second configuration has its potential dipole reversed, the mock engine reports negative rhoa for it
    let configurations: Vec<Configuration> = vec![
        Configuration::new(Some(0), Some(3), Some(1), Some(2)),
        Configuration::new(Some(0), Some(3), Some(2), Some(1)),
        Configuration::new(Some(1), Some(4), Some(2), Some(3)),
    ];
    let scheme: Scheme = Scheme::new(sensors, configurations).expect("valid scheme");

    let jacobian: SensitivityMatrix = compute_jacobian(&MockForwardEngine::new(), &MockInversionEngine::new(), &mesh, &model, &scheme).expect("jacobian");

    assert_eq!(jacobian.rows, vec![0, 2]);
    assert_eq!(jacobian.values.dim(), (2, mesh.cell_count()));
    assert!(jacobian.values.iter().any(|value: &f64| *value != 0.0));
}
