use crate::Error;
use crate::electrodes::ElectrodePosition;
use crate::engines::{Engines, ForwardEngine, ForwardOperator, InversionEngine, InversionResult, MeshService, ResistivityModel};
use crate::mesh::{Mesh, StructuredMeshService};
use crate::scheme::{Configuration, Scheme, StandardSchemeGenerator};
use ndarray::{Array1, Array2};
use std::f64::consts::PI;
use std::sync::Arc;

/// Gradient of the potential of a unit point source at `source`, evaluated at `(x, y)`
fn point_source_gradient(source: &ElectrodePosition, x: f64, y: f64) -> [f64; 2] {
    let d_x: f64 = x - source.x;
    let d_y: f64 = y - source.y;
    let distance_cubed: f64 = (d_x.powi(2) + d_y.powi(2)).sqrt().powi(3);
    return [-d_x / distance_cubed, -d_y / distance_cubed];
}

/// Dipole sensitivity kernel `grad(phi_ab) . grad(phi_mn)` at every cell centre
///
/// Missing electrodes (poles) contribute nothing.
pub fn dipole_kernel(sensors: &[ElectrodePosition], configuration: &Configuration, mesh: &Mesh) -> Array1<f64> {
    let cell_centers: &Array2<f64> = mesh.cell_centers();
    let mut kernel: Array1<f64> = Array1::zeros(mesh.cell_count());
    for i_cell in 0..mesh.cell_count() {
        let x: f64 = cell_centers[[i_cell, 0]];
        let y: f64 = cell_centers[[i_cell, 1]];

        let dipole_gradient = |positive: Option<usize>, negative: Option<usize>| -> [f64; 2] {
            let mut gradient: [f64; 2] = [0.0, 0.0];
            for (electrode, sign) in [(positive, 1.0), (negative, -1.0)] {
                if let Some(i_electrode) = electrode {
                    let source_gradient: [f64; 2] = point_source_gradient(&sensors[i_electrode], x, y);
                    gradient[0] += sign * source_gradient[0];
                    gradient[1] += sign * source_gradient[1];
                }
            }
            return gradient;
        };
        let gradient_ab: [f64; 2] = dipole_gradient(configuration.a, configuration.b);
        let gradient_mn: [f64; 2] = dipole_gradient(configuration.m, configuration.n);
        kernel[i_cell] = gradient_ab[0] * gradient_mn[0] + gradient_ab[1] * gradient_mn[1];
    }
    return kernel;
}

/// `1/AM - 1/BM - 1/AN + 1/BN` of a surface configuration
fn geometric_term(sensors: &[ElectrodePosition], configuration: &Configuration) -> f64 {
    let inverse_distance = |current: Option<usize>, potential: Option<usize>| -> f64 {
        return match (current, potential) {
            (Some(i_current), Some(i_potential)) => 1.0 / sensors[i_current].distance_to(&sensors[i_potential]),
            _ => 0.0,
        };
    };
    return inverse_distance(configuration.a, configuration.m) - inverse_distance(configuration.b, configuration.m)
        - inverse_distance(configuration.a, configuration.n)
        + inverse_distance(configuration.b, configuration.n);
}

/// Normalised dipole kernel of every configuration, shape = [n_configurations, n_cells]
fn kernel_matrix(scheme: &Scheme, mesh: &Mesh) -> Array2<f64> {
    let mut matrix: Array2<f64> = Array2::zeros((scheme.len(), mesh.cell_count()));
    for (i_config, configuration) in scheme.configurations().iter().enumerate() {
        let kernel: Array1<f64> = dipole_kernel(scheme.sensor_positions(), configuration, mesh);
        let kernel_sum: f64 = kernel.iter().map(|value: &f64| value.abs()).sum();
        if kernel_sum > 0.0 {
            matrix.row_mut(i_config).assign(&(kernel / kernel_sum));
        }
    }
    return matrix;
}

/// Forward engine with apparent resistivities from a sensitivity weighted mean of the cell resistivities
///
/// The sign follows the geometric factor, so reversed potential dipoles give negative `rhoa`.
/// Noise is not added.
#[derive(Clone, Debug, Default)]
pub struct MockForwardEngine {}

impl MockForwardEngine {
    pub fn new() -> Self {
        MockForwardEngine {}
    }
}

impl ForwardEngine for MockForwardEngine {
    fn simulate(&self, mesh: &Mesh, model: &ResistivityModel, scheme: &Scheme, noise_level: f64, noise_abs: f64) -> Result<Scheme, Error> {
        let cell_resistivities: Array1<f64> = model.cell_values(mesh)?;
        let weights: Array2<f64> = kernel_matrix(scheme, mesh).mapv(f64::abs);

        let mut data: Scheme = scheme.clone();
        let sensors: Vec<ElectrodePosition> = scheme.sensor_positions().to_vec();
        for (i_config, configuration) in data.configurations_mut().iter_mut().enumerate() {
            let geometric: f64 = geometric_term(&sensors, configuration);
            let weight_sum: f64 = weights.row(i_config).sum();
            if geometric == 0.0 || weight_sum == 0.0 {
                configuration.rhoa = 0.0;
                continue;
            }
            let rhoa: f64 = geometric.signum() * weights.row(i_config).dot(&cell_resistivities) / weight_sum;
            configuration.k = 2.0 * PI / geometric;
            configuration.i = 1.0;
            configuration.rhoa = rhoa;
            configuration.r = rhoa / configuration.k;
            configuration.u = configuration.r * configuration.i;
            configuration.err = noise_level / 100.0 + noise_abs / configuration.u.abs().max(f64::MIN_POSITIVE);
        }
        return Ok(data);
    }
}

/// Forward operator whose Jacobian is the normalised dipole kernel
pub struct MockForwardOperator {
    data: Scheme,
    mesh: Mesh,
    jacobian: Array2<f64>,
}

impl ForwardOperator for MockForwardOperator {
    fn create_jacobian(&mut self, model: &Array1<f64>) -> Result<(), Error> {
        if model.len() != self.mesh.cell_count() {
            return Err(Error::DimensionMismatch {
                context: "forward operator model".to_string(),
                expected: self.mesh.cell_count(),
                found: model.len(),
            });
        }
        self.jacobian = kernel_matrix(&self.data, &self.mesh);
        return Ok(());
    }

    fn jacobian(&self) -> &Array2<f64> {
        return &self.jacobian;
    }
}

/// Inversion engine back-projecting the apparent resistivities with the absolute sensitivities
#[derive(Clone, Debug, Default)]
pub struct MockInversionEngine {}

impl MockInversionEngine {
    pub fn new() -> Self {
        MockInversionEngine {}
    }
}

impl InversionEngine for MockInversionEngine {
    fn invert(&self, data: &Scheme, mesh: &Mesh, _lambda: f64) -> Result<InversionResult, Error> {
        if data.is_empty() {
            return Err(Error::EmptyScheme("inversion data".to_string()));
        }
        let weights: Array2<f64> = kernel_matrix(data, mesh).mapv(f64::abs);
        let rhoa: Array1<f64> = data.rhoa();

        let weight_sums: Array1<f64> = weights.sum_axis(ndarray::Axis(0));
        let weighted_rhoa: Array1<f64> = weights.t().dot(&rhoa);
        let mean_rhoa: f64 = rhoa.mean().unwrap_or(1.0);
        let resistivity: Array1<f64> = Array1::from_shape_fn(mesh.cell_count(), |i_cell: usize| {
            if weight_sums[i_cell] > 0.0 { weighted_rhoa[i_cell] / weight_sums[i_cell] } else { mean_rhoa }
        });

        let mut forward_operator: Box<dyn ForwardOperator + Send + Sync> = self.forward_operator(mesh, data, true)?;
        forward_operator.create_jacobian(&resistivity)?;

        return Ok(InversionResult {
            resistivity,
            forward_operator,
            para_domain: mesh.clone(),
        });
    }

    fn forward_operator(&self, mesh: &Mesh, data: &Scheme, _omit_background: bool) -> Result<Box<dyn ForwardOperator + Send + Sync>, Error> {
        return Ok(Box::new(MockForwardOperator {
            data: data.clone(),
            mesh: mesh.clone(),
            jacobian: Array2::zeros((0, mesh.cell_count())),
        }));
    }
}

/// Parameter mesh of one sensor distance cells, a quarter of the spread deep
pub fn test_para_mesh(sensors: &[ElectrodePosition]) -> Mesh {
    let spread: f64 = sensors[sensors.len() - 1].x - sensors[0].x;
    let sensor_distance: f64 = sensors[1].x - sensors[0].x;
    let depth: f64 = 0.25 * spread;
    let n_layers: usize = (depth / sensor_distance).round() as usize;
    return StructuredMeshService::new()
        .create_para_mesh(sensors, 1.0, 1.0, depth, n_layers)
        .expect("can't create parameter mesh");
}

pub fn test_engines() -> Engines {
    Engines {
        mesh_service: Arc::new(StructuredMeshService::new()),
        forward_engine: Arc::new(MockForwardEngine::new()),
        inversion_engine: Arc::new(MockInversionEngine::new()),
        scheme_generator: Arc::new(StandardSchemeGenerator::new()),
    }
}
