use crate::Error;
use crate::electrodes::ElectrodePosition;
use crate::mesh::Mesh;
use crate::scheme::Scheme;
use crate::world::World;
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// Resistivity model handed to the forward engine
#[derive(Clone, Debug, PartialEq)]
pub enum ResistivityModel {
    /// `(region marker, resistivity)` pairs, (ohm metre)
    ByRegion(Vec<(i32, f64)>),
    /// One resistivity per mesh cell, (ohm metre)
    PerCell(Array1<f64>),
}

impl ResistivityModel {
    /// Region model with markers `1..=n` for the given resistivities
    pub fn from_resistivities(resistivities: &[f64]) -> Self {
        let pairs: Vec<(i32, f64)> = resistivities
            .iter()
            .enumerate()
            .map(|(i_region, &resistivity)| (i_region as i32 + 1, resistivity))
            .collect();
        return ResistivityModel::ByRegion(pairs);
    }

    /// Resistivity of every cell of `mesh`
    pub fn cell_values(&self, mesh: &Mesh) -> Result<Array1<f64>, Error> {
        match self {
            ResistivityModel::ByRegion(pairs) => {
                let mut values: Array1<f64> = Array1::zeros(mesh.cell_count());
                for (i_cell, marker) in mesh.cell_markers().iter().enumerate() {
                    let resistivity: f64 = pairs
                        .iter()
                        .find(|(region, _)| region == marker)
                        .map(|(_, resistivity)| *resistivity)
                        .ok_or(Error::ModelMismatch {
                            mesh_regions: mesh.unique_marker_count(),
                            resistivities: pairs.len(),
                        })?;
                    values[i_cell] = resistivity;
                }
                return Ok(values);
            }
            ResistivityModel::PerCell(values) => {
                if values.len() != mesh.cell_count() {
                    return Err(Error::DimensionMismatch {
                        context: "cell resistivities".to_string(),
                        expected: mesh.cell_count(),
                        found: values.len(),
                    });
                }
                return Ok(values.clone());
            }
        }
    }
}

/// Generates the configurations of a named array type on a line of electrodes
pub trait SchemeGenerator {
    fn create_scheme(&self, electrodes: &[ElectrodePosition], scheme_name: &str) -> Result<Scheme, Error>;
}

/// Builds simulation and parameter meshes
pub trait MeshService {
    /// Simulation mesh of `world`, refined around `refinement_nodes`
    fn create_mesh(&self, world: &World, refinement_nodes: &[ElectrodePosition], quality: f64, max_area: f64) -> Result<Mesh, Error>;

    /// Parameter mesh below `sensors`; `para_dx` and `para_dz` are relative to the sensor distance
    fn create_para_mesh(&self, sensors: &[ElectrodePosition], para_dx: f64, para_dz: f64, para_depth: f64, n_layers: usize) -> Result<Mesh, Error>;
}

/// Synthetic measurements
pub trait ForwardEngine {
    /// Simulate the configurations of `scheme`
    ///
    /// # Returns
    /// * copy of `scheme` with `rhoa` (and the other measured fields) filled in; noise is relative
    ///   (`noise_level`, percent) plus absolute (`noise_abs`, volt)
    fn simulate(&self, mesh: &Mesh, model: &ResistivityModel, scheme: &Scheme, noise_level: f64, noise_abs: f64) -> Result<Scheme, Error>;
}

/// Forward operator of an inversion, able to provide the sensitivity of its data set
pub trait ForwardOperator {
    /// Compute the Jacobian at the cell resistivities `model`
    fn create_jacobian(&mut self, model: &Array1<f64>) -> Result<(), Error>;

    /// Last computed Jacobian, shape = [n_configurations, n_cells]
    fn jacobian(&self) -> &Array2<f64>;
}

/// Outcome of an inversion
pub struct InversionResult {
    /// Resistivity per parameter cell, (ohm metre)
    pub resistivity: Array1<f64>,
    pub forward_operator: Box<dyn ForwardOperator + Send + Sync>,
    /// Mesh the resistivities live on
    pub para_domain: Mesh,
}

/// Regularised inversion
pub trait InversionEngine {
    fn invert(&self, data: &Scheme, mesh: &Mesh, lambda: f64) -> Result<InversionResult, Error>;

    /// Forward operator for `data` on `mesh`; the background region is left out when `omit_background` is set
    fn forward_operator(&self, mesh: &Mesh, data: &Scheme, omit_background: bool) -> Result<Box<dyn ForwardOperator + Send + Sync>, Error>;
}

/// Collaborators used for a run
#[derive(Clone)]
pub struct Engines {
    pub mesh_service: Arc<dyn MeshService + Send + Sync>,
    pub forward_engine: Arc<dyn ForwardEngine + Send + Sync>,
    pub inversion_engine: Arc<dyn InversionEngine + Send + Sync>,
    pub scheme_generator: Arc<dyn SchemeGenerator + Send + Sync>,
}

#[test]
fn test_resistivity_model_cell_values() {
    let x_edges: Array1<f64> = Array1::from(vec![0.0, 1.0, 2.0]);
    let y_edges: Array1<f64> = Array1::from(vec![0.0, -1.0]);
    let mesh: Mesh = Mesh::rectangular_grid(&x_edges, &y_edges, |x: f64, _y: f64| if x < 1.0 { 1 } else { 2 }).expect("grid");

    let model: ResistivityModel = ResistivityModel::from_resistivities(&[10.0, 100.0]);
    assert_eq!(model.cell_values(&mesh).expect("cell values"), Array1::from(vec![10.0, 100.0]));

    // Missing region
    let model: ResistivityModel = ResistivityModel::from_resistivities(&[10.0]);
    assert!(matches!(model.cell_values(&mesh), Err(Error::ModelMismatch { .. })));

    let model: ResistivityModel = ResistivityModel::PerCell(Array1::from(vec![1.0, 2.0, 3.0]));
    assert!(matches!(model.cell_values(&mesh), Err(Error::DimensionMismatch { .. })));
}
