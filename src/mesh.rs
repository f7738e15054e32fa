use crate::Error;
use crate::electrodes::ElectrodePosition;
use crate::engines::MeshService;
use crate::world::World;
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;

/// Cell based discretisation of the subsurface
///
/// Only what the experimental design needs is stored: cell centres, region markers and the cell adjacency.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    cell_centers: Array2<f64>, // shape = [n_cells, 3]
    cell_markers: Vec<i32>,
    neighbors: Vec<Vec<usize>>,
}

impl Mesh {
    pub fn new(cell_centers: Array2<f64>, cell_markers: Vec<i32>, neighbors: Vec<Vec<usize>>) -> Result<Self, Error> {
        let n_cells: usize = cell_centers.nrows();
        if cell_centers.ncols() != 3 {
            return Err(Error::DimensionMismatch {
                context: "mesh cell centre coordinates".to_string(),
                expected: 3,
                found: cell_centers.ncols(),
            });
        }
        if cell_markers.len() != n_cells {
            return Err(Error::DimensionMismatch {
                context: "mesh cell markers".to_string(),
                expected: n_cells,
                found: cell_markers.len(),
            });
        }
        if neighbors.len() != n_cells {
            return Err(Error::DimensionMismatch {
                context: "mesh cell neighbours".to_string(),
                expected: n_cells,
                found: neighbors.len(),
            });
        }
        for cell_neighbors in &neighbors {
            if let Some(&bad_index) = cell_neighbors.iter().find(|&&i_neighbor| i_neighbor >= n_cells) {
                return Err(Error::IndexOutOfRange {
                    index: bad_index,
                    len: n_cells,
                });
            }
        }

        return Ok(Mesh {
            cell_centers,
            cell_markers,
            neighbors,
        });
    }

    /// Regular grid of rectangular cells
    ///
    /// # Arguments
    /// * `x_edges` - cell edges along the profile, ascending, (metre)
    /// * `y_edges` - cell edges in depth, descending from the surface, (metre)
    /// * `marker_at` - region marker of a cell given its centre
    ///
    /// # Returns
    /// * mesh with `(x_edges.len() - 1) * (y_edges.len() - 1)` cells, numbered row by row from the surface;
    ///   neighbours share an edge
    pub fn rectangular_grid<F>(x_edges: &Array1<f64>, y_edges: &Array1<f64>, marker_at: F) -> Result<Self, Error>
    where
        F: Fn(f64, f64) -> i32,
    {
        if x_edges.len() < 2 || y_edges.len() < 2 {
            return Err(Error::DimensionMismatch {
                context: "rectangular grid edges".to_string(),
                expected: 2,
                found: x_edges.len().min(y_edges.len()),
            });
        }

        let n_x: usize = x_edges.len() - 1;
        let n_y: usize = y_edges.len() - 1;
        let n_cells: usize = n_x * n_y;

        let mut cell_centers: Array2<f64> = Array2::zeros((n_cells, 3));
        let mut cell_markers: Vec<i32> = Vec::with_capacity(n_cells);
        let mut neighbors: Vec<Vec<usize>> = Vec::with_capacity(n_cells);
        for i_y in 0..n_y {
            for i_x in 0..n_x {
                let i_cell: usize = i_y * n_x + i_x;
                let x: f64 = 0.5 * (x_edges[i_x] + x_edges[i_x + 1]);
                let y: f64 = 0.5 * (y_edges[i_y] + y_edges[i_y + 1]);
                cell_centers[[i_cell, 0]] = x;
                cell_centers[[i_cell, 1]] = y;
                cell_markers.push(marker_at(x, y));

                let mut cell_neighbors: Vec<usize> = Vec::with_capacity(4);
                if i_x > 0 {
                    cell_neighbors.push(i_cell - 1);
                }
                if i_x + 1 < n_x {
                    cell_neighbors.push(i_cell + 1);
                }
                if i_y > 0 {
                    cell_neighbors.push(i_cell - n_x);
                }
                if i_y + 1 < n_y {
                    cell_neighbors.push(i_cell + n_x);
                }
                neighbors.push(cell_neighbors);
            }
        }

        return Mesh::new(cell_centers, cell_markers, neighbors);
    }

    pub fn cell_count(&self) -> usize {
        return self.cell_markers.len();
    }

    /// Cell centres, shape = [n_cells, 3]
    pub fn cell_centers(&self) -> &Array2<f64> {
        return &self.cell_centers;
    }

    pub fn cell_markers(&self) -> &[i32] {
        return &self.cell_markers;
    }

    pub fn neighbors_of(&self, i_cell: usize) -> &[usize] {
        return &self.neighbors[i_cell];
    }

    /// Number of distinct region markers
    pub fn unique_marker_count(&self) -> usize {
        let markers: BTreeSet<i32> = self.cell_markers.iter().copied().collect();
        return markers.len();
    }

    /// Distance between the centres of two cells, (metre)
    pub fn center_distance(&self, i_cell: usize, j_cell: usize) -> f64 {
        let d_x: f64 = self.cell_centers[[i_cell, 0]] - self.cell_centers[[j_cell, 0]];
        let d_y: f64 = self.cell_centers[[i_cell, 1]] - self.cell_centers[[j_cell, 1]];
        let d_z: f64 = self.cell_centers[[i_cell, 2]] - self.cell_centers[[j_cell, 2]];
        return (d_x.powi(2) + d_y.powi(2) + d_z.powi(2)).sqrt();
    }
}

/// Cell edges from `start` to `end` with steps no larger than `max_step`
fn edges(start: f64, end: f64, max_step: f64) -> Array1<f64> {
    let n_steps: usize = ((end - start).abs() / max_step).ceil().max(1.0) as usize;
    return Array1::linspace(start, end, n_steps + 1);
}

/// Mesh service producing structured rectangular meshes
///
/// The simulation mesh covers the whole world with cells of (at most) `sqrt(max_area)` side length,
/// refined to half that size around the refinement nodes. Parameter meshes cover the electrode spread down to
/// `para_depth`.
#[derive(Clone, Debug, Default)]
pub struct StructuredMeshService {}

impl StructuredMeshService {
    pub fn new() -> Self {
        StructuredMeshService {}
    }
}

impl MeshService for StructuredMeshService {
    fn create_mesh(&self, world: &World, refinement_nodes: &[ElectrodePosition], _quality: f64, max_area: f64) -> Result<Mesh, Error> {
        let (world_x, world_z) = world.dimensions();
        let cell_size: f64 = if max_area > 0.0 { max_area.sqrt() } else { world_x.min(world_z) / 20.0 };

        // Coarse grid, with additional edges half a cell either side of every refinement node
        let mut x_edges: Vec<f64> = edges(0.0, world_x, cell_size).to_vec();
        for node in refinement_nodes {
            for x in [node.x - 0.25 * cell_size, node.x + 0.25 * cell_size] {
                if x > 0.0 && x < world_x {
                    x_edges.push(x);
                }
            }
        }
        x_edges.sort_by(|a, b| a.total_cmp(b));
        x_edges.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

        let mut y_edges: Vec<f64> = edges(0.0, -world_z, cell_size).to_vec();
        if !refinement_nodes.is_empty() {
            y_edges.push(-0.5 * cell_size);
        }
        y_edges.sort_by(|a, b| b.total_cmp(a));
        y_edges.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

        return Mesh::rectangular_grid(&Array1::from(x_edges), &Array1::from(y_edges), |x: f64, y: f64| world.region_marker_at(x, y));
    }

    fn create_para_mesh(&self, sensors: &[ElectrodePosition], para_dx: f64, para_dz: f64, para_depth: f64, n_layers: usize) -> Result<Mesh, Error> {
        if sensors.len() < 2 {
            return Err(Error::DimensionMismatch {
                context: "parameter mesh sensors".to_string(),
                expected: 2,
                found: sensors.len(),
            });
        }

        // `para_dx` and `para_dz` are relative to the sensor distance
        let sensor_distance: f64 = sensors[1].x - sensors[0].x;
        let x_min: f64 = sensors.iter().map(|sensor: &ElectrodePosition| sensor.x).fold(f64::INFINITY, f64::min);
        let x_max: f64 = sensors.iter().map(|sensor: &ElectrodePosition| sensor.x).fold(f64::NEG_INFINITY, f64::max);
        let x_edges: Array1<f64> = edges(x_min, x_max, para_dx * sensor_distance);

        let n_layers: usize = n_layers.max(1);
        let d_z: f64 = (para_dz * sensor_distance).min(para_depth / n_layers as f64);
        let y_edges: Array1<f64> = edges(0.0, -para_depth, d_z);

        // Parameter cells all belong to the same inversion region
        return Mesh::rectangular_grid(&x_edges, &y_edges, |_x: f64, _y: f64| 2);
    }
}

#[test]
fn test_rectangular_grid() {
    use approx::assert_abs_diff_eq;

    let x_edges: Array1<f64> = Array1::from(vec![0.0, 1.0, 2.0, 3.0]);
    let y_edges: Array1<f64> = Array1::from(vec![0.0, -1.0, -3.0]);
    let mesh: Mesh = Mesh::rectangular_grid(&x_edges, &y_edges, |x: f64, _y: f64| if x < 1.5 { 1 } else { 2 }).expect("grid");

    assert_eq!(mesh.cell_count(), 6);
    assert_eq!(mesh.unique_marker_count(), 2);
    assert_abs_diff_eq!(mesh.cell_centers()[[4, 0]], 1.5);
    assert_abs_diff_eq!(mesh.cell_centers()[[4, 1]], -2.0);

    // Corner cell has two neighbours, the middle surface cell three
    assert_eq!(mesh.neighbors_of(0), &[1, 3]);
    assert_eq!(mesh.neighbors_of(1), &[0, 2, 4]);
    assert_abs_diff_eq!(mesh.center_distance(1, 4), 1.5);
}

#[test]
fn test_structured_mesh_service() {
    use crate::electrodes::electrode_line;

    let world: World = World::Inclusion {
        world_x: 100.0,
        world_z: 50.0,
        start: [40.0, -10.0],
        dimension: [20.0, 10.0],
    };
    let sensors: Vec<ElectrodePosition> = electrode_line(0.0, 100.0, 21);
    let mesh_service: StructuredMeshService = StructuredMeshService::new();

    let mesh: Mesh = mesh_service.create_mesh(&world, &sensors, 34.0, 25.0).expect("simulation mesh");
    assert_eq!(mesh.unique_marker_count(), 2);

    // Parameter mesh: 5 metre sensor distance, cells of one sensor distance, 4 layers down to 20 metre
    let para_mesh: Mesh = mesh_service.create_para_mesh(&sensors, 1.0, 1.0, 20.0, 4).expect("parameter mesh");
    assert_eq!(para_mesh.cell_count(), 20 * 4);
    assert_eq!(para_mesh.unique_marker_count(), 1);
}
