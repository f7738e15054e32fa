use ndarray::{Array1, Array2};
use numpy::IntoPyArray; // converting to python data types
use numpy::PyArrayMethods; // used in to convert python data into ndarray
use numpy::{PyArray1, PyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::path::Path;

mod config;
pub use config::InversionConfiguration;
mod controller;
pub use controller::{ControllerState, IterationController, IterationOutcome, IterationStep, RunContext};
mod electrodes;
pub use electrodes::{ElectrodeKey, ElectrodePosition, electrode_count, electrode_line};
mod engines;
pub use engines::{Engines, ForwardEngine, ForwardOperator, InversionEngine, InversionResult, MeshService, ResistivityModel, SchemeGenerator};
mod error;
pub use error::Error;
pub mod goodness;
pub mod linalg;
mod mesh;
pub use mesh::{Mesh, StructuredMeshService};
pub mod scheme;
pub use scheme::{Configuration, Scheme, StandardSchemeGenerator};
mod sensitivity;
pub use sensitivity::{SensitivityMatrix, compute_jacobian};
pub mod updaters;
mod world;
pub use world::World;

#[cfg(test)]
mod test_utils;

impl From<Error> for PyErr {
    fn from(error: Error) -> PyErr {
        return PyValueError::new_err(error.to_string());
    }
}

/// A Python module implemented in Rust; bindings added here
#[pymodule]
fn ert_design_rs(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    #[pyfn(m)]
    fn resolution_diagonal_py(py: Python, jacobian: &Bound<'_, PyArray2<f64>>) -> PyResult<Py<PyArray1<f64>>> {
        let jacobian_ndarray: Array2<f64> = unsafe { jacobian.as_array() }.to_owned();

        let diagonal: Array1<f64> = linalg::resolution_diagonal(&jacobian_ndarray)?;

        return Ok(diagonal.into_pyarray(py).into());
    }

    #[pyfn(m)]
    fn pseudo_inverse_py(py: Python, matrix: &Bound<'_, PyArray2<f64>>) -> PyResult<Py<PyArray2<f64>>> {
        let matrix_ndarray: Array2<f64> = unsafe { matrix.as_array() }.to_owned();

        let matrix_pinv: Array2<f64> = linalg::pseudo_inverse(&matrix_ndarray)?;

        return Ok(matrix_pinv.into_pyarray(py).into());
    }

    /// Merge two scheme files, the first one has priority; returns the merged configuration count
    #[pyfn(m)]
    fn merge_scheme_files_py(scheme_1_path: &str, scheme_2_path: &str, output_path: &str) -> PyResult<usize> {
        let scheme_1: Scheme = scheme::read_scheme_file(Path::new(scheme_1_path))?;
        let scheme_2: Scheme = scheme::read_scheme_file(Path::new(scheme_2_path))?;

        let merged: Scheme = scheme::merge_schemes(&scheme_1, &scheme_2)?;
        scheme::write_scheme_file(&merged, Path::new(output_path))?;

        return Ok(merged.len());
    }

    #[pyfn(m)]
    fn find_duplicate_configurations_py(scheme_a_path: &str, scheme_b_path: &str) -> PyResult<Vec<usize>> {
        let scheme_a: Scheme = scheme::read_scheme_file(Path::new(scheme_a_path))?;
        let scheme_b: Scheme = scheme::read_scheme_file(Path::new(scheme_b_path))?;

        let indices: Vec<usize> = scheme::find_duplicate_configurations(&scheme_a, &scheme_b)?;

        return Ok(indices);
    }

    #[pyfn(m)]
    fn extract_configurations_py(scheme_path: &str, config_indices: Vec<usize>, output_path: &str) -> PyResult<usize> {
        let scheme_full: Scheme = scheme::read_scheme_file(Path::new(scheme_path))?;

        let extracted: Scheme = scheme::extract_configurations(&scheme_full, &config_indices)?;
        scheme::write_scheme_file(&extracted, Path::new(output_path))?;

        return Ok(extracted.len());
    }

    #[pyfn(m)]
    fn build_comprehensive_scheme_py(world_x: f64, spacing: f64, offset: f64, scheme_names: Vec<String>, output_path: &str) -> PyResult<usize> {
        let scheme_generator: StandardSchemeGenerator = StandardSchemeGenerator::new();

        let comprehensive_scheme: Scheme = goodness::build_comprehensive_scheme(&scheme_generator, world_x, spacing, offset, &scheme_names)?;
        scheme::write_scheme_file(&comprehensive_scheme, Path::new(output_path))?;

        return Ok(comprehensive_scheme.len());
    }

    /// Select configurations from a comprehensive scheme; `j_compr` has one row per comprehensive configuration
    #[pyfn(m)]
    #[pyo3(signature = (scheme_base_path, scheme_compr_path, j_base, j_compr, addconfig_count, gradient_weight, li_threshold, cell_gradient=None))]
    fn select_configurations_py(
        scheme_base_path: &str,
        scheme_compr_path: &str,
        j_base: &Bound<'_, PyArray2<f64>>,
        j_compr: &Bound<'_, PyArray2<f64>>,
        addconfig_count: usize,
        gradient_weight: f64,
        li_threshold: f64,
        cell_gradient: Option<&Bound<'_, PyArray1<f64>>>,
    ) -> PyResult<Vec<usize>> {
        let scheme_base: Scheme = scheme::read_scheme_file(Path::new(scheme_base_path))?;
        let scheme_compr: Scheme = scheme::read_scheme_file(Path::new(scheme_compr_path))?;
        let j_base_ndarray: Array2<f64> = unsafe { j_base.as_array() }.to_owned();
        let j_compr_ndarray: Array2<f64> = unsafe { j_compr.as_array() }.to_owned();
        let cell_gradient_ndarray: Option<Array1<f64>> = cell_gradient.map(|gradient| Array1::from(unsafe { gradient.as_array() }.to_vec()));

        let n_rows: usize = j_compr_ndarray.nrows();
        let j_compr_matrix: SensitivityMatrix = SensitivityMatrix {
            values: j_compr_ndarray,
            rows: (0..n_rows).collect(),
        };
        let settings: goodness::SelectionSettings = goodness::SelectionSettings {
            addconfig_count,
            gradient_weight,
            li_threshold,
        };

        let selection: Vec<usize> = goodness::select_configurations(
            &scheme_base,
            &scheme_compr,
            &j_base_ndarray,
            &j_compr_matrix,
            cell_gradient_ndarray.as_ref(),
            &settings,
        )?;

        return Ok(selection);
    }

    Ok(())
}
