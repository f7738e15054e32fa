use super::{ElectrodeUpdater, combined_scheme, profile_electrodes};
use crate::Error;
use crate::config::InversionConfiguration;
use crate::electrodes::ElectrodePosition;
use crate::engines::{Engines, ForwardOperator};
use crate::goodness::{SelectionSettings, build_comprehensive_scheme, cell_gradient, select_configurations};
use crate::mesh::Mesh;
use crate::scheme::{Scheme, extract_configurations, merge_schemes, write_scheme_file};
use crate::sensitivity::{SensitivityMatrix, compute_jacobian};
use log::info;
use ndarray::{Array1, Array2};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Adds the configurations which improve the model resolution the most
///
/// The candidate pool (comprehensive scheme) is built on the first update and reused afterwards.
pub struct ResolutionElectrodeUpdater {
    world_x: f64,
    spacing: f64,
    offset: f64,
    base_configs: Vec<String>,
    add_configs: Vec<String>,
    settings: SelectionSettings,
    engines: Engines,
    comprehensive_scheme: Option<Scheme>,
    folder: Option<PathBuf>,
    iteration: usize,
}

impl ResolutionElectrodeUpdater {
    pub fn new(config: &InversionConfiguration, engines: Engines) -> Self {
        ResolutionElectrodeUpdater {
            world_x: config.world_x,
            spacing: config.finv_spacing,
            offset: config.world_electrode_offset,
            base_configs: config.finv_base_configs.clone(),
            add_configs: config.finv_add_configs.clone(),
            settings: SelectionSettings {
                addconfig_count: config.finv_addconfig_count,
                gradient_weight: config.finv_gradient_weight,
                li_threshold: config.finv_li_threshold,
            },
            engines,
            comprehensive_scheme: None,
            folder: None,
            iteration: 0,
        }
    }

    /// Candidate pool, built on first use
    ///
    /// Base configuration types are part of the pool, so every measured configuration can be found in it.
    fn comprehensive_scheme(&mut self) -> Result<&Scheme, Error> {
        if self.comprehensive_scheme.is_none() {
            let scheme_names: Vec<String> = self.base_configs.iter().chain(self.add_configs.iter()).cloned().collect();
            let comprehensive_scheme: Scheme =
                build_comprehensive_scheme(self.engines.scheme_generator.as_ref(), self.world_x, self.spacing, self.offset, &scheme_names)?;

            if let Some(folder) = &self.folder {
                let path: PathBuf = folder.join("tmp").join("comprehensive.shm");
                write_scheme_file(&comprehensive_scheme, &path)?;
                info!("Comprehensive scheme saved to {}", path.display());
            }
            self.comprehensive_scheme = Some(comprehensive_scheme);
        }
        return self
            .comprehensive_scheme
            .as_ref()
            .ok_or(Error::EmptyScheme("comprehensive".to_string()));
    }

    pub fn iteration(&self) -> usize {
        return self.iteration;
    }
}

/// `x y rho grad` per cell
fn write_gradient_file(path: &Path, inv_grid: &Mesh, inv_result: &Array1<f64>, gradient: &Array1<f64>) -> Result<(), Error> {
    let cell_centers: &Array2<f64> = inv_grid.cell_centers();
    let mut output: String = String::from("x y rho grad\n");
    for i_cell in 0..inv_grid.cell_count() {
        output += &format!(
            "{} {} {} {}\n",
            cell_centers[[i_cell, 0]],
            cell_centers[[i_cell, 1]],
            inv_result[i_cell],
            gradient[i_cell]
        );
    }
    fs::write(path, output)?;
    return Ok(());
}

/// One comprehensive index per line
fn write_added_configs_file(path: &Path, config_indices: &[usize]) -> Result<(), Error> {
    let output: String = config_indices.iter().map(|i_config: &usize| format!("{}\n", i_config)).collect();
    fs::write(path, output)?;
    return Ok(());
}

impl ElectrodeUpdater for ResolutionElectrodeUpdater {
    fn set_essentials(&mut self, folder: &Path) {
        self.folder = Some(folder.to_path_buf());
    }

    fn init_scheme(&mut self) -> Result<Scheme, Error> {
        let electrodes: Vec<ElectrodePosition> = profile_electrodes(self.world_x, self.spacing, self.offset);
        return combined_scheme(self.engines.scheme_generator.as_ref(), &electrodes, &self.base_configs);
    }

    fn update_scheme(
        &mut self,
        old_scheme: &Scheme,
        forward_operator: &dyn ForwardOperator,
        inv_grid: &Mesh,
        inv_result: &Array1<f64>,
        iteration_folder: &Path,
    ) -> Result<Scheme, Error> {
        self.iteration += 1;
        let timing_start: Instant = Instant::now();

        let settings: SelectionSettings = self.settings;
        let forward_engine = self.engines.forward_engine.clone();
        let inversion_engine = self.engines.inversion_engine.clone();
        let comprehensive_scheme: &Scheme = self.comprehensive_scheme()?;

        info!("Computing Jacobian for comprehensive scheme...");
        let j_compr: SensitivityMatrix = compute_jacobian(forward_engine.as_ref(), inversion_engine.as_ref(), inv_grid, inv_result, comprehensive_scheme)?;

        let gradient: Option<Array1<f64>> = if settings.gradient_weight > 0.0 {
            let gradient: Array1<f64> = cell_gradient(inv_grid, inv_result)?;
            write_gradient_file(&iteration_folder.join("gradient.dat"), inv_grid, inv_result, &gradient)?;
            Some(gradient)
        } else {
            None
        };

        info!("Computing goodness function...");
        let config_indices: Vec<usize> = select_configurations(
            old_scheme,
            comprehensive_scheme,
            forward_operator.jacobian(),
            &j_compr,
            gradient.as_ref(),
            &settings,
        )?;
        info!("Goodness function computed, {} configurations selected", config_indices.len());
        if settings.gradient_weight > 0.0 {
            write_added_configs_file(&iteration_folder.join("added_configs.dat"), &config_indices)?;
        }

        if config_indices.is_empty() {
            return Ok(old_scheme.clone());
        }
        let scheme_add: Scheme = extract_configurations(comprehensive_scheme, &config_indices)?;
        let new_scheme: Scheme = merge_schemes(old_scheme, &scheme_add)?;
        info!(
            "Update {} took {:.2?}: {} -> {} configurations",
            self.iteration,
            timing_start.elapsed(),
            old_scheme.len(),
            new_scheme.len()
        );

        return Ok(new_scheme);
    }

    fn name(&self) -> &str {
        return "resolution";
    }
}

#[cfg(test)]
fn run_update(config: &InversionConfiguration, iteration_folder: &Path) -> (Scheme, Scheme) {
    use crate::engines::{InversionResult, ResistivityModel};
    use crate::test_utils::{test_engines, test_para_mesh};

    let engines: Engines = test_engines();
    let mut updater: ResolutionElectrodeUpdater = ResolutionElectrodeUpdater::new(config, engines.clone());
    let old_scheme: Scheme = updater.init_scheme().expect("initial scheme");

    // Two-layer model on the parameter mesh: the inversion result has a contrast to work with
    let mesh: Mesh = test_para_mesh(old_scheme.sensor_positions());
    let model: Array1<f64> = Array1::from_shape_fn(mesh.cell_count(), |i_cell: usize| {
        if mesh.cell_centers()[[i_cell, 1]] > -10.0 { 10.0 } else { 100.0 }
    });
    let data: Scheme = engines
        .forward_engine
        .simulate(&mesh, &ResistivityModel::PerCell(model), &old_scheme, 0.0, 0.0)
        .expect("simulated data");
    let inversion: InversionResult = engines.inversion_engine.invert(&data, &mesh, config.inv_lambda).expect("inversion");

    let new_scheme: Scheme = updater
        .update_scheme(
            &old_scheme,
            inversion.forward_operator.as_ref(),
            &inversion.para_domain,
            &inversion.resistivity,
            iteration_folder,
        )
        .expect("updated scheme");
    assert_eq!(updater.iteration(), 1);

    return (old_scheme, new_scheme);
}

#[test]
fn test_resolution_updater_41_electrodes() {
    use crate::config::test_configuration;

    let config: InversionConfiguration = test_configuration();
    assert_eq!(config.finv_addconfig_count, 100);

    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");
    let (old_scheme, new_scheme) = run_update(&config, temporary_directory.path());

    assert_eq!(old_scheme.sensor_positions().len(), 41);
    assert!(new_scheme.len() >= old_scheme.len());
    assert!(new_scheme.len() <= old_scheme.len() + 100);
    assert!(new_scheme.sensor_positions().len() >= old_scheme.sensor_positions().len());
    assert_eq!(&new_scheme.configurations()[..old_scheme.len()], old_scheme.configurations());

    // Without gradient weighting no diagnostics are written
    assert!(!temporary_directory.path().join("gradient.dat").exists());
}

#[test]
fn test_resolution_updater_gradient_diagnostics() {
    use crate::config::test_configuration;

    let mut config: InversionConfiguration = test_configuration();
    config.world_x = 50.0;
    config.finv_addconfig_count = 20;
    config.finv_gradient_weight = 0.5;

    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");
    let (old_scheme, new_scheme) = run_update(&config, temporary_directory.path());

    let added_configs: String = fs::read_to_string(temporary_directory.path().join("added_configs.dat")).expect("added configurations");
    let n_added: usize = added_configs.lines().count();
    assert!(n_added <= 20);
    assert_eq!(new_scheme.len(), old_scheme.len() + n_added);

    let gradient: String = fs::read_to_string(temporary_directory.path().join("gradient.dat")).expect("gradient");
    assert_eq!(gradient.lines().next(), Some("x y rho grad"));
}
