use super::run_context::RunContext;
use crate::Error;
use crate::config::InversionConfiguration;
use crate::electrodes::ElectrodePosition;
use crate::engines::{Engines, InversionResult, ResistivityModel};
use crate::mesh::Mesh;
use crate::scheme::{Configuration, Scheme, write_scheme_file};
use crate::updaters::ElectrodeUpdater;
use crate::world::World;
use log::{error, info};
use ndarray::{Array1, Array2};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Initialized,
    Iterating,
    FinalInverted,
    Done,
}

/// Work done by one call of `IterationController::run_iteration`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterationStep {
    /// First iteration: there is no data to invert yet
    SimulateOnly,
    /// Invert the last data, update the scheme, simulate
    InvertUpdateSimulate,
    /// Iteration budget used up: invert on the final mesh
    FinalInversion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterationOutcome {
    Continue,
    Stop,
}

/// Step following `completed_iterations` completed iterations
pub fn next_step(completed_iterations: usize, max_iterations: usize) -> IterationStep {
    if completed_iterations >= max_iterations {
        return IterationStep::FinalInversion;
    }
    if completed_iterations == 0 {
        return IterationStep::SimulateOnly;
    }
    return IterationStep::InvertUpdateSimulate;
}

/// Everything created during initialisation and changed from iteration to iteration
struct IterationState {
    run_context: RunContext,
    scheme: Scheme,
    sim_mesh: Mesh,
    inv_mesh: Mesh,
    inv_final_mesh: Mesh,
    model: ResistivityModel,
    syndata: Option<Scheme>,
    inversion: Option<InversionResult>,
    final_resistivity: Option<Array1<f64>>,
}

/// `x y rho` per cell
fn write_resistivity_file(path: &Path, mesh: &Mesh, resistivity: &Array1<f64>) -> Result<(), Error> {
    if resistivity.len() != mesh.cell_count() {
        return Err(Error::DimensionMismatch {
            context: "resistivity file".to_string(),
            expected: mesh.cell_count(),
            found: resistivity.len(),
        });
    }
    let cell_centers: &Array2<f64> = mesh.cell_centers();
    let mut output: String = String::from("x y rho\n");
    for i_cell in 0..mesh.cell_count() {
        output += &format!("{} {} {}\n", cell_centers[[i_cell, 0]], cell_centers[[i_cell, 1]], resistivity[i_cell]);
    }
    fs::write(path, output)?;
    return Ok(());
}

/// Drives the simulate, invert and update cycle of an adaptive survey
///
/// ```text
/// Uninitialized -> Initialized -> Iterating (x max_iterations) -> FinalInverted -> Done
/// ```
pub struct IterationController {
    config: InversionConfiguration,
    electrode_updater: Box<dyn ElectrodeUpdater + Send>,
    engines: Engines,
    controller_state: ControllerState,
    iteration: usize,
    iteration_state: Option<IterationState>,
}

impl IterationController {
    pub fn new(config: InversionConfiguration, electrode_updater: Box<dyn ElectrodeUpdater + Send>, engines: Engines) -> Self {
        IterationController {
            config,
            electrode_updater,
            engines,
            controller_state: ControllerState::Uninitialized,
            iteration: 0,
            iteration_state: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        return self.controller_state;
    }

    /// Number of completed iterations
    pub fn iteration(&self) -> usize {
        return self.iteration;
    }

    pub fn scheme(&self) -> Option<&Scheme> {
        return self.iteration_state.as_ref().map(|state: &IterationState| &state.scheme);
    }

    pub fn run_folder(&self) -> Option<&Path> {
        return self.iteration_state.as_ref().map(|state: &IterationState| state.run_context.folder());
    }

    /// Resistivity of the final inversion, per final mesh cell
    pub fn final_resistivity(&self) -> Option<&Array1<f64>> {
        return self.iteration_state.as_ref().and_then(|state: &IterationState| state.final_resistivity.as_ref());
    }

    fn require_state(&self, expected: &[ControllerState]) -> Result<(), Error> {
        if expected.contains(&self.controller_state) {
            return Ok(());
        }
        return Err(Error::InvalidState {
            expected: format!("{:?}", expected),
            found: format!("{:?}", self.controller_state),
        });
    }

    /// Validate the parameters, create the job folder, the initial scheme and the meshes
    ///
    /// Parameters are checked before anything is written to disk.
    pub fn initialize(&mut self) -> Result<(), Error> {
        self.require_state(&[ControllerState::Uninitialized])?;
        self.config.check_integrity()?;

        let run_context: RunContext = RunContext::create(Path::new(&self.config.general_results_folder), &self.config.general_folder_suffix)?;
        run_context.init_logging()?;
        info!("### STARTING INITIALIZATION PHASE");
        info!("Temporary directory created");
        self.electrode_updater.set_essentials(run_context.folder());
        info!("Configuration file is integer!");
        let params_path: PathBuf = run_context.save_parameters(&self.config)?;
        info!("Configuration parameters saved to {}", params_path.display());

        info!("Configuration parameters:");
        info!("#---------------#:");
        for line in self.config.print_config() {
            info!("{}", line);
        }
        info!("Electrode updater: {}", self.electrode_updater.name());
        info!("#---------------#:");

        info!("Creating world...");
        let world: World = World::from_config(&self.config)?;
        info!("Creating configuration scheme...");
        let scheme: Scheme = self.electrode_updater.init_scheme()?;

        info!("Creating initial mesh...");
        let (sim_mesh, inv_mesh, inv_final_mesh) = self.create_meshes(&world, scheme.sensor_positions())?;

        info!("Checking model integrity...");
        let n_regions: usize = sim_mesh.unique_marker_count();
        if n_regions != self.config.world_resistivities.len() {
            error!("Marker count does NOT fit given resistivities! ABORTING!");
            return Err(Error::ModelMismatch {
                mesh_regions: n_regions,
                resistivities: self.config.world_resistivities.len(),
            });
        }
        info!("Creating resistivity array...");
        let model: ResistivityModel = ResistivityModel::from_resistivities(&self.config.world_resistivities);

        self.iteration_state = Some(IterationState {
            run_context,
            scheme,
            sim_mesh,
            inv_mesh,
            inv_final_mesh,
            model,
            syndata: None,
            inversion: None,
            final_resistivity: None,
        });
        self.controller_state = ControllerState::Initialized;
        info!("### INITIALIZATION COMPLETED");
        return Ok(());
    }

    /// Simulation mesh (refined below the sensors), in-field parameter mesh and final parameter mesh
    fn create_meshes(&self, world: &World, sensors: &[ElectrodePosition]) -> Result<(Mesh, Mesh, Mesh), Error> {
        if sensors.len() < 2 {
            return Err(Error::DimensionMismatch {
                context: "initial scheme sensors".to_string(),
                expected: 2,
                found: sensors.len(),
            });
        }
        let config: &InversionConfiguration = &self.config;

        let mut refinement_nodes: Vec<ElectrodePosition> = Vec::with_capacity(2 * sensors.len());
        for sensor in sensors {
            refinement_nodes.push(*sensor);
            refinement_nodes.push(sensor.shifted(0.0, -config.finv_spacing / 2.0, 0.0));
        }
        let sim_mesh: Mesh = self
            .engines
            .mesh_service
            .create_mesh(world, &refinement_nodes, config.sim_mesh_quality, config.sim_mesh_maxarea)?;

        let sensor_distance: f64 = sensors[1].x - sensors[0].x;
        let inv_mesh: Mesh = self.engines.mesh_service.create_para_mesh(
            sensors,
            config.inv_dx / sensor_distance,
            config.inv_dz / sensor_distance,
            config.inv_depth,
            (config.inv_depth / config.inv_dz) as usize,
        )?;
        let inv_final_mesh: Mesh = self.engines.mesh_service.create_para_mesh(
            sensors,
            config.inv_final_dx / sensor_distance,
            config.inv_final_dz / sensor_distance,
            config.inv_final_depth,
            (config.inv_final_depth / config.inv_final_dz) as usize,
        )?;

        return Ok((sim_mesh, inv_mesh, inv_final_mesh));
    }

    /// Perform the next step of the cycle, see `next_step`
    pub fn run_iteration(&mut self) -> Result<IterationOutcome, Error> {
        self.require_state(&[ControllerState::Initialized, ControllerState::Iterating])?;
        let step: IterationStep = next_step(self.iteration, self.config.finv_max_iterations);

        let config: &InversionConfiguration = &self.config;
        let engines: &Engines = &self.engines;
        let iteration_state: &mut IterationState = self.iteration_state.as_mut().ok_or(Error::InvalidState {
            expected: "initialized iteration state".to_string(),
            found: "none".to_string(),
        })?;
        let no_data = || Error::InvalidState {
            expected: "simulated data".to_string(),
            found: "none".to_string(),
        };

        if step == IterationStep::FinalInversion {
            info!("### MAX ITERATIONS REACHED");
            info!("Inverting data on final mesh ...");
            let folder: PathBuf = iteration_state.run_context.final_folder()?;
            let syndata: &Scheme = iteration_state.syndata.as_ref().ok_or_else(no_data)?;
            let final_inversion: InversionResult = engines
                .inversion_engine
                .invert(syndata, &iteration_state.inv_final_mesh, config.inv_final_lambda)?;
            write_resistivity_file(&folder.join("resistivity.dat"), &final_inversion.para_domain, &final_inversion.resistivity)?;
            iteration_state.final_resistivity = Some(final_inversion.resistivity);
            self.controller_state = ControllerState::FinalInverted;
            return Ok(IterationOutcome::Stop);
        }

        self.iteration += 1;
        info!("### ITERATION {}", self.iteration);
        let timing_start: Instant = Instant::now();
        let folder: PathBuf = iteration_state.run_context.iteration_folder(self.iteration)?;

        if step == IterationStep::InvertUpdateSimulate {
            info!("Inverting data ...");
            let syndata: &Scheme = iteration_state.syndata.as_ref().ok_or_else(no_data)?;
            let inversion: InversionResult = engines.inversion_engine.invert(syndata, &iteration_state.inv_mesh, config.inv_lambda)?;
            write_resistivity_file(&folder.join("resistivity.dat"), &inversion.para_domain, &inversion.resistivity)?;

            info!("Updating scheme ...");
            let scheme: Scheme = self.electrode_updater.update_scheme(
                &iteration_state.scheme,
                inversion.forward_operator.as_ref(),
                &inversion.para_domain,
                &inversion.resistivity,
                &folder,
            )?;
            iteration_state.scheme = scheme;
            iteration_state.inversion = Some(inversion);
        }

        info!(
            "Simulating data ({} electrodes, {} configurations)...",
            iteration_state.scheme.sensor_positions().len(),
            iteration_state.scheme.len()
        );
        let mut syndata: Scheme = engines.forward_engine.simulate(
            &iteration_state.sim_mesh,
            &iteration_state.model,
            &iteration_state.scheme,
            config.sim_noise_level,
            config.sim_noise_abs,
        )?;
        syndata.mark_invalid(|configuration: &Configuration| configuration.rhoa <= 0.0);
        let n_removed: usize = syndata.remove_invalid();
        if n_removed > 0 {
            info!("Removed {} invalid data", n_removed);
        }
        write_scheme_file(&syndata, &folder.join("syndata.dat"))?;
        iteration_state.syndata = Some(syndata);

        self.controller_state = ControllerState::Iterating;
        info!("Iteration {} took {:.2?}", self.iteration, timing_start.elapsed());
        return Ok(IterationOutcome::Continue);
    }

    /// Initialise when needed, then iterate until the final inversion is done
    pub fn run(&mut self) -> Result<(), Error> {
        if self.controller_state == ControllerState::Uninitialized {
            self.initialize()?;
        }
        while self.run_iteration()? == IterationOutcome::Continue {}
        self.controller_state = ControllerState::Done;
        info!("Routine end time: {}", chrono::Local::now());
        return Ok(());
    }
}

#[cfg(test)]
fn small_configuration(results_folder: &Path, suffix: &str) -> InversionConfiguration {
    use crate::config::test_configuration;

    let mut config: InversionConfiguration = test_configuration();
    config.general_results_folder = results_folder.to_string_lossy().to_string();
    config.general_folder_suffix = suffix.to_string();
    config.world_x = 50.0;
    config.world_z = 25.0;
    config.world_inclusion_start = vec![20.0, -5.0];
    config.world_inclusion_dim = vec![10.0, 5.0];
    config.sim_mesh_maxarea = 4.0;
    config.inv_dx = 5.0;
    config.inv_dz = 5.0;
    config.inv_depth = 15.0;
    config.inv_final_dx = 2.5;
    config.inv_final_dz = 2.5;
    config.inv_final_depth = 15.0;
    config.finv_max_iterations = 2;
    config.finv_addconfig_count = 10;
    return config;
}

#[test]
fn test_next_step() {
    assert_eq!(next_step(0, 3), IterationStep::SimulateOnly);
    assert_eq!(next_step(1, 3), IterationStep::InvertUpdateSimulate);
    assert_eq!(next_step(2, 3), IterationStep::InvertUpdateSimulate);
    assert_eq!(next_step(3, 3), IterationStep::FinalInversion);
}

#[test]
fn test_initialize_rejects_configuration_before_writing() {
    use crate::test_utils::test_engines;
    use crate::updaters::StaticElectrodeUpdater;

    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");
    let results_folder: PathBuf = temporary_directory.path().join("results");
    let mut config: InversionConfiguration = small_configuration(&results_folder, "-rejected");
    config.finv_gradient_weight = 2.0;

    let engines: Engines = test_engines();
    let updater: StaticElectrodeUpdater = StaticElectrodeUpdater::new(&config, engines.scheme_generator.clone());
    let mut controller: IterationController = IterationController::new(config, Box::new(updater), engines);

    let result: Result<(), Error> = controller.initialize();
    assert!(matches!(result, Err(Error::ConfigurationIntegrity { code: 12, .. })));
    assert!(!results_folder.exists());
    assert_eq!(controller.state(), ControllerState::Uninitialized);

    // Iterating before initialisation
    assert!(matches!(controller.run_iteration(), Err(Error::InvalidState { .. })));
}

#[test]
fn test_initialize_model_mismatch() {
    use crate::test_utils::test_engines;
    use crate::updaters::StaticElectrodeUpdater;

    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");
    let mut config: InversionConfiguration = small_configuration(temporary_directory.path(), "-mismatch");
    config.world_resistivities = vec![10.0, 100.0, 1000.0];

    let engines: Engines = test_engines();
    let updater: StaticElectrodeUpdater = StaticElectrodeUpdater::new(&config, engines.scheme_generator.clone());
    let mut controller: IterationController = IterationController::new(config, Box::new(updater), engines);

    let result: Result<(), Error> = controller.initialize();
    assert!(matches!(result, Err(Error::ModelMismatch { mesh_regions: 2, resistivities: 3 })));
}

#[test]
fn test_run_static() {
    use crate::test_utils::test_engines;
    use crate::updaters::StaticElectrodeUpdater;

    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");
    let config: InversionConfiguration = small_configuration(temporary_directory.path(), "-static");

    let engines: Engines = test_engines();
    let updater: StaticElectrodeUpdater = StaticElectrodeUpdater::new(&config, engines.scheme_generator.clone());
    let mut controller: IterationController = IterationController::new(config, Box::new(updater), engines);

    controller.initialize().expect("initialization");
    assert_eq!(controller.state(), ControllerState::Initialized);
    let initial_scheme: Scheme = controller.scheme().expect("scheme").clone();

    assert_eq!(controller.run_iteration().expect("iteration 1"), IterationOutcome::Continue);
    assert_eq!(controller.run_iteration().expect("iteration 2"), IterationOutcome::Continue);
    assert_eq!(controller.state(), ControllerState::Iterating);
    assert_eq!(controller.run_iteration().expect("final inversion"), IterationOutcome::Stop);
    assert_eq!(controller.state(), ControllerState::FinalInverted);
    assert_eq!(controller.iteration(), 2);

    let run_folder: PathBuf = controller.run_folder().expect("run folder").to_path_buf();
    assert!(run_folder.join("params.json").is_file());
    assert!(run_folder.join("job.log").is_file());
    // The first iteration only simulates
    assert!(run_folder.join("iteration1").join("syndata.dat").is_file());
    assert!(!run_folder.join("iteration1").join("resistivity.dat").exists());
    assert!(run_folder.join("iteration2").join("resistivity.dat").is_file());
    assert!(run_folder.join("final_inv").join("resistivity.dat").is_file());

    assert_eq!(controller.scheme().expect("scheme"), &initial_scheme);
    let final_resistivity: &Array1<f64> = controller.final_resistivity().expect("final resistivity");
    assert!(final_resistivity.iter().all(|rho: &f64| *rho > 0.0));

    let syndata: Scheme = crate::scheme::read_scheme_file(&run_folder.join("iteration2").join("syndata.dat")).expect("syndata");
    assert_eq!(syndata.len(), initial_scheme.len());
}

#[test]
fn test_run_resolution() {
    use crate::test_utils::test_engines;
    use crate::updaters::ResolutionElectrodeUpdater;

    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");
    let config: InversionConfiguration = small_configuration(temporary_directory.path(), "-resolution");

    let engines: Engines = test_engines();
    let updater: ResolutionElectrodeUpdater = ResolutionElectrodeUpdater::new(&config, engines.clone());
    let mut controller: IterationController = IterationController::new(config, Box::new(updater), engines);

    controller.initialize().expect("initialization");
    let initial_count: usize = controller.scheme().expect("scheme").len();

    controller.run().expect("run");

    assert_eq!(controller.state(), ControllerState::Done);
    let final_count: usize = controller.scheme().expect("scheme").len();
    assert!(final_count >= initial_count);
    assert!(final_count <= initial_count + 10);

    let run_folder: PathBuf = controller.run_folder().expect("run folder").to_path_buf();
    assert!(run_folder.join("tmp").join("comprehensive.shm").is_file());

    // Done is terminal
    assert!(matches!(controller.run_iteration(), Err(Error::InvalidState { .. })));
}
