use super::{ElectrodeUpdater, combined_scheme, profile_electrodes};
use crate::Error;
use crate::config::InversionConfiguration;
use crate::electrodes::ElectrodePosition;
use crate::engines::{ForwardOperator, SchemeGenerator};
use crate::mesh::Mesh;
use crate::scheme::{Scheme, merge_schemes};
use log::info;
use ndarray::Array1;
use std::path::Path;
use std::sync::Arc;

/// Halves the electrode spacing every iteration, down to the minimum spacing
pub struct SimpleRefiningElectrodeUpdater {
    world_x: f64,
    spacing: f64,
    min_spacing: f64,
    offset: f64,
    base_configs: Vec<String>,
    scheme_generator: Arc<dyn SchemeGenerator + Send + Sync>,
}

impl SimpleRefiningElectrodeUpdater {
    pub fn new(config: &InversionConfiguration, scheme_generator: Arc<dyn SchemeGenerator + Send + Sync>) -> Self {
        SimpleRefiningElectrodeUpdater {
            world_x: config.world_x,
            spacing: config.finv_spacing,
            min_spacing: config.finv_min_spacing,
            offset: config.world_electrode_offset,
            base_configs: config.finv_base_configs.clone(),
            scheme_generator,
        }
    }
}

/// Electrodes sorted along the profile, with a midpoint inserted into every gap wider than `2 * min_spacing`
///
/// # Returns
/// * refined electrodes and the number of inserted midpoints
pub fn refine_electrodes(electrodes: &[ElectrodePosition], min_spacing: f64) -> (Vec<ElectrodePosition>, usize) {
    let mut sorted: Vec<ElectrodePosition> = electrodes.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x));

    let mut refined: Vec<ElectrodePosition> = Vec::with_capacity(2 * sorted.len());
    let mut n_inserted: usize = 0;
    for (i_electrode, electrode) in sorted.iter().enumerate() {
        if i_electrode > 0 {
            let previous: &ElectrodePosition = &sorted[i_electrode - 1];
            if electrode.x - previous.x > 2.0 * min_spacing {
                refined.push(ElectrodePosition::new(
                    0.5 * (previous.x + electrode.x),
                    0.5 * (previous.y + electrode.y),
                    0.5 * (previous.z + electrode.z),
                ));
                n_inserted += 1;
            }
        }
        refined.push(*electrode);
    }

    return (refined, n_inserted);
}

impl ElectrodeUpdater for SimpleRefiningElectrodeUpdater {
    fn init_scheme(&mut self) -> Result<Scheme, Error> {
        let electrodes: Vec<ElectrodePosition> = profile_electrodes(self.world_x, self.spacing, self.offset);
        return combined_scheme(self.scheme_generator.as_ref(), &electrodes, &self.base_configs);
    }

    fn update_scheme(
        &mut self,
        old_scheme: &Scheme,
        _forward_operator: &dyn ForwardOperator,
        _inv_grid: &Mesh,
        _inv_result: &Array1<f64>,
        _iteration_folder: &Path,
    ) -> Result<Scheme, Error> {
        let (electrodes, n_inserted) = refine_electrodes(old_scheme.sensor_positions(), self.min_spacing);
        if n_inserted == 0 {
            info!("Electrode spacing is at its minimum, scheme unchanged");
            return Ok(old_scheme.clone());
        }
        info!("Inserted {} electrodes", n_inserted);

        let refined_scheme: Scheme = combined_scheme(self.scheme_generator.as_ref(), &electrodes, &self.base_configs)?;
        return merge_schemes(old_scheme, &refined_scheme);
    }

    fn name(&self) -> &str {
        return "simple_refining";
    }
}

#[test]
fn test_refine_electrodes() {
    use crate::electrodes::electrode_line;

    let electrodes: Vec<ElectrodePosition> = electrode_line(0.0, 20.0, 5);

    let (refined, n_inserted) = refine_electrodes(&electrodes, 1.0);
    assert_eq!(n_inserted, 4);
    assert_eq!(refined.len(), 9);
    assert_eq!(refined[1], ElectrodePosition::new(2.5, 0.0, 0.0));

    // Gaps of 2.5 metre are not wider than twice 1.25 metre
    let (refined_again, n_inserted) = refine_electrodes(&refined, 1.25);
    assert_eq!(n_inserted, 0);
    assert_eq!(refined_again, refined);
}

#[test]
fn test_simple_refining_updater() {
    use crate::config::test_configuration;
    use crate::engines::InversionEngine;
    use crate::scheme::{StandardSchemeGenerator, find_duplicate_configurations};
    use crate::test_utils::{MockInversionEngine, test_para_mesh};

    let mut config: InversionConfiguration = test_configuration();
    config.world_x = 40.0;
    config.finv_spacing = 10.0;
    config.finv_min_spacing = 3.0;
    let mut updater: SimpleRefiningElectrodeUpdater = SimpleRefiningElectrodeUpdater::new(&config, Arc::new(StandardSchemeGenerator::new()));

    let scheme: Scheme = updater.init_scheme().expect("initial scheme");
    assert_eq!(scheme.sensor_positions().len(), 5);

    let mesh: Mesh = test_para_mesh(scheme.sensor_positions());
    let forward_operator = MockInversionEngine::new().forward_operator(&mesh, &scheme, true).expect("forward operator");
    let resistivity: Array1<f64> = Array1::from_elem(mesh.cell_count(), 100.0);

    // 10 metre gaps are halved
    let refined: Scheme = updater
        .update_scheme(&scheme, forward_operator.as_ref(), &mesh, &resistivity, Path::new("."))
        .expect("refined scheme");
    assert_eq!(refined.sensor_positions().len(), 9);
    assert_eq!(&refined.configurations()[..scheme.len()], scheme.configurations());
    assert!(find_duplicate_configurations(&refined, &scheme).is_ok());
    assert!(refined.len() > scheme.len());

    // 5 metre gaps are not wider than 6 metre
    let unchanged: Scheme = updater
        .update_scheme(&refined, forward_operator.as_ref(), &mesh, &resistivity, Path::new("."))
        .expect("unchanged scheme");
    assert_eq!(unchanged, refined);
}
