use super::{ElectrodeUpdater, combined_scheme, profile_electrodes};
use crate::Error;
use crate::config::InversionConfiguration;
use crate::electrodes::ElectrodePosition;
use crate::engines::{ForwardOperator, SchemeGenerator};
use crate::mesh::Mesh;
use crate::scheme::Scheme;
use ndarray::Array1;
use std::path::Path;
use std::sync::Arc;

/// Keeps measuring the initial configurations
pub struct StaticElectrodeUpdater {
    world_x: f64,
    spacing: f64,
    offset: f64,
    base_configs: Vec<String>,
    scheme_generator: Arc<dyn SchemeGenerator + Send + Sync>,
}

impl StaticElectrodeUpdater {
    pub fn new(config: &InversionConfiguration, scheme_generator: Arc<dyn SchemeGenerator + Send + Sync>) -> Self {
        StaticElectrodeUpdater {
            world_x: config.world_x,
            spacing: config.finv_spacing,
            offset: config.world_electrode_offset,
            base_configs: config.finv_base_configs.clone(),
            scheme_generator,
        }
    }
}

impl ElectrodeUpdater for StaticElectrodeUpdater {
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
        return Ok(old_scheme.clone());
    }

    fn name(&self) -> &str {
        return "static";
    }
}

#[test]
fn test_static_updater_keeps_scheme() {
    use crate::config::test_configuration;
    use crate::engines::InversionEngine;
    use crate::scheme::StandardSchemeGenerator;
    use crate::test_utils::{MockInversionEngine, test_para_mesh};

    let config: InversionConfiguration = test_configuration();
    let mut updater: StaticElectrodeUpdater = StaticElectrodeUpdater::new(&config, Arc::new(StandardSchemeGenerator::new()));

    let scheme: Scheme = updater.init_scheme().expect("initial scheme");
    assert_eq!(scheme.sensor_positions().len(), 41);
    assert!(!scheme.is_empty());

    let mesh: Mesh = test_para_mesh(scheme.sensor_positions());
    let forward_operator = MockInversionEngine::new().forward_operator(&mesh, &scheme, true).expect("forward operator");
    let resistivity: Array1<f64> = Array1::from_elem(mesh.cell_count(), 100.0);

    let updated: Scheme = updater
        .update_scheme(&scheme, forward_operator.as_ref(), &mesh, &resistivity, Path::new("."))
        .expect("updated scheme");
    assert_eq!(updated, scheme);
}
