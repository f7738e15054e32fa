use crate::Error;
use crate::electrodes::{ElectrodePosition, electrode_count, electrode_line};
use crate::engines::{ForwardOperator, SchemeGenerator};
use crate::mesh::Mesh;
use crate::scheme::{Scheme, merge_schemes};
use ndarray::Array1;
use std::path::Path;

// Load modules
mod resolution;
mod simple_refining;
mod static_updater;

// Expose
pub use resolution::ResolutionElectrodeUpdater;
pub use simple_refining::SimpleRefiningElectrodeUpdater;
pub use static_updater::StaticElectrodeUpdater;

/// Strategy deciding which configurations are measured in the next iteration
pub trait ElectrodeUpdater {
    /// Working folder of the run, for files the updater wants to keep
    fn set_essentials(&mut self, _folder: &Path) {}

    /// Scheme measured in the first iteration
    fn init_scheme(&mut self) -> Result<Scheme, Error>;

    /// Scheme for the next iteration
    ///
    /// # Arguments
    /// * `old_scheme` - configurations measured so far
    /// * `forward_operator` - forward operator of the last inversion, holding the Jacobian of the measured data
    /// * `inv_grid` - parameter mesh of the last inversion
    /// * `inv_result` - resistivity per `inv_grid` cell, (ohm metre)
    /// * `iteration_folder` - folder for diagnostics of this iteration
    fn update_scheme(
        &mut self,
        old_scheme: &Scheme,
        forward_operator: &dyn ForwardOperator,
        inv_grid: &Mesh,
        inv_result: &Array1<f64>,
        iteration_folder: &Path,
    ) -> Result<Scheme, Error>;

    fn name(&self) -> &str;
}

/// Surface electrodes covering the profile with the given spacing
pub fn profile_electrodes(world_x: f64, spacing: f64, offset: f64) -> Vec<ElectrodePosition> {
    let n_electrodes: usize = electrode_count(world_x, spacing, offset);
    return electrode_line(offset, world_x - offset, n_electrodes);
}

/// All `scheme_names` configuration types on `electrodes`, merged in the given order
pub fn combined_scheme(scheme_generator: &dyn SchemeGenerator, electrodes: &[ElectrodePosition], scheme_names: &[String]) -> Result<Scheme, Error> {
    let mut combined: Option<Scheme> = None;
    for scheme_name in scheme_names {
        let scheme: Scheme = scheme_generator.create_scheme(electrodes, scheme_name)?;
        if scheme.is_empty() {
            continue;
        }
        combined = Some(match combined {
            None => scheme,
            Some(combined) => merge_schemes(&combined, &scheme)?,
        });
    }
    return combined.ok_or(Error::EmptyScheme(scheme_names.join(", ")));
}

#[test]
fn test_combined_scheme() {
    use crate::scheme::StandardSchemeGenerator;

    let generator: StandardSchemeGenerator = StandardSchemeGenerator::new();
    let electrodes: Vec<ElectrodePosition> = profile_electrodes(200.0, 5.0, 0.0);
    assert_eq!(electrodes.len(), 41);

    let names: Vec<String> = vec!["wa".to_string(), "wb".to_string()];
    let scheme: Scheme = combined_scheme(&generator, &electrodes, &names).expect("combined scheme");
    let scheme_wa: Scheme = generator.create_scheme(&electrodes, "wa").expect("wa");
    let scheme_wb: Scheme = generator.create_scheme(&electrodes, "wb").expect("wb");
    assert_eq!(scheme.len(), scheme_wa.len() + scheme_wb.len());
    assert_eq!(scheme.configurations()[0], scheme_wa.configurations()[0]);

    // Three electrodes are too few for a gradient array
    let names: Vec<String> = vec!["gr".to_string()];
    let empty: Result<Scheme, Error> = combined_scheme(&generator, &electrode_line(0.0, 10.0, 3), &names);
    assert!(matches!(empty, Err(Error::EmptyScheme(_))));
}
