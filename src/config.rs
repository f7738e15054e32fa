use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All parameters of an adaptive inversion run.
///
/// Validated once by `check_integrity` before the run starts and never changed afterwards.
/// Prefixes group the parameters: `general_`, `world_` (synthetic subsurface), `sim_` (forward simulation),
/// `inv_` (in-field inversion), `inv_final_` (inversion after the last iteration) and `finv_` (experimental design).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InversionConfiguration {
    #[serde(default)]
    pub general_verbose: bool,
    #[serde(default)]
    pub general_folder_suffix: String,
    #[serde(default = "default_results_folder")]
    pub general_results_folder: String,

    pub world_x: f64,
    pub world_z: f64,
    pub world_resistivities: Vec<f64>,
    /// "lay", "incl" or "tile"
    pub world_gen: String,
    #[serde(default)]
    pub world_layers: Vec<f64>,
    #[serde(default)]
    pub world_angle: f64,
    #[serde(default)]
    pub world_inclusion_start: Vec<f64>,
    #[serde(default)]
    pub world_inclusion_dim: Vec<f64>,
    #[serde(default)]
    pub world_tile_x: f64,
    #[serde(default)]
    pub world_tile_z: f64,
    #[serde(default)]
    pub world_electrode_offset: f64,

    pub sim_mesh_quality: f64,
    pub sim_mesh_maxarea: f64,
    pub sim_noise_level: f64,
    pub sim_noise_abs: f64,

    pub inv_lambda: f64,
    pub inv_dx: f64,
    pub inv_dz: f64,
    pub inv_depth: f64,
    pub inv_final_lambda: f64,
    pub inv_final_dx: f64,
    pub inv_final_dz: f64,
    pub inv_final_depth: f64,

    pub finv_max_iterations: usize,
    pub finv_spacing: f64,
    #[serde(default = "default_min_spacing")]
    pub finv_min_spacing: f64,
    pub finv_base_configs: Vec<String>,
    pub finv_add_configs: Vec<String>,
    pub finv_gradient_weight: f64,
    pub finv_addconfig_count: usize,
    pub finv_li_threshold: f64,
}

fn default_results_folder() -> String {
    "../inversion_results".to_string()
}
fn default_min_spacing() -> f64 {
    1.0
}

fn integrity_error(code: u8, reason: &str) -> Result<(), Error> {
    return Err(Error::ConfigurationIntegrity {
        code,
        reason: reason.to_string(),
    });
}

impl InversionConfiguration {
    /// Load from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let contents: String = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        return Ok(config);
    }

    /// Check the parameters, returning the first violated rule
    ///
    /// # Error codes
    /// 1. world dimensions are not positive
    /// 2. resistivity list is empty or contains non-positive values
    /// 3. world generator tag is not one of "lay", "incl", "tile"
    /// 4. inclusion start / dimension are not pairs of finite values, or the inclusion size is not positive
    /// 5. layer borders are not within the world depth
    /// 6. dipping angle is not finite
    /// 7. mesh quality, maximum cell area or noise are negative or not finite
    /// 8. configuration type lists are empty or contain empty names
    /// 9. inversion parameters are not positive
    /// 10. iteration budget is zero
    /// 11. electrode spacing / offset do not fit the world
    /// 12. gradient weight outside [0, 1]
    /// 13. linear independence threshold outside (0, 1]
    /// 14. tile sizes are not positive
    pub fn check_integrity(&self) -> Result<(), Error> {
        fn positive(value: f64) -> bool {
            return value.is_finite() && value > 0.0;
        }
        fn non_negative(value: f64) -> bool {
            return value.is_finite() && value >= 0.0;
        }

        if !positive(self.world_x) || !positive(self.world_z) {
            return integrity_error(1, "world dimensions must be positive");
        }

        if self.world_resistivities.is_empty() || !self.world_resistivities.iter().all(|&resistivity| positive(resistivity)) {
            return integrity_error(2, "world resistivities must be a non-empty list of positive values");
        }

        match self.world_gen.as_str() {
            "incl" => {
                if self.world_inclusion_start.len() != 2 || self.world_inclusion_dim.len() != 2 {
                    return integrity_error(4, "inclusion start and dimension must have two entries");
                }
                if !self.world_inclusion_start.iter().all(|value| value.is_finite()) || !self.world_inclusion_dim.iter().all(|&value| positive(value)) {
                    return integrity_error(4, "inclusion start must be finite and its dimension positive");
                }
            }
            "lay" => {
                if !self.world_layers.iter().all(|&border| border.is_finite() && border < 0.0 && border > -self.world_z) {
                    return integrity_error(5, "layer borders must lie within the world depth");
                }
                if !self.world_angle.is_finite() {
                    return integrity_error(6, "dipping angle must be finite");
                }
            }
            "tile" => {
                if !positive(self.world_tile_x) || !positive(self.world_tile_z) {
                    return integrity_error(14, "tile sizes must be positive");
                }
            }
            _ => return integrity_error(3, "world generator must be one of \"lay\", \"incl\", \"tile\""),
        }

        if !non_negative(self.sim_mesh_quality) || !non_negative(self.sim_mesh_maxarea) || !non_negative(self.sim_noise_level) || !non_negative(self.sim_noise_abs)
        {
            return integrity_error(7, "mesh quality, maximum cell area and noise must be non-negative");
        }

        let config_lists: [&Vec<String>; 2] = [&self.finv_base_configs, &self.finv_add_configs];
        if self.finv_base_configs.is_empty() || config_lists.iter().any(|list| list.iter().any(|name| name.trim().is_empty())) {
            return integrity_error(8, "configuration type lists must be non-empty lists of names");
        }

        let inversion_values: [f64; 8] = [
            self.inv_lambda,
            self.inv_dx,
            self.inv_dz,
            self.inv_depth,
            self.inv_final_lambda,
            self.inv_final_dx,
            self.inv_final_dz,
            self.inv_final_depth,
        ];
        if !inversion_values.iter().all(|&value| positive(value)) {
            return integrity_error(9, "inversion parameters must be positive");
        }

        if self.finv_max_iterations == 0 {
            return integrity_error(10, "at least one iteration is needed");
        }

        if !positive(self.finv_spacing)
            || !positive(self.finv_min_spacing)
            || self.finv_min_spacing > self.finv_spacing
            || !non_negative(self.world_electrode_offset)
            || self.world_x - 2.0 * self.world_electrode_offset < self.finv_spacing
        {
            return integrity_error(11, "electrode spacing and offset must leave at least two electrodes on the profile");
        }

        if !(0.0..=1.0).contains(&self.finv_gradient_weight) {
            return integrity_error(12, "gradient weight must be within [0, 1]");
        }

        if !(self.finv_li_threshold > 0.0 && self.finv_li_threshold <= 1.0) {
            return integrity_error(13, "linear independence threshold must be within (0, 1]");
        }

        return Ok(());
    }

    /// Human readable parameter listing, for the job log
    pub fn print_config(&self) -> Vec<String> {
        let mut lines: Vec<String> = vec![
            format!("Verbose: {}", self.general_verbose),
            format!("World X: {}", self.world_x),
            format!("World Z: {}", self.world_z),
            format!("World resistivities: {:?}", self.world_resistivities),
            format!("World generator: {}", self.world_gen),
        ];

        match self.world_gen.as_str() {
            "lay" => {
                lines.push(format!("World layers: {:?}", self.world_layers));
                lines.push(format!("World angle: {}", self.world_angle));
            }
            "incl" => {
                lines.push(format!("World inclusion start: {:?}", self.world_inclusion_start));
                lines.push(format!("World inclusion dimension: {:?}", self.world_inclusion_dim));
            }
            "tile" => {
                lines.push(format!("World tile size: [{}, {}]", self.world_tile_x, self.world_tile_z));
            }
            _ => {}
        }
        lines.push(format!("Electrode offset: {}", self.world_electrode_offset));

        lines.push(format!("Mesh quality: {}", self.sim_mesh_quality));
        lines.push(format!("Mesh max area: {}", self.sim_mesh_maxarea));
        lines.push(format!("Noise level: {}", self.sim_noise_level));
        lines.push(format!("Absolute noise: {}", self.sim_noise_abs));

        lines.push(format!("Lambda: {}", self.inv_lambda));
        lines.push(format!("Inversion grid: dx {}, dz {}, depth {}", self.inv_dx, self.inv_dz, self.inv_depth));
        lines.push(format!("Final lambda: {}", self.inv_final_lambda));
        lines.push(format!(
            "Final inversion grid: dx {}, dz {}, depth {}",
            self.inv_final_dx, self.inv_final_dz, self.inv_final_depth
        ));

        lines.push(format!("Max iterations: {}", self.finv_max_iterations));
        lines.push(format!("Electrode spacing: {}", self.finv_spacing));
        lines.push(format!("Min electrode spacing: {}", self.finv_min_spacing));
        lines.push(format!("Base configurations: {:?}", self.finv_base_configs));
        lines.push(format!("Additional configurations: {:?}", self.finv_add_configs));
        lines.push(format!("Gradient weight: {}", self.finv_gradient_weight));
        lines.push(format!("Configurations added per iteration: {}", self.finv_addconfig_count));
        lines.push(format!("Linear independence threshold: {}", self.finv_li_threshold));

        return lines;
    }
}

/// Parameter set of the reference inclusion run, used by the tests
#[cfg(test)]
pub fn test_configuration() -> InversionConfiguration {
    InversionConfiguration {
        general_verbose: false,
        general_folder_suffix: "-test".to_string(),
        general_results_folder: default_results_folder(),
        world_x: 200.0,
        world_z: 100.0,
        world_resistivities: vec![10.0, 100.0],
        world_gen: "incl".to_string(),
        world_layers: vec![],
        world_angle: 0.0,
        world_inclusion_start: vec![50.0, -20.0],
        world_inclusion_dim: vec![20.0, 10.0],
        world_tile_x: 40.0,
        world_tile_z: 5.0,
        world_electrode_offset: 0.0,
        sim_mesh_quality: 34.0,
        sim_mesh_maxarea: 30.0,
        sim_noise_level: 5.0,
        sim_noise_abs: 1e-6,
        inv_lambda: 10.0,
        inv_dx: 10.0,
        inv_dz: 10.0,
        inv_depth: 50.0,
        inv_final_lambda: 50.0,
        inv_final_dx: 5.0,
        inv_final_dz: 5.0,
        inv_final_depth: 50.0,
        finv_max_iterations: 5,
        finv_spacing: 5.0,
        finv_min_spacing: 1.0,
        finv_base_configs: vec!["dd".to_string()],
        finv_add_configs: ["wa", "wb", "pp", "pd", "slm", "hw", "gr"].iter().map(|name| name.to_string()).collect(),
        finv_gradient_weight: 0.0,
        finv_addconfig_count: 100,
        finv_li_threshold: 0.8,
    }
}

#[test]
fn test_check_integrity_codes() {
    fn error_code(config: &InversionConfiguration) -> Option<u8> {
        return match config.check_integrity() {
            Ok(()) => None,
            Err(Error::ConfigurationIntegrity { code, .. }) => Some(code),
            Err(other) => panic!("unexpected error {:?}", other),
        };
    }

    let config: InversionConfiguration = test_configuration();
    assert_eq!(error_code(&config), None);

    let mut broken: InversionConfiguration = config.clone();
    broken.world_x = -1.0;
    assert_eq!(error_code(&broken), Some(1));

    let mut broken: InversionConfiguration = config.clone();
    broken.world_resistivities = vec![];
    assert_eq!(error_code(&broken), Some(2));

    let mut broken: InversionConfiguration = config.clone();
    broken.world_gen = "dome".to_string();
    assert_eq!(error_code(&broken), Some(3));

    let mut broken: InversionConfiguration = config.clone();
    broken.world_inclusion_dim = vec![20.0];
    assert_eq!(error_code(&broken), Some(4));

    let mut broken: InversionConfiguration = config.clone();
    broken.world_gen = "lay".to_string();
    broken.world_layers = vec![-10.0, -120.0];
    assert_eq!(error_code(&broken), Some(5));

    let mut broken: InversionConfiguration = config.clone();
    broken.world_gen = "lay".to_string();
    broken.world_layers = vec![-10.0];
    broken.world_angle = f64::NAN;
    assert_eq!(error_code(&broken), Some(6));

    let mut broken: InversionConfiguration = config.clone();
    broken.sim_noise_level = -5.0;
    assert_eq!(error_code(&broken), Some(7));

    let mut broken: InversionConfiguration = config.clone();
    broken.finv_base_configs = vec![];
    assert_eq!(error_code(&broken), Some(8));

    let mut broken: InversionConfiguration = config.clone();
    broken.inv_final_dz = 0.0;
    assert_eq!(error_code(&broken), Some(9));

    let mut broken: InversionConfiguration = config.clone();
    broken.finv_max_iterations = 0;
    assert_eq!(error_code(&broken), Some(10));

    let mut broken: InversionConfiguration = config.clone();
    broken.world_electrode_offset = 99.0;
    assert_eq!(error_code(&broken), Some(11));

    let mut broken: InversionConfiguration = config.clone();
    broken.finv_gradient_weight = 1.5;
    assert_eq!(error_code(&broken), Some(12));

    let mut broken: InversionConfiguration = config.clone();
    broken.finv_li_threshold = 0.0;
    assert_eq!(error_code(&broken), Some(13));

    let mut broken: InversionConfiguration = config.clone();
    broken.world_gen = "tile".to_string();
    broken.world_tile_z = 0.0;
    assert_eq!(error_code(&broken), Some(14));
}

#[test]
fn test_configuration_json_round_trip() {
    let config: InversionConfiguration = test_configuration();

    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");
    let path = temporary_directory.path().join("params.json");
    std::fs::write(&path, serde_json::to_string_pretty(&config).expect("can't serialise")).expect("can't write");

    let config_read: InversionConfiguration = InversionConfiguration::from_file(&path).expect("can't read configuration");
    assert_eq!(config_read, config);

    // Optional parameters fall back to their defaults
    let minimal: &str = r#"{
        "world_x": 200, "world_z": 100, "world_resistivities": [10, 100], "world_gen": "tile",
        "world_tile_x": 40, "world_tile_z": 5,
        "sim_mesh_quality": 34, "sim_mesh_maxarea": 30, "sim_noise_level": 5, "sim_noise_abs": 1e-6,
        "inv_lambda": 10, "inv_dx": 10, "inv_dz": 10, "inv_depth": 50,
        "inv_final_lambda": 50, "inv_final_dx": 2, "inv_final_dz": 2, "inv_final_depth": 50,
        "finv_max_iterations": 5, "finv_spacing": 2, "finv_base_configs": ["dd"], "finv_add_configs": [],
        "finv_gradient_weight": 0.5, "finv_addconfig_count": 50, "finv_li_threshold": 0.8
    }"#;
    let config: InversionConfiguration = serde_json::from_str(minimal).expect("can't parse minimal configuration");
    assert_eq!(config.general_results_folder, "../inversion_results");
    assert_eq!(config.finv_min_spacing, 1.0);
    assert!(config.check_integrity().is_ok());
}
