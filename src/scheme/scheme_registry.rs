use super::scheme::{Configuration, Quadruple, Scheme};
use crate::Error;
use crate::electrodes::{ElectrodeKey, ElectrodePosition};
use log::info;
use std::collections::{HashMap, HashSet};

/// Register of electrode identities, mapping each location to its index in the register
struct ElectrodeRegister {
    electrodes: Vec<ElectrodePosition>,
    index_by_key: HashMap<ElectrodeKey, usize>,
}

impl ElectrodeRegister {
    fn from_electrodes(electrodes: &[ElectrodePosition]) -> Self {
        let mut index_by_key: HashMap<ElectrodeKey, usize> = HashMap::with_capacity(electrodes.len());
        for (i_electrode, electrode) in electrodes.iter().enumerate() {
            index_by_key.entry(electrode.key()).or_insert(i_electrode);
        }
        ElectrodeRegister {
            electrodes: electrodes.to_vec(),
            index_by_key,
        }
    }

    fn find(&self, electrode: &ElectrodePosition) -> Option<usize> {
        return self.index_by_key.get(&electrode.key()).copied();
    }

    /// Index of `electrode` in the register, appending it when it is new
    fn find_or_insert(&mut self, electrode: &ElectrodePosition) -> usize {
        if let Some(index) = self.find(electrode) {
            return index;
        }
        let index: usize = self.electrodes.len();
        self.electrodes.push(*electrode);
        self.index_by_key.insert(electrode.key(), index);
        return index;
    }
}

/// Merge two schemes, prioritising the first one
///
/// # Arguments
/// * `scheme_1` - first scheme, all of its configurations are kept unchanged
/// * `scheme_2` - second scheme, contributes only configurations whose electrode quadruple is new
///
/// # Returns
/// * merged scheme; its sensors are `scheme_1`'s sensors followed by the sensors of `scheme_2` at new locations
///
/// # Algorithm
/// 1. Build an electrode register from `scheme_1`'s sensors, appending `scheme_2` sensors at locations not yet registered.
/// 2. Copy every `scheme_1` configuration verbatim.
/// 3. Remap each `scheme_2` configuration onto the register and append it when its quadruple is not present yet.
pub fn merge_schemes(scheme_1: &Scheme, scheme_2: &Scheme) -> Result<Scheme, Error> {
    if scheme_1.is_empty() {
        return Err(Error::EmptyScheme("scheme_1".to_string()));
    }
    if scheme_2.is_empty() {
        return Err(Error::EmptyScheme("scheme_2".to_string()));
    }
    info!("Merging datasets with {} and {} entries", scheme_1.len(), scheme_2.len());

    // Global electrode register
    let mut register: ElectrodeRegister = ElectrodeRegister::from_electrodes(scheme_1.sensor_positions());
    let scheme_2_remap: Vec<usize> = scheme_2
        .sensor_positions()
        .iter()
        .map(|electrode: &ElectrodePosition| register.find_or_insert(electrode))
        .collect();

    // `scheme_1` electrode indices are unchanged, because its sensors come first
    let mut configurations: Vec<Configuration> = scheme_1.configurations().to_vec();
    let mut known_quadruples: HashSet<Quadruple> = configurations.iter().map(|configuration: &Configuration| configuration.quadruple()).collect();

    for configuration in scheme_2.configurations() {
        let remapped: Configuration = configuration.remapped(&scheme_2_remap);
        if known_quadruples.insert(remapped.quadruple()) {
            configurations.push(remapped);
        }
    }
    info!("Merging complete ({} entries)", configurations.len());

    return Scheme::new(register.electrodes, configurations);
}

/// Find, for every configuration of `scheme_b`, the index of the equivalent configuration in `scheme_a`
///
/// # Arguments
/// * `scheme_a` - reference scheme
/// * `scheme_b` - scheme whose configurations are all expected to exist in `scheme_a`
///
/// # Returns
/// * one index into `scheme_a`'s configurations per `scheme_b` configuration, the first match is used
pub fn find_duplicate_configurations(scheme_a: &Scheme, scheme_b: &Scheme) -> Result<Vec<usize>, Error> {
    info!(
        "Finding duplicate configurations for datasets with {} and {} entries",
        scheme_a.len(),
        scheme_b.len()
    );

    let register: ElectrodeRegister = ElectrodeRegister::from_electrodes(scheme_a.sensor_positions());
    let scheme_b_remap: Vec<Option<usize>> = scheme_b
        .sensor_positions()
        .iter()
        .map(|electrode: &ElectrodePosition| register.find(electrode))
        .collect();

    let mut index_by_quadruple: HashMap<Quadruple, usize> = HashMap::with_capacity(scheme_a.len());
    for (i_config, configuration) in scheme_a.configurations().iter().enumerate() {
        index_by_quadruple.entry(configuration.quadruple()).or_insert(i_config);
    }

    let mut indices: Vec<usize> = Vec::with_capacity(scheme_b.len());
    for (i_config, configuration) in scheme_b.configurations().iter().enumerate() {
        // Electrodes of `scheme_b` which do not exist in `scheme_a` cannot match anything
        let mut quadruple: Quadruple = [None; 4];
        for (i_electrode, electrode) in configuration.quadruple().iter().enumerate() {
            quadruple[i_electrode] = match electrode {
                None => None,
                Some(index) => match scheme_b_remap[*index] {
                    Some(remapped) => Some(remapped),
                    None => return Err(Error::ConfigurationNotFound { index: i_config }),
                },
            };
        }

        match index_by_quadruple.get(&quadruple) {
            Some(index) => indices.push(*index),
            None => return Err(Error::ConfigurationNotFound { index: i_config }),
        }
    }
    info!("Finding duplicates complete ({} entries)", indices.len());

    return Ok(indices);
}

/// Extract the configurations at `config_indices` (in that order) into a new scheme with the full sensor list
pub fn extract_configurations(scheme: &Scheme, config_indices: &[usize]) -> Result<Scheme, Error> {
    info!("Extracting {} configs from scheme", config_indices.len());

    let n_configs: usize = scheme.len();
    let mut configurations: Vec<Configuration> = Vec::with_capacity(config_indices.len());
    for &i_config in config_indices {
        if i_config >= n_configs {
            return Err(Error::IndexOutOfRange {
                index: i_config,
                len: n_configs,
            });
        }
        configurations.push(scheme.configurations()[i_config].clone());
    }

    return Scheme::new(scheme.sensor_positions().to_vec(), configurations);
}

#[cfg(test)]
fn test_scheme(x_positions: &[f64], quadruples: &[[i64; 4]], rhoa_offset: f64) -> Scheme {
    // Quadruples are given 0-based, with -1 meaning "no electrode"
    let sensors: Vec<ElectrodePosition> = x_positions.iter().map(|&x| ElectrodePosition::new(x, 0.0, 0.0)).collect();
    let configurations: Vec<Configuration> = quadruples
        .iter()
        .enumerate()
        .map(|(i_config, quadruple)| {
            let to_index = |value: i64| if value < 0 { None } else { Some(value as usize) };
            let mut configuration: Configuration =
                Configuration::new(to_index(quadruple[0]), to_index(quadruple[1]), to_index(quadruple[2]), to_index(quadruple[3]));
            configuration.rhoa = rhoa_offset + i_config as f64;
            configuration.k = 1.5 * (i_config as f64 + 1.0);
            configuration
        })
        .collect();
    return Scheme::new(sensors, configurations).expect("test scheme should be valid");
}

#[test]
fn test_merge_schemes_priority() {
    // Electrodes at 0, 10, 20, 30 and 0, 5, 10, 15, 20, 25, 30: the second scheme shares four locations
    let scheme_1: Scheme = test_scheme(&[0.0, 10.0, 20.0, 30.0], &[[0, 3, 1, 2], [0, -1, 1, -1]], 100.0);
    let scheme_2: Scheme = test_scheme(
        &[0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0],
        &[
            [0, 6, 2, 4], // same as scheme_1[0] after remapping
            [0, 1, 2, 3], // new
            [0, -1, 2, -1], // same as scheme_1[1] after remapping
        ],
        200.0,
    );

    let merged: Scheme = merge_schemes(&scheme_1, &scheme_2).expect("merge should succeed");

    // Sensors: scheme_1 first, then new locations from scheme_2 in their order
    let merged_x: Vec<f64> = merged.sensor_positions().iter().map(|electrode| electrode.x).collect();
    assert_eq!(merged_x, vec![0.0, 10.0, 20.0, 30.0, 5.0, 15.0, 25.0]);

    // scheme_1 configurations unchanged, including the measured values
    assert_eq!(merged.len(), 3);
    assert_eq!(&merged.configurations()[0..2], scheme_1.configurations());

    // The new configuration is remapped onto the merged sensor list
    let added: &Configuration = &merged.configurations()[2];
    assert_eq!(added.quadruple(), [Some(0), Some(4), Some(1), Some(5)]);
    assert_eq!(added.rhoa, 201.0);
}

#[test]
fn test_merge_schemes_identical_single_electrode() {
    // Both schemes use a single electrode at the origin and the same quadruple
    let scheme_1: Scheme = test_scheme(&[0.0], &[[0, 0, 0, 0]], 1.0);
    let scheme_2: Scheme = test_scheme(&[0.0], &[[0, 0, 0, 0]], 2.0);

    let merged: Scheme = merge_schemes(&scheme_1, &scheme_2).expect("merge should succeed");

    assert_eq!(merged.sensor_positions().len(), 1);
    assert_eq!(merged.len(), scheme_1.len());
    assert_eq!(merged.configurations()[0].rhoa, 1.0);
}

#[test]
fn test_merge_schemes_idempotent() {
    let scheme: Scheme = test_scheme(&[0.0, 1.0, 2.0, 3.0, 4.0], &[[0, 3, 1, 2], [1, 4, 2, 3], [0, -1, 1, 2], [4, -1, 3, -1]], 10.0);

    let merged: Scheme = merge_schemes(&scheme, &scheme).expect("merge should succeed");

    assert_eq!(merged, scheme);
}

#[test]
fn test_merge_schemes_empty() {
    let scheme: Scheme = test_scheme(&[0.0, 1.0, 2.0, 3.0], &[[0, 3, 1, 2]], 10.0);
    let empty: Scheme = Scheme::from_sensors(scheme.sensor_positions().to_vec());

    assert!(matches!(merge_schemes(&scheme, &empty), Err(Error::EmptyScheme(_))));
    assert!(matches!(merge_schemes(&empty, &scheme), Err(Error::EmptyScheme(_))));
}

#[test]
fn test_find_duplicates_inverts_extract() {
    let scheme: Scheme = test_scheme(
        &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        &[[0, 3, 1, 2], [1, 4, 2, 3], [2, 5, 3, 4], [0, -1, 1, -1], [0, 5, 2, 3], [1, -1, 2, 3]],
        10.0,
    );
    let indices: Vec<usize> = vec![4, 0, 3, 5];

    let extracted: Scheme = extract_configurations(&scheme, &indices).expect("extract should succeed");
    assert_eq!(extracted.sensor_positions(), scheme.sensor_positions());
    assert_eq!(extracted.configurations()[0], scheme.configurations()[4]);

    let found: Vec<usize> = find_duplicate_configurations(&scheme, &extracted).expect("all configurations exist");
    assert_eq!(found, indices);
}

#[test]
fn test_find_duplicates_across_electrode_sets() {
    // Coarse scheme on every second electrode of the fine scheme
    let fine: Scheme = test_scheme(&[0.0, 5.0, 10.0, 15.0, 20.0], &[[0, 1, 2, 3], [0, 4, 1, 3], [0, -1, 2, -1]], 0.0);
    let coarse: Scheme = test_scheme(&[0.0, 10.0, 20.0], &[[0, -1, 1, -1], [0, 2, 0, 1]], 0.0);

    // [0, 2, 0, 1] on the coarse line is [0, 4, 0, 2] on the fine line, which does not exist
    let result: Result<Vec<usize>, Error> = find_duplicate_configurations(&fine, &coarse);
    assert!(matches!(result, Err(Error::ConfigurationNotFound { index: 1 })));

    let coarse: Scheme = test_scheme(&[0.0, 10.0, 20.0], &[[0, -1, 1, -1]], 0.0);
    let found: Vec<usize> = find_duplicate_configurations(&fine, &coarse).expect("configuration exists");
    assert_eq!(found, vec![2]);

    // Electrode which is not part of the reference scheme
    let shifted: Scheme = test_scheme(&[0.0, 7.0], &[[0, -1, 1, -1]], 0.0);
    assert!(matches!(
        find_duplicate_configurations(&fine, &shifted),
        Err(Error::ConfigurationNotFound { index: 0 })
    ));
}

#[test]
fn test_extract_out_of_range() {
    let scheme: Scheme = test_scheme(&[0.0, 1.0, 2.0, 3.0], &[[0, 3, 1, 2]], 10.0);
    assert!(matches!(extract_configurations(&scheme, &[1]), Err(Error::IndexOutOfRange { index: 1, len: 1 })));
}
