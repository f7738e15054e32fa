use crate::Error;
use crate::electrodes::{ElectrodePosition, electrode_count, electrode_line};
use crate::engines::SchemeGenerator;
use crate::scheme::{Scheme, merge_schemes};
use log::info;

/// Fewest electrodes a thinned line may have
const MIN_THINNED_ELECTRODES: usize = 5;

/// Electrode counts of the nested electrode lines
///
/// Starts at `n_electrodes` and keeps every second electrode, `n -> (n - 1) / 2 + 1`, while this
/// keeps the end electrodes in place and at least `MIN_THINNED_ELECTRODES` remain.
/// For example 41 electrodes give `[41, 21, 11, 6]`.
pub fn electrode_count_chain(n_electrodes: usize) -> Vec<usize> {
    let mut counts: Vec<usize> = vec![n_electrodes];
    let mut n_current: usize = n_electrodes;
    while n_current > 1 && (n_current - 1) % 2 == 0 {
        let n_next: usize = (n_current - 1) / 2 + 1;
        if n_next < MIN_THINNED_ELECTRODES || counts.contains(&n_next) {
            break;
        }
        counts.push(n_next);
        n_current = n_next;
    }
    return counts;
}

/// Candidate pool of configurations
///
/// # Arguments
/// * `scheme_generator` - generator for the configuration types
/// * `world_x` - profile length, (metre)
/// * `spacing` - electrode spacing of the densest line, (metre)
/// * `offset` - distance of the first and last electrode from the world edges, (metre)
/// * `scheme_names` - configuration types, duplicates are ignored
///
/// # Returns
/// * every configuration type generated on every nested electrode line, merged into one deduplicated scheme
///
/// # Algorithm
/// For each configuration type the schemes of all electrode densities are merged (densest first), then the
/// type scheme is merged behind the pool built so far. Types which produce no configuration on a line are skipped.
pub fn build_comprehensive_scheme(
    scheme_generator: &dyn SchemeGenerator,
    world_x: f64,
    spacing: f64,
    offset: f64,
    scheme_names: &[String],
) -> Result<Scheme, Error> {
    info!("Creating comprehensive scheme...");

    let n_electrodes: usize = electrode_count(world_x, spacing, offset);
    let electrode_lines: Vec<Vec<ElectrodePosition>> = electrode_count_chain(n_electrodes)
        .into_iter()
        .map(|n_line: usize| electrode_line(offset, world_x - offset, n_line))
        .collect();
    info!("Electrode lines: {:?}", electrode_lines.iter().map(|electrodes| electrodes.len()).collect::<Vec<usize>>());

    let mut scheme_names_unique: Vec<&String> = vec![];
    for scheme_name in scheme_names {
        if !scheme_names_unique.contains(&scheme_name) {
            scheme_names_unique.push(scheme_name);
        }
    }

    let mut comprehensive_scheme: Option<Scheme> = None;
    for scheme_name in scheme_names_unique {
        let mut type_scheme: Option<Scheme> = None;
        for electrodes in &electrode_lines {
            let scheme: Scheme = scheme_generator.create_scheme(electrodes, scheme_name)?;
            if scheme.is_empty() {
                continue;
            }
            type_scheme = Some(match type_scheme {
                None => scheme,
                Some(type_scheme) => merge_schemes(&type_scheme, &scheme)?,
            });
        }

        let Some(type_scheme) = type_scheme else {
            info!("Configuration `{}` has no configurations on these electrode lines", scheme_name);
            continue;
        };
        info!("Merging with configuration: {} ({} configurations)", scheme_name, type_scheme.len());
        comprehensive_scheme = Some(match comprehensive_scheme {
            None => type_scheme,
            Some(comprehensive_scheme) => merge_schemes(&comprehensive_scheme, &type_scheme)?,
        });
    }

    let comprehensive_scheme: Scheme = comprehensive_scheme.ok_or(Error::EmptyScheme("comprehensive".to_string()))?;
    info!(
        "Comprehensive scheme created ({} electrodes, {} configurations)",
        comprehensive_scheme.sensor_positions().len(),
        comprehensive_scheme.len()
    );

    return Ok(comprehensive_scheme);
}

#[test]
fn test_electrode_count_chain() {
    assert_eq!(electrode_count_chain(41), vec![41, 21, 11, 6]);
    assert_eq!(electrode_count_chain(68), vec![68]);
    assert_eq!(electrode_count_chain(9), vec![9, 5]);
    assert_eq!(electrode_count_chain(7), vec![7]);
}

#[test]
fn test_build_comprehensive_scheme() {
    use crate::scheme::{StandardSchemeGenerator, find_duplicate_configurations};
    use std::collections::HashSet;

    let generator: StandardSchemeGenerator = StandardSchemeGenerator::new();
    let scheme_names: Vec<String> = ["dd", "wa", "pp", "dd"].iter().map(|name| name.to_string()).collect();

    let comprehensive_scheme: Scheme = build_comprehensive_scheme(&generator, 50.0, 5.0, 0.0, &scheme_names).expect("comprehensive scheme");

    // 11 and 6 electrodes; the thinned line reuses every second electrode
    assert_eq!(comprehensive_scheme.sensor_positions().len(), 11);

    // No duplicate quadruples
    let quadruples: HashSet<[Option<usize>; 4]> = comprehensive_scheme.configurations().iter().map(|configuration| configuration.quadruple()).collect();
    assert_eq!(quadruples.len(), comprehensive_scheme.len());

    // Every base type scheme on the full line is part of the pool
    let electrodes: Vec<ElectrodePosition> = electrode_line(0.0, 50.0, 11);
    for scheme_name in ["dd", "wa", "pp"] {
        let scheme: Scheme = generator.create_scheme(&electrodes, scheme_name).expect("scheme");
        assert!(find_duplicate_configurations(&comprehensive_scheme, &scheme).is_ok());
    }

    // Nothing to generate
    let empty: Result<Scheme, Error> = build_comprehensive_scheme(&generator, 50.0, 5.0, 0.0, &[]);
    assert!(matches!(empty, Err(Error::EmptyScheme(_))));
}
