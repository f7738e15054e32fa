use super::scheme::{Configuration, Scheme};
use crate::Error;
use crate::electrodes::ElectrodePosition;
use crate::engines::SchemeGenerator;

/// Largest separation factor `n` for the dipole based arrays
const MAX_SEPARATION_FACTOR: usize = 6;

/// Configuration types known to `StandardSchemeGenerator`
pub const STANDARD_SCHEME_NAMES: [&str; 8] = ["wa", "wb", "pp", "pd", "dd", "slm", "hw", "gr"];

/// Generates the standard surface arrays on a line of electrodes
///
/// * `wa` - Wenner-alpha, C1 P1 P2 C2, equal spacing
/// * `wb` - Wenner-beta, C2 C1 P1 P2, equal spacing
/// * `dd` - dipole-dipole, C2 C1 P1 P2 with dipole length `a` and separation `n * a`
/// * `pd` - pole-dipole, C1 P1 P2 with the second current electrode at infinity
/// * `pp` - pole-pole, C1 P1 with both remote electrodes at infinity
/// * `slm` - Schlumberger, C1 P1 P2 C2 with potential dipole `a` and current spread `(2n + 1) * a`
/// * `hw` - half-Wenner, C1 P1 P2 with equal spacing, in both directions
/// * `gr` - gradient, fixed current pair with moving unit potential dipoles between them
#[derive(Clone, Debug, Default)]
pub struct StandardSchemeGenerator {}

impl StandardSchemeGenerator {
    pub fn new() -> Self {
        StandardSchemeGenerator {}
    }
}

impl SchemeGenerator for StandardSchemeGenerator {
    fn create_scheme(&self, electrodes: &[ElectrodePosition], scheme_name: &str) -> Result<Scheme, Error> {
        let n_electrodes: usize = electrodes.len();
        let quadruples: Vec<[Option<usize>; 4]> = match scheme_name {
            "wa" => wenner_alpha(n_electrodes),
            "wb" => wenner_beta(n_electrodes),
            "dd" => dipole_dipole(n_electrodes),
            "pd" => pole_dipole(n_electrodes),
            "pp" => pole_pole(n_electrodes),
            "slm" => schlumberger(n_electrodes),
            "hw" => half_wenner(n_electrodes),
            "gr" => gradient(n_electrodes),
            _ => return Err(Error::UnknownSchemeType(scheme_name.to_string())),
        };

        let configurations: Vec<Configuration> = quadruples
            .into_iter()
            .map(|[a, b, m, n]| Configuration::new(a, b, m, n))
            .collect();

        return Scheme::new(electrodes.to_vec(), configurations);
    }
}

fn wenner_alpha(n_electrodes: usize) -> Vec<[Option<usize>; 4]> {
    let mut quadruples: Vec<[Option<usize>; 4]> = vec![];
    let mut spacing: usize = 1;
    while 3 * spacing < n_electrodes {
        for i in 0..n_electrodes - 3 * spacing {
            quadruples.push([Some(i), Some(i + 3 * spacing), Some(i + spacing), Some(i + 2 * spacing)]);
        }
        spacing += 1;
    }
    return quadruples;
}

fn wenner_beta(n_electrodes: usize) -> Vec<[Option<usize>; 4]> {
    let mut quadruples: Vec<[Option<usize>; 4]> = vec![];
    let mut spacing: usize = 1;
    while 3 * spacing < n_electrodes {
        for i in 0..n_electrodes - 3 * spacing {
            quadruples.push([Some(i + spacing), Some(i), Some(i + 2 * spacing), Some(i + 3 * spacing)]);
        }
        spacing += 1;
    }
    return quadruples;
}

fn dipole_dipole(n_electrodes: usize) -> Vec<[Option<usize>; 4]> {
    let mut quadruples: Vec<[Option<usize>; 4]> = vec![];
    for separation in 1..=MAX_SEPARATION_FACTOR {
        let mut dipole: usize = 1;
        // Total length of the array is `(separation + 2) * dipole`
        while (separation + 2) * dipole < n_electrodes {
            for i in 0..n_electrodes - (separation + 2) * dipole {
                let m: usize = i + (separation + 1) * dipole;
                quadruples.push([Some(i + dipole), Some(i), Some(m), Some(m + dipole)]);
            }
            dipole += 1;
        }
    }
    return quadruples;
}

fn pole_dipole(n_electrodes: usize) -> Vec<[Option<usize>; 4]> {
    let mut quadruples: Vec<[Option<usize>; 4]> = vec![];
    for separation in 1..=MAX_SEPARATION_FACTOR {
        let mut dipole: usize = 1;
        while (separation + 1) * dipole < n_electrodes {
            for i in 0..n_electrodes - (separation + 1) * dipole {
                let m: usize = i + separation * dipole;
                quadruples.push([Some(i), None, Some(m), Some(m + dipole)]);
            }
            dipole += 1;
        }
    }
    return quadruples;
}

fn pole_pole(n_electrodes: usize) -> Vec<[Option<usize>; 4]> {
    let mut quadruples: Vec<[Option<usize>; 4]> = vec![];
    for i in 0..n_electrodes {
        for j in i + 1..n_electrodes {
            quadruples.push([Some(i), None, Some(j), None]);
        }
    }
    return quadruples;
}

fn schlumberger(n_electrodes: usize) -> Vec<[Option<usize>; 4]> {
    let mut quadruples: Vec<[Option<usize>; 4]> = vec![];
    for separation in 1..=MAX_SEPARATION_FACTOR {
        let mut dipole: usize = 1;
        while (2 * separation + 1) * dipole < n_electrodes {
            for i in 0..n_electrodes - (2 * separation + 1) * dipole {
                let m: usize = i + separation * dipole;
                let n: usize = m + dipole;
                quadruples.push([Some(i), Some(n + separation * dipole), Some(m), Some(n)]);
            }
            dipole += 1;
        }
    }
    return quadruples;
}

fn half_wenner(n_electrodes: usize) -> Vec<[Option<usize>; 4]> {
    let mut quadruples: Vec<[Option<usize>; 4]> = vec![];
    let mut spacing: usize = 1;
    while 2 * spacing < n_electrodes {
        // Forward
        for i in 0..n_electrodes - 2 * spacing {
            quadruples.push([Some(i), None, Some(i + spacing), Some(i + 2 * spacing)]);
        }
        // Reverse
        for i in 2 * spacing..n_electrodes {
            quadruples.push([Some(i), None, Some(i - spacing), Some(i - 2 * spacing)]);
        }
        spacing += 1;
    }
    return quadruples;
}

fn gradient(n_electrodes: usize) -> Vec<[Option<usize>; 4]> {
    let mut quadruples: Vec<[Option<usize>; 4]> = vec![];
    if n_electrodes < 4 {
        return quadruples;
    }
    // Current electrode spread: whole line, then halved while a potential dipole still fits inside
    let mut spread: usize = n_electrodes - 1;
    while spread >= 3 {
        for i in 0..n_electrodes - spread {
            let b: usize = i + spread;
            for m in i + 1..b - 1 {
                quadruples.push([Some(i), Some(b), Some(m), Some(m + 1)]);
            }
        }
        spread /= 2;
    }
    return quadruples;
}

#[test]
fn test_standard_scheme_counts() {
    use crate::electrodes::electrode_line;

    let generator: StandardSchemeGenerator = StandardSchemeGenerator::new();
    let electrodes: Vec<ElectrodePosition> = electrode_line(0.0, 50.0, 11);

    // Wenner-alpha with 11 electrodes: 8 + 5 + 2 = 15
    let scheme: Scheme = generator.create_scheme(&electrodes, "wa").expect("wa");
    assert_eq!(scheme.len(), 15);
    assert_eq!(scheme.configurations()[0].quadruple(), [Some(0), Some(3), Some(1), Some(2)]);

    // Pole-pole: every electrode pair
    let scheme: Scheme = generator.create_scheme(&electrodes, "pp").expect("pp");
    assert_eq!(scheme.len(), 55);

    // Dipole-dipole, separation 1: 8 + 5 + 2 = 15 (dipole lengths 1, 2, 3)
    let scheme: Scheme = generator.create_scheme(&electrodes, "dd").expect("dd");
    assert_eq!(scheme.configurations()[0].quadruple(), [Some(1), Some(0), Some(2), Some(3)]);
    let n_separation_1: usize = scheme
        .configurations()
        .iter()
        .filter(|configuration| configuration.m.zip(configuration.a).map(|(m, a)| m - a) == configuration.a.zip(configuration.b).map(|(a, b)| a - b))
        .count();
    assert_eq!(n_separation_1, 15);
}

#[test]
fn test_standard_schemes_are_valid() {
    use crate::electrodes::electrode_line;
    use std::collections::HashSet;

    let generator: StandardSchemeGenerator = StandardSchemeGenerator::new();
    for n_electrodes in [4, 6, 11, 21] {
        let electrodes: Vec<ElectrodePosition> = electrode_line(0.0, 100.0, n_electrodes);
        for scheme_name in STANDARD_SCHEME_NAMES {
            let scheme: Scheme = generator.create_scheme(&electrodes, scheme_name).expect("standard scheme");

            // Every configuration uses four (or fewer, for poles) distinct electrodes, no repetition
            let mut quadruples: HashSet<[Option<usize>; 4]> = HashSet::new();
            for configuration in scheme.configurations() {
                let used: Vec<usize> = configuration.quadruple().iter().flatten().copied().collect();
                let distinct: HashSet<usize> = used.iter().copied().collect();
                assert_eq!(used.len(), distinct.len(), "{} repeats an electrode", scheme_name);
                assert!(quadruples.insert(configuration.quadruple()), "{} has duplicate configurations", scheme_name);
            }
        }
    }

    let unknown: Result<Scheme, Error> = generator.create_scheme(&electrode_line(0.0, 10.0, 5), "xyz");
    assert!(matches!(unknown, Err(Error::UnknownSchemeType(_))));
}
