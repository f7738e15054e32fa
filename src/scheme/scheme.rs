use crate::Error;
use crate::electrodes::ElectrodePosition;
use ndarray::Array1;

/// Electrode quadruple (a, b, m, n); `None` is a pole ("no electrode")
pub type Quadruple = [Option<usize>; 4];

/// A single four-electrode measurement
///
/// `a`, `b` are the current electrodes, `m`, `n` the potential electrodes.
/// The remaining fields are the measured or derived values carried along with the configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    pub a: Option<usize>,
    pub b: Option<usize>,
    pub m: Option<usize>,
    pub n: Option<usize>,
    pub err: f64,
    pub i: f64,
    pub ip: f64,
    pub iperr: f64,
    pub k: f64,
    pub r: f64,
    pub rhoa: f64,
    pub u: f64,
    pub valid: bool,
}

impl Configuration {
    /// New configuration with all measurement fields zeroed and marked valid
    pub fn new(a: Option<usize>, b: Option<usize>, m: Option<usize>, n: Option<usize>) -> Self {
        Configuration {
            a,
            b,
            m,
            n,
            err: 0.0,
            i: 0.0,
            ip: 0.0,
            iperr: 0.0,
            k: 0.0,
            r: 0.0,
            rhoa: 0.0,
            u: 0.0,
            valid: true,
        }
    }

    pub fn quadruple(&self) -> Quadruple {
        return [self.a, self.b, self.m, self.n];
    }

    /// Copy of this configuration with the electrode indices passed through `remap`.
    /// Measurement fields are kept verbatim.
    pub fn remapped(&self, remap: &[usize]) -> Configuration {
        let mut configuration: Configuration = self.clone();
        configuration.a = self.a.map(|index: usize| remap[index]);
        configuration.b = self.b.map(|index: usize| remap[index]);
        configuration.m = self.m.map(|index: usize| remap[index]);
        configuration.n = self.n.map(|index: usize| remap[index]);
        return configuration;
    }
}

/// Electrode layout plus the configurations measured on it.
/// Also used as the simulated data set, with `rhoa` and `valid` filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct Scheme {
    sensors: Vec<ElectrodePosition>,
    configurations: Vec<Configuration>,
}

impl Scheme {
    /// Create a scheme, checking that every electrode index points into `sensors`
    pub fn new(sensors: Vec<ElectrodePosition>, configurations: Vec<Configuration>) -> Result<Self, Error> {
        let n_sensors: usize = sensors.len();
        for (i_config, configuration) in configurations.iter().enumerate() {
            for electrode in configuration.quadruple().iter().flatten() {
                if *electrode >= n_sensors {
                    return Err(Error::InvalidElectrodeIndex {
                        config: i_config,
                        electrode: *electrode,
                        n_sensors,
                    });
                }
            }
        }

        return Ok(Scheme { sensors, configurations });
    }

    /// Scheme with sensors but no configurations
    pub fn from_sensors(sensors: Vec<ElectrodePosition>) -> Self {
        Scheme {
            sensors,
            configurations: vec![],
        }
    }

    pub fn sensor_positions(&self) -> &[ElectrodePosition] {
        return &self.sensors;
    }

    pub fn configurations(&self) -> &[Configuration] {
        return &self.configurations;
    }

    pub fn configurations_mut(&mut self) -> &mut [Configuration] {
        return &mut self.configurations;
    }

    /// Number of configurations
    pub fn len(&self) -> usize {
        return self.configurations.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.configurations.is_empty();
    }

    pub fn push(&mut self, configuration: Configuration) -> Result<(), Error> {
        let n_sensors: usize = self.sensors.len();
        for electrode in configuration.quadruple().iter().flatten() {
            if *electrode >= n_sensors {
                return Err(Error::InvalidElectrodeIndex {
                    config: self.configurations.len(),
                    electrode: *electrode,
                    n_sensors,
                });
            }
        }
        self.configurations.push(configuration);
        return Ok(());
    }

    /// Apparent resistivities, one per configuration, (ohm metre)
    pub fn rhoa(&self) -> Array1<f64> {
        return self.configurations.iter().map(|configuration: &Configuration| configuration.rhoa).collect();
    }

    /// Mark every configuration for which `predicate` holds as invalid
    pub fn mark_invalid<F>(&mut self, predicate: F)
    where
        F: Fn(&Configuration) -> bool,
    {
        for configuration in self.configurations.iter_mut() {
            if predicate(configuration) {
                configuration.valid = false;
            }
        }
    }

    /// Drop invalid configurations and return how many were removed
    pub fn remove_invalid(&mut self) -> usize {
        let n_before: usize = self.configurations.len();
        self.configurations.retain(|configuration: &Configuration| configuration.valid);
        return n_before - self.configurations.len();
    }
}

#[test]
fn test_scheme_rejects_invalid_electrode_index() {
    let sensors: Vec<ElectrodePosition> = vec![ElectrodePosition::new(0.0, 0.0, 0.0), ElectrodePosition::new(1.0, 0.0, 0.0)];
    let configurations: Vec<Configuration> = vec![Configuration::new(Some(0), Some(1), Some(2), None)];

    let scheme: Result<Scheme, Error> = Scheme::new(sensors.clone(), configurations);
    assert!(matches!(scheme, Err(Error::InvalidElectrodeIndex { config: 0, electrode: 2, n_sensors: 2 })));

    // Poles are always fine
    let scheme: Result<Scheme, Error> = Scheme::new(sensors, vec![Configuration::new(Some(0), None, Some(1), None)]);
    assert!(scheme.is_ok());
}

#[test]
fn test_scheme_remove_invalid() {
    let sensors: Vec<ElectrodePosition> = (0..4).map(|i: usize| ElectrodePosition::new(i as f64, 0.0, 0.0)).collect();
    let mut configurations: Vec<Configuration> = vec![];
    for rhoa in [10.0, -1.0, 0.0, 12.0] {
        let mut configuration: Configuration = Configuration::new(Some(0), Some(3), Some(1), Some(2));
        configuration.rhoa = rhoa;
        configurations.push(configuration);
    }
    let mut scheme: Scheme = Scheme::new(sensors, configurations).expect("valid scheme");

    scheme.mark_invalid(|configuration: &Configuration| configuration.rhoa <= 0.0);
    let n_removed: usize = scheme.remove_invalid();

    assert_eq!(n_removed, 2);
    assert_eq!(scheme.rhoa(), Array1::from(vec![10.0, 12.0]));
}
