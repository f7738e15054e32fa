use super::scheme::{Configuration, Scheme};
use crate::Error;
use crate::electrodes::ElectrodePosition;
use std::fs;
use std::path::Path;

const SENSOR_COLUMNS: [&str; 3] = ["x", "y", "z"];
const DATA_COLUMNS: [&str; 13] = ["a", "b", "m", "n", "err", "i", "ip", "iperr", "k", "r", "rhoa", "u", "valid"];

/// Serialise a scheme into the unified data format
///
/// Layout: sensor count, `# x y z` header, one line per sensor; configuration count,
/// `# a b m n err i ip iperr k r rhoa u valid` header, one line per configuration with 1-based electrode
/// indices (0 = no electrode); a closing `0` for the empty topography section.
///
/// Floats are written with the shortest representation which reads back to the same value.
pub fn scheme_to_string(scheme: &Scheme) -> String {
    fn electrode_to_string(electrode: Option<usize>) -> String {
        return match electrode {
            Some(index) => (index + 1).to_string(),
            None => "0".to_string(),
        };
    }

    let mut output: String = String::new();

    // Electrodes
    output += &format!("{}\n", scheme.sensor_positions().len());
    output += &format!("# {}\n", SENSOR_COLUMNS.join(" "));
    for electrode in scheme.sensor_positions() {
        output += &format!("{} {} {}\n", electrode.x, electrode.y, electrode.z);
    }

    // Data
    output += &format!("{}\n", scheme.len());
    output += &format!("# {}\n", DATA_COLUMNS.join(" "));
    for configuration in scheme.configurations() {
        output += &format!(
            "{} {} {} {} {} {} {} {} {} {} {} {} {}\n",
            electrode_to_string(configuration.a),
            electrode_to_string(configuration.b),
            electrode_to_string(configuration.m),
            electrode_to_string(configuration.n),
            configuration.err,
            configuration.i,
            configuration.ip,
            configuration.iperr,
            configuration.k,
            configuration.r,
            configuration.rhoa,
            configuration.u,
            configuration.valid as u8,
        );
    }

    // Empty topography
    output += "0\n";

    return output;
}

pub fn write_scheme_file(scheme: &Scheme, path: &Path) -> Result<(), Error> {
    fs::write(path, scheme_to_string(scheme))?;
    return Ok(());
}

pub fn read_scheme_file(path: &Path) -> Result<Scheme, Error> {
    let text: String = fs::read_to_string(path)?;
    return parse_scheme(&text);
}

/// Non-empty lines with their 1-based line numbers
struct LineCursor<'a> {
    lines: Vec<(usize, &'a str)>,
    position: usize,
}

impl<'a> LineCursor<'a> {
    fn new(text: &'a str) -> Self {
        let lines: Vec<(usize, &'a str)> = text
            .lines()
            .enumerate()
            .map(|(i_line, line)| (i_line + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty())
            .collect();
        LineCursor { lines, position: 0 }
    }

    fn last_line_number(&self) -> usize {
        return self.lines.last().map(|(i_line, _)| *i_line).unwrap_or(0);
    }

    /// Next data line; comment lines are skipped, the last one seen is returned as column header
    fn next_data_line(&mut self) -> Option<(usize, &'a str, Option<Vec<String>>)> {
        let mut header: Option<Vec<String>> = None;
        while self.position < self.lines.len() {
            let (i_line, line) = self.lines[self.position];
            self.position += 1;
            if let Some(comment) = line.strip_prefix('#') {
                header = Some(comment.split_whitespace().map(|token: &str| token.to_lowercase()).collect());
                continue;
            }
            return Some((i_line, line, header));
        }
        return None;
    }

    fn read_count(&mut self, section: &str) -> Result<(usize, Option<Vec<String>>), Error> {
        let (i_line, line, header) = self.next_data_line().ok_or_else(|| Error::SchemeFormat {
            line: self.last_line_number(),
            message: format!("missing {} count", section),
        })?;
        let first_token: &str = line.split_whitespace().next().unwrap_or("");
        let count: usize = first_token.parse::<usize>().map_err(|_| Error::SchemeFormat {
            line: i_line,
            message: format!("expected {} count, found `{}`", section, line),
        })?;
        return Ok((count, header));
    }
}

fn parse_value(token: &str, i_line: usize) -> Result<f64, Error> {
    return token.parse::<f64>().map_err(|_| Error::SchemeFormat {
        line: i_line,
        message: format!("cannot parse `{}` as a number", token),
    });
}

/// Column of each expected field within a line; `None` when the file does not carry the field
fn column_mapping(header: &[String], fields: &[&str]) -> Vec<Option<usize>> {
    return fields
        .iter()
        .map(|field: &&str| header.iter().position(|token: &String| token == field))
        .collect();
}

/// Parse a scheme in the unified data format
///
/// Columns are mapped through the `#` header preceding each section, so files carrying only `a b m n`
/// are accepted; missing numeric fields are set to zero and missing `valid` to true.
pub fn parse_scheme(text: &str) -> Result<Scheme, Error> {
    let mut cursor: LineCursor = LineCursor::new(text);

    // Electrodes
    let (n_sensors, _) = cursor.read_count("sensor")?;
    let mut sensors: Vec<ElectrodePosition> = Vec::with_capacity(n_sensors);
    let mut sensor_columns: Vec<Option<usize>> = vec![Some(0), Some(1), Some(2)];
    for _ in 0..n_sensors {
        let (i_line, line, header) = cursor.next_data_line().ok_or_else(|| Error::SchemeFormat {
            line: cursor.last_line_number(),
            message: format!("expected {} sensors, found {}", n_sensors, sensors.len()),
        })?;
        if let Some(header) = header {
            sensor_columns = column_mapping(&header, &SENSOR_COLUMNS);
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let mut coordinates: [f64; 3] = [0.0; 3];
        for (i_coordinate, column) in sensor_columns.iter().enumerate() {
            if let Some(token) = column.and_then(|i_column: usize| tokens.get(i_column)) {
                coordinates[i_coordinate] = parse_value(token, i_line)?;
            }
        }
        sensors.push(ElectrodePosition::new(coordinates[0], coordinates[1], coordinates[2]));
    }

    // Data
    let (n_configs, _) = cursor.read_count("data")?;
    let mut configurations: Vec<Configuration> = Vec::with_capacity(n_configs);
    let mut data_columns: Vec<Option<usize>> = column_mapping(&["a", "b", "m", "n"].map(String::from), &DATA_COLUMNS);
    for _ in 0..n_configs {
        let (i_line, line, header) = cursor.next_data_line().ok_or_else(|| Error::SchemeFormat {
            line: cursor.last_line_number(),
            message: format!("expected {} configurations, found {}", n_configs, configurations.len()),
        })?;
        if let Some(header) = header {
            data_columns = column_mapping(&header, &DATA_COLUMNS);
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let mut values: [Option<f64>; 13] = [None; 13];
        for (i_field, column) in data_columns.iter().enumerate() {
            if let Some(token) = column.and_then(|i_column: usize| tokens.get(i_column)) {
                values[i_field] = Some(parse_value(token, i_line)?);
            }
        }

        // 1-based electrode index, 0 = no electrode
        let electrode = |value: Option<f64>| -> Result<Option<usize>, Error> {
            let value: f64 = value.unwrap_or(0.0);
            if value < 0.0 || value.fract() != 0.0 {
                return Err(Error::SchemeFormat {
                    line: i_line,
                    message: format!("invalid electrode index {}", value),
                });
            }
            return Ok(if value == 0.0 { None } else { Some(value as usize - 1) });
        };
        let mut configuration: Configuration = Configuration::new(electrode(values[0])?, electrode(values[1])?, electrode(values[2])?, electrode(values[3])?);
        configuration.err = values[4].unwrap_or(0.0);
        configuration.i = values[5].unwrap_or(0.0);
        configuration.ip = values[6].unwrap_or(0.0);
        configuration.iperr = values[7].unwrap_or(0.0);
        configuration.k = values[8].unwrap_or(0.0);
        configuration.r = values[9].unwrap_or(0.0);
        configuration.rhoa = values[10].unwrap_or(0.0);
        configuration.u = values[11].unwrap_or(0.0);
        configuration.valid = values[12].map(|valid: f64| valid != 0.0).unwrap_or(true);
        configurations.push(configuration);
    }

    // The topography section is not used

    return Scheme::new(sensors, configurations);
}

#[test]
fn test_scheme_file_round_trip() {
    let sensors: Vec<ElectrodePosition> = vec![
        ElectrodePosition::new(0.0, 0.0, 0.0),
        ElectrodePosition::new(2.5, -0.1, 0.0),
        ElectrodePosition::new(5.000000001, 0.0, 0.0),
        ElectrodePosition::new(7.5, 0.0, 1.0 / 3.0),
    ];
    let mut configuration_1: Configuration = Configuration::new(Some(0), Some(3), Some(1), Some(2));
    configuration_1.rhoa = 123.456789012345;
    configuration_1.k = -std::f64::consts::PI * 1e3;
    configuration_1.err = 0.03;
    configuration_1.u = 1.0e-9;
    let mut configuration_2: Configuration = Configuration::new(Some(0), None, Some(2), None);
    configuration_2.valid = false;
    configuration_2.i = 0.1;
    let scheme: Scheme = Scheme::new(sensors, vec![configuration_1, configuration_2]).expect("valid scheme");

    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");
    let path = temporary_directory.path().join("scheme.shm");
    write_scheme_file(&scheme, &path).expect("can't write scheme");
    let scheme_read: Scheme = read_scheme_file(&path).expect("can't read scheme");

    assert_eq!(scheme_read, scheme);
}

#[test]
fn test_parse_scheme_minimal_columns() {
    // Written like a plain configuration list: no data columns and no `y`
    let text: &str = "4\n# x z\n0 0\n1 0\n2 0\n3 -0.5\n2\n# a b m n\n1 4 2 3\n1 0 2 0\n0\n";

    let scheme: Scheme = parse_scheme(text).expect("can't parse scheme");

    assert_eq!(scheme.sensor_positions()[3], ElectrodePosition::new(3.0, 0.0, -0.5));
    assert_eq!(scheme.len(), 2);
    assert_eq!(scheme.configurations()[0].quadruple(), [Some(0), Some(3), Some(1), Some(2)]);
    assert_eq!(scheme.configurations()[1].quadruple(), [Some(0), None, Some(1), None]);
    assert!(scheme.configurations()[1].valid);
    assert_eq!(scheme.configurations()[1].rhoa, 0.0);
}

#[test]
fn test_parse_scheme_errors() {
    // Too few sensors
    let result: Result<Scheme, Error> = parse_scheme("3\n# x y z\n0 0 0\n1 0 0\n");
    assert!(matches!(result, Err(Error::SchemeFormat { .. })));

    // Electrode index beyond the sensor list
    let result: Result<Scheme, Error> = parse_scheme("2\n0 0 0\n1 0 0\n1\n# a b m n\n1 2 3 0\n0\n");
    assert!(matches!(result, Err(Error::InvalidElectrodeIndex { .. })));

    // Not a number
    let result: Result<Scheme, Error> = parse_scheme("1\n0 zero 0\n0\n");
    assert!(matches!(result, Err(Error::SchemeFormat { line: 2, .. })));
}
