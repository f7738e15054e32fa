use std::fmt;

/// Quantisation step used to decide whether two electrodes share a location, (metre)
pub const POSITION_TOLERANCE: f64 = 1e-6;

/// Electrode position, (metre)
///
/// Follows the pyGIMLi convention for 2D surveys: `x` along the profile, `y` is the (negative) depth
/// and `z` is unused.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElectrodePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Spatial identity of an electrode.
///
/// Coordinates are quantised to `POSITION_TOLERANCE`, so electrodes produced by different geometry
/// routines (with slightly different floating point rounding) are still recognised as the same electrode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElectrodeKey(i64, i64, i64);

impl ElectrodePosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        ElectrodePosition { x, y, z }
    }

    pub fn key(&self) -> ElectrodeKey {
        fn quantise(value: f64) -> i64 {
            return (value / POSITION_TOLERANCE).round() as i64;
        }
        return ElectrodeKey(quantise(self.x), quantise(self.y), quantise(self.z));
    }

    pub fn distance_to(&self, other: &ElectrodePosition) -> f64 {
        let d_x: f64 = self.x - other.x;
        let d_y: f64 = self.y - other.y;
        let d_z: f64 = self.z - other.z;
        return (d_x.powi(2) + d_y.powi(2) + d_z.powi(2)).sqrt();
    }

    /// Copy of this position shifted by the given offsets
    pub fn shifted(&self, d_x: f64, d_y: f64, d_z: f64) -> ElectrodePosition {
        return ElectrodePosition::new(self.x + d_x, self.y + d_y, self.z + d_z);
    }
}

impl fmt::Display for ElectrodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// Create `n_electrodes` equidistant surface electrodes between `start` and `end` (inclusive)
///
/// # Arguments
/// * `start` - position of the first electrode, (metre)
/// * `end` - position of the last electrode, (metre)
/// * `n_electrodes` - number of electrodes
///
/// # Returns
/// * electrode positions, ordered by `x`
pub fn electrode_line(start: f64, end: f64, n_electrodes: usize) -> Vec<ElectrodePosition> {
    if n_electrodes == 0 {
        return vec![];
    }
    if n_electrodes == 1 {
        return vec![ElectrodePosition::new(start, 0.0, 0.0)];
    }

    let d_x: f64 = (end - start) / (n_electrodes as f64 - 1.0);
    let electrodes: Vec<ElectrodePosition> = (0..n_electrodes)
        .map(|i_electrode: usize| {
            // Pin the last electrode to `end` exactly
            let x: f64 = if i_electrode == n_electrodes - 1 { end } else { start + i_electrode as f64 * d_x };
            return ElectrodePosition::new(x, 0.0, 0.0);
        })
        .collect();

    return electrodes;
}

/// Number of electrodes needed to cover the profile with the given spacing
///
/// `ceil((world_x - 2 * offset) / spacing) + 1`
pub fn electrode_count(world_x: f64, spacing: f64, offset: f64) -> usize {
    let profile_length: f64 = world_x - 2.0 * offset;
    return (profile_length / spacing).ceil() as usize + 1;
}

#[test]
fn test_electrode_line() {
    use approx::assert_abs_diff_eq;

    let electrodes: Vec<ElectrodePosition> = electrode_line(0.0, 200.0, 41);
    assert_eq!(electrodes.len(), 41);
    assert_abs_diff_eq!(electrodes[1].x, 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(electrodes[40].x, 200.0, epsilon = 0.0);
    assert_eq!(electrodes[7].y, 0.0);

    // Electrode count used by the comprehensive scheme
    assert_eq!(electrode_count(200.0, 5.0, 0.0), 41);
    assert_eq!(electrode_count(200.0, 3.0, 0.0), 68);
    assert_eq!(electrode_count(200.0, 5.0, 10.0), 37);
}

#[test]
fn test_electrode_key_tolerates_rounding() {
    // 0.1 + 0.2 != 0.3 in floating point, but they are the same electrode
    let electrode_1: ElectrodePosition = ElectrodePosition::new(0.1 + 0.2, 0.0, 0.0);
    let electrode_2: ElectrodePosition = ElectrodePosition::new(0.3, 0.0, 0.0);
    assert_ne!(electrode_1, electrode_2);
    assert_eq!(electrode_1.key(), electrode_2.key());

    let electrode_3: ElectrodePosition = ElectrodePosition::new(0.3001, 0.0, 0.0);
    assert_ne!(electrode_1.key(), electrode_3.key());
}
