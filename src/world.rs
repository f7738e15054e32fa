use crate::Error;
use crate::config::InversionConfiguration;

/// Synthetic subsurface used to simulate data
///
/// The world spans `0 <= x <= world_x` and `-world_z <= y <= 0`.
/// Region markers start at 1.
#[derive(Clone, Debug, PartialEq)]
pub enum World {
    /// Layers separated by straight borders; `borders` are the border depths at `x = 0` (negative),
    /// the borders dip with `angle` (degrees, counter-clockwise). Markers increase with depth.
    Layered { world_x: f64, world_z: f64, borders: Vec<f64>, angle: f64 },
    /// Homogeneous background (marker 1) with a rectangular inclusion (marker 2).
    /// `start` is the upper left corner of the inclusion as `[x, y]`, `dimension` its `[width, height]`.
    Inclusion {
        world_x: f64,
        world_z: f64,
        start: [f64; 2],
        dimension: [f64; 2],
    },
    /// Checkerboard of tiles alternating between marker 1 (upper left corner) and marker 2
    Tiled { world_x: f64, world_z: f64, tile_x: f64, tile_z: f64 },
}

impl World {
    /// Build the world described by a validated configuration
    pub fn from_config(config: &InversionConfiguration) -> Result<Self, Error> {
        let world: World = match config.world_gen.as_str() {
            "lay" => {
                let mut borders: Vec<f64> = config.world_layers.clone();
                // Shallowest border first
                borders.sort_by(|a, b| b.total_cmp(a));
                World::Layered {
                    world_x: config.world_x,
                    world_z: config.world_z,
                    borders,
                    angle: config.world_angle,
                }
            }
            "incl" => {
                if config.world_inclusion_start.len() != 2 || config.world_inclusion_dim.len() != 2 {
                    return Err(Error::ConfigurationIntegrity {
                        code: 4,
                        reason: "inclusion start and dimension must have two entries".to_string(),
                    });
                }
                World::Inclusion {
                    world_x: config.world_x,
                    world_z: config.world_z,
                    start: [config.world_inclusion_start[0], config.world_inclusion_start[1]],
                    dimension: [config.world_inclusion_dim[0], config.world_inclusion_dim[1]],
                }
            }
            "tile" => World::Tiled {
                world_x: config.world_x,
                world_z: config.world_z,
                tile_x: config.world_tile_x,
                tile_z: config.world_tile_z,
            },
            other => {
                return Err(Error::ConfigurationIntegrity {
                    code: 3,
                    reason: format!("unknown world generator `{}`", other),
                });
            }
        };
        return Ok(world);
    }

    /// World size as `(world_x, world_z)`, (metre)
    pub fn dimensions(&self) -> (f64, f64) {
        return match self {
            World::Layered { world_x, world_z, .. } => (*world_x, *world_z),
            World::Inclusion { world_x, world_z, .. } => (*world_x, *world_z),
            World::Tiled { world_x, world_z, .. } => (*world_x, *world_z),
        };
    }

    /// Number of distinct regions
    pub fn region_count(&self) -> usize {
        return match self {
            World::Layered { borders, .. } => borders.len() + 1,
            World::Inclusion { .. } => 2,
            World::Tiled {
                world_x,
                world_z,
                tile_x,
                tile_z,
            } => {
                // A single tile has no neighbour with the second marker
                if *tile_x >= *world_x && *tile_z >= *world_z { 1 } else { 2 }
            }
        };
    }

    /// Region marker of the point `(x, y)`, `y` negative below the surface
    pub fn region_marker_at(&self, x: f64, y: f64) -> i32 {
        match self {
            World::Layered { borders, angle, .. } => {
                let slope: f64 = angle.to_radians().tan();
                let n_borders_above: usize = borders.iter().filter(|&&border| y < border + x * slope).count();
                return n_borders_above as i32 + 1;
            }
            World::Inclusion { start, dimension, .. } => {
                let inside_x: bool = x >= start[0] && x <= start[0] + dimension[0];
                let inside_y: bool = y <= start[1] && y >= start[1] - dimension[1];
                return if inside_x && inside_y { 2 } else { 1 };
            }
            World::Tiled { tile_x, tile_z, .. } => {
                let i_tile: i64 = (x / tile_x).floor() as i64;
                let j_tile: i64 = (-y / tile_z).floor() as i64;
                return if (i_tile + j_tile) % 2 == 0 { 1 } else { 2 };
            }
        }
    }
}

#[test]
fn test_region_marker_at() {
    use crate::config::{InversionConfiguration, test_configuration};

    // Inclusion
    let config: InversionConfiguration = test_configuration();
    let world: World = World::from_config(&config).expect("inclusion world");
    assert_eq!(world.region_count(), 2);
    assert_eq!(world.region_marker_at(60.0, -25.0), 2);
    assert_eq!(world.region_marker_at(60.0, -35.0), 1);
    assert_eq!(world.region_marker_at(10.0, -25.0), 1);

    // Dipping layers: 45 degrees counter-clockwise lifts the border by one metre per metre
    let world: World = World::Layered {
        world_x: 100.0,
        world_z: 50.0,
        borders: vec![-10.0, -30.0],
        angle: 45.0,
    };
    assert_eq!(world.region_count(), 3);
    assert_eq!(world.region_marker_at(0.0, -5.0), 1);
    assert_eq!(world.region_marker_at(0.0, -20.0), 2);
    assert_eq!(world.region_marker_at(0.0, -40.0), 3);
    assert_eq!(world.region_marker_at(20.0, -5.0), 2);

    // Tiles
    let world: World = World::Tiled {
        world_x: 100.0,
        world_z: 50.0,
        tile_x: 10.0,
        tile_z: 5.0,
    };
    assert_eq!(world.region_marker_at(5.0, -2.0), 1);
    assert_eq!(world.region_marker_at(15.0, -2.0), 2);
    assert_eq!(world.region_marker_at(15.0, -7.0), 1);
}
