//! Typed tile bounding volumes
//!
//! Converts the JSON `boundingVolume` arrays into typed volumes, applies tile
//! transforms, and subdivides implicit roots down to a given tree coordinate.

use glam::{DMat3, DMat4, DVec3};

use crate::core::{Error, Result};
use crate::implicit::TreeCoordinates;
use crate::tileset::BoundingVolume;

/// A decoded bounding volume
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Volume {
    /// Oriented box: center plus the three half-axis vectors (as matrix columns)
    Box { center: DVec3, half_axes: DMat3 },
    /// Geographic region in radians and meters
    Region {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        min_height: f64,
        max_height: f64,
    },
    Sphere { center: DVec3, radius: f64 },
}

fn expect_len(values: &[f64], len: usize, kind: &str) -> Result<()> {
    if values.len() != len {
        return Err(Error::MalformedTileset(format!(
            "{} bounding volume needs {} values, found {}",
            kind,
            len,
            values.len()
        )));
    }
    Ok(())
}

impl Volume {
    /// Decode the JSON form. `box` wins over `region` wins over `sphere`.
    pub fn from_json(volume: &BoundingVolume) -> Result<Self> {
        if let Some(b) = &volume.r#box {
            expect_len(b, 12, "box")?;
            return Ok(Self::Box {
                center: DVec3::new(b[0], b[1], b[2]),
                half_axes: DMat3::from_cols(
                    DVec3::new(b[3], b[4], b[5]),
                    DVec3::new(b[6], b[7], b[8]),
                    DVec3::new(b[9], b[10], b[11]),
                ),
            });
        }
        if let Some(r) = &volume.region {
            expect_len(r, 6, "region")?;
            return Ok(Self::Region {
                west: r[0],
                south: r[1],
                east: r[2],
                north: r[3],
                min_height: r[4],
                max_height: r[5],
            });
        }
        if let Some(s) = &volume.sphere {
            expect_len(s, 4, "sphere")?;
            return Ok(Self::Sphere {
                center: DVec3::new(s[0], s[1], s[2]),
                radius: s[3],
            });
        }
        Err(Error::MalformedTileset(
            "bounding volume has no box, region or sphere".into(),
        ))
    }

    /// Encode back into the JSON form
    pub fn to_json(&self) -> BoundingVolume {
        match *self {
            Self::Box { center, half_axes } => {
                let (a, b, c) = (half_axes.x_axis, half_axes.y_axis, half_axes.z_axis);
                BoundingVolume {
                    r#box: Some(vec![
                        center.x, center.y, center.z, a.x, a.y, a.z, b.x, b.y, b.z, c.x, c.y, c.z,
                    ]),
                    ..Default::default()
                }
            }
            Self::Region { west, south, east, north, min_height, max_height } => BoundingVolume {
                region: Some(vec![west, south, east, north, min_height, max_height]),
                ..Default::default()
            },
            Self::Sphere { center, radius } => BoundingVolume {
                sphere: Some(vec![center.x, center.y, center.z, radius]),
                ..Default::default()
            },
        }
    }

    /// Apply a tile transform. Regions are geographic and stay untouched.
    pub fn transformed(&self, transform: &DMat4) -> Self {
        if *transform == DMat4::IDENTITY {
            return *self;
        }
        let linear = DMat3::from_mat4(*transform);
        match *self {
            Self::Box { center, half_axes } => Self::Box {
                center: transform.transform_point3(center),
                half_axes: linear * half_axes,
            },
            Self::Sphere { center, radius } => {
                let scale = linear
                    .x_axis
                    .length()
                    .max(linear.y_axis.length())
                    .max(linear.z_axis.length());
                Self::Sphere {
                    center: transform.transform_point3(center),
                    radius: radius * scale,
                }
            }
            region @ Self::Region { .. } => region,
        }
    }

    /// The part of this (implicit root) volume covered by `coordinates`.
    ///
    /// Quadtrees split the box x/y axes or the region longitude/latitude and
    /// keep the third dimension whole; octrees split all three.
    pub fn subdivide(&self, coordinates: &TreeCoordinates) -> Result<Self> {
        let level = coordinates.level();
        let cells = (1u64 << level) as f64;
        let [x, y, z] = coordinates.xyz();
        let octree = matches!(coordinates, TreeCoordinates::Octree(_));

        match *self {
            Self::Box { center, half_axes } => {
                // Offset of the cell center in [-1, 1] box-local units
                let offset = |i: u32| (2.0 * i as f64 + 1.0) / cells - 1.0;
                let mut child_center = center
                    + half_axes.x_axis * offset(x)
                    + half_axes.y_axis * offset(y);
                let mut z_axis = half_axes.z_axis;
                if octree {
                    child_center += half_axes.z_axis * offset(z);
                    z_axis /= cells;
                }
                Ok(Self::Box {
                    center: child_center,
                    half_axes: DMat3::from_cols(
                        half_axes.x_axis / cells,
                        half_axes.y_axis / cells,
                        z_axis,
                    ),
                })
            }
            Self::Region { west, south, east, north, min_height, max_height } => {
                let mut width = east - west;
                if width < 0.0 {
                    width += std::f64::consts::TAU;
                }
                let cell_width = width / cells;
                let cell_height = (north - south) / cells;
                let mut child_west = west + cell_width * x as f64;
                let mut child_east = child_west + cell_width;
                if child_west > std::f64::consts::PI {
                    child_west -= std::f64::consts::TAU;
                }
                if child_east > std::f64::consts::PI {
                    child_east -= std::f64::consts::TAU;
                }
                let child_south = south + cell_height * y as f64;
                let (lo, hi) = if octree {
                    let step = (max_height - min_height) / cells;
                    let lo = min_height + step * z as f64;
                    (lo, lo + step)
                } else {
                    (min_height, max_height)
                };
                Ok(Self::Region {
                    west: child_west,
                    south: child_south,
                    east: child_east,
                    north: child_south + cell_height,
                    min_height: lo,
                    max_height: hi,
                })
            }
            Self::Sphere { .. } => Err(Error::InvalidSubdivision(
                "implicit tiling requires a box or region bounding volume".into(),
            )),
        }
    }
}

/// Build a transform matrix from the 16 column-major JSON values
pub fn transform_from_json(values: &[f64]) -> Result<DMat4> {
    let array: [f64; 16] = values.try_into().map_err(|_| {
        Error::MalformedTileset(format!("transform needs 16 values, found {}", values.len()))
    })?;
    Ok(DMat4::from_cols_array(&array))
}
