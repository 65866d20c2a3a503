//! `LonLat`: a geographic point in degrees.
//!
//! Equality is exact floating comparison, no tolerance. The two coordinate
//! orderings this crate reconciles describe the *same* physical points, so
//! matches are exact or near-exact in practice and a fuzzy comparison would
//! only mask configuration errors.

use serde::{Deserialize, Serialize};

/// A (longitude, latitude) pair in degrees.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl LonLat {
    /// Creates a point from longitude and latitude in degrees.
    #[inline]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Projects the point onto the unit sphere.
    ///
    /// Nearest-neighbour queries run in this Cartesian space so that points
    /// straddling the antimeridian or near the poles compare correctly;
    /// chordal and great-circle distance induce the same ordering.
    pub fn to_unit_xyz(self) -> [f64; 3] {
        let lon = self.lon.to_radians();
        let lat = self.lat.to_radians();
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }
}

impl From<(f64, f64)> for LonLat {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}
