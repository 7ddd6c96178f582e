//! Geographic points and metre-based offsets.
//!
//! Distances are converted to degrees on a spherical Earth. Longitude offsets
//! are stretched by `1 / cos(latitude)` to account for meridian convergence,
//! and results are wrapped (not clamped) back into the valid coordinate range,
//! so a region that crosses the antimeridian or a pole continues on the
//! opposite side.

use std::f64::consts::PI;

/// Equatorial radius of the Earth in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Degrees of arc per metre along a great circle.
pub const METRE_IN_DEGREES: f64 = (1.0 / ((2.0 * PI / 360.0) * EARTH_RADIUS_KM)) / 1000.0;

/// Latitude bound: valid latitudes are `[-90, 90)`.
pub const LAT_BOUND: f64 = 90.0;

/// Longitude bound: valid longitudes are `[-180, 180)`.
pub const LNG_BOUND: f64 = 180.0;

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude, `[-90, 90)`.
    pub lat: f64,
    /// Longitude, `[-180, 180)`.
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Move this point by a displacement in metres.
    ///
    /// Positive `north_m` moves north, positive `east_m` moves east. The
    /// longitude scale uses this point's latitude.
    ///
    /// # Example
    ///
    /// ```
    /// use globe::GeoPoint;
    ///
    /// let moved = GeoPoint::new(0.0, 179.99).offset(0.0, 5_000.0);
    /// assert!(moved.lng < -179.9); // wrapped across the antimeridian
    /// ```
    pub fn offset(&self, north_m: f64, east_m: f64) -> GeoPoint {
        let lat = self.lat + north_m * METRE_IN_DEGREES;
        let lng = self.lng + (east_m * METRE_IN_DEGREES) / self.lat.to_radians().cos();

        GeoPoint {
            lat: wrap_coordinate(lat, LAT_BOUND),
            lng: wrap_coordinate(lng, LNG_BOUND),
        }
    }
}

/// Wrap `coord` cyclically onto `[-bound, bound)`.
///
/// Accepts any finite value, however many multiples of `2 * bound` it lies
/// outside the range.
///
/// ```
/// use globe::geo::wrap_coordinate;
///
/// assert_eq!(wrap_coordinate(90.0, 90.0), -90.0);
/// assert_eq!(wrap_coordinate(271.0, 90.0), -89.0);
/// assert_eq!(wrap_coordinate(-271.0, 90.0), 89.0);
/// ```
pub fn wrap_coordinate(coord: f64, bound: f64) -> f64 {
    let period = bound * 2.0;
    let wrapped = (coord + bound).rem_euclid(period) - bound;

    // rem_euclid may round up to exactly `period` for tiny negative inputs
    if wrapped >= bound {
        wrapped - period
    } else {
        wrapped
    }
}

/// A geographic bounding box for filtering tiles during preload.
///
/// Coordinates are in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum latitude (southern boundary).
    pub min_lat: f64,
    /// Minimum longitude (western boundary).
    pub min_lng: f64,
    /// Maximum latitude (northern boundary).
    pub max_lat: f64,
    /// Maximum longitude (eastern boundary).
    pub max_lng: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        }
    }

    /// Check if this bounding box overlaps the half-open rectangle
    /// `[south, north) x [west, east)`.
    pub fn overlaps(&self, north: f64, south: f64, east: f64, west: f64) -> bool {
        self.min_lat < north && self.max_lat >= south && self.min_lng < east && self.max_lng >= west
    }
}
