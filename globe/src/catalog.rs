//! GLOBE tile catalog and grid projection.
//!
//! The GLOBE dataset splits the globe into sixteen rectangular tiles arranged
//! in a 4×4 grid (`a10g` in the north-west through `p10g` in the south-east).
//! Every tile is 10800 columns wide (30 arc-seconds over 90° of longitude);
//! the two polar bands are 4800 rows tall (40° of latitude), the two
//! equatorial bands 6000 rows (50°).
//!
//! Tile bounds are half-open: a point belongs to a tile when
//! `south <= lat < north` and `west <= lng < east`.

use crate::error::{GlobeError, Result};
use crate::geo::{BoundingBox, GeoPoint, LAT_BOUND, LNG_BOUND};

/// Static descriptor of one GLOBE raster tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    /// Tile identifier, also the raster file name (e.g. `"a10g"`).
    pub id: &'static str,
    /// Number of columns (west to east).
    pub cols: usize,
    /// Number of rows (north to south).
    pub rows: usize,
    /// Column of this tile in the 4×4 tile arrangement (0 = westernmost).
    pub grid_x: usize,
    /// Row of this tile in the 4×4 tile arrangement (0 = northernmost).
    pub grid_y: usize,
    /// Lowest elevation in the tile, as published with the dataset.
    pub elevation_min: i16,
    /// Highest elevation in the tile, as published with the dataset.
    pub elevation_max: i16,
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Tile {
    /// Whether `point` falls within this tile's half-open bounds.
    pub fn contains(&self, point: GeoPoint) -> bool {
        let matches_lat = self.south <= point.lat && point.lat < self.north;
        let matches_lng = self.west <= point.lng && point.lng < self.east;
        matches_lat && matches_lng
    }

    /// Project a longitude onto this tile's column grid.
    ///
    /// Rounds to the nearest cell. No clamping is done: the longitude must
    /// lie within the tile.
    pub fn col(&self, lng: f64) -> usize {
        relative_pos(lng, self.west, self.east, self.cols)
    }

    /// Project a latitude onto this tile's row grid (row 0 = north edge).
    ///
    /// Rounds to the nearest cell. No clamping is done: the latitude must
    /// lie within the tile.
    pub fn row(&self, lat: f64) -> usize {
        relative_pos(lat, self.north, self.south, self.rows)
    }

    /// Project a point onto this tile's grid as `(row, col)`.
    pub fn cell(&self, point: GeoPoint) -> (usize, usize) {
        (self.row(point.lat), self.col(point.lng))
    }

    /// Number of samples in the tile's raster.
    pub fn samples(&self) -> usize {
        self.cols * self.rows
    }

    /// Size of the tile's raw raster file in bytes (2 bytes per sample).
    pub fn file_size(&self) -> usize {
        self.samples() * 2
    }

    /// Check if this tile overlaps the given bounding box.
    pub fn overlaps(&self, bbox: &BoundingBox) -> bool {
        bbox.overlaps(self.north, self.south, self.east, self.west)
    }

    fn area(&self) -> f64 {
        (self.north - self.south) * (self.east - self.west)
    }

    fn intersects(&self, other: &Tile) -> bool {
        self.south < other.north
            && other.south < self.north
            && self.west < other.east
            && other.west < self.east
    }
}

/// Nearest-integer position of `target` within `[min, max]` split into `cells`.
fn relative_pos(target: f64, min: f64, max: f64, cells: usize) -> usize {
    let percent = (target - min) / (max - min);
    (cells as f64 * percent).round() as usize
}

macro_rules! globe_tile {
    ($id:literal, $rows:literal, $gx:literal, $gy:literal, $emin:literal, $emax:literal,
     $north:literal, $south:literal, $west:literal, $east:literal) => {
        Tile {
            id: $id,
            cols: 10800,
            rows: $rows,
            grid_x: $gx,
            grid_y: $gy,
            elevation_min: $emin,
            elevation_max: $emax,
            north: $north,
            south: $south,
            east: $east,
            west: $west,
        }
    };
}

/// The sixteen tiles of the GLOBE 30 arc-second dataset.
#[rustfmt::skip]
pub const GLOBE_TILES: [Tile; 16] = [
    //           id      rows  gx gy  min   max    north  south   west    east
    globe_tile!("a10g", 4800, 0, 0,    1, 6098,  90.0,  50.0, -180.0,  -90.0),
    globe_tile!("b10g", 4800, 1, 0,    1, 3940,  90.0,  50.0,  -90.0,    0.0),
    globe_tile!("c10g", 4800, 2, 0,  -30, 4010,  90.0,  50.0,    0.0,   90.0),
    globe_tile!("d10g", 4800, 3, 0,    1, 4588,  90.0,  50.0,   90.0,  180.0),
    globe_tile!("e10g", 6000, 0, 1,  -84, 5443,  50.0,   0.0, -180.0,  -90.0),
    globe_tile!("f10g", 6000, 1, 1,  -40, 6085,  50.0,   0.0,  -90.0,    0.0),
    globe_tile!("g10g", 6000, 2, 1, -407, 8752,  50.0,   0.0,    0.0,   90.0),
    globe_tile!("h10g", 6000, 3, 1,  -63, 7491,  50.0,   0.0,   90.0,  180.0),
    globe_tile!("i10g", 6000, 0, 2,    1, 2732,   0.0, -50.0, -180.0,  -90.0),
    globe_tile!("j10g", 6000, 1, 2, -127, 6798,   0.0, -50.0,  -90.0,    0.0),
    globe_tile!("k10g", 6000, 2, 2,    1, 5825,   0.0, -50.0,    0.0,   90.0),
    globe_tile!("l10g", 6000, 3, 2,    1, 5179,   0.0, -50.0,   90.0,  180.0),
    globe_tile!("m10g", 4800, 0, 3,    1, 4009, -50.0, -90.0, -180.0,  -90.0),
    globe_tile!("n10g", 4800, 1, 3,    1, 4743, -50.0, -90.0,  -90.0,    0.0),
    globe_tile!("o10g", 4800, 2, 3,    1, 4039, -50.0, -90.0,    0.0,   90.0),
    globe_tile!("p10g", 4800, 3, 3,    1, 4363, -50.0, -90.0,   90.0,  180.0),
];

/// An immutable set of tiles that exactly partitions the globe.
#[derive(Debug, Clone)]
pub struct TileCatalog {
    tiles: Vec<Tile>,
    grid_columns: usize,
}

impl TileCatalog {
    /// The GLOBE dataset catalog.
    pub fn globe() -> Self {
        Self {
            tiles: GLOBE_TILES.to_vec(),
            grid_columns: 4,
        }
    }

    /// Build a catalog from custom tile definitions.
    ///
    /// # Errors
    ///
    /// Returns [`GlobeError::InvalidCatalog`] unless the tiles form a
    /// gap-free, non-overlapping partition of `[-90, 90) × [-180, 180)`
    /// with unique ids and unique grid positions.
    pub fn new(tiles: Vec<Tile>) -> Result<Self> {
        validate(&tiles)?;
        let grid_columns = tiles.iter().map(|t| t.grid_x).max().unwrap_or(0) + 1;
        Ok(Self {
            tiles,
            grid_columns,
        })
    }

    /// Find the tile containing `point`.
    ///
    /// Returns `None` for points outside every tile, which for a valid
    /// catalog means the coordinates themselves are invalid (NaN, or
    /// outside `[-90, 90) × [-180, 180)`).
    pub fn find_tile(&self, point: GeoPoint) -> Option<&Tile> {
        self.tiles.iter().find(|tile| tile.contains(point))
    }

    /// Look up a tile by id.
    pub fn get(&self, id: &str) -> Option<&Tile> {
        self.tiles.iter().find(|tile| tile.id == id)
    }

    /// All tiles, in catalog order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tile> {
        self.tiles.iter()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of tile columns around the globe, used to detect adjacency
    /// across the antimeridian.
    pub fn grid_columns(&self) -> usize {
        self.grid_columns
    }

    /// Tiles overlapping any of the given bounding boxes.
    pub fn overlapping<'a>(
        &'a self,
        bounds: &'a [BoundingBox],
    ) -> impl Iterator<Item = &'a Tile> + 'a {
        self.tiles
            .iter()
            .filter(move |tile| bounds.iter().any(|b| tile.overlaps(b)))
    }
}

impl Default for TileCatalog {
    fn default() -> Self {
        Self::globe()
    }
}

impl<'a> IntoIterator for &'a TileCatalog {
    type Item = &'a Tile;
    type IntoIter = std::slice::Iter<'a, Tile>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.iter()
    }
}

fn validate(tiles: &[Tile]) -> Result<()> {
    let invalid = |reason: String| Err(GlobeError::InvalidCatalog { reason });

    if tiles.is_empty() {
        return invalid("catalog has no tiles".to_string());
    }

    for tile in tiles {
        if tile.cols == 0 || tile.rows == 0 {
            return invalid(format!("tile {} has an empty grid", tile.id));
        }
        if !(tile.north > tile.south && tile.east > tile.west) {
            return invalid(format!("tile {} has non-positive extent", tile.id));
        }
        if tile.south < -LAT_BOUND
            || tile.north > LAT_BOUND
            || tile.west < -LNG_BOUND
            || tile.east > LNG_BOUND
        {
            return invalid(format!("tile {} extends beyond the globe", tile.id));
        }
    }

    for (i, a) in tiles.iter().enumerate() {
        for b in &tiles[i + 1..] {
            if a.id == b.id {
                return invalid(format!("duplicate tile id {}", a.id));
            }
            if (a.grid_x, a.grid_y) == (b.grid_x, b.grid_y) {
                return invalid(format!(
                    "tiles {} and {} share grid position ({}, {})",
                    a.id, b.id, a.grid_x, a.grid_y
                ));
            }
            if a.intersects(b) {
                return invalid(format!("tiles {} and {} overlap", a.id, b.id));
            }
        }
    }

    // Non-overlapping tiles inside the globe cover it iff their areas add up
    let covered: f64 = tiles.iter().map(Tile::area).sum();
    let globe_area = (2.0 * LAT_BOUND) * (2.0 * LNG_BOUND);
    if (covered - globe_area).abs() > 1e-6 {
        return invalid(format!(
            "tiles cover {covered} square degrees, expected {globe_area}"
        ));
    }

    validate_grid_positions(tiles)
}

/// Grid positions must follow the geometry: `grid_x` counts tiles west to
/// east from the antimeridian, `grid_y` counts them north to south from the
/// north pole, and neighbours differ by exactly one.
fn validate_grid_positions(tiles: &[Tile]) -> Result<()> {
    let invalid = |reason: String| Err(GlobeError::InvalidCatalog { reason });
    let last_column = tiles.iter().map(|t| t.grid_x).max().unwrap_or(0);

    for tile in tiles {
        if tile.west == -LNG_BOUND && tile.grid_x != 0 {
            return invalid(format!(
                "tile {} touches 180W but has grid_x {}",
                tile.id, tile.grid_x
            ));
        }
        if tile.east == LNG_BOUND && tile.grid_x != last_column {
            return invalid(format!(
                "tile {} touches 180E but has grid_x {} (expected {})",
                tile.id, tile.grid_x, last_column
            ));
        }
        if tile.north == LAT_BOUND && tile.grid_y != 0 {
            return invalid(format!(
                "tile {} touches 90N but has grid_y {}",
                tile.id, tile.grid_y
            ));
        }
    }

    for a in tiles {
        for b in tiles {
            let share_rows = a.south < b.north && b.south < a.north;
            if a.east == b.west && share_rows && b.grid_x != a.grid_x + 1 {
                return invalid(format!(
                    "tile {} is east of {} but has grid_x {} (expected {})",
                    b.id,
                    a.id,
                    b.grid_x,
                    a.grid_x + 1
                ));
            }

            let share_columns = a.west < b.east && b.west < a.east;
            if a.south == b.north && share_columns && b.grid_y != a.grid_y + 1 {
                return invalid(format!(
                    "tile {} is south of {} but has grid_y {} (expected {})",
                    b.id,
                    a.id,
                    b.grid_y,
                    a.grid_y + 1
                ));
            }
        }
    }

    Ok(())
}
