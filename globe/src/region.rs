//! Elevation statistics over a square region.
//!
//! A region is described by its four corner cells. Each corner may sit in a
//! different tile, so a region covers one tile, two neighbouring tiles, or a
//! 2×2 block of tiles. Regions crossing more than one tile boundary along an
//! axis are rejected.
//!
//! Cells are addressed in a combined grid: columns of the western tile are
//! followed by columns of the eastern tile, and likewise for rows.

use std::sync::Arc;

use crate::catalog::Tile;
use crate::error::{GlobeError, Result};
use crate::grid::ElevationGrid;

/// Elevation statistics for a query, in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationResult {
    /// Elevation of the cell at the query point. Can be the no-data sentinel
    /// for region queries whose center falls in the sea.
    pub center: i16,
    /// Mean of all valid cells.
    pub average: f64,
    /// Lowest valid cell.
    pub min: i16,
    /// Highest valid cell.
    pub max: i16,
    /// Population variance of all valid cells.
    pub variance: f64,
}

impl ElevationResult {
    /// Statistics of a single cell.
    pub fn single(value: i16) -> Self {
        Self {
            center: value,
            average: f64::from(value),
            min: value,
            max: value,
            variance: 0.0,
        }
    }
}

/// Corner positions, in the order corners are stored in a [`Region`].
pub const TOP_LEFT: usize = 0;
pub const TOP_RIGHT: usize = 1;
pub const BOTTOM_LEFT: usize = 2;
pub const BOTTOM_RIGHT: usize = 3;

/// `(north, east)` unit offsets of the corners from the region center.
pub const CORNER_OFFSETS: [(f64, f64); 4] = [(1.0, -1.0), (1.0, 1.0), (-1.0, -1.0), (-1.0, 1.0)];

/// One corner of a region: its tile, the cell it projects to, and the grid.
#[derive(Clone)]
pub struct Corner<'a> {
    pub tile: &'a Tile,
    pub row: usize,
    pub col: usize,
    pub grid: Arc<ElevationGrid>,
}

/// Number of tiles a region covers along each axis (1 or 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpan {
    pub width: usize,
    pub height: usize,
}

/// Determine how many tiles the corner tiles cover.
///
/// `corners` is ordered top-left, top-right, bottom-left, bottom-right.
/// Horizontal adjacency is cyclic, so a region straddling the antimeridian
/// spans two tiles. Vertical adjacency is not: a region wrapped over a pole
/// is rejected.
///
/// # Errors
///
/// Returns [`GlobeError::UnsupportedRegionSpan`] if the region covers more
/// than two tiles along either axis.
pub fn tile_span(corners: [&Tile; 4], grid_columns: usize) -> Result<TileSpan> {
    let left = corners[TOP_LEFT];
    let right = corners[TOP_RIGHT];
    let bottom = corners[BOTTOM_LEFT];

    let dx = (right.grid_x + grid_columns - left.grid_x) % grid_columns.max(1);
    let dy = bottom.grid_y as isize - left.grid_y as isize;

    match (dx, dy) {
        (0 | 1, 0 | 1) => Ok(TileSpan {
            width: dx + 1,
            height: dy as usize + 1,
        }),
        _ => Err(GlobeError::UnsupportedRegionSpan {
            width: dx + 1,
            height: dy.unsigned_abs() + 1,
        }),
    }
}

/// A validated region ready for aggregation.
pub struct Region<'a> {
    corners: [Corner<'a>; 4],
    span: TileSpan,
}

impl<'a> Region<'a> {
    /// Build a region from its corners (top-left, top-right, bottom-left,
    /// bottom-right).
    pub fn new(corners: [Corner<'a>; 4], grid_columns: usize) -> Result<Self> {
        let span = tile_span(
            [
                corners[TOP_LEFT].tile,
                corners[TOP_RIGHT].tile,
                corners[BOTTOM_LEFT].tile,
                corners[BOTTOM_RIGHT].tile,
            ],
            grid_columns,
        )?;
        Ok(Self { corners, span })
    }

    pub fn span(&self) -> TileSpan {
        self.span
    }

    pub fn corners(&self) -> &[Corner<'a>; 4] {
        &self.corners
    }

    /// Aggregate every cell of the region.
    ///
    /// No-data cells are skipped. Returns `None` if no cell has data.
    /// `center` is reported unchanged in the result.
    pub fn summarize(&self, center: i16) -> Option<ElevationResult> {
        let top_left = &self.corners[TOP_LEFT];
        let bottom_right = &self.corners[BOTTOM_RIGHT];
        let (tile_cols, tile_rows) = (top_left.tile.cols, top_left.tile.rows);

        let col_span = if self.span.width == 2 {
            tile_cols.saturating_sub(top_left.col) + bottom_right.col
        } else {
            bottom_right.col.saturating_sub(top_left.col)
        };
        let row_span = if self.span.height == 2 {
            tile_rows.saturating_sub(top_left.row) + bottom_right.row
        } else {
            bottom_right.row.saturating_sub(top_left.row)
        };

        let mut stats = RunningStats::default();

        for j in 0..=row_span {
            let (gy, row) = split_index(top_left.row + j, tile_rows, self.span.height);
            for i in 0..=col_span {
                let (gx, col) = split_index(top_left.col + i, tile_cols, self.span.width);
                let grid = &self.corners[2 * gy + gx].grid;

                let value = grid.get(row, col);
                if !grid.is_no_data(value) {
                    stats.push(value);
                }
            }
        }

        stats.finish(center)
    }
}

/// Map a combined-grid index onto `(sub-tile, local index)`.
fn split_index(index: usize, first_len: usize, tiles: usize) -> (usize, usize) {
    if tiles == 2 && index >= first_len {
        (1, index - first_len)
    } else {
        (0, index)
    }
}

/// Single-pass mean and variance (Welford).
#[derive(Default)]
struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: Option<i16>,
    max: Option<i16>,
}

impl RunningStats {
    fn push(&mut self, value: i16) {
        self.count += 1;
        let x = f64::from(value);
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    fn finish(&self, center: i16) -> Option<ElevationResult> {
        Some(ElevationResult {
            center,
            average: self.mean,
            min: self.min?,
            max: self.max?,
            variance: self.m2 / self.count as f64,
        })
    }
}
