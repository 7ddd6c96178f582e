//! Helpers for tests: a down-sampled GLOBE catalog and synthetic tile files.
//!
//! The catalog keeps the real tile bounds but uses one cell per degree, so
//! polar tiles are 90×40 and equatorial tiles 90×50.

use std::path::Path;

use crate::catalog::{Tile, TileCatalog, GLOBE_TILES};
use crate::grid::ElevationGrid;

/// GLOBE tile bounds with 1°×1° cells.
pub fn small_catalog() -> TileCatalog {
    let tiles = GLOBE_TILES
        .iter()
        .map(|tile| Tile {
            cols: 90,
            rows: tile.rows / 120,
            ..*tile
        })
        .collect();
    TileCatalog::new(tiles).unwrap()
}

/// Encode a raster where each cell holds `value(row, col)`.
pub fn tile_bytes(tile: &Tile, value: impl Fn(usize, usize) -> i16) -> Vec<u8> {
    let mut data = Vec::with_capacity(tile.file_size());
    for row in 0..tile.rows {
        for col in 0..tile.cols {
            data.extend_from_slice(&value(row, col).to_le_bytes());
        }
    }
    data
}

/// In-memory grid where each cell holds `value(row, col)`.
pub fn grid_with(tile: &Tile, value: impl Fn(usize, usize) -> i16) -> ElevationGrid {
    ElevationGrid::from_bytes(tile_bytes(tile, value), tile).unwrap()
}

pub fn write_tile_bytes(dir: &Path, name: &str, data: &[u8]) {
    std::fs::write(dir.join(name), data).unwrap();
}

/// Write a raw tile file where each cell holds `value(row, col)`.
pub fn write_tile_with(dir: &Path, tile: &Tile, value: impl Fn(usize, usize) -> i16) {
    write_tile_bytes(dir, tile.id, &tile_bytes(tile, value));
}

/// Write a raw tile file with every cell set to `value`.
pub fn write_flat_tile(dir: &Path, tile: &Tile, value: i16) {
    write_tile_with(dir, tile, |_, _| value);
}
