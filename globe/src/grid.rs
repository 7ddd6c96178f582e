//! GLOBE raster parsing and cell sampling.
//!
//! A GLOBE tile file is a headerless row-major sequence of 16-bit
//! little-endian signed integers, `cols * rows` of them, starting at the
//! north-west corner. Ocean and unmapped cells hold [`NO_DATA`].

use std::fmt;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::catalog::Tile;
use crate::error::{GlobeError, Result};

/// Value marking a cell without elevation data in GLOBE tiles.
pub const NO_DATA: i16 = -500;

/// Raw sample bytes, either memory-mapped from a tile file or owned.
enum Samples {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Samples {
    fn bytes(&self) -> &[u8] {
        match self {
            Samples::Mapped(mmap) => &mmap[..],
            Samples::Owned(data) => &data[..],
        }
    }
}

/// Read-only elevation raster of one tile.
///
/// # Example
///
/// ```ignore
/// use globe::{ElevationGrid, TileCatalog};
///
/// let catalog = TileCatalog::globe();
/// let tile = catalog.get("g10g").unwrap();
/// let grid = ElevationGrid::from_file("/data/globe/g10g", tile)?;
/// println!("Elevation: {}m", grid.get(3000, 5400));
/// ```
pub struct ElevationGrid {
    samples: Samples,
    tile_id: &'static str,
    cols: usize,
    rows: usize,
    no_data: i16,
}

impl fmt::Debug for ElevationGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevationGrid")
            .field("tile_id", &self.tile_id)
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("no_data", &self.no_data)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

impl ElevationGrid {
    /// Memory-map a raw GLOBE tile file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened or memory-mapped
    /// - The file size isn't exactly `cols * rows * 2` bytes
    pub fn from_file<P: AsRef<Path>>(path: P, tile: &Tile) -> Result<Self> {
        let file = File::open(&path)?;

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. We open the file read-only and don't expose the mapping.
        let mmap = unsafe { Mmap::map(&file)? };

        Self::new(Samples::Mapped(mmap), tile)
    }

    /// Wrap raw little-endian sample bytes already in memory.
    pub fn from_bytes(data: Vec<u8>, tile: &Tile) -> Result<Self> {
        Self::new(Samples::Owned(data), tile)
    }

    fn new(samples: Samples, tile: &Tile) -> Result<Self> {
        if tile.cols == 0 || tile.rows == 0 {
            return Err(GlobeError::InvalidCatalog {
                reason: format!("tile {} has an empty grid", tile.id),
            });
        }

        let size = samples.bytes().len();
        if size != tile.file_size() {
            return Err(GlobeError::InvalidFileSize {
                tile: tile.id.to_string(),
                size,
                expected: tile.file_size(),
            });
        }

        Ok(Self {
            samples,
            tile_id: tile.id,
            cols: tile.cols,
            rows: tile.rows,
            no_data: NO_DATA,
        })
    }

    /// Use a different no-data sentinel for this grid.
    pub fn with_no_data(mut self, no_data: i16) -> Self {
        self.no_data = no_data;
        self
    }

    /// Get the raw sample at a row/column index.
    ///
    /// Indices that round past the last row or column (a point in the final
    /// half cell of the tile) are clamped onto the edge.
    ///
    /// # Arguments
    ///
    /// * `row` - Row index (0 = north edge)
    /// * `col` - Column index (0 = west edge)
    pub fn get(&self, row: usize, col: usize) -> i16 {
        let row = row.min(self.rows - 1);
        let col = col.min(self.cols - 1);

        let offset = (row * self.cols + col) * 2;
        let data = self.samples.bytes();
        i16::from_le_bytes([data[offset], data[offset + 1]])
    }

    /// Whether `value` is this grid's no-data sentinel.
    pub fn is_no_data(&self, value: i16) -> bool {
        value == self.no_data
    }

    pub fn no_data(&self) -> i16 {
        self.no_data
    }

    pub fn tile_id(&self) -> &'static str {
        self.tile_id
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Whether the samples are memory-mapped from disk.
    pub fn is_mapped(&self) -> bool {
        matches!(self.samples, Samples::Mapped(_))
    }

    /// Scan every cell for min/max elevation and no-data count.
    pub fn summary(&self) -> GridSummary {
        let mut summary = GridSummary {
            min: None,
            max: None,
            no_data_count: 0,
            samples: (self.cols * self.rows) as u64,
        };

        for chunk in self.samples.bytes().chunks_exact(2) {
            let value = i16::from_le_bytes([chunk[0], chunk[1]]);
            if self.is_no_data(value) {
                summary.no_data_count += 1;
                continue;
            }
            summary.min = Some(summary.min.map_or(value, |m: i16| m.min(value)));
            summary.max = Some(summary.max.map_or(value, |m: i16| m.max(value)));
        }

        summary
    }
}

/// Result of a full scan over a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSummary {
    /// Lowest elevation, `None` if every cell is no-data.
    pub min: Option<i16>,
    /// Highest elevation, `None` if every cell is no-data.
    pub max: Option<i16>,
    pub no_data_count: u64,
    pub samples: u64,
}

impl GridSummary {
    /// Share of cells without data (0.0 to 1.0).
    pub fn no_data_ratio(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.no_data_count as f64 / self.samples as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::GLOBE_TILES;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn small_tile() -> Tile {
        Tile {
            cols: 90,
            rows: 50,
            ..GLOBE_TILES[6]
        }
    }

    /// Encode a grid where cell (row, col) = row * 100 + col
    fn gradient_bytes(tile: &Tile) -> Vec<u8> {
        let mut data = Vec::with_capacity(tile.file_size());
        for row in 0..tile.rows {
            for col in 0..tile.cols {
                let value = (row * 100 + col) as i16;
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        data
    }

    #[test]
    fn test_load_from_file() {
        let tile = small_tile();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&gradient_bytes(&tile)).unwrap();

        let grid = ElevationGrid::from_file(file.path(), &tile).unwrap();
        assert!(grid.is_mapped());
        assert_eq!(grid.tile_id(), "g10g");
        assert_eq!(grid.get(0, 0), 0);
        assert_eq!(grid.get(3, 7), 307);
        assert_eq!(grid.get(49, 89), 4989);
    }

    #[test]
    fn test_little_endian_decoding() {
        let tile = small_tile();
        let mut data = vec![0u8; tile.file_size()];
        // 1000 = 0x03E8, stored low byte first
        data[0] = 0xE8;
        data[1] = 0x03;
        // -500 = 0xFE0C
        data[2] = 0x0C;
        data[3] = 0xFE;

        let grid = ElevationGrid::from_bytes(data, &tile).unwrap();
        assert!(!grid.is_mapped());
        assert_eq!(grid.get(0, 0), 1000);
        assert_eq!(grid.get(0, 1), NO_DATA);
        assert!(grid.is_no_data(grid.get(0, 1)));
    }

    #[test]
    fn test_invalid_file_size() {
        let tile = small_tile();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![0u8; 1000]).unwrap();

        let result = ElevationGrid::from_file(file.path(), &tile);
        if let Err(GlobeError::InvalidFileSize {
            tile,
            size,
            expected,
        }) = result
        {
            assert_eq!(tile, "g10g");
            assert_eq!(size, 1000);
            assert_eq!(expected, 90 * 50 * 2);
        } else {
            panic!("Expected InvalidFileSize error");
        }
    }

    #[test]
    fn test_truncated_by_one_byte() {
        let tile = small_tile();
        let mut data = gradient_bytes(&tile);
        data.pop();
        assert!(ElevationGrid::from_bytes(data, &tile).is_err());
    }

    #[test]
    fn test_empty_tile_rejected() {
        let tile = Tile {
            cols: 0,
            ..small_tile()
        };
        let result = ElevationGrid::from_bytes(Vec::new(), &tile);
        assert!(matches!(result, Err(GlobeError::InvalidCatalog { .. })));

        let tile = Tile {
            rows: 0,
            ..small_tile()
        };
        assert!(ElevationGrid::from_bytes(Vec::new(), &tile).is_err());
    }

    #[test]
    fn test_debug_omits_samples() {
        let tile = small_tile();
        let grid = ElevationGrid::from_bytes(gradient_bytes(&tile), &tile).unwrap();
        assert_eq!(
            format!("{grid:?}"),
            "ElevationGrid { tile_id: \"g10g\", cols: 90, rows: 50, no_data: -500, mapped: false }"
        );
    }

    #[test]
    fn test_missing_file() {
        let result = ElevationGrid::from_file("/nonexistent/g10g", &small_tile());
        assert!(matches!(result, Err(GlobeError::Io(_))));
    }

    #[test]
    fn test_get_clamps_to_edge() {
        let tile = small_tile();
        let grid = ElevationGrid::from_bytes(gradient_bytes(&tile), &tile).unwrap();

        assert_eq!(grid.get(50, 0), 4900);
        assert_eq!(grid.get(0, 90), 89);
        assert_eq!(grid.get(50, 90), 4989);
    }

    #[test]
    fn test_custom_no_data() {
        let tile = small_tile();
        let grid = ElevationGrid::from_bytes(gradient_bytes(&tile), &tile)
            .unwrap()
            .with_no_data(0);

        assert_eq!(grid.no_data(), 0);
        assert!(grid.is_no_data(grid.get(0, 0)));
        assert!(!grid.is_no_data(NO_DATA));
    }

    #[test]
    fn test_summary() {
        let tile = small_tile();
        let mut data = gradient_bytes(&tile);
        for cell in 0..10 {
            data[cell * 2..cell * 2 + 2].copy_from_slice(&NO_DATA.to_le_bytes());
        }

        let grid = ElevationGrid::from_bytes(data, &tile).unwrap();
        let summary = grid.summary();
        assert_eq!(summary.min, Some(10));
        assert_eq!(summary.max, Some(4989));
        assert_eq!(summary.no_data_count, 10);
        assert_eq!(summary.samples, 4500);
        assert!((summary.no_data_ratio() - 10.0 / 4500.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary_all_no_data() {
        let tile = small_tile();
        let data = NO_DATA
            .to_le_bytes()
            .iter()
            .copied()
            .cycle()
            .take(tile.file_size())
            .collect();

        let summary = ElevationGrid::from_bytes(data, &tile).unwrap().summary();
        assert_eq!(summary.min, None);
        assert_eq!(summary.max, None);
        assert_eq!(summary.no_data_ratio(), 1.0);
    }
}
