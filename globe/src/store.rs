//! Lazily populated cache of GLOBE tile grids.
//!
//! [`TileStore`] maps tile ids to loaded [`ElevationGrid`]s. A tile is read
//! at most once per store: concurrent first-time requests for the same tile
//! coalesce into a single load and every caller gets the same grid. Grids are
//! never evicted; the whole dataset is sixteen tiles.
//!
//! # Tile sources
//!
//! For a tile `a10g` the store looks in its data directory for, in order:
//!
//! 1. `a10g`: the raw raster, memory-mapped directly
//! 2. `a10g.gz`: decompressed next to it as `a10g`
//! 3. `all10g.zip`: the dataset archive; the `a10g` entry is extracted
//! 4. a download, when built with the `download` feature and configured

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use moka::sync::Cache;

use crate::archive::{extract_zip_entry, gunzip, DATASET_ARCHIVE};
use crate::catalog::{Tile, TileCatalog};
use crate::error::{GlobeError, Result};
use crate::geo::BoundingBox;
use crate::grid::{ElevationGrid, NO_DATA};

#[cfg(feature = "download")]
use crate::download::Downloader;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of tiles currently in the cache.
    pub entry_count: u64,
    /// Number of cache hits (requests served from cache).
    pub hit_count: u64,
    /// Number of cache misses (tiles loaded from disk).
    pub miss_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Statistics from a preload operation.
#[derive(Debug, Clone, Default)]
pub struct PreloadStats {
    /// Number of tiles successfully loaded into cache.
    pub tiles_loaded: u64,
    /// Number of tiles that were already in cache.
    pub tiles_already_cached: u64,
    /// Number of tiles that failed to load.
    pub tiles_failed: u64,
    /// Number of tiles that matched the bounding box filter.
    pub tiles_matched: u64,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

/// Where a tile's data can be read from locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileSource {
    /// Raw raster file.
    Raw(PathBuf),
    /// Gzipped raster file.
    Gzip(PathBuf),
    /// Entry of the dataset ZIP archive.
    Archive(PathBuf),
}

impl TileSource {
    pub fn path(&self) -> &Path {
        match self {
            TileSource::Raw(path) | TileSource::Gzip(path) | TileSource::Archive(path) => path,
        }
    }
}

/// Cache of loaded tile grids, backed by a data directory.
///
/// # Example
///
/// ```ignore
/// use globe::{TileCatalog, TileStore};
///
/// let catalog = TileCatalog::globe();
/// let store = TileStore::new("/data/globe");
///
/// let tile = catalog.get("g10g").unwrap();
/// let grid = store.ensure_loaded(tile)?; // reads g10g from disk
/// let again = store.ensure_loaded(tile)?; // served from cache
/// assert!(std::sync::Arc::ptr_eq(&grid, &again));
/// ```
pub struct TileStore {
    /// Directory containing tile files.
    data_dir: PathBuf,
    /// Loaded grids, keyed by tile id.
    grids: Cache<&'static str, Arc<ElevationGrid>>,
    /// Sentinel applied to every loaded grid.
    no_data: i16,
    /// Number of cache hits.
    hit_count: AtomicU64,
    /// Number of cache misses.
    miss_count: AtomicU64,
    /// Optional downloader for tiles missing locally.
    #[cfg(feature = "download")]
    downloader: Option<Downloader>,
}

impl TileStore {
    /// Create a store reading tiles from `data_dir`.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            grids: Cache::builder().build(),
            no_data: NO_DATA,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            #[cfg(feature = "download")]
            downloader: None,
        }
    }

    /// Use a different no-data sentinel for grids loaded by this store.
    pub fn with_no_data(mut self, no_data: i16) -> Self {
        self.no_data = no_data;
        self
    }

    /// Download missing tiles with `downloader`.
    #[cfg(feature = "download")]
    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Get a tile's grid, loading it on first access.
    ///
    /// May block on I/O the first time a tile is requested. Concurrent
    /// callers asking for the same unloaded tile wait for a single load.
    ///
    /// # Errors
    ///
    /// Returns [`GlobeError::TileLoad`] if the tile has no usable source or
    /// its raster is malformed. A failed load is not cached, so a later call
    /// retries.
    pub fn ensure_loaded(&self, tile: &Tile) -> Result<Arc<ElevationGrid>> {
        let entry = self
            .grids
            .entry(tile.id)
            .or_try_insert_with(|| self.load(tile).map(Arc::new))
            .map_err(|source| GlobeError::TileLoad {
                tile: tile.id,
                source,
            })?;

        if entry.is_fresh() {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(tile = tile.id, "Tile served from cache");
        }

        Ok(entry.into_value())
    }

    /// Whether a tile's grid is already cached.
    pub fn is_cached(&self, tile_id: &str) -> bool {
        self.grids.contains_key(tile_id)
    }

    /// Read a tile from the first available source.
    fn load(&self, tile: &Tile) -> Result<ElevationGrid> {
        let start = Instant::now();
        let path = self.data_dir.join(tile.id);

        if !path.exists() {
            match self.local_source(tile) {
                Some(TileSource::Gzip(gz_path)) => {
                    tracing::info!(tile = tile.id, path = %gz_path.display(), "Decompressing tile");
                    let data = gunzip(BufReader::new(File::open(&gz_path)?))?;
                    install_unpacked(tile, &path, &data)?;
                }
                Some(TileSource::Archive(zip_path)) => {
                    tracing::info!(tile = tile.id, path = %zip_path.display(), "Extracting tile from archive");
                    let data = extract_zip_entry(BufReader::new(File::open(&zip_path)?), tile.id)?;
                    install_unpacked(tile, &path, &data)?;
                }
                Some(TileSource::Raw(_)) => {}
                None => self.fetch_missing(tile, &path)?,
            }
        }

        let grid = ElevationGrid::from_file(&path, tile)?.with_no_data(self.no_data);

        tracing::debug!(
            tile = tile.id,
            path = %path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded tile"
        );

        Ok(grid)
    }

    #[cfg(feature = "download")]
    fn fetch_missing(&self, tile: &Tile, path: &Path) -> Result<()> {
        match self.downloader {
            Some(ref downloader) => {
                tracing::info!(tile = tile.id, "Downloading missing tile");
                downloader.download_tile(tile.id, &self.data_dir)?;
                Ok(())
            }
            None => Err(GlobeError::TileNotFound {
                path: path.to_path_buf(),
            }),
        }
    }

    #[cfg(not(feature = "download"))]
    fn fetch_missing(&self, _tile: &Tile, path: &Path) -> Result<()> {
        Err(GlobeError::TileNotFound {
            path: path.to_path_buf(),
        })
    }

    /// Find a local source for a tile without loading it.
    ///
    /// The dataset archive is reported when it exists; whether it actually
    /// contains the tile is only checked on load.
    pub fn local_source(&self, tile: &Tile) -> Option<TileSource> {
        let raw = self.data_dir.join(tile.id);
        if raw.exists() {
            return Some(TileSource::Raw(raw));
        }

        let gz = self.data_dir.join(format!("{}.gz", tile.id));
        if gz.exists() {
            return Some(TileSource::Gzip(gz));
        }

        let zip = self.data_dir.join(DATASET_ARCHIVE);
        if zip.exists() {
            return Some(TileSource::Archive(zip));
        }

        None
    }

    /// List the local source of every catalog tile that has one.
    pub fn available_sources<'a>(&self, catalog: &'a TileCatalog) -> Vec<(&'a Tile, TileSource)> {
        catalog
            .iter()
            .filter_map(|tile| self.local_source(tile).map(|source| (tile, source)))
            .collect()
    }

    /// Preload tiles into the cache.
    ///
    /// Loads every catalog tile, or only those overlapping at least one of
    /// `bounds`. Useful to pay the load cost up front instead of on the
    /// first query that touches each tile.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use globe::{BoundingBox, TileCatalog, TileStore};
    ///
    /// let store = TileStore::new("/data/globe");
    /// let alps = BoundingBox::new(45.0, 5.0, 48.0, 16.0);
    /// let stats = store.preload(&TileCatalog::globe(), Some(&[alps]));
    /// println!("Loaded {} tiles in {}ms", stats.tiles_loaded, stats.elapsed_ms);
    /// ```
    pub fn preload(&self, catalog: &TileCatalog, bounds: Option<&[BoundingBox]>) -> PreloadStats {
        let start = Instant::now();
        let mut stats = PreloadStats::default();

        for tile in catalog {
            if let Some(boxes) = bounds {
                if !boxes.iter().any(|b| tile.overlaps(b)) {
                    continue;
                }
            }

            stats.tiles_matched += 1;

            if self.is_cached(tile.id) {
                stats.tiles_already_cached += 1;
                continue;
            }

            match self.ensure_loaded(tile) {
                Ok(_) => stats.tiles_loaded += 1,
                Err(e) => {
                    tracing::warn!(tile = tile.id, error = %e, "Failed to preload tile");
                    stats.tiles_failed += 1;
                }
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        stats
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.grids.run_pending_tasks();
        CacheStats {
            entry_count: self.grids.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached grid.
    ///
    /// Counters are kept. Grids still referenced by callers stay alive until
    /// those references are dropped.
    pub fn clear(&self) {
        self.grids.invalidate_all();
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Sentinel applied to loaded grids.
    pub fn no_data(&self) -> i16 {
        self.no_data
    }

    /// Check if auto-download is enabled.
    #[cfg(feature = "download")]
    pub fn has_auto_download(&self) -> bool {
        self.downloader.is_some()
    }
}

/// Write an unpacked raster next to its source as the raw tile file.
///
/// The size is checked first and the data lands under a temporary name, so a
/// bad archive never leaves a raw file that would shadow its source.
fn install_unpacked(tile: &Tile, path: &Path, data: &[u8]) -> Result<()> {
    if data.len() != tile.file_size() {
        return Err(GlobeError::InvalidFileSize {
            tile: tile.id.to_string(),
            size: data.len(),
            expected: tile.file_size(),
        });
    }

    let part_path = path.with_extension("part");
    std::fs::write(&part_path, data)?;
    if let Err(e) = std::fs::rename(&part_path, path) {
        let _ = std::fs::remove_file(&part_path);
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{small_catalog, write_flat_tile, write_tile_bytes};
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    #[test]
    fn test_load_and_cache_hit() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        let tile = catalog.get("g10g").unwrap();
        write_flat_tile(temp_dir.path(), tile, 500);

        let store = TileStore::new(temp_dir.path());

        let first = store.ensure_loaded(tile).unwrap();
        let stats = store.cache_stats();
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_count, 0);

        let second = store.ensure_loaded(tile).unwrap();
        let stats = store.cache_stats();
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.get(10, 10), 500);
    }

    #[test]
    fn test_missing_tile() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        let store = TileStore::new(temp_dir.path());

        let err = store.ensure_loaded(catalog.get("a10g").unwrap()).unwrap_err();
        assert!(err.is_configuration());
        match err {
            GlobeError::TileLoad { tile, source } => {
                assert_eq!(tile, "a10g");
                assert!(matches!(*source, GlobeError::TileNotFound { .. }));
            }
            other => panic!("Expected TileLoad error, got {other:?}"),
        }
        assert!(!store.is_cached("a10g"));
    }

    #[test]
    fn test_truncated_tile_is_configuration_error() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        let tile = catalog.get("b10g").unwrap();
        write_tile_bytes(temp_dir.path(), tile.id, &[0u8; 100]);

        let store = TileStore::new(temp_dir.path());
        let err = store.ensure_loaded(tile).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Invalid file size"));
    }

    #[test]
    fn test_failed_load_is_retried() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        let tile = catalog.get("c10g").unwrap();
        let store = TileStore::new(temp_dir.path());

        assert!(store.ensure_loaded(tile).is_err());

        write_flat_tile(temp_dir.path(), tile, 42);
        assert_eq!(store.ensure_loaded(tile).unwrap().get(0, 0), 42);
    }

    #[test]
    fn test_load_from_gzip() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        let tile = catalog.get("d10g").unwrap();

        let raw: Vec<u8> = 321i16.to_le_bytes().repeat(tile.samples());
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&raw).unwrap();
        write_tile_bytes(temp_dir.path(), "d10g.gz", &encoder.finish().unwrap());

        let store = TileStore::new(temp_dir.path());
        assert!(matches!(store.local_source(tile), Some(TileSource::Gzip(_))));

        let grid = store.ensure_loaded(tile).unwrap();
        assert_eq!(grid.get(5, 5), 321);
        assert!(grid.is_mapped());
        assert!(temp_dir.path().join("d10g").exists());
    }

    #[test]
    fn test_bad_gzip_leaves_no_raw_file() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        let tile = catalog.get("d10g").unwrap();
        let gz_path = temp_dir.path().join("d10g.gz");

        let gzip = |raw: &[u8]| {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(raw).unwrap();
            encoder.finish().unwrap()
        };

        std::fs::write(&gz_path, gzip(&[0u8; 100])).unwrap();
        let store = TileStore::new(temp_dir.path());
        let err = store.ensure_loaded(tile).unwrap_err();
        assert!(err.to_string().contains("Invalid file size"));
        assert!(!temp_dir.path().join("d10g").exists());
        assert!(!temp_dir.path().join("d10g.part").exists());
        assert!(matches!(store.local_source(tile), Some(TileSource::Gzip(_))));

        std::fs::write(&gz_path, gzip(&9i16.to_le_bytes().repeat(tile.samples()))).unwrap();
        assert_eq!(store.ensure_loaded(tile).unwrap().get(0, 0), 9);
    }

    #[test]
    fn test_load_from_dataset_archive() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        let tile = catalog.get("h10g").unwrap();

        let raw: Vec<u8> = 77i16.to_le_bytes().repeat(tile.samples());
        let mut buffer = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buffer));
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("all10/h10g", options).unwrap();
            zip.write_all(&raw).unwrap();
            zip.finish().unwrap();
        }
        write_tile_bytes(temp_dir.path(), DATASET_ARCHIVE, &buffer);

        let store = TileStore::new(temp_dir.path());
        let grid = store.ensure_loaded(tile).unwrap();
        assert_eq!(grid.get(0, 0), 77);

        // The archive does not hold every tile
        let err = store.ensure_loaded(catalog.get("a10g").unwrap()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_custom_no_data_applied() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        let tile = catalog.get("g10g").unwrap();
        write_flat_tile(temp_dir.path(), tile, -9999);

        let store = TileStore::new(temp_dir.path()).with_no_data(-9999);
        let grid = store.ensure_loaded(tile).unwrap();
        assert_eq!(grid.no_data(), -9999);
        assert!(grid.is_no_data(grid.get(0, 0)));
    }

    #[test]
    fn test_concurrent_first_access_loads_once() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        let tile = *catalog.get("g10g").unwrap();
        write_flat_tile(temp_dir.path(), &tile, 500);

        let store = TileStore::new(temp_dir.path());

        let grids: Vec<Arc<ElevationGrid>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| store.ensure_loaded(&tile).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(grids.iter().all(|g| Arc::ptr_eq(g, &grids[0])));
        let stats = store.cache_stats();
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_count, 7);
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        let tile = catalog.get("g10g").unwrap();
        write_flat_tile(temp_dir.path(), tile, 500);

        let store = TileStore::new(temp_dir.path());
        store.ensure_loaded(tile).unwrap();
        assert!(store.is_cached("g10g"));

        store.clear();
        assert!(!store.is_cached("g10g"));

        store.ensure_loaded(tile).unwrap();
        assert_eq!(store.cache_stats().miss_count, 2);
    }

    #[test]
    fn test_preload_all_available() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        write_flat_tile(temp_dir.path(), catalog.get("a10g").unwrap(), 1);
        write_flat_tile(temp_dir.path(), catalog.get("p10g").unwrap(), 2);

        let store = TileStore::new(temp_dir.path());
        let stats = store.preload(&catalog, None);

        assert_eq!(stats.tiles_matched, 16);
        assert_eq!(stats.tiles_loaded, 2);
        assert_eq!(stats.tiles_failed, 14);
        assert!(store.is_cached("a10g"));
        assert!(store.is_cached("p10g"));
    }

    #[test]
    fn test_preload_with_bounding_box() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        write_flat_tile(temp_dir.path(), catalog.get("g10g").unwrap(), 1);
        write_flat_tile(temp_dir.path(), catalog.get("h10g").unwrap(), 2);

        let store = TileStore::new(temp_dir.path());
        let alps = BoundingBox::new(45.0, 5.0, 48.0, 16.0);
        let stats = store.preload(&catalog, Some(&[alps]));

        assert_eq!(stats.tiles_matched, 1);
        assert_eq!(stats.tiles_loaded, 1);
        assert!(store.is_cached("g10g"));
        assert!(!store.is_cached("h10g"));

        let stats = store.preload(&catalog, Some(&[alps]));
        assert_eq!(stats.tiles_already_cached, 1);
        assert_eq!(stats.tiles_loaded, 0);
    }

    #[test]
    fn test_available_sources() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = small_catalog();
        write_flat_tile(temp_dir.path(), catalog.get("a10g").unwrap(), 1);
        write_tile_bytes(temp_dir.path(), "b10g.gz", b"not checked until load");

        let store = TileStore::new(temp_dir.path());
        let sources = store.available_sources(&catalog);

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].0.id, "a10g");
        assert!(matches!(sources[0].1, TileSource::Raw(_)));
        assert_eq!(sources[1].0.id, "b10g");
        assert!(sources[1].1.path().ends_with("b10g.gz"));
    }
}
