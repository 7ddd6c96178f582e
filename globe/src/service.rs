//! GLOBE elevation service.
//!
//! This module provides [`ElevationService`], a high-level interface for
//! querying elevation statistics with automatic tile loading and caching.
//!
//! # Auto-Download Feature
//!
//! When compiled with the `download` feature, `ElevationService` can
//! automatically download missing tiles from a configured data source.
//!
//! ```ignore
//! use globe::{ElevationServiceBuilder, GeoPoint, download::DownloadConfig};
//!
//! let service = ElevationServiceBuilder::new("/data/globe")
//!     .auto_download(DownloadConfig::ngdc())
//!     .build()?;
//!
//! // Will download h10g if not present locally
//! let result = service.query(GeoPoint::new(35.36, 138.73), 1_000.0)?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{Tile, TileCatalog};
use crate::error::{GlobeError, Result};
use crate::geo::{BoundingBox, GeoPoint};
use crate::grid::{ElevationGrid, NO_DATA};
use crate::region::{tile_span, Corner, ElevationResult, Region, CORNER_OFFSETS};
use crate::store::{CacheStats, PreloadStats, TileStore};

#[cfg(feature = "download")]
use crate::download::{DownloadConfig, Downloader};

/// Outcome of a batch of queries.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One entry per input point; `None` for no-data and failed points.
    pub results: Vec<Option<ElevationResult>>,
    /// Points where every sampled cell was no-data.
    pub no_data: usize,
    /// Points that could not be queried (invalid coordinates or region).
    pub failed: usize,
}

impl BatchReport {
    /// Number of points with a result.
    pub fn succeeded(&self) -> usize {
        self.results.len() - self.no_data - self.failed
    }
}

/// High-level GLOBE elevation service with automatic tile caching.
///
/// `ElevationService` resolves points to tiles, loads tiles on first use and
/// aggregates elevation statistics over square regions. It is `Send + Sync`;
/// share it between threads behind an `Arc`.
///
/// # Example
///
/// ```ignore
/// use globe::{ElevationService, GeoPoint};
///
/// let service = ElevationService::new("/path/to/globe/tiles");
///
/// // Single cell - tile is loaded automatically
/// let fuji = GeoPoint::new(35.3606, 138.7274);
/// if let Some(result) = service.query(fuji, 0.0)? {
///     println!("Elevation: {}m", result.center);
/// }
///
/// // 2 km square around the summit, same tile from cache
/// if let Some(result) = service.query(fuji, 1_000.0)? {
///     println!("Mean {:.0}m, range {}..{}m", result.average, result.min, result.max);
/// }
/// ```
pub struct ElevationService {
    catalog: TileCatalog,
    store: TileStore,
}

impl ElevationService {
    /// Create a service over the GLOBE catalog reading tiles from `data_dir`.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            catalog: TileCatalog::globe(),
            store: TileStore::new(data_dir),
        }
    }

    /// Create a builder for more configuration options.
    pub fn builder<P: AsRef<Path>>(data_dir: P) -> ElevationServiceBuilder {
        ElevationServiceBuilder::new(data_dir)
    }

    /// Query elevation statistics around a point.
    ///
    /// With `apothem == 0.0` the result describes the single cell containing
    /// `point`. Otherwise it aggregates every cell of the square whose corners
    /// lie `apothem` metres north/south and east/west of `point`; the result's
    /// `center` is still the cell at `point` and may be the no-data value.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(result))` - elevation statistics in metres
    /// - `Ok(None)` - every sampled cell is no-data (sea or unmapped)
    /// - `Err(...)` - invalid input, unsupported region, or a tile failed to load
    ///
    /// # Errors
    ///
    /// - [`GlobeError::InvalidApothem`] if `apothem` is negative or not finite
    /// - [`GlobeError::UnresolvableCoordinate`] if the point or a corner lies
    ///   outside every tile
    /// - [`GlobeError::UnsupportedRegionSpan`] if the region crosses more than
    ///   one tile boundary along an axis
    /// - [`GlobeError::TileLoad`] if a needed tile is missing or malformed
    pub fn query(&self, point: GeoPoint, apothem: f64) -> Result<Option<ElevationResult>> {
        if !apothem.is_finite() || apothem < 0.0 {
            return Err(GlobeError::InvalidApothem { apothem });
        }

        let tile = self.resolve(point)?;
        let center = self.sample(tile, point)?;

        if apothem == 0.0 {
            let no_data = self.store.no_data();
            return Ok((center != no_data).then(|| ElevationResult::single(center)));
        }

        let points = CORNER_OFFSETS.map(|(north, east)| point.offset(north * apothem, east * apothem));
        let tiles = [
            self.resolve(points[0])?,
            self.resolve(points[1])?,
            self.resolve(points[2])?,
            self.resolve(points[3])?,
        ];

        // Reject oversized regions before loading anything
        let span = tile_span(tiles, self.catalog.grid_columns())?;
        tracing::trace!(
            lat = point.lat,
            lng = point.lng,
            apothem,
            width = span.width,
            height = span.height,
            "Region resolved"
        );

        let corners = [
            self.corner(tiles[0], points[0])?,
            self.corner(tiles[1], points[1])?,
            self.corner(tiles[2], points[2])?,
            self.corner(tiles[3], points[3])?,
        ];

        let region = Region::new(corners, self.catalog.grid_columns())?;
        Ok(region.summarize(center))
    }

    /// Query a batch of points with a shared apothem.
    ///
    /// Per-point failures (invalid coordinates, unsupported regions) and
    /// no-data results are counted and the batch carries on. Errors that make
    /// the dataset unusable (missing or malformed tiles) abort the batch.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let points = vec![
    ///     GeoPoint::new(35.3606, 138.7274), // Fuji
    ///     GeoPoint::new(0.0, -150.0),       // Pacific
    /// ];
    /// let report = service.query_batch(&points, 500.0)?;
    /// println!("{} / {} resolved", report.succeeded(), points.len());
    /// ```
    pub fn query_batch(&self, points: &[GeoPoint], apothem: f64) -> Result<BatchReport> {
        self.query_batch_with_progress(points, apothem, |_| {})
    }

    /// Like [`Self::query_batch`], calling `on_progress` with the number of
    /// points processed so far after each point.
    pub fn query_batch_with_progress(
        &self,
        points: &[GeoPoint],
        apothem: f64,
        mut on_progress: impl FnMut(usize),
    ) -> Result<BatchReport> {
        let mut report = BatchReport {
            results: Vec::with_capacity(points.len()),
            ..Default::default()
        };

        for (index, &point) in points.iter().enumerate() {
            let result = match self.query(point, apothem) {
                Ok(Some(result)) => Some(result),
                Ok(None) => {
                    report.no_data += 1;
                    None
                }
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    tracing::warn!(index, lat = point.lat, lng = point.lng, error = %e, "Query failed");
                    report.failed += 1;
                    None
                }
            };

            report.results.push(result);
            on_progress(index + 1);
        }

        tracing::debug!(
            points = points.len(),
            succeeded = report.succeeded(),
            no_data = report.no_data,
            failed = report.failed,
            "Batch complete"
        );

        Ok(report)
    }

    /// Preload tiles into the cache.
    ///
    /// See [`TileStore::preload`].
    pub fn preload(&self, bounds: Option<&[BoundingBox]>) -> PreloadStats {
        let stats = self.store.preload(&self.catalog, bounds);
        tracing::info!(
            loaded = stats.tiles_loaded,
            cached = stats.tiles_already_cached,
            failed = stats.tiles_failed,
            elapsed_ms = stats.elapsed_ms,
            "Preload complete"
        );
        stats
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.store.cache_stats()
    }

    pub fn catalog(&self) -> &TileCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    /// Load a tile's grid through the cache.
    pub fn grid(&self, tile: &Tile) -> Result<Arc<ElevationGrid>> {
        self.store.ensure_loaded(tile)
    }

    fn resolve(&self, point: GeoPoint) -> Result<&Tile> {
        self.catalog
            .find_tile(point)
            .ok_or(GlobeError::UnresolvableCoordinate {
                lat: point.lat,
                lng: point.lng,
            })
    }

    fn corner<'a>(&self, tile: &'a Tile, point: GeoPoint) -> Result<Corner<'a>> {
        let (row, col) = tile.cell(point);
        Ok(Corner {
            tile,
            row,
            col,
            grid: self.store.ensure_loaded(tile)?,
        })
    }

    fn sample(&self, tile: &Tile, point: GeoPoint) -> Result<i16> {
        let (row, col) = tile.cell(point);
        Ok(self.store.ensure_loaded(tile)?.get(row, col))
    }
}

/// Builder for [`ElevationService`] with configuration options.
///
/// # Example
///
/// ```ignore
/// use globe::ElevationServiceBuilder;
///
/// let service = ElevationServiceBuilder::new("/data/globe")
///     .no_data(-9999)
///     .build()?;
/// ```
pub struct ElevationServiceBuilder {
    data_dir: PathBuf,
    catalog: TileCatalog,
    no_data: i16,
    #[cfg(feature = "download")]
    download_config: Option<DownloadConfig>,
}

impl ElevationServiceBuilder {
    /// Create a new builder with the specified data directory.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            catalog: TileCatalog::globe(),
            no_data: NO_DATA,
            #[cfg(feature = "download")]
            download_config: None,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `GLOBE_DATA_DIR` | Directory containing tile files | Required |
    /// | `GLOBE_DOWNLOAD_SOURCE` | Named source: "ngdc"* | None |
    /// | `GLOBE_DOWNLOAD_URL` | URL template with `{tile}` placeholder* | None |
    ///
    /// *Only used when `download` feature is enabled.
    ///
    /// # Example
    ///
    /// ```bash
    /// export GLOBE_DATA_DIR=/data/globe
    /// export GLOBE_DOWNLOAD_SOURCE=ngdc
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`GlobeError::MissingEnv`] if `GLOBE_DATA_DIR` is not set.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("GLOBE_DATA_DIR").map_err(|_| GlobeError::MissingEnv {
            var: "GLOBE_DATA_DIR",
        })?;

        #[cfg(feature = "download")]
        let download_config = match std::env::var("GLOBE_DOWNLOAD_SOURCE") {
            Ok(source) if source.eq_ignore_ascii_case("ngdc") => Some(DownloadConfig::ngdc()),
            _ => std::env::var("GLOBE_DOWNLOAD_URL")
                .ok()
                .map(|url| DownloadConfig::with_url_template(url)),
        };

        Ok(Self {
            #[cfg(feature = "download")]
            download_config,
            ..Self::new(data_dir)
        })
    }

    /// Set the data directory.
    ///
    /// Overrides the directory set in the constructor or from environment.
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Use a custom tile catalog instead of the GLOBE one.
    pub fn catalog(mut self, catalog: TileCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Set the no-data sentinel. Default is [`NO_DATA`].
    pub fn no_data(mut self, no_data: i16) -> Self {
        self.no_data = no_data;
        self
    }

    /// Enable auto-download with the specified configuration.
    #[cfg(feature = "download")]
    pub fn auto_download(mut self, config: DownloadConfig) -> Self {
        self.download_config = Some(config);
        self
    }

    /// Build the [`ElevationService`].
    ///
    /// # Errors
    ///
    /// Returns an error if auto-download is enabled but the downloader
    /// cannot be created (e.g., due to TLS initialization failure).
    pub fn build(self) -> Result<ElevationService> {
        let store = TileStore::new(&self.data_dir).with_no_data(self.no_data);

        #[cfg(feature = "download")]
        let store = match self.download_config {
            Some(config) => store.with_downloader(Downloader::new(config)?),
            None => store,
        };

        Ok(ElevationService {
            catalog: self.catalog,
            store,
        })
    }
}
