//! Error types for the GLOBE library.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur when querying GLOBE elevation data.
///
/// "No data" is not an error: queries report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum GlobeError {
    /// IO error when reading or writing tile files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raster file size doesn't match the tile's `cols * rows * 2` bytes.
    #[error("Invalid file size for tile {tile}: {size} bytes (expected {expected})")]
    InvalidFileSize {
        tile: String,
        size: usize,
        expected: usize,
    },

    /// No raster source (raw, gzip, zip or download) exists for a tile.
    #[error("GLOBE tile file not found: {path}")]
    TileNotFound { path: PathBuf },

    /// Loading a tile into the cache failed.
    ///
    /// The source is shared because every caller waiting on the same
    /// first-time load observes the same failure.
    #[error("Failed to load tile {tile}: {source}")]
    TileLoad {
        tile: &'static str,
        #[source]
        source: Arc<GlobeError>,
    },

    /// The tile definitions do not partition the globe.
    #[error("Invalid tile catalog: {reason}")]
    InvalidCatalog { reason: String },

    /// A required environment variable is not set.
    #[error("{var} environment variable not set")]
    MissingEnv { var: &'static str },

    /// The point (or a region corner) lies outside every tile.
    #[error("Invalid coordinates provided: lat={lat}, lng={lng}")]
    UnresolvableCoordinate { lat: f64, lng: f64 },

    /// The region crosses more than one tile boundary along an axis.
    #[error("Region spans {width}x{height} tiles; only regions covering up to a 2x2 grid of tiles are supported")]
    UnsupportedRegionSpan { width: usize, height: usize },

    /// The apothem is negative or not finite.
    #[error("Invalid apothem: {apothem} (expected a finite number of metres >= 0)")]
    InvalidApothem { apothem: f64 },

    /// Download failed.
    #[cfg(feature = "download")]
    #[error("Failed to download {tile}: {reason}")]
    DownloadFailed { tile: String, reason: String },

    /// HTTP request error.
    #[cfg(feature = "download")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GlobeError {
    /// Whether this error means the dataset or its configuration is unusable.
    ///
    /// Configuration errors abort a batch run; every other error only
    /// affects the query that produced it.
    pub fn is_configuration(&self) -> bool {
        match self {
            GlobeError::UnresolvableCoordinate { .. }
            | GlobeError::UnsupportedRegionSpan { .. }
            | GlobeError::InvalidApothem { .. } => false,
            GlobeError::TileLoad { source, .. } => source.is_configuration(),
            _ => true,
        }
    }
}

/// Result type alias using [`GlobeError`].
pub type Result<T> = std::result::Result<T, GlobeError>;
