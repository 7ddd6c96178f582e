//! # GLOBE - Elevation Lookup Library
//!
//! Elevation lookups and regional statistics over the GLOBE (Global
//! Land One-km Base Elevation) 30 arc-second dataset.
//!
//! ## Features
//!
//! - **Fast**: Memory-mapped I/O for instant data access
//! - **Memory Efficient**: Only loads tiles on demand, each at most once
//! - **Regional Statistics**: Mean, min, max and variance over a square
//!   region, even across tile boundaries and the antimeridian
//! - **Offline**: Works with local tile files, raw, gzipped or in the
//!   distribution ZIP archive
//!
//! ## Quick Start
//!
//! ```ignore
//! use globe::{ElevationService, GeoPoint};
//!
//! let service = ElevationService::new("/data/globe");
//!
//! // Elevation of the cell containing the point
//! let result = service.query(GeoPoint::new(35.3606, 138.7274), 0.0)?;
//!
//! // Statistics over a 10 km square
//! if let Some(stats) = service.query(GeoPoint::new(35.3606, 138.7274), 5_000.0)? {
//!     println!("mean {:.0}m, variance {:.0}", stats.average, stats.variance);
//! }
//! ```
//!
//! ## GLOBE Data Format
//!
//! The dataset consists of sixteen tiles, `a10g` through `p10g`, each a
//! headerless raster of 16-bit little-endian signed integers:
//!
//! - **Polar tiles** (`a`-`d`, `m`-`p`): 10800×4800 samples
//! - **Equatorial tiles** (`e`-`l`): 10800×6000 samples
//!
//! Elevations are in metres. The value -500 marks cells without data,
//! mostly ocean.
//!
//! ## Data Sources
//!
//! Download GLOBE data from:
//! - <https://www.ngdc.noaa.gov/mgg/topo/gltiles.html>

pub mod archive;
pub mod catalog;
#[cfg(feature = "download")]
pub mod download;
pub mod error;
pub mod geo;
pub mod grid;
pub mod region;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod test_util;

// Re-export main types at crate root for convenience
pub use catalog::{Tile, TileCatalog, GLOBE_TILES};
pub use error::{GlobeError, Result};
pub use geo::{BoundingBox, GeoPoint};
pub use grid::{ElevationGrid, GridSummary, NO_DATA};
pub use region::ElevationResult;
pub use service::{BatchReport, ElevationService, ElevationServiceBuilder};
pub use store::{CacheStats, PreloadStats, TileSource, TileStore};
