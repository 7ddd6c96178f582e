//! GLOBE tile download functionality.
//!
//! This module fetches missing tiles from a remote server. It is only
//! available when the `download` feature is enabled.
//!
//! # Data Sources
//!
//! NOAA's National Centers for Environmental Information publish every
//! GLOBE tile individually gzipped under
//! `https://www.ngdc.noaa.gov/mgg/topo/DATATILES/elev/`. Mirrors can be
//! configured with a URL template containing a `{tile}` placeholder.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;

use crate::archive::{extract_zip_entry, gunzip};
use crate::error::{GlobeError, Result};

/// Compression format of downloaded tile files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression - raw tile file
    #[default]
    None,
    /// Gzip compression (`a10g.gz`)
    Gzip,
    /// ZIP archive containing the tile
    Zip,
}

impl Compression {
    /// Detect compression format from a URL or filename.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use globe::download::Compression;
    ///
    /// assert_eq!(Compression::from_url("a10g.gz"), Compression::Gzip);
    /// assert_eq!(Compression::from_url("a10g.zip"), Compression::Zip);
    /// assert_eq!(Compression::from_url("a10g"), Compression::None);
    /// ```
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.ends_with(".gz") {
            Compression::Gzip
        } else if lower.ends_with(".zip") {
            Compression::Zip
        } else {
            Compression::None
        }
    }
}

/// Default timeout for HTTP requests in seconds.
///
/// Tiles are 100-130 MB uncompressed, so allow for slow links.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// NOAA NGDC tile URL template.
pub const NGDC_URL_TEMPLATE: &str = "https://www.ngdc.noaa.gov/mgg/topo/DATATILES/elev/{tile}.gz";

/// Configuration for downloading GLOBE tiles.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// URL template; `{tile}` is replaced with the tile id.
    pub url_template: String,
    /// Compression format of the downloaded file.
    pub compression: Compression,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Number of retry attempts on failure.
    pub max_retries: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            url_template: String::new(),
            compression: Compression::None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 3,
        }
    }
}

impl DownloadConfig {
    /// Create a download configuration with a custom URL template.
    ///
    /// Compression is auto-detected from the URL extension:
    /// - `.gz` → Gzip
    /// - `.zip` → ZIP
    /// - otherwise → None
    ///
    /// # Example
    ///
    /// ```ignore
    /// use globe::download::DownloadConfig;
    ///
    /// let config = DownloadConfig::with_url_template("https://mirror.example.com/globe/{tile}.gz");
    /// ```
    pub fn with_url_template(url_template: impl Into<String>) -> Self {
        let url_template = url_template.into();
        let compression = Compression::from_url(&url_template);
        Self {
            url_template,
            compression,
            ..Default::default()
        }
    }

    /// Create a download configuration with explicit compression setting.
    pub fn with_url_template_and_compression(
        url_template: impl Into<String>,
        compression: Compression,
    ) -> Self {
        Self {
            url_template: url_template.into(),
            compression,
            ..Default::default()
        }
    }

    /// Download from NOAA NGDC (gzipped tiles, no authentication).
    pub fn ngdc() -> Self {
        Self::with_url_template(NGDC_URL_TEMPLATE)
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the maximum number of retry attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// GLOBE tile downloader.
pub struct Downloader {
    client: Client,
    config: DownloadConfig,
}

impl Downloader {
    /// Create a new downloader with the given configuration.
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GlobeError::DownloadFailed {
                tile: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download a tile into `dest_dir`, decompressing it if needed.
    ///
    /// Returns the path of the raw tile file, `<dest_dir>/<tile_id>`. Nothing
    /// is fetched when that file already exists.
    pub fn download_tile(&self, tile_id: &str, dest_dir: &Path) -> Result<PathBuf> {
        let url = self.build_url(tile_id)?;
        let dest_path = dest_dir.join(tile_id);

        // Skip if file already exists
        if dest_path.exists() {
            return Ok(dest_path);
        }

        fs::create_dir_all(dest_dir)?;

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(500 * attempt as u64));
                tracing::debug!(tile = tile_id, attempt, "Retrying download");
            }

            match self.do_download(tile_id, &url, &dest_path) {
                Ok(()) => {
                    tracing::info!(tile = tile_id, url = %url, "Downloaded tile");
                    return Ok(dest_path);
                }
                Err(e) => {
                    tracing::warn!(tile = tile_id, attempt, error = %e, "Download attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| GlobeError::DownloadFailed {
            tile: tile_id.to_string(),
            reason: "Unknown error".to_string(),
        }))
    }

    /// Build the download URL for a tile.
    fn build_url(&self, tile_id: &str) -> Result<String> {
        if self.config.url_template.is_empty() {
            return Err(GlobeError::DownloadFailed {
                tile: tile_id.to_string(),
                reason: "No download URL template configured".to_string(),
            });
        }

        Ok(self.config.url_template.replace("{tile}", tile_id))
    }

    fn do_download(&self, tile_id: &str, url: &str, dest_path: &Path) -> Result<()> {
        let response = self.client.get(url).send()?;

        if !response.status().is_success() {
            return Err(GlobeError::DownloadFailed {
                tile: tile_id.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes()?;
        let data = decompress(&bytes, self.config.compression, tile_id)?;

        // Write under a temporary name so a partial file never passes for a tile
        let partial = dest_path.with_extension("part");
        fs::write(&partial, data)?;
        fs::rename(&partial, dest_path)?;

        Ok(())
    }
}

fn decompress(bytes: &[u8], compression: Compression, tile_id: &str) -> Result<Vec<u8>> {
    let failed = |e: GlobeError| GlobeError::DownloadFailed {
        tile: tile_id.to_string(),
        reason: e.to_string(),
    };

    match compression {
        Compression::None => Ok(bytes.to_vec()),
        Compression::Gzip => gunzip(bytes).map_err(failed),
        Compression::Zip => extract_zip_entry(Cursor::new(bytes), tile_id).map_err(failed),
    }
}
