pub mod batch;
pub mod info;
pub mod list;
pub mod query;

use anyhow::{Context, Result};
use globe::{download::DownloadConfig, ElevationResult, ElevationService, ElevationServiceBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Elevation statistics as written to JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Elevation {
    pub center: i16,
    pub average: f64,
    pub min: i16,
    pub max: i16,
    pub variance: f64,
}

impl From<ElevationResult> for Elevation {
    fn from(result: ElevationResult) -> Self {
        Self {
            center: result.center,
            average: result.average,
            min: result.min,
            max: result.max,
            variance: result.variance,
        }
    }
}

/// Build the elevation service shared by the query commands.
pub fn build_service(data_dir: PathBuf, auto_download: bool) -> Result<ElevationService> {
    let mut builder = ElevationServiceBuilder::new(data_dir);

    if auto_download {
        builder = builder.auto_download(DownloadConfig::ngdc());
    }

    builder.build().context("Failed to create elevation service")
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
