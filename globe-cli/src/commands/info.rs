use anyhow::{Context, Result};
use globe::{Tile, TileSource};
use std::path::PathBuf;

use super::{build_service, format_size};

pub fn run(data_dir: PathBuf, tile: String) -> Result<()> {
    let service = build_service(data_dir, false)?;

    let id = tile.to_lowercase();
    let tile = service
        .catalog()
        .get(&id)
        .with_context(|| format!("Unknown tile: {} (expected a10g through p10g)", tile))?;

    let source = service
        .store()
        .local_source(tile)
        .with_context(|| format!("Tile not found in {}", service.store().data_dir().display()))?;

    let grid = service.grid(tile).context("Failed to load tile")?;

    let raw_path = service.store().data_dir().join(tile.id);
    let file_size = std::fs::metadata(&raw_path)?.len();

    println!("Tile: {}", tile.id);
    println!("Path: {}", raw_path.display());
    match source {
        TileSource::Raw(_) => {}
        TileSource::Gzip(path) | TileSource::Archive(path) => {
            println!("Extracted from: {}", path.display());
        }
    }
    println!();
    println!("Grid: {} columns x {} rows", grid.cols(), grid.rows());
    println!("Coverage: {}", coverage(tile));
    println!("Tile position: column {}, row {}", tile.grid_x, tile.grid_y);
    println!("File size: {}", format_size(file_size));
    println!();

    let summary = grid.summary();
    if let (Some(min), Some(max)) = (summary.min, summary.max) {
        println!("Min elevation: {}m", min);
        println!("Max elevation: {}m", max);
    }
    println!(
        "Published range: {}m to {}m",
        tile.elevation_min, tile.elevation_max
    );
    if summary.no_data_count > 0 {
        println!(
            "No-data samples: {} ({:.1}%)",
            summary.no_data_count,
            summary.no_data_ratio() * 100.0
        );
    }

    Ok(())
}

/// Human readable bounds, e.g. `50N to 90N, 180W to 90W`.
pub fn coverage(tile: &Tile) -> String {
    fn lat(v: f64) -> String {
        match v {
            v if v > 0.0 => format!("{}N", v),
            v if v < 0.0 => format!("{}S", -v),
            _ => "0".to_string(),
        }
    }
    fn lng(v: f64) -> String {
        match v {
            v if v > 0.0 => format!("{}E", v),
            v if v < 0.0 => format!("{}W", -v),
            _ => "0".to_string(),
        }
    }

    format!(
        "{} to {}, {} to {}",
        lat(tile.south),
        lat(tile.north),
        lng(tile.west),
        lng(tile.east)
    )
}
