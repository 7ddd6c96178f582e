use anyhow::Result;
use globe::TileSource;
use std::path::PathBuf;

use super::info::coverage;
use super::{build_service, format_size};

pub fn run(data_dir: PathBuf) -> Result<()> {
    let service = build_service(data_dir, false)?;
    let store = service.store();

    if !store.data_dir().exists() {
        anyhow::bail!("Data directory does not exist: {}", store.data_dir().display());
    }

    let sources = store.available_sources(service.catalog());

    println!("{:<6} {:>11} {:>28} {:>8}", "TILE", "SAMPLES", "COVERAGE", "SOURCE");
    println!("{}", "-".repeat(56));

    let mut total_size: u64 = 0;

    for tile in service.catalog() {
        let source = sources.iter().find(|(t, _)| t.id == tile.id).map(|(_, s)| s);

        let label = match source {
            Some(TileSource::Raw(path)) => {
                total_size += std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                "raw"
            }
            Some(TileSource::Gzip(_)) => "gzip",
            Some(TileSource::Archive(_)) => "zip",
            None => "-",
        };

        println!(
            "{:<6} {:>11} {:>28} {:>8}",
            tile.id,
            format!("{}x{}", tile.cols, tile.rows),
            coverage(tile),
            label
        );
    }

    // Summary
    println!();
    println!("Summary:");
    println!("  Available tiles: {} / {}", sources.len(), service.catalog().len());
    println!("  Raw size: {}", format_size(total_size));
    println!("  Data directory: {}", store.data_dir().display());

    Ok(())
}
