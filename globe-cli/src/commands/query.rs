use anyhow::{Context, Result};
use globe::GeoPoint;
use serde::Serialize;
use std::path::PathBuf;

use super::{build_service, Elevation};

#[derive(Serialize)]
struct ElevationResponse {
    lat: f64,
    lng: f64,
    apothem: f64,
    elevation: Option<Elevation>,
}

pub fn run(
    data_dir: PathBuf,
    auto_download: bool,
    lat: f64,
    lng: f64,
    apothem: f64,
    json: bool,
) -> Result<()> {
    let service = build_service(data_dir, auto_download)?;

    let result = service
        .query(GeoPoint::new(lat, lng), apothem)
        .context("Failed to get elevation")?;

    if json {
        let response = ElevationResponse {
            lat,
            lng,
            apothem,
            elevation: result.map(Elevation::from),
        };
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    match result {
        None => println!("no data"),
        Some(result) if apothem == 0.0 => println!("{}", result.center),
        Some(result) => {
            println!("Center:   {}m", result.center);
            println!("Average:  {:.2}m", result.average);
            println!("Min:      {}m", result.min);
            println!("Max:      {}m", result.max);
            println!("Variance: {:.2}", result.variance);
        }
    }

    Ok(())
}
