use anyhow::{bail, Context, Result};
use globe::{BatchReport, ElevationService, GeoPoint};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{build_service, Elevation};

/// A saved map: a named list of coordinates with arbitrary extra fields.
#[derive(Serialize, Deserialize)]
struct CoordinateMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "customCoordinates", default)]
    custom_coordinates: Vec<Coordinate>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct Coordinate {
    lat: f64,
    lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    elevation: Option<Elevation>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

const STAT_COLUMNS: [&str; 5] = ["center", "average", "min", "max", "variance"];

pub fn run(
    data_dir: PathBuf,
    auto_download: bool,
    input: PathBuf,
    apothem: f64,
    output: Option<PathBuf>,
    lat_col: String,
    lng_col: String,
) -> Result<()> {
    if !apothem.is_finite() || apothem < 0.0 {
        bail!("Apothem must be a non-negative number of metres");
    }

    let service = build_service(data_dir, auto_download)?;

    // Detect file format
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    tracing::debug!(input = %input.display(), format = %extension, apothem, "Starting batch");

    let (output_path, report) = match extension.as_str() {
        "csv" => {
            let output = output.unwrap_or_else(|| PathBuf::from("output.csv"));
            let report = process_csv(&service, &input, &output, apothem, &lat_col, &lng_col)?;
            (output, report)
        }
        "json" => {
            let output = output.unwrap_or_else(|| PathBuf::from("output.json"));
            let report = process_json(&service, &input, &output, apothem)?;
            (output, report)
        }
        _ => bail!("Unsupported file format: {}. Use .json or .csv", extension),
    };

    let total = report.results.len();
    let not_found = report.no_data + report.failed;

    println!(
        "\nSuccessfully calculated the elevation for {} / {} locations with an apothem of {} metres.",
        total - not_found,
        total,
        apothem
    );
    if not_found > 0 {
        println!(
            "\nElevation for {} locations could not be found. This usually happens when the location is too close to water or other areas that don't have elevation data.",
            not_found
        );
    }
    println!("\nOutput saved to \"{}\"", output_path.display());

    Ok(())
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn query_all(service: &ElevationService, points: &[GeoPoint], apothem: f64) -> Result<BatchReport> {
    let pb = progress_bar(points.len())?;
    let report = service
        .query_batch_with_progress(points, apothem, |done| pb.set_position(done as u64))
        .context("Failed to calculate elevations")?;
    pb.finish_and_clear();
    Ok(report)
}

fn process_json(
    service: &ElevationService,
    input: &Path,
    output: &Path,
    apothem: f64,
) -> Result<BatchReport> {
    let file = File::open(input).context("Failed to open input file")?;
    let mut map: CoordinateMap = serde_json::from_reader(BufReader::new(file))
        .context("Could not read the input file, please make sure it's valid JSON format")?;

    if map.custom_coordinates.is_empty() {
        bail!("File does not contain any valid locations");
    }

    let points: Vec<GeoPoint> = map
        .custom_coordinates
        .iter()
        .map(|c| GeoPoint::new(c.lat, c.lng))
        .collect();

    let report = query_all(service, &points, apothem)?;

    for (coordinate, result) in map.custom_coordinates.iter_mut().zip(&report.results) {
        if let Some(result) = result {
            coordinate.elevation = Some(Elevation::from(*result));
        }
    }

    let output_file = File::create(output).context("Failed to create output file")?;
    let mut writer = BufWriter::new(output_file);
    serde_json::to_writer(&mut writer, &map)?;
    writer.flush()?;

    Ok(report)
}

fn process_csv(
    service: &ElevationService,
    input: &Path,
    output: &Path,
    apothem: f64,
    lat_col: &str,
    lng_col: &str,
) -> Result<BatchReport> {
    let file = File::open(input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    // Find column indices
    let headers = reader.headers()?.clone();
    let lat_idx = headers
        .iter()
        .position(|h| h == lat_col)
        .with_context(|| format!("Column '{}' not found in CSV", lat_col))?;
    let lng_idx = headers
        .iter()
        .position(|h| h == lng_col)
        .with_context(|| format!("Column '{}' not found in CSV", lng_col))?;

    let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    if records.is_empty() {
        bail!("File does not contain any valid locations");
    }

    let points = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let field = |idx: usize, name: &str| -> Result<f64> {
                record
                    .get(idx)
                    .with_context(|| format!("Missing {} on row {}", name, i + 1))?
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid {} on row {}", name, i + 1))
            };
            Ok(GeoPoint::new(field(lat_idx, "latitude")?, field(lng_idx, "longitude")?))
        })
        .collect::<Result<Vec<_>>>()?;

    let report = query_all(service, &points, apothem)?;

    let output_file = File::create(output).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.extend(STAT_COLUMNS);
    writer.write_record(&new_headers)?;

    for (record, result) in records.iter().zip(&report.results) {
        let stats: [String; 5] = match result {
            Some(r) => [
                r.center.to_string(),
                r.average.to_string(),
                r.min.to_string(),
                r.max.to_string(),
                r.variance.to_string(),
            ],
            None => Default::default(),
        };

        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.extend(stats.iter().map(String::as_str));
        writer.write_record(&new_record)?;
    }

    writer.flush()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use globe::{Tile, TileCatalog, GLOBE_TILES, NO_DATA};
    use tempfile::TempDir;

    /// Service over GLOBE bounds with 1 degree cells, g10g land and k10g sea.
    fn test_service(dir: &Path) -> ElevationService {
        let tiles: Vec<Tile> = GLOBE_TILES
            .iter()
            .map(|t| Tile {
                cols: 90,
                rows: t.rows / 120,
                ..*t
            })
            .collect();

        for (id, value) in [("g10g", 250i16), ("k10g", NO_DATA)] {
            let tile = tiles.iter().find(|t| t.id == id).unwrap();
            std::fs::write(dir.join(id), value.to_le_bytes().repeat(tile.samples())).unwrap();
        }

        globe::ElevationServiceBuilder::new(dir)
            .catalog(TileCatalog::new(tiles).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_process_json_preserves_fields() {
        let temp_dir = TempDir::new().unwrap();
        let service = test_service(temp_dir.path());

        let input = temp_dir.path().join("map.json");
        std::fs::write(
            &input,
            r#"{
                "name": "Mountains",
                "extra": {"tags": ["hard"]},
                "customCoordinates": [
                    {"lat": 30.0, "lng": 10.0, "panoId": "abc", "heading": 90},
                    {"lat": -20.0, "lng": 30.0},
                    {"lat": 95.0, "lng": 0.0}
                ]
            }"#,
        )
        .unwrap();

        let output = temp_dir.path().join("out.json");
        let report = process_json(&service, &input, &output, 1_000.0).unwrap();
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.no_data, 1);
        assert_eq!(report.failed, 1);

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["name"], "Mountains");
        assert_eq!(written["extra"]["tags"][0], "hard");

        let coords = written["customCoordinates"].as_array().unwrap();
        assert_eq!(coords.len(), 3);
        assert_eq!(coords[0]["panoId"], "abc");
        assert_eq!(coords[0]["heading"], 90);
        assert_eq!(coords[0]["elevation"]["center"], 250);
        assert_eq!(coords[0]["elevation"]["variance"], 0.0);
        assert!(coords[1].get("elevation").is_none());
        assert!(coords[2].get("elevation").is_none());
    }

    #[test]
    fn test_process_json_empty() {
        let temp_dir = TempDir::new().unwrap();
        let service = test_service(temp_dir.path());

        let input = temp_dir.path().join("map.json");
        std::fs::write(&input, r#"{"name": "Empty", "customCoordinates": []}"#).unwrap();

        let err = process_json(&service, &input, &temp_dir.path().join("out.json"), 0.0)
            .unwrap_err();
        assert!(err.to_string().contains("does not contain any valid locations"));
    }

    #[test]
    fn test_process_json_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let service = test_service(temp_dir.path());

        let input = temp_dir.path().join("map.json");
        std::fs::write(&input, "not json").unwrap();

        let err = process_json(&service, &input, &temp_dir.path().join("out.json"), 0.0)
            .unwrap_err();
        assert!(err.to_string().contains("valid JSON"));
    }

    #[test]
    fn test_process_csv() {
        let temp_dir = TempDir::new().unwrap();
        let service = test_service(temp_dir.path());

        let input = temp_dir.path().join("points.csv");
        std::fs::write(&input, "id,lat,lng\na,30.0,10.0\nb,-20.0,30.0\n").unwrap();

        let output = temp_dir.path().join("out.csv");
        let report = process_csv(&service, &input, &output, 0.0, "lat", "lng").unwrap();
        assert_eq!(report.succeeded(), 1);

        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "id,lat,lng,center,average,min,max,variance");
        assert_eq!(lines[1], "a,30.0,10.0,250,250,250,250,0");
        assert_eq!(lines[2], "b,-20.0,30.0,,,,,");
    }

    #[test]
    fn test_process_csv_missing_column() {
        let temp_dir = TempDir::new().unwrap();
        let service = test_service(temp_dir.path());

        let input = temp_dir.path().join("points.csv");
        std::fs::write(&input, "latitude,longitude\n30.0,10.0\n").unwrap();

        let err = process_csv(
            &service,
            &input,
            &temp_dir.path().join("out.csv"),
            0.0,
            "lat",
            "lng",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Column 'lat' not found"));
    }

    #[test]
    fn test_missing_tile_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let service = test_service(temp_dir.path());

        let input = temp_dir.path().join("map.json");
        std::fs::write(&input, r#"{"customCoordinates": [{"lat": 30.0, "lng": 100.0}]}"#)
            .unwrap();

        let output = temp_dir.path().join("out.json");
        assert!(process_json(&service, &input, &output, 0.0).is_err());
        assert!(!output.exists());
    }
}
