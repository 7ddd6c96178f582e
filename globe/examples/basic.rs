//! Basic example demonstrating globe library usage.
//!
//! Run with: cargo run --example basic -- /path/to/globe/tiles [apothem-metres]

use globe::{ElevationService, GeoPoint, GlobeError};
use std::env;

fn main() -> Result<(), GlobeError> {
    let mut args = env::args().skip(1);
    let data_dir = args.next().unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/globe/tiles [apothem-metres]");
        std::process::exit(1);
    });
    let apothem: f64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(0.0);

    let service = ElevationService::new(&data_dir);

    // Query some famous peaks
    let locations = [
        ("Mount Fuji, Japan", 35.3606, 138.7274),
        ("Mount Everest, Nepal", 27.9881, 86.9250),
        ("Denali, Alaska", 63.0695, -151.0074),
        ("Pacific Ocean", 0.0, -150.0),
    ];

    println!("Elevation queries (apothem {}m):", apothem);
    println!("{:-<50}", "");

    for (name, lat, lng) in &locations {
        match service.query(GeoPoint::new(*lat, *lng), apothem) {
            Ok(Some(result)) => {
                println!(
                    "{}: {}m (mean {:.1}m, min {}m, max {}m)",
                    name, result.center, result.average, result.min, result.max
                );
            }
            Ok(None) => {
                println!("{}: no data", name);
            }
            Err(e @ GlobeError::TileLoad { .. }) => {
                println!("{}: tile not available locally ({})", name, e);
            }
            Err(e) => {
                println!("{}: error - {}", name, e);
            }
        }
    }

    // Show cache statistics
    let stats = service.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached tiles: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
