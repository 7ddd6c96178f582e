use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// GLOBE elevation data CLI tool
#[derive(Parser)]
#[command(name = "globe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing GLOBE tile files (a10g ... p10g)
    #[arg(
        short,
        long,
        env = "GLOBE_DATA_DIR",
        default_value = "data",
        global = true
    )]
    data_dir: PathBuf,

    /// Download missing tiles from NOAA
    #[arg(short, long, global = true)]
    auto_download: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query elevation around a single coordinate
    Query {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Distance in metres to check in each direction from the coordinate
        #[arg(long, default_value = "0")]
        apothem: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Calculate elevation statistics for every coordinate in a file
    Batch {
        /// Input file (JSON map with customCoordinates, or CSV)
        input: PathBuf,

        /// Distance in metres to check in each direction from each coordinate
        apothem: f64,

        /// Output file [default: output.json, or output.csv for CSV input]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for latitude (CSV only)
        #[arg(long, default_value = "lat")]
        lat_col: String,

        /// Column name for longitude (CSV only)
        #[arg(long, default_value = "lng")]
        lng_col: String,
    },

    /// Display information about a GLOBE tile
    Info {
        /// Tile name (e.g., g10g)
        tile: String,
    },

    /// List GLOBE tiles and their local availability
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "globe=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            lat,
            lng,
            apothem,
            json,
        } => commands::query::run(cli.data_dir, cli.auto_download, lat, lng, apothem, json),
        Commands::Batch {
            input,
            apothem,
            output,
            lat_col,
            lng_col,
        } => commands::batch::run(
            cli.data_dir,
            cli.auto_download,
            input,
            apothem,
            output,
            lat_col,
            lng_col,
        ),
        Commands::Info { tile } => commands::info::run(cli.data_dir, tile),
        Commands::List => commands::list::run(cli.data_dir),
    }
}
