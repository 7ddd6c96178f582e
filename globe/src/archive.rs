//! Decompression of distributed GLOBE tiles.
//!
//! NOAA distributes each tile gzipped (`a10g.gz`) and the whole dataset as
//! one ZIP archive (`all10g.zip`, entries like `all10/a10g`).

use std::io::{Read, Seek};

use flate2::read::GzDecoder;
use zip::ZipArchive;

use crate::error::{GlobeError, Result};

/// File name of the archive holding every tile.
pub const DATASET_ARCHIVE: &str = "all10g.zip";

/// Decompress a gzip stream.
pub fn gunzip<R: Read>(reader: R) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(reader);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data).map_err(|e| {
        GlobeError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to decompress gzip: {}", e),
        ))
    })?;
    Ok(data)
}

/// Extract one tile from a ZIP archive.
///
/// Matches the entry whose file name (ignoring directories and case) equals
/// `tile_id`. Returns [`GlobeError::Io`] with `NotFound` if there is none.
pub fn extract_zip_entry<R: Read + Seek>(reader: R, tile_id: &str) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(reader).map_err(invalid_data)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(invalid_data)?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().rsplit('/').next().unwrap_or("").to_lowercase();
        if name == tile_id {
            let mut contents = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut contents)?;
            return Ok(contents);
        }
    }

    Err(GlobeError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("No entry for tile {} in ZIP archive", tile_id),
    )))
}

fn invalid_data(e: zip::result::ZipError) -> GlobeError {
    GlobeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
