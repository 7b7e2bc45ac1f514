//! Input loaders: the candidate address list and the binary image.
//!
//! Both failures here are fatal; everything after loading is per-address
//! recoverable.

use std::path::Path;

use log::{debug, info, warn};

use crate::{Address, RelocationError};

/// Load the full binary image into memory.
pub fn load_image(path: &Path) -> Result<Vec<u8>, RelocationError> {
    info!("Loading binary image: {}", path.display());
    let data = std::fs::read(path)?;
    info!("Binary image loaded, size: {} bytes", data.len());
    Ok(data)
}

/// Read candidate instruction addresses from a delimiter-separated file.
///
/// Only the first column is consulted. Rows whose first field does not start
/// with `0x` are skipped; `0x`-prefixed fields that fail to parse as 32-bit
/// hex are counted as invalid and logged, never fatal.
pub fn read_candidates(path: &Path, delimiter: u8) -> Result<Vec<Address>, RelocationError> {
    info!("Reading candidate addresses from: {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)?;

    let mut addresses = Vec::new();
    let mut invalid = 0usize;

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let field = match record.get(0) {
            Some(field) => field.trim(),
            None => continue,
        };

        if !field.starts_with("0x") {
            debug!("Row {} skipped (no address): {:?}", row + 1, field);
            continue;
        }

        match u32::from_str_radix(&field[2..], 16) {
            Ok(addr) => {
                debug!("Candidate address: 0x{:08X}", addr);
                addresses.push(addr);
            }
            Err(_) => {
                invalid += 1;
                warn!("Invalid address on row {}: {}", row + 1, field);
            }
        }
    }

    info!("{} valid candidate addresses found", addresses.len());
    if invalid > 0 {
        warn!("{} invalid addresses ignored", invalid);
    }

    Ok(addresses)
}
