//! CRC32 checksums of written snapshot files
//!
//! Reported as `crc32:xxxxxxxx` (lowercase hex, zero-padded) so a consumer
//! can detect a snapshot file modified after publication.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crc32fast::Hasher;

use super::errors::{SnapshotError, SnapshotResult};

/// CRC32 of an in-memory buffer.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// CRC32 of a whole file, read in chunks.
pub fn compute_file_checksum(path: &Path) -> SnapshotResult<u32> {
    let file = File::open(path).map_err(|e| SnapshotError::io_error_at_path(path, e))?;

    let mut reader = BufReader::new(file);
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| SnapshotError::io_error_at_path(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize())
}

pub fn format_checksum(checksum: u32) -> String {
    format!("crc32:{:08x}", checksum)
}

/// Parses `crc32:xxxxxxxx`. Returns `None` for any other shape.
pub fn parse_checksum(formatted: &str) -> Option<u32> {
    let hex = formatted.strip_prefix("crc32:")?;
    if hex.len() != 8 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// True if the file's current checksum matches `expected`.
pub fn verify_file_checksum(path: &Path, expected: &str) -> SnapshotResult<bool> {
    let Some(expected) = parse_checksum(expected) else {
        return Ok(false);
    };
    Ok(compute_file_checksum(path)? == expected)
}
