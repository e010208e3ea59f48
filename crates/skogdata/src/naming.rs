//! Translation of tile identifiers ("Las_namn") into archive paths.
//!
//! The archive groups tiles by acquisition year and a coarse spatial bucket:
//!
//! ```text
//! Tradhojd_LaserdataSkog/{year}/{northing 2 digits}_{easting 1 digit}/THL_{id}_{year}.mrf
//! ```
//!
//! The layout is fixed by the remote server and mirrored verbatim in the
//! local cache.

use crate::{Result, SkogError};

/// Top-level directory of the tree height archive.
pub const ARCHIVE_BASEDIR: &str = "Tradhojd_LaserdataSkog";

/// Extension of the tile rasters.
pub const TILE_EXTENSION: &str = "mrf";

/// Sibling files every MRF tile needs next to it (index and LERC data).
pub const TILE_AUXILIARY: [&str; 2] = ["idx", "lrc"];

/// Convert a tile identifier to its archive-relative path.
///
/// ```
/// let path = skogdata::lasnamn_to_path("21D013_66600_5000_25")?;
/// assert_eq!(path, "Tradhojd_LaserdataSkog/2021/66_5/THL_21D013_66600_5000_2021.mrf");
/// # Ok::<(), skogdata::SkogError>(())
/// ```
pub fn lasnamn_to_path(lasnamn: &str) -> Result<String> {
    let fields = parse_fields(lasnamn)?;

    let year = format!("20{}", &lasnamn[..2]);
    let bucket = format!("{}_{}", &fields[1][..2], &fields[2][..1]);
    let stem = &lasnamn[..lasnamn.len() - 3];

    Ok(format!(
        "{ARCHIVE_BASEDIR}/{year}/{bucket}/THL_{stem}_{year}.{TILE_EXTENSION}"
    ))
}

fn parse_fields(lasnamn: &str) -> Result<Vec<&str>> {
    let malformed = || SkogError::MalformedIdentifier(lasnamn.to_string());
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let fields: Vec<&str> = lasnamn.split('_').collect();
    if fields.len() != 4 {
        return Err(malformed());
    }

    let area = fields[0].as_bytes();
    if area.len() < 2 || !area[0].is_ascii_digit() || !area[1].is_ascii_digit() {
        return Err(malformed());
    }
    if !all_digits(fields[1]) || fields[1].len() < 2 || !all_digits(fields[2]) {
        return Err(malformed());
    }
    if !all_digits(fields[3]) || fields[3].len() != 2 {
        return Err(malformed());
    }

    Ok(fields)
}
