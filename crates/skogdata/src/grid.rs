//! Grid cell keys used to bucket tiles.
//!
//! Coordinates are SWEREF99 TM metres. A cell is addressed in hundred-metre
//! units floored to a multiple of [`CELL_STEP`], so every cell spans 2.5 km
//! in each direction. Keys are written northing first: `"69300_5475_25"`.

use geo::Rect;
use std::fmt;

/// Spacing between cell origins, in hundred-metre units.
pub const CELL_STEP: i64 = 25;

/// Size suffix carried by every cell key.
pub const CELL_SUFFIX: &str = "25";

/// A grid cell identified by its south-west corner in hundred-metre units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    /// Northing of the cell origin (multiple of 25).
    pub northing: i64,
    /// Easting of the cell origin (multiple of 25).
    pub easting: i64,
}

impl GridCell {
    /// Cell containing a projected coordinate.
    pub fn containing(x: f64, y: f64) -> Self {
        Self {
            northing: align(y),
            easting: align(x),
        }
    }

    /// Catalog key of this cell.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.northing, self.easting, CELL_SUFFIX)
    }
}

/// Snap a coordinate to the cell lattice: `floor(c / 100)` floored to a
/// multiple of 25.
pub fn align(coordinate: f64) -> i64 {
    let hundreds = (coordinate / 100.0).floor() as i64;
    hundreds.div_euclid(CELL_STEP) * CELL_STEP
}

/// Inclusive range of grid cells covering a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    /// South-west cell.
    pub min: GridCell,
    /// North-east cell.
    pub max: GridCell,
}

impl GridBounds {
    /// Grid-aligned bounds of a rectangle.
    pub fn from_rect(rect: &Rect<f64>) -> Self {
        Self {
            min: GridCell::containing(rect.min().x, rect.min().y),
            max: GridCell::containing(rect.max().x, rect.max().y),
        }
    }

    /// Every cell in the range, northing-major then easting.
    pub fn cells(&self) -> Vec<GridCell> {
        let northings = (self.min.northing..=self.max.northing).step_by(CELL_STEP as usize);
        let mut cells = Vec::new();
        for northing in northings {
            for easting in (self.min.easting..=self.max.easting).step_by(CELL_STEP as usize) {
                cells.push(GridCell { northing, easting });
            }
        }
        cells
    }
}
