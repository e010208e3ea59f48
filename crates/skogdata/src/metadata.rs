//! The tile metadata catalog.
//!
//! One record per archived tile: the grid cell it belongs to, its
//! identifier, the acquisition day and its footprint. Several records can
//! share a cell when an area has been flown more than once.

use crate::geometry::Feature;
use crate::{Result, SkogError};
use geo::{BooleanOps, Geometry, MultiPolygon};
use std::collections::{BTreeMap, HashSet};

/// Column holding the grid-cell key.
pub const SQUARE_COLUMN: &str = "square";

/// Column holding the acquisition day.
pub const UNIXDAY_COLUMN: &str = "Unixday";

/// Column holding the tile identifier.
pub const LASNAMN_COLUMN: &str = "Las_namn";

/// One row of the metadata catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRecord {
    /// Grid-cell key, e.g. `"69300_5475_25"`.
    pub square: String,
    /// Tile identifier, e.g. `"19E031_69300_5475_25"`.
    pub las_namn: String,
    /// Acquisition day (days since the Unix epoch).
    pub unixday: i64,
    /// Tile footprint.
    pub footprint: MultiPolygon<f64>,
}

/// In-memory metadata table.
#[derive(Debug, Clone, Default)]
pub struct TileMetadata {
    records: Vec<TileRecord>,
    squares: HashSet<String>,
}

impl TileMetadata {
    /// Build the table from records, keeping their order.
    pub fn from_records(records: Vec<TileRecord>) -> Self {
        let squares = records.iter().map(|r| r.square.clone()).collect();
        Self { records, squares }
    }

    /// Build the table from vector features carrying the catalog columns.
    pub fn from_features(features: Vec<Feature>) -> Result<Self> {
        let mut records = Vec::with_capacity(features.len());

        for (index, feature) in features.into_iter().enumerate() {
            let missing = |field: &str| SkogError::MissingAttribute {
                index,
                field: field.to_string(),
            };

            let square = feature
                .property(SQUARE_COLUMN)
                .and_then(|v| v.as_str())
                .ok_or_else(|| missing(SQUARE_COLUMN))?
                .to_string();
            let las_namn = feature
                .property(LASNAMN_COLUMN)
                .and_then(|v| v.as_str())
                .ok_or_else(|| missing(LASNAMN_COLUMN))?
                .to_string();
            let unixday = feature
                .property(UNIXDAY_COLUMN)
                .and_then(|v| v.as_i64())
                .ok_or_else(|| missing(UNIXDAY_COLUMN))?;

            let footprint = match feature.geometry {
                Some(Geometry::Polygon(p)) => MultiPolygon::new(vec![p]),
                Some(Geometry::MultiPolygon(mp)) => mp,
                Some(Geometry::Rect(r)) => MultiPolygon::new(vec![r.to_polygon()]),
                _ => return Err(missing("geometry")),
            };

            records.push(TileRecord {
                square,
                las_namn,
                unixday,
                footprint,
            });
        }

        Ok(Self::from_records(records))
    }

    /// All records in catalog order.
    pub fn records(&self) -> &[TileRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any tile is registered for the cell key.
    pub fn has_square(&self, square: &str) -> bool {
        self.squares.contains(square)
    }

    /// The most recent tile identifier of each requested cell.
    ///
    /// Returns one identifier per requested cell that has records, ordered by
    /// cell key. Within a cell the record with the largest `unixday` wins; on
    /// equal days the record that comes first in the catalog is kept.
    pub fn latest_per_square(&self, squares: &[String]) -> Vec<String> {
        let wanted: HashSet<&str> = squares.iter().map(String::as_str).collect();
        let mut winners: BTreeMap<&str, &TileRecord> = BTreeMap::new();

        for record in self.records.iter().filter(|r| wanted.contains(r.square.as_str())) {
            winners
                .entry(record.square.as_str())
                .and_modify(|best| {
                    if record.unixday > best.unixday {
                        *best = record;
                    }
                })
                .or_insert(record);
        }

        winners.into_values().map(|r| r.las_namn.clone()).collect()
    }

    /// Union of every footprint in the catalog.
    pub fn union_footprints(&self) -> MultiPolygon<f64> {
        self.records
            .iter()
            .fold(MultiPolygon::new(Vec::new()), |acc, r| acc.union(&r.footprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::AttributeValue;
    use geo::{polygon, Area};

    fn record(square: &str, las_namn: &str, unixday: i64) -> TileRecord {
        TileRecord {
            square: square.to_string(),
            las_namn: las_namn.to_string(),
            unixday,
            footprint: MultiPolygon::new(vec![]),
        }
    }

    #[test]
    fn test_latest_per_square_picks_most_recent() {
        let table = TileMetadata::from_records(vec![
            record("69300_5450_25", "17A001_69300_5450_25", 17_500),
            record("69300_5425_25", "19E031_69300_5425_25", 18_000),
            record("69300_5450_25", "19E031_69300_5450_25", 18_000),
            record("69300_5425_25", "15B002_69300_5425_25", 16_000),
        ]);

        let squares = vec!["69300_5450_25".to_string(), "69300_5425_25".to_string()];
        assert_eq!(
            table.latest_per_square(&squares),
            vec!["19E031_69300_5425_25", "19E031_69300_5450_25"]
        );
    }

    #[test]
    fn test_tie_keeps_first_in_catalog_order() {
        let table = TileMetadata::from_records(vec![
            record("69300_5475_25", "19E031_69300_5475_25", 18_000),
            record("69300_5475_25", "19E099_69300_5475_25", 18_000),
        ]);
        let squares = vec!["69300_5475_25".to_string()];
        assert_eq!(table.latest_per_square(&squares), vec!["19E031_69300_5475_25"]);
    }

    #[test]
    fn test_unrequested_squares_are_ignored() {
        let table = TileMetadata::from_records(vec![
            record("69300_5475_25", "19E031_69300_5475_25", 18_000),
            record("69325_5475_25", "19E031_69325_5475_25", 18_000),
        ]);
        let squares = vec!["69325_5475_25".to_string()];
        assert_eq!(table.latest_per_square(&squares), vec!["19E031_69325_5475_25"]);
        assert!(table.has_square("69300_5475_25"));
        assert!(!table.has_square("69350_5475_25"));
    }

    #[test]
    fn test_from_features() {
        let mut feature = Feature::new(Some(Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 2500.0, y: 0.0),
            (x: 2500.0, y: 2500.0),
            (x: 0.0, y: 2500.0),
        ])));
        feature
            .properties
            .insert(SQUARE_COLUMN.into(), AttributeValue::Text("0_0_25".into()));
        feature
            .properties
            .insert(LASNAMN_COLUMN.into(), AttributeValue::Text("20A001_0_0_25".into()));
        feature
            .properties
            .insert(UNIXDAY_COLUMN.into(), AttributeValue::Number(18_500.0));

        let table = TileMetadata::from_features(vec![feature]).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].unixday, 18_500);
        approx::assert_relative_eq!(table.union_footprints().unsigned_area(), 2500.0 * 2500.0);
    }

    #[test]
    fn test_from_features_missing_column() {
        let feature = Feature::new(None);
        let err = TileMetadata::from_features(vec![feature]).unwrap_err();
        assert!(matches!(err, SkogError::MissingAttribute { index: 0, .. }));
    }
}
