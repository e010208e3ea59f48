//! Query geometries and vector features.

use crate::{Result, SkogError};
use geo::{BoundingRect, Geometry, MultiPolygon, Polygon, Rect};
use std::collections::BTreeMap;
use std::str::FromStr;

/// A single attribute value read from a vector dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Character field.
    Text(String),
    /// Integer field.
    Integer(i64),
    /// Numeric or floating point field.
    Number(f64),
    /// Logical field.
    Bool(bool),
    /// Empty or unsupported field.
    Null,
}

impl AttributeValue {
    /// Text content, if this is a character field.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s.trim()),
            _ => None,
        }
    }

    /// Integral value of a numeric field. Fractions are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            AttributeValue::Number(v) if v.is_finite() => Some(*v as i64),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A vector feature: optional geometry plus named attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    /// Geometry payload, absent for attribute-only rows.
    pub geometry: Option<Geometry<f64>>,
    /// Attributes keyed by column name.
    pub properties: BTreeMap<String, AttributeValue>,
}

impl Feature {
    /// Create a feature from a geometry with no attributes.
    pub fn new(geometry: Option<Geometry<f64>>) -> Self {
        Self {
            geometry,
            properties: BTreeMap::new(),
        }
    }

    /// Look up an attribute by column name.
    pub fn property(&self, name: &str) -> Option<&AttributeValue> {
        self.properties.get(name)
    }
}

/// Geometry accepted by query operations.
///
/// Callers may pass a bare polygon or a feature wrapping one; every entry
/// point normalizes with [`QueryGeometry::normalize`] before doing any work.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryGeometry {
    /// A single polygon.
    Polygon(Polygon<f64>),
    /// A multipolygon.
    MultiPolygon(MultiPolygon<f64>),
    /// A feature whose geometry is used.
    Feature(Feature),
}

impl From<Polygon<f64>> for QueryGeometry {
    fn from(polygon: Polygon<f64>) -> Self {
        QueryGeometry::Polygon(polygon)
    }
}

impl From<MultiPolygon<f64>> for QueryGeometry {
    fn from(polygon: MultiPolygon<f64>) -> Self {
        QueryGeometry::MultiPolygon(polygon)
    }
}

impl From<Rect<f64>> for QueryGeometry {
    fn from(rect: Rect<f64>) -> Self {
        QueryGeometry::Polygon(rect.to_polygon())
    }
}

impl From<Feature> for QueryGeometry {
    fn from(feature: Feature) -> Self {
        QueryGeometry::Feature(feature)
    }
}

impl QueryGeometry {
    /// Reduce to a bare geometry.
    ///
    /// Fails with [`SkogError::InvalidGeometry`] when a feature carries no
    /// geometry.
    pub fn normalize(&self) -> Result<Geometry<f64>> {
        match self {
            QueryGeometry::Polygon(p) => Ok(Geometry::Polygon(p.clone())),
            QueryGeometry::MultiPolygon(mp) => Ok(Geometry::MultiPolygon(mp.clone())),
            QueryGeometry::Feature(feature) => feature
                .geometry
                .clone()
                .ok_or_else(|| SkogError::InvalidGeometry("Feature geometry is None".into())),
        }
    }

    /// Bounding box of the normalized geometry.
    pub fn bounds(&self) -> Result<Rect<f64>> {
        self.normalize()?
            .bounding_rect()
            .ok_or_else(|| SkogError::InvalidGeometry("geometry is empty".into()))
    }

    /// The bounding rectangle as a polygon.
    pub fn envelope(&self) -> Result<QueryGeometry> {
        Ok(QueryGeometry::Polygon(self.bounds()?.to_polygon()))
    }

    /// Parse a WKT polygon or multipolygon.
    pub fn from_wkt(text: &str) -> Result<Self> {
        let parsed = wkt::Wkt::<f64>::from_str(text.trim())
            .map_err(|e| SkogError::InvalidGeometry(format!("WKT: {e}")))?;
        let geometry = Geometry::<f64>::try_from(parsed)
            .map_err(|e| SkogError::InvalidGeometry(format!("WKT: {e}")))?;
        Self::from_geometry(geometry)
    }

    /// Parse a GeoJSON geometry, feature, or single-feature collection.
    pub fn from_geojson(text: &str) -> Result<Self> {
        let parsed = geojson::GeoJson::from_str(text)
            .map_err(|e| SkogError::InvalidGeometry(format!("GeoJSON: {e}")))?;

        let to_geo = |g: geojson::Geometry| {
            Geometry::<f64>::try_from(g)
                .map_err(|e| SkogError::InvalidGeometry(format!("GeoJSON: {e}")))
        };

        match parsed {
            geojson::GeoJson::Geometry(g) => Self::from_geometry(to_geo(g)?),
            geojson::GeoJson::Feature(f) => {
                let geometry = f.geometry.map(to_geo).transpose()?;
                Ok(QueryGeometry::Feature(Feature::new(geometry)))
            }
            geojson::GeoJson::FeatureCollection(fc) => match fc.features.len() {
                1 => {
                    let feature = fc.features.into_iter().next();
                    let geometry = feature.and_then(|f| f.geometry).map(to_geo).transpose()?;
                    Ok(QueryGeometry::Feature(Feature::new(geometry)))
                }
                n => Err(SkogError::InvalidGeometry(format!(
                    "expected exactly one feature, found {n}"
                ))),
            },
        }
    }

    fn from_geometry(geometry: Geometry<f64>) -> Result<Self> {
        match geometry {
            Geometry::Polygon(p) => Ok(QueryGeometry::Polygon(p)),
            Geometry::MultiPolygon(mp) => Ok(QueryGeometry::MultiPolygon(mp)),
            Geometry::Rect(r) => Ok(QueryGeometry::Polygon(r.to_polygon())),
            other => Err(SkogError::InvalidGeometry(format!(
                "expected a polygon, got {other:?}"
            ))),
        }
    }
}

/// Expand a rectangle by `distance` on every side.
///
/// Equals the bounding box of the rectangle buffered by `distance`.
pub fn pad_rect(rect: &Rect<f64>, distance: f64) -> Rect<f64> {
    Rect::new(
        geo::coord! { x: rect.min().x - distance, y: rect.min().y - distance },
        geo::coord! { x: rect.max().x + distance, y: rect.max().y + distance },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square() -> Polygon<f64> {
        polygon![
            (x: 10.0, y: 20.0),
            (x: 30.0, y: 20.0),
            (x: 30.0, y: 50.0),
            (x: 10.0, y: 50.0),
        ]
    }

    #[test]
    fn test_feature_without_geometry_is_invalid() {
        let query = QueryGeometry::Feature(Feature::new(None));
        assert!(matches!(query.normalize(), Err(SkogError::InvalidGeometry(_))));
        assert!(matches!(query.bounds(), Err(SkogError::InvalidGeometry(_))));
    }

    #[test]
    fn test_feature_and_polygon_agree() {
        let plain = QueryGeometry::from(square());
        let wrapped = QueryGeometry::Feature(Feature::new(Some(Geometry::Polygon(square()))));
        assert_eq!(plain.bounds().unwrap(), wrapped.bounds().unwrap());
    }

    #[test]
    fn test_envelope() {
        let env = QueryGeometry::from(square()).envelope().unwrap();
        let rect = env.bounds().unwrap();
        assert_eq!(rect.min().x, 10.0);
        assert_eq!(rect.max().y, 50.0);
    }

    #[test]
    fn test_pad_rect() {
        let rect = QueryGeometry::from(square()).bounds().unwrap();
        let padded = pad_rect(&rect, 20.0);
        assert_eq!(padded.min().x, -10.0);
        assert_eq!(padded.min().y, 0.0);
        assert_eq!(padded.max().x, 50.0);
        assert_eq!(padded.max().y, 70.0);
    }

    #[test]
    fn test_from_wkt() {
        let query = QueryGeometry::from_wkt("POLYGON ((0 0, 10 0, 10 5, 0 5, 0 0))").unwrap();
        let rect = query.bounds().unwrap();
        assert_eq!(rect.width(), 10.0);
        assert_eq!(rect.height(), 5.0);

        assert!(QueryGeometry::from_wkt("POINT (1 2)").is_err());
    }

    #[test]
    fn test_from_geojson_feature_without_geometry() {
        let text = r#"{"type": "Feature", "geometry": null, "properties": {}}"#;
        let query = QueryGeometry::from_geojson(text).unwrap();
        assert!(matches!(query.normalize(), Err(SkogError::InvalidGeometry(_))));
    }

    #[test]
    fn test_attribute_conversions() {
        assert_eq!(AttributeValue::Number(18123.0).as_i64(), Some(18123));
        assert_eq!(AttributeValue::Text(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(AttributeValue::Text("abc ".into()).as_str(), Some("abc"));
        assert_eq!(AttributeValue::Null.as_i64(), None);
    }
}
