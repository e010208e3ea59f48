//! Single-band rasters with an affine geotransform.
//!
//! GeoTIFF is handled by the `tiff` crate. MRF, the archive's native tile
//! format, is read through GDAL when the `gdal` feature is enabled.

mod geotiff;

#[cfg(feature = "gdal")]
mod gdal_reader;

pub use geotiff::{read_geotiff, write_geotiff};

use crate::Result;
use geo::Rect;
use ndarray::Array2;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Affine transform from pixel (col, row) to projected (x, y).
///
/// Coefficients follow the GDAL ordering:
/// `x = a0 + col * a1 + row * a2`, `y = a3 + col * a4 + row * a5`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X of the upper-left corner.
    pub origin_x: f64,
    /// Pixel width.
    pub pixel_width: f64,
    /// Row rotation (zero for north-up rasters).
    pub rotation_x: f64,
    /// Y of the upper-left corner.
    pub origin_y: f64,
    /// Column rotation (zero for north-up rasters).
    pub rotation_y: f64,
    /// Pixel height (negative for north-up rasters).
    pub pixel_height: f64,
}

impl GeoTransform {
    /// A north-up transform with square-ish pixels.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            rotation_x: 0.0,
            origin_y,
            rotation_y: 0.0,
            pixel_height: -pixel_height.abs(),
        }
    }

    /// Build from GDAL's six coefficients.
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            origin_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    /// GDAL's six coefficients.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.rotation_x,
            self.origin_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Whether the transform has no rotation terms.
    pub fn is_north_up(&self) -> bool {
        self.rotation_x == 0.0 && self.rotation_y == 0.0 && self.pixel_height < 0.0
    }

    /// Projected coordinate of a (fractional) pixel position.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.rotation_x,
            self.origin_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// Fractional pixel position of a projected coordinate (north-up only).
    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Transform of a window starting at (col, row).
    pub fn shifted(&self, col: usize, row: usize) -> Self {
        let (origin_x, origin_y) = self.apply(col as f64, row as f64);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }
}

/// A single-band raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    /// Pixel values, shape (rows, cols).
    pub data: Array2<f32>,
    /// Pixel to projected transform.
    pub transform: GeoTransform,
    /// No-data value, if any.
    pub nodata: Option<f32>,
    /// Coordinate reference system, e.g. `"EPSG:3006"` or WKT.
    pub crs: Option<String>,
}

impl Raster {
    /// Create a raster from its parts.
    pub fn new(data: Array2<f32>, transform: GeoTransform) -> Self {
        Self {
            data,
            transform,
            nodata: None,
            crs: None,
        }
    }

    /// Set the no-data value.
    pub fn with_nodata(mut self, nodata: Option<f32>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Set the coordinate reference system.
    pub fn with_crs(mut self, crs: Option<String>) -> Self {
        self.crs = crs;
        self
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Projected extent of a north-up raster.
    pub fn bounds(&self) -> Rect<f64> {
        let (x0, y0) = self.transform.apply(0.0, 0.0);
        let (x1, y1) = self
            .transform
            .apply(self.width() as f64, self.height() as f64);
        Rect::new(geo::coord! { x: x0, y: y0 }, geo::coord! { x: x1, y: y1 })
    }

    /// Whether a value equals the no-data value (NaN matches NaN).
    pub fn is_nodata(&self, value: f32) -> bool {
        matches_nodata(value, self.nodata)
    }
}

pub(crate) fn matches_nodata(value: f32, nodata: Option<f32>) -> bool {
    match nodata {
        Some(nd) if nd.is_nan() => value.is_nan(),
        Some(nd) => value == nd,
        None => false,
    }
}

/// Open a raster file.
///
/// TIFF files are recognised by their signature and read with
/// [`read_geotiff`] whatever their extension. Everything else (MRF tiles)
/// goes through GDAL when the `gdal` feature is enabled.
pub fn open_raster<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let path = path.as_ref();
    if is_tiff(path)? {
        return read_geotiff(path);
    }

    #[cfg(feature = "gdal")]
    {
        gdal_reader::read_with_gdal(path)
    }
    #[cfg(not(feature = "gdal"))]
    {
        Err(crate::SkogError::UnsupportedFormat(path.to_path_buf()))
    }
}

fn is_tiff(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
        Err(e) => return Err(e.into()),
    }
    // Classic TIFF (42) and BigTIFF (43), either byte order
    Ok(matches!(
        magic,
        [b'I', b'I', 42, 0] | [b'M', b'M', 0, 42] | [b'I', b'I', 43, 0] | [b'M', b'M', 0, 43]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SkogError;
    use ndarray::array;

    #[test]
    fn test_transform_roundtrip() {
        let gt = GeoTransform::north_up(500_000.0, 6_930_000.0, 2.0, 2.0);
        let (x, y) = gt.apply(10.0, 5.0);
        assert_eq!((x, y), (500_020.0, 6_929_990.0));
        assert_eq!(gt.invert(x, y), (10.0, 5.0));
        assert_eq!(GeoTransform::from_gdal(gt.to_gdal()), gt);
        assert!(gt.is_north_up());
    }

    #[test]
    fn test_shifted() {
        let gt = GeoTransform::north_up(100.0, 200.0, 1.0, 1.0);
        let shifted = gt.shifted(3, 4);
        assert_eq!(shifted.origin_x, 103.0);
        assert_eq!(shifted.origin_y, 196.0);
        assert_eq!(shifted.pixel_height, -1.0);
    }

    #[test]
    fn test_bounds() {
        let raster = Raster::new(
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            GeoTransform::north_up(100.0, 200.0, 10.0, 10.0),
        );
        let b = raster.bounds();
        assert_eq!((b.min().x, b.min().y, b.max().x, b.max().y), (100.0, 180.0, 130.0, 200.0));
    }

    #[test]
    fn test_nodata_matching() {
        assert!(matches_nodata(f32::NAN, Some(f32::NAN)));
        assert!(matches_nodata(255.0, Some(255.0)));
        assert!(!matches_nodata(0.0, None));
    }

    #[test]
    fn test_tiff_detected_by_signature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("THL_19E031_69300_5475_2019.mrf");
        let raster = Raster::new(array![[1.0, 2.0]], GeoTransform::north_up(0.0, 1.0, 1.0, 1.0));
        write_geotiff(&raster, &path).unwrap();

        assert_eq!(open_raster(&path).unwrap(), raster);
    }

    #[cfg(not(feature = "gdal"))]
    #[test]
    fn test_mrf_needs_gdal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.mrf");
        std::fs::write(&path, "<MRF_META></MRF_META>").unwrap();

        let err = open_raster(&path).unwrap_err();
        assert!(matches!(err, SkogError::UnsupportedFormat(_)));
    }
}
