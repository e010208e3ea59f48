//! GeoTIFF reading and writing through the `tiff` crate.

use super::{GeoTransform, Raster};
use crate::{Result, SkogError};
use ndarray::Array2;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Read a single-band GeoTIFF.
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut decoder = Decoder::new(file)?;

    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.ifd_value_size = 1024 * 1024 * 1024;
    decoder = decoder.with_limits(limits);

    let (width, height) = decoder.dimensions()?;
    let transform = read_geotransform(&mut decoder, path)?;
    let nodata = read_nodata_value(&mut decoder);
    let crs = read_epsg(&mut decoder).map(|code| format!("EPSG:{code}"));

    let data = decode_band(&mut decoder)?;
    let expected = width as usize * height as usize;
    if data.len() != expected {
        return Err(SkogError::InvalidGeoTiff(format!(
            "{}: expected {} samples for a single band, found {}",
            path.display(),
            expected,
            data.len()
        )));
    }
    let data = Array2::from_shape_vec((height as usize, width as usize), data)
        .map_err(|e| SkogError::InvalidGeoTiff(e.to_string()))?;

    Ok(Raster {
        data,
        transform,
        nodata,
        crs,
    })
}

/// Read the geotransform from ModelTransformation or ModelTiepoint +
/// ModelPixelScale.
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if m.len() >= 8 {
            return Ok(GeoTransform {
                origin_x: m[3],
                pixel_width: m[0],
                rotation_x: m[1],
                origin_y: m[7],
                rotation_y: m[4],
                pixel_height: m[5],
            });
        }
    }

    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);
    let pixel_scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);

    if let (Ok(tiepoint), Ok(scale)) = (tiepoint, pixel_scale) {
        if tiepoint.len() >= 6 && scale.len() >= 2 {
            // Tiepoint format: [i, j, k, x, y, z] where (i,j) is pixel coords and (x,y) is model coords
            let (i, j) = (tiepoint[0], tiepoint[1]);
            let (x, y) = (tiepoint[3], tiepoint[4]);
            return Ok(GeoTransform::north_up(
                x - i * scale[0],
                y + j * scale[1],
                scale[0],
                scale[1],
            ));
        }
    }

    Err(SkogError::InvalidGeoTiff(format!(
        "{}: no georeferencing tags",
        path.display()
    )))
}

/// Decode the pixel data, converting to f32.
fn decode_band<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
    let result = decoder.read_image()?;

    match result {
        DecodingResult::F32(data) => Ok(data),
        DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
    }
}

/// GDAL_NODATA is stored as an ASCII string.
fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim().trim_end_matches('\0').parse().ok())
}

/// EPSG code from the GeoKey directory, if it names one.
fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u16> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    // Header: version, revision, minor, number of keys; then 4 shorts per key
    let count = *keys.get(3)? as usize;
    let entries = keys.get(4..4 + count * 4)?;

    let lookup = |wanted: u16| {
        entries
            .chunks_exact(4)
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| e[3])
    };
    lookup(PROJECTED_CS_TYPE_KEY)
        .or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
        .filter(|code| *code != 0 && *code != 32767)
}

/// Write a raster as a single-band float32 GeoTIFF.
pub fn write_geotiff<P: AsRef<Path>>(raster: &Raster, path: P) -> Result<()> {
    let t = &raster.transform;
    if !t.is_north_up() {
        return Err(SkogError::InvalidGeoTiff(
            "only north-up rasters can be written".to_string(),
        ));
    }

    let width = raster.width() as u32;
    let height = raster.height() as u32;
    let samples: Vec<f32> = raster.data.iter().copied().collect();

    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let mut image = encoder.new_image::<colortype::Gray32Float>(width, height)?;

    let scale = [t.pixel_width, -t.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    let epsg = raster
        .crs
        .as_deref()
        .and_then(|crs| crs.strip_prefix("EPSG:"))
        .and_then(|code| code.parse::<u16>().ok());
    if let Some(code) = epsg {
        let keys: [u16; 16] = [
            1, 1, 0, 3,
            GT_MODEL_TYPE_KEY, 0, 1, 1,
            GT_RASTER_TYPE_KEY, 0, 1, 1,
            PROJECTED_CS_TYPE_KEY, 0, 1, code,
        ];
        image
            .encoder()
            .write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;
    }

    if let Some(nodata) = raster.nodata {
        let text = nodata.to_string();
        image
            .encoder()
            .write_tag(Tag::GdalNodata, text.as_str())?;
    }

    image.write_data(&samples)?;
    Ok(())
}
