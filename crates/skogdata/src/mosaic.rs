//! Merging tiles into a mosaic and cropping it to a box.

use crate::raster::{matches_nodata, GeoTransform, Raster};
use crate::{Result, SkogError};
use geo::Rect;
use ndarray::{s, Array2};

/// Merge rasters into one covering the union of their extents.
///
/// The output uses the resolution, CRS and no-data value of the first
/// raster. Rasters are painted in order and a pixel is only written while
/// the output still holds the fill value (the no-data value, or 0 when there
/// is none) and the source pixel is valid, so the first valid value wins.
/// Sources are sampled at the output pixel centres (nearest neighbour).
pub fn merge(rasters: &[Raster]) -> Result<Raster> {
    let first = rasters
        .first()
        .ok_or_else(|| SkogError::IncompatibleRasters("nothing to merge".to_string()))?;
    if let Some(r) = rasters.iter().find(|r| !r.transform.is_north_up()) {
        return Err(SkogError::IncompatibleRasters(format!(
            "rotated transform {:?}",
            r.transform
        )));
    }

    let res_x = first.transform.pixel_width;
    let res_y = -first.transform.pixel_height;

    let extent = rasters
        .iter()
        .map(Raster::bounds)
        .reduce(|a, b| {
            Rect::new(
                geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        })
        .unwrap_or_else(|| first.bounds());

    let width = (extent.width() / res_x).round() as usize;
    let height = (extent.height() / res_y).round() as usize;
    let transform = GeoTransform::north_up(extent.min().x, extent.max().y, res_x, res_y);

    let nodata = first.nodata;
    let fill = nodata.unwrap_or(0.0);
    let mut data = Array2::from_elem((height, width), fill);

    log::debug!(
        "Merging {} raster(s) into {}x{} mosaic at {:?}",
        rasters.len(),
        width,
        height,
        transform
    );

    for src in rasters {
        let cols: Vec<Option<usize>> = (0..width)
            .map(|c| {
                let (x, _) = transform.apply(c as f64 + 0.5, 0.0);
                sample_index(src.transform.invert(x, src.transform.origin_y).0, src.width())
            })
            .collect();
        let rows: Vec<Option<usize>> = (0..height)
            .map(|r| {
                let (_, y) = transform.apply(0.0, r as f64 + 0.5);
                sample_index(src.transform.invert(src.transform.origin_x, y).1, src.height())
            })
            .collect();

        for (r, src_row) in rows.iter().enumerate() {
            let Some(src_row) = *src_row else { continue };
            for (c, src_col) in cols.iter().enumerate() {
                let Some(src_col) = *src_col else { continue };
                let value = src.data[[src_row, src_col]];
                let dst = &mut data[[r, c]];
                if is_unfilled(*dst, fill) && !src.is_nodata(value) {
                    *dst = value;
                }
            }
        }
    }

    Ok(Raster {
        data,
        transform,
        nodata,
        crs: first.crs.clone(),
    })
}

fn is_unfilled(value: f32, fill: f32) -> bool {
    matches_nodata(value, Some(fill))
}

fn sample_index(position: f64, len: usize) -> Option<usize> {
    if position < 0.0 {
        return None;
    }
    let index = position.floor() as usize;
    (index < len).then_some(index)
}

/// Crop a raster to the pixel window covering `rect` and mask what lies
/// outside it.
///
/// The window spans the rectangle rounded outwards to whole pixels and is
/// clipped to the raster. Pixels of the window whose centre falls outside
/// the rectangle are set to the raster's no-data value (0 when unset).
pub fn crop_to_rect(raster: &Raster, rect: &Rect<f64>) -> Result<Raster> {
    let t = &raster.transform;
    if !t.is_north_up() {
        return Err(SkogError::IncompatibleRasters(format!("rotated transform {t:?}")));
    }

    let (c0, r0) = t.invert(rect.min().x, rect.max().y);
    let (c1, r1) = t.invert(rect.max().x, rect.min().y);

    let col_start = c0.min(c1).floor().max(0.0) as i64;
    let col_stop = (c0.max(c1).ceil() as i64).min(raster.width() as i64);
    let row_start = r0.min(r1).floor().max(0.0) as i64;
    let row_stop = (r0.max(r1).ceil() as i64).min(raster.height() as i64);

    if col_stop <= col_start || row_stop <= row_start {
        return Err(SkogError::NoOverlap);
    }
    let (col_start, col_stop) = (col_start as usize, col_stop as usize);
    let (row_start, row_stop) = (row_start as usize, row_stop as usize);

    let transform = t.shifted(col_start, row_start);
    let fill = raster.nodata.unwrap_or(0.0);
    let mut data = raster
        .data
        .slice(s![row_start..row_stop, col_start..col_stop])
        .to_owned();

    for ((r, c), value) in data.indexed_iter_mut() {
        let (x, y) = transform.apply(c as f64 + 0.5, r as f64 + 0.5);
        let inside = x >= rect.min().x && x <= rect.max().x && y >= rect.min().y && y <= rect.max().y;
        if !inside {
            *value = fill;
        }
    }

    Ok(Raster {
        data,
        transform,
        nodata: raster.nodata,
        crs: raster.crs.clone(),
    })
}
