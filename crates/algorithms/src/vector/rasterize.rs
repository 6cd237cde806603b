//! Polygon to raster conversion
//!
//! A cell takes a polygon's value when the cell centre lies strictly inside
//! the polygon (holes excluded). Where polygons overlap, the first feature
//! in layer order wins.

use crate::maybe_rayon::*;
use ccm_core::raster::{Raster, RasterElement};
use ccm_core::vector::FeatureCollection;
use ccm_core::{AttributeValue, Result};
use geo::{BoundingRect, Contains, MultiPolygon, Point, Polygon, Rect};

/// A polygon ready to be burnt into a grid
struct Shape<'a> {
    polygon: &'a Polygon<f64>,
    bbox: Rect<f64>,
    value: f64,
}

impl<'a> Shape<'a> {
    fn new(polygon: &'a Polygon<f64>, value: f64) -> Option<Self> {
        let bbox = polygon.bounding_rect()?;
        Some(Self { polygon, bbox, value })
    }
}

/// First shape value at every cell centre of `template`, NaN elsewhere
fn burn<T: RasterElement>(shapes: &[Shape<'_>], template: &Raster<T>) -> Vec<f64> {
    let (rows, cols) = template.shape();
    let transform = *template.transform();

    (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let (_, y) = transform.pixel_to_geo(0, row);

            let candidates: Vec<&Shape<'_>> = shapes
                .iter()
                .filter(|s| y >= s.bbox.min().y && y <= s.bbox.max().y)
                .collect();
            if candidates.is_empty() {
                return row_data;
            }

            for (col, out) in row_data.iter_mut().enumerate() {
                let (x, _) = transform.pixel_to_geo(col, row);
                let centre = Point::new(x, y);
                let hit = candidates.iter().find(|s| {
                    x >= s.bbox.min().x && x <= s.bbox.max().x && s.polygon.contains(&centre)
                });
                if let Some(shape) = hit {
                    *out = shape.value;
                }
            }

            row_data
        })
        .collect()
}

/// 1 where the cell centre lies inside `area`, 0 elsewhere
pub fn polygon_mask<T: RasterElement>(area: &MultiPolygon<f64>, template: &Raster<T>) -> Result<Raster<u8>> {
    let shapes: Vec<Shape<'_>> = area.0.iter().filter_map(|p| Shape::new(p, 1.0)).collect();
    let data = burn(&shapes, template)
        .into_iter()
        .map(|v| u8::from(!v.is_nan()))
        .collect();
    template.derive(data, None)
}

/// Burn the numeric attribute `field` of every feature onto the grid of
/// `template`.
///
/// Cells not covered by any feature, and cells covered only by features
/// whose `field` is missing or non-numeric, are NODATA (NaN).
pub fn rasterize_polygons<T: RasterElement>(
    layer: &FeatureCollection,
    field: &str,
    template: &Raster<T>,
) -> Result<Raster<f64>> {
    let shapes: Vec<Shape<'_>> = layer
        .iter()
        .filter_map(|f| {
            let value = f.get_property(field).and_then(AttributeValue::as_f64)?;
            Some(f.polygons().into_iter().filter_map(move |p| Shape::new(p, value)))
        })
        .flatten()
        .collect();

    template.derive(burn(&shapes, template), Some(f64::NAN))
}
