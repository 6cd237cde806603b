//! Clipping operations
//!
//! Clip polygon layers by a rectangular extent using Sutherland-Hodgman.
//! Exterior and interior rings are clipped independently; rings that
//! collapse to nothing are dropped.

use ccm_core::vector::{Feature, FeatureCollection};
use ccm_core::{Error, Result};
use geo::{Area, Coord, Geometry, LineString, MultiPolygon, Polygon};
use tracing::debug;

/// A clipping rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ClipRect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// From `(min_x, min_y, max_x, max_y)` bounds, as returned by `Raster::bounds`
    pub fn from_bounds(bounds: (f64, f64, f64, f64)) -> Self {
        Self::new(bounds.0, bounds.1, bounds.2, bounds.3)
    }

    /// Whether two rectangles overlap with non-zero area
    pub fn intersects(&self, other: &ClipRect) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

impl From<geo::Rect<f64>> for ClipRect {
    fn from(rect: geo::Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// Edge of the clipping rectangle
#[derive(Debug, Clone, Copy)]
enum Edge {
    Left,
    Right,
    Bottom,
    Top,
}

impl Edge {
    fn is_inside(&self, p: &Coord<f64>, rect: &ClipRect) -> bool {
        match self {
            Edge::Left => p.x >= rect.min_x,
            Edge::Right => p.x <= rect.max_x,
            Edge::Bottom => p.y >= rect.min_y,
            Edge::Top => p.y <= rect.max_y,
        }
    }

    fn intersect(&self, p: &Coord<f64>, q: &Coord<f64>, rect: &ClipRect) -> Coord<f64> {
        let dx = q.x - p.x;
        let dy = q.y - p.y;

        match self {
            Edge::Left => {
                let t = (rect.min_x - p.x) / dx;
                Coord { x: rect.min_x, y: p.y + t * dy }
            }
            Edge::Right => {
                let t = (rect.max_x - p.x) / dx;
                Coord { x: rect.max_x, y: p.y + t * dy }
            }
            Edge::Bottom => {
                let t = (rect.min_y - p.y) / dy;
                Coord { x: p.x + t * dx, y: rect.min_y }
            }
            Edge::Top => {
                let t = (rect.max_y - p.y) / dy;
                Coord { x: p.x + t * dx, y: rect.max_y }
            }
        }
    }
}

/// Clip a ring against one edge (Sutherland-Hodgman step)
fn clip_ring_edge(vertices: &[Coord<f64>], edge: Edge, rect: &ClipRect) -> Vec<Coord<f64>> {
    let mut output = Vec::with_capacity(vertices.len() + 2);
    let n = vertices.len();

    for i in 0..n {
        let current = &vertices[i];
        let next = &vertices[(i + 1) % n];

        match (edge.is_inside(current, rect), edge.is_inside(next, rect)) {
            (true, true) => output.push(*next),
            (true, false) => output.push(edge.intersect(current, next, rect)),
            (false, true) => {
                output.push(edge.intersect(current, next, rect));
                output.push(*next);
            }
            (false, false) => {}
        }
    }

    output
}

/// Clip one ring; `None` when fewer than three vertices survive
fn clip_ring(ring: &LineString<f64>, rect: &ClipRect) -> Option<LineString<f64>> {
    let mut vertices: Vec<Coord<f64>> = ring.0.to_vec();

    // Remove closing vertex for algorithm
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    for edge in [Edge::Left, Edge::Right, Edge::Bottom, Edge::Top] {
        vertices = clip_ring_edge(&vertices, edge, rect);
        if vertices.len() < 3 {
            return None;
        }
    }

    vertices.push(vertices[0]);
    Some(LineString::new(vertices))
}

/// Clip a polygon by a rectangular extent.
///
/// Returns `None` when nothing of non-zero area remains.
pub fn clip_polygon(polygon: &Polygon<f64>, rect: ClipRect) -> Option<Polygon<f64>> {
    let exterior = clip_ring(polygon.exterior(), &rect)?;
    let interiors = polygon
        .interiors()
        .iter()
        .filter_map(|ring| clip_ring(ring, &rect))
        .collect();

    let clipped = Polygon::new(exterior, interiors);
    (clipped.unsigned_area() > 0.0).then_some(clipped)
}

/// Clip every polygon of a layer by `rect`.
///
/// Features keep their attributes and id; features with nothing left inside
/// the rectangle are dropped. A layer with no polygon inside `rect` is an
/// error, since nothing downstream could be rasterized.
pub fn clip_features(layer: &FeatureCollection, rect: ClipRect) -> Result<FeatureCollection> {
    let mut clipped = FeatureCollection {
        features: Vec::with_capacity(layer.len()),
        crs: layer.crs.clone(),
    };

    for feature in layer.iter() {
        let parts: Vec<Polygon<f64>> = feature
            .polygons()
            .into_iter()
            .filter_map(|p| clip_polygon(p, rect))
            .collect();

        let geometry = match parts.len() {
            0 => continue,
            1 => parts.into_iter().next().map(Geometry::Polygon),
            _ => Some(Geometry::MultiPolygon(MultiPolygon::new(parts))),
        };

        clipped.push(Feature {
            geometry,
            properties: feature.properties.clone(),
            id: feature.id.clone(),
        });
    }

    debug!(input = layer.len(), kept = clipped.len(), "clipped layer to extent");

    if clipped.is_empty() {
        return Err(Error::external(
            "clip",
            format!(
                "no polygon of the layer ({} features) intersects [{}, {}, {}, {}]",
                layer.len(),
                rect.min_x,
                rect.min_y,
                rect.max_x,
                rect.max_y
            ),
        ));
    }

    Ok(clipped)
}
