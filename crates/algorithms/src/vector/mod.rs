//! Vector operations on polygon layers
//!
//! - Clip: intersect layers with a rectangular extent
//! - Rasterize: burn polygon attributes onto a raster grid

mod clip;
mod rasterize;

pub use clip::{clip_features, clip_polygon, ClipRect};
pub use rasterize::{polygon_mask, rasterize_polygons};
