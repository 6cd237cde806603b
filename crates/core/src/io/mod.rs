//! Raster I/O
//!
//! Native GeoTIFF reading and writing. Output is always 32-bit float with
//! NaN as NODATA, the format every downstream GIS reads without help.

mod native;

pub use native::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer, GeoTiffOptions};
