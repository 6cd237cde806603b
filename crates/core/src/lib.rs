//! # CCM Core
//!
//! Core types and I/O for cross-country mobility analysis.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling
//! - `FeatureCollection`: Polygon features with attributes, read from GeoJSON
//! - `AttributeTable`: Parameter and lookup tables, read from JSON
//! - Native GeoTIFF I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod table;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use table::AttributeTable;
pub use vector::{AttributeValue, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::table::AttributeTable;
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
}
