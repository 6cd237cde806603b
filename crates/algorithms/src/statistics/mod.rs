//! Statistical analysis of rasters
//!
//! - Focal statistics: moving window statistics

mod focal;

pub use focal::{focal_statistics, FocalParams, FocalStatistic};
