//! Factor composition

use super::factors::Factor;
use crate::algebra;
use ccm_core::raster::Raster;
use ccm_core::{Error, Result};
use std::ops::RangeInclusive;

/// Allowed number of factors in one composition
pub const FACTOR_COUNT: RangeInclusive<usize> = 2..=5;

/// Multiply factors cell by cell, left to right.
///
/// NODATA in any factor gives NODATA. Fewer than two or more than five
/// factors is an error.
pub fn combine(factors: &[Factor]) -> Result<Raster<f64>> {
    match factors.split_first() {
        Some((first, rest)) if FACTOR_COUNT.contains(&factors.len()) => rest
            .iter()
            .try_fold(first.raster.clone(), |acc, factor| algebra::multiply(&acc, &factor.raster)),
        _ => Err(Error::InvalidFactorCount {
            count: factors.len(),
            factors: factors.iter().map(|f| f.kind.to_string()).collect(),
        }),
    }
}
