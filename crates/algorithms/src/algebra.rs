//! Raster algebra
//!
//! Cell-wise arithmetic, comparison and conditional operations. Every
//! operation returns a new raster on the grid of its primary operand,
//! with NaN as NODATA. NODATA in any input cell gives NODATA in the
//! output cell; division by zero gives NODATA as well.
//!
//! Boolean results (`greater_equal`, `is_null`) are `Raster<u8>` masks
//! holding 0 or 1 and no NODATA.

use crate::maybe_rayon::*;
use ccm_core::raster::{Raster, RasterElement};
use ccm_core::{Error, Result};

/// Binary operations between two operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgebraOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl AlgebraOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            AlgebraOp::Add => a + b,
            AlgebraOp::Subtract => a - b,
            AlgebraOp::Multiply => a * b,
            AlgebraOp::Divide => {
                if b == 0.0 {
                    f64::NAN
                } else {
                    a / b
                }
            }
        }
    }
}

/// One side of an algebra expression: a raster or a constant
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Raster(&'a Raster<f64>),
    Scalar(f64),
}

impl<'a> From<&'a Raster<f64>> for Operand<'a> {
    fn from(r: &'a Raster<f64>) -> Self {
        Operand::Raster(r)
    }
}

impl From<f64> for Operand<'_> {
    fn from(v: f64) -> Self {
        Operand::Scalar(v)
    }
}

impl Operand<'_> {
    #[inline]
    fn at(&self, row: usize, col: usize) -> f64 {
        match self {
            Operand::Raster(r) => value_at(r, row, col),
            Operand::Scalar(v) => *v,
        }
    }

    fn check_grid<T: RasterElement>(&self, grid: &Raster<T>) -> Result<()> {
        match self {
            Operand::Raster(r) => grid.ensure_same_grid(*r),
            Operand::Scalar(_) => Ok(()),
        }
    }
}

/// Cell value with NODATA normalised to NaN
#[inline]
fn value_at(raster: &Raster<f64>, row: usize, col: usize) -> f64 {
    let v = unsafe { raster.get_unchecked(row, col) };
    if raster.is_nodata(v) {
        f64::NAN
    } else {
        v
    }
}

/// Evaluate `f` for every cell of `grid`, row-parallel when enabled
fn evaluate<T, U, F>(grid: &Raster<T>, nodata: Option<U>, f: F) -> Result<Raster<U>>
where
    T: RasterElement,
    U: RasterElement,
    F: Fn(usize, usize) -> U + Sync + Send,
{
    let (rows, cols) = grid.shape();

    let data: Vec<U> = (0..rows)
        .into_par_iter()
        .flat_map(|row| (0..cols).map(|col| f(row, col)).collect::<Vec<U>>())
        .collect();

    grid.derive(data, nodata)
}

/// Apply a unary function to every valid cell. NODATA cells stay NODATA.
pub fn map<F>(raster: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    evaluate(raster, Some(f64::NAN), |row, col| {
        let v = value_at(raster, row, col);
        if v.is_nan() {
            f64::NAN
        } else {
            f(v)
        }
    })
}

/// Apply `op` between two operands. At least one must be a raster; the
/// first raster operand defines the output grid.
pub fn apply(a: Operand<'_>, b: Operand<'_>, op: AlgebraOp) -> Result<Raster<f64>> {
    let grid = match (a, b) {
        (Operand::Raster(r), _) | (_, Operand::Raster(r)) => r,
        (Operand::Scalar(_), Operand::Scalar(_)) => {
            return Err(Error::Algorithm("raster algebra needs at least one raster operand".into()))
        }
    };
    a.check_grid(grid)?;
    b.check_grid(grid)?;

    evaluate(grid, Some(f64::NAN), |row, col| {
        let va = a.at(row, col);
        let vb = b.at(row, col);
        if va.is_nan() || vb.is_nan() {
            f64::NAN
        } else {
            op.apply(va, vb)
        }
    })
}

/// `a + b`
pub fn add<'a>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
    apply(a.into(), b.into(), AlgebraOp::Add)
}

/// `a - b`
pub fn subtract<'a>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
    apply(a.into(), b.into(), AlgebraOp::Subtract)
}

/// `a * b`
pub fn multiply<'a>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
    apply(a.into(), b.into(), AlgebraOp::Multiply)
}

/// `a / b`; zero divisors give NODATA
pub fn divide<'a>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
    apply(a.into(), b.into(), AlgebraOp::Divide)
}

/// Mask of cells whose value is `>= threshold`. NODATA cells are 0.
pub fn greater_equal(raster: &Raster<f64>, threshold: f64) -> Result<Raster<u8>> {
    evaluate(raster, None, |row, col| {
        let v = value_at(raster, row, col);
        u8::from(!v.is_nan() && v >= threshold)
    })
}

/// Mask of NODATA cells
pub fn is_null(raster: &Raster<f64>) -> Result<Raster<u8>> {
    evaluate(raster, None, |row, col| u8::from(value_at(raster, row, col).is_nan()))
}

/// Conditional: `if_true` where the mask is non-zero, `if_false` elsewhere
pub fn select<'a>(
    mask: &Raster<u8>,
    if_true: impl Into<Operand<'a>>,
    if_false: impl Into<Operand<'a>>,
) -> Result<Raster<f64>> {
    let if_true = if_true.into();
    let if_false = if_false.into();
    if_true.check_grid(mask)?;
    if_false.check_grid(mask)?;

    evaluate(mask, Some(f64::NAN), |row, col| {
        if unsafe { mask.get_unchecked(row, col) } != 0 {
            if_true.at(row, col)
        } else {
            if_false.at(row, col)
        }
    })
}

/// Raster of `value` on the grid of `template`
pub fn constant<T: RasterElement>(value: f64, template: &Raster<T>) -> Result<Raster<f64>> {
    template.derive(vec![value; template.len()], Some(f64::NAN))
}
