//! B-spline assignment kernels and stencil geometry.
//!
//! The order-p kernel is the p-fold self-convolution of the unit
//! top-hat, so its Fourier window is `sinc^p`. The closed forms below
//! are normalized so that the weights over the integer stencil offsets
//! sum to one exactly.

use crate::error::CosmogridError;
use crate::mesh::CellLayout;
use std::fmt;
use std::str::FromStr;

/// Density assignment / interpolation method, by kernel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentMethod {
    /// Nearest grid point (order 1).
    Ngp,
    /// Cloud in cell (order 2).
    Cic,
    /// Triangular shaped cloud (order 3).
    Tsc,
    /// Piecewise cubic spline (order 4).
    Pcs,
    /// Piecewise quartic spline (order 5).
    Pqs,
}

impl AssignmentMethod {
    pub fn order(self) -> usize {
        match self {
            AssignmentMethod::Ngp => 1,
            AssignmentMethod::Cic => 2,
            AssignmentMethod::Tsc => 3,
            AssignmentMethod::Pcs => 4,
            AssignmentMethod::Pqs => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AssignmentMethod::Ngp => "NGP",
            AssignmentMethod::Cic => "CIC",
            AssignmentMethod::Tsc => "TSC",
            AssignmentMethod::Pcs => "PCS",
            AssignmentMethod::Pqs => "PQS",
        }
    }
}

impl fmt::Display for AssignmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssignmentMethod {
    type Err = CosmogridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NGP" => Ok(AssignmentMethod::Ngp),
            "CIC" => Ok(AssignmentMethod::Cic),
            "TSC" => Ok(AssignmentMethod::Tsc),
            "PCS" => Ok(AssignmentMethod::Pcs),
            "PQS" => Ok(AssignmentMethod::Pqs),
            _ => Err(CosmogridError::NotConfigured(format!(
                "unknown density assignment method '{s}'"
            ))),
        }
    }
}

/// 1-D B-spline kernel of the given order, at distance `x >= 0` from a
/// stencil cell. Zero outside the kernel support.
#[inline]
pub fn bspline_kernel<const ORDER: usize>(x: f64) -> f64 {
    match ORDER {
        1 => {
            if x <= 0.5 {
                1.0
            } else {
                0.0
            }
        }
        2 => {
            if x < 1.0 {
                1.0 - x
            } else {
                0.0
            }
        }
        3 => {
            if x < 0.5 {
                0.75 - x * x
            } else if x < 1.5 {
                0.5 * (1.5 - x) * (1.5 - x)
            } else {
                0.0
            }
        }
        4 => {
            if x < 1.0 {
                2.0 / 3.0 + x * x * (-1.0 + 0.5 * x)
            } else if x < 2.0 {
                (2.0 - x) * (2.0 - x) * (2.0 - x) / 6.0
            } else {
                0.0
            }
        }
        5 => {
            if x < 0.5 {
                115.0 / 192.0 + 0.25 * x * x * (x * x - 2.5)
            } else if x < 1.5 {
                (55.0 + 4.0 * x * (5.0 - 2.0 * x * (15.0 + 2.0 * (-5.0 + x) * x))) / 96.0
            } else if x < 2.5 {
                let u = 5.0 - 2.0 * x;
                u * u * u * u / 384.0
            } else {
                0.0
            }
        }
        _ => unreachable!("kernel order {} not implemented", ORDER),
    }
}

/// Leftmost stencil offset per axis for a particle at fractional cell
/// offset `delta`.
///
/// Even orders in the corner convention always start at `-p/2 + 1`; odd
/// orders start at `-p/2` and shift right by one when the particle sits
/// in the upper half of the cell. The centered convention swaps which
/// parity carries the shift.
pub(crate) fn stencil_origin<const N: usize, const ORDER: usize>(
    delta: &[f64; N],
    layout: CellLayout,
) -> [i64; N] {
    let half = (ORDER / 2) as i64;
    let mut xstart = [-half; N];
    if ORDER % 2 == 0 {
        match layout {
            CellLayout::Corner => {
                for start in &mut xstart {
                    *start = -half + 1;
                }
            }
            CellLayout::Centered => {
                for (start, d) in xstart.iter_mut().zip(delta) {
                    if *d > 0.5 {
                        *start += 1;
                    }
                }
            }
        }
    } else if layout == CellLayout::Corner {
        for (start, d) in xstart.iter_mut().zip(delta) {
            if *d > 0.5 {
                *start += 1;
            }
        }
    }
    xstart
}

/// Distance from the particle to a stencil cell, in cells.
#[inline]
pub(crate) fn stencil_distance(offset: i64, delta: f64, layout: CellLayout) -> f64 {
    match layout {
        CellLayout::Corner => (offset as f64 - delta).abs(),
        CellLayout::Centered => (offset as f64 + 0.5 - delta).abs(),
    }
}
