//! Particle-grid transfer.
//!
//! Scatter deposits particles onto the mesh as a density-contrast field
//! using a B-spline assignment kernel of order 1 to 5 (NGP, CIC, TSC,
//! PCS, PQS); gather interpolates the mesh back to particle positions
//! with the same kernel, which avoids unphysical self-forces when the
//! two are paired. The Fourier-space window of the order-p kernel is
//! `sinc^p`, and [`deconvolve_assignment_window`] divides it out.

mod convolve;
mod deconvolve;
mod gather;
mod kernel;
mod scatter;

pub use convolve::convolve_with_kernel;
pub use deconvolve::deconvolve_assignment_window;
pub use gather::{interpolate_to_particles, interpolate_to_particles_by_method};
pub use kernel::{bspline_kernel, AssignmentMethod};
pub use scatter::{particles_to_grid, particles_to_grid_by_method};

pub use crate::mesh::CellLayout;

use crate::error::{CosmogridError, Result};
use crate::mesh::MeshGrid;

/// Ghost widths `(left, right)` a grid needs for order-`order` transfer.
///
/// The corner convention needs one extra right slab for odd orders
/// (their stencil shifts right when the particle sits in the upper half
/// of a cell); the centered convention is symmetric.
pub fn ghost_slices_needed(order: usize, layout: CellLayout) -> (usize, usize) {
    match layout {
        CellLayout::Centered => (order / 2, order / 2),
        CellLayout::Corner => {
            if order % 2 == 1 {
                (order / 2, order / 2 + 1)
            } else {
                (order / 2 - 1, order / 2)
            }
        }
    }
}

pub(crate) fn check_ghosts<const N: usize>(
    grid: &MeshGrid<N>,
    order: usize,
    layout: CellLayout,
) -> Result<()> {
    let (needed_left, needed_right) = ghost_slices_needed(order, layout);
    if grid.nghost_left() < needed_left || grid.nghost_right() < needed_right {
        return Err(CosmogridError::GhostTooThin {
            order,
            needed_left,
            needed_right,
            have_left: grid.nghost_left(),
            have_right: grid.nghost_right(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ghost_requirements_per_order() {
        assert_eq!(ghost_slices_needed(1, CellLayout::Corner), (0, 1));
        assert_eq!(ghost_slices_needed(2, CellLayout::Corner), (0, 1));
        assert_eq!(ghost_slices_needed(3, CellLayout::Corner), (1, 2));
        assert_eq!(ghost_slices_needed(4, CellLayout::Corner), (1, 2));
        assert_eq!(ghost_slices_needed(5, CellLayout::Corner), (2, 3));
        assert_eq!(ghost_slices_needed(1, CellLayout::Centered), (0, 0));
        assert_eq!(ghost_slices_needed(3, CellLayout::Centered), (1, 1));
        assert_eq!(ghost_slices_needed(5, CellLayout::Centered), (2, 2));
    }
}
