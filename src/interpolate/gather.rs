//! Grid-to-particle interpolation.
//!
//! The mirror of the scatter: the same stencil and kernel read the grid
//! at each particle position, with no ghost reduction and no contrast
//! bias. Interpolating with the order that built the density field
//! avoids unphysical self-forces.

use super::kernel::{bspline_kernel, stencil_distance, stencil_origin};
use super::{check_ghosts, AssignmentMethod, CellLayout};
use crate::error::Result;
use crate::mesh::MeshGrid;
use crate::particle::Particle;
use crate::FloatType;

/// Interpolate `grid` to each particle position with the order-`ORDER`
/// B-spline kernel. Returns one value per particle, in order.
pub fn interpolate_to_particles<const N: usize, const ORDER: usize, P: Particle<N>>(
    grid: &MeshGrid<N>,
    particles: &[P],
    layout: CellLayout,
) -> Result<Vec<FloatType>> {
    check_ghosts(grid, ORDER, layout)?;
    let _span = tracing::debug_span!(
        "interpolate_to_particles",
        order = ORDER,
        local_count = particles.len()
    )
    .entered();

    let nmesh = grid.nmesh() as i64;
    let x_start = grid.local_x_start() as i64;
    let x_end = x_start + grid.local_nx() as i64;
    let stencil_cells = ORDER.pow(N as u32);

    let mut values = Vec::with_capacity(particles.len());
    for particle in particles {
        let pos = particle.pos();

        let mut ix = [0i64; N];
        let mut delta = [0.0; N];
        for d in 0..N {
            let scaled = pos[d] * nmesh as f64;
            let mut cell = scaled as i64;
            if d == 0 {
                // A position exactly on the upper edge of the local
                // domain is the one tolerated out-of-range case.
                if cell == x_end {
                    cell = x_end - 1;
                }
                if cell < x_start {
                    cell = x_start;
                }
            } else if cell == nmesh {
                cell = nmesh - 1;
            }
            delta[d] = scaled - cell as f64;
            ix[d] = cell;
        }
        ix[0] -= x_start;

        let xstart = stencil_origin::<N, ORDER>(&delta, layout);
        let mut value = 0.0f64;
        let mut sum_weights = 0.0;
        for s in 0..stencil_cells {
            let mut weight = 1.0;
            let mut coord = [0i64; N];
            let mut n = 1;
            for d in 0..N {
                let offset = xstart[d] + ((s / n) % ORDER) as i64;
                n *= ORDER;
                weight *= bspline_kernel::<ORDER>(stencil_distance(offset, delta[d], layout));
                let mut c = ix[d] + offset;
                if d > 0 {
                    if c >= nmesh {
                        c -= nmesh;
                    }
                    if c < 0 {
                        c += nmesh;
                    }
                }
                coord[d] = c;
            }
            value += weight * grid.get_real(&coord) as f64;
            sum_weights += weight;
        }
        debug_assert!(
            (sum_weights - 1.0).abs() < 1e-3,
            "interpolation weights sum to {sum_weights}"
        );
        values.push(value as FloatType);
    }
    Ok(values)
}

/// [`interpolate_to_particles`] with the kernel order chosen at runtime.
pub fn interpolate_to_particles_by_method<const N: usize, P: Particle<N>>(
    grid: &MeshGrid<N>,
    particles: &[P],
    layout: CellLayout,
    method: AssignmentMethod,
) -> Result<Vec<FloatType>> {
    match method {
        AssignmentMethod::Ngp => interpolate_to_particles::<N, 1, P>(grid, particles, layout),
        AssignmentMethod::Cic => interpolate_to_particles::<N, 2, P>(grid, particles, layout),
        AssignmentMethod::Tsc => interpolate_to_particles::<N, 3, P>(grid, particles, layout),
        AssignmentMethod::Pcs => interpolate_to_particles::<N, 4, P>(grid, particles, layout),
        AssignmentMethod::Pqs => interpolate_to_particles::<N, 5, P>(grid, particles, layout),
    }
}
