//! Particle-to-grid density assignment.
//!
//! The deposited field is the density contrast `delta = rho/rho_bar - 1`:
//! the whole buffer is prefilled with `-1`, each particle adds
//! `w * (mass / mean_mass) * (M^N / N_total)` over its stencil, and the
//! ghost reduction folds boundary deposits back onto their owners with a
//! `+1` bias that cancels the prefill the ghost slabs carried.

use super::kernel::{bspline_kernel, stencil_distance, stencil_origin};
use super::{check_ghosts, AssignmentMethod, CellLayout};
use crate::comm::MeshComm;
use crate::error::{CosmogridError, Result};
use crate::mesh::MeshGrid;
use crate::particle::Particle;
use crate::FloatType;

/// Deposit particles onto `grid` with the order-`ORDER` B-spline kernel.
///
/// `total_particle_count` is the particle count across all ranks;
/// `particles` holds this rank's share, every position inside this
/// rank's slab block. After the collective ghost reduction the grid
/// holds the density contrast, with a global mean of zero.
pub fn particles_to_grid<const N: usize, const ORDER: usize, P: Particle<N>>(
    particles: &[P],
    total_particle_count: usize,
    grid: &mut MeshGrid<N>,
    layout: CellLayout,
    comm: &dyn MeshComm,
) -> Result<()> {
    check_ghosts(grid, ORDER, layout)?;
    let _span = tracing::debug_span!(
        "particles_to_grid",
        order = ORDER,
        local_count = particles.len()
    )
    .entered();

    let nmesh = grid.nmesh() as i64;
    let stencil_cells = ORDER.pow(N as u32);

    let mut norm_fac = (grid.nmesh() as f64).powi(N as i32) / total_particle_count as f64;
    let local_mass: f64 = particles.iter().map(|p| p.mass()).sum();
    let mean_mass = comm.all_reduce_sum(local_mass) / total_particle_count as f64;
    norm_fac /= mean_mass;

    grid.fill_real(-1.0);

    for particle in particles {
        let (ix, delta) = cell_and_offset(grid, particle.pos())?;
        let mass = particle.mass();
        let xstart = stencil_origin::<N, ORDER>(&delta, layout);

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
                // Axes past the first wrap periodically; the first axis
                // addresses the ghost slabs instead.
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
            grid.add_real(&coord, (weight * norm_fac * mass) as FloatType);
            sum_weights += weight;
        }
        debug_assert!(
            (sum_weights - 1.0).abs() < 1e-3,
            "assignment weights sum to {sum_weights}"
        );
    }

    add_ghost_contributions(grid, comm);
    Ok(())
}

/// [`particles_to_grid`] with the kernel order chosen at runtime.
pub fn particles_to_grid_by_method<const N: usize, P: Particle<N>>(
    particles: &[P],
    total_particle_count: usize,
    grid: &mut MeshGrid<N>,
    layout: CellLayout,
    method: AssignmentMethod,
    comm: &dyn MeshComm,
) -> Result<()> {
    match method {
        AssignmentMethod::Ngp => {
            particles_to_grid::<N, 1, P>(particles, total_particle_count, grid, layout, comm)
        }
        AssignmentMethod::Cic => {
            particles_to_grid::<N, 2, P>(particles, total_particle_count, grid, layout, comm)
        }
        AssignmentMethod::Tsc => {
            particles_to_grid::<N, 3, P>(particles, total_particle_count, grid, layout, comm)
        }
        AssignmentMethod::Pcs => {
            particles_to_grid::<N, 4, P>(particles, total_particle_count, grid, layout, comm)
        }
        AssignmentMethod::Pqs => {
            particles_to_grid::<N, 5, P>(particles, total_particle_count, grid, layout, comm)
        }
    }
}

/// Cell index (first axis in the local frame) and in-cell offset of a
/// position. Fails on positions outside `[0, 1)`.
fn cell_and_offset<const N: usize>(
    grid: &MeshGrid<N>,
    pos: &[f64; N],
) -> Result<([i64; N], [f64; N])> {
    let m = grid.nmesh();
    let mut ix = [0i64; N];
    let mut delta = [0.0; N];
    for d in 0..N {
        if !(0.0..1.0).contains(&pos[d]) {
            return Err(CosmogridError::OutOfBounds(format!(
                "particle position {} on axis {d} outside [0, 1)",
                pos[d]
            )));
        }
        let scaled = pos[d] * m as f64;
        let mut cell = scaled as i64;
        delta[d] = scaled - cell as f64;
        if cell == m as i64 {
            // pos < 1 can still round up to the mesh edge; keep the cell
            // inside and put the full offset in delta.
            cell -= 1;
            delta[d] = 1.0;
        }
        ix[d] = cell;
    }
    ix[0] -= grid.local_x_start() as i64;
    Ok((ix, delta))
}

/// Fold the deposits that landed in ghost slabs back onto the owning
/// ranks. Collective; with one process the ghosts wrap onto the
/// opposite edge of the owned block.
fn add_ghost_contributions<const N: usize>(grid: &mut MeshGrid<N>, comm: &dyn MeshComm) {
    let _span = tracing::debug_span!("ghost_reduction").entered();
    let size = comm.size();
    let rank = comm.rank();
    let right = (rank + 1) % size;
    let left = (rank + size - 1) % size;
    let local_nx = grid.local_nx() as i64;
    let slab = grid.slab_real_len();

    let mut sendbuf: Vec<FloatType> = vec![0.0; slab];
    let mut temp: Vec<FloatType> = vec![0.0; slab];

    // Our right-ghost deposits belong to the right neighbor's leftmost
    // owned slabs; the left neighbor's arrive here symmetrically.
    for i in 0..grid.nghost_right() as i64 {
        sendbuf.copy_from_slice(grid.real_slab(local_nx + i));
        comm.sendrecv(&sendbuf, right, &mut temp, left);
        for (cell, incoming) in grid.real_slab_mut(i).iter_mut().zip(&temp) {
            *cell += *incoming + 1.0;
        }
    }

    for i in 1..=(grid.nghost_left() as i64) {
        sendbuf.copy_from_slice(grid.real_slab(-i));
        comm.sendrecv(&sendbuf, left, &mut temp, right);
        for (cell, incoming) in grid.real_slab_mut(local_nx - i).iter_mut().zip(&temp) {
            *cell += *incoming + 1.0;
        }
    }
}
