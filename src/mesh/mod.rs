//! Distributed in-place real/Fourier mesh.
//!
//! [`MeshGrid`] owns a single contiguous complex allocation per process
//! holding `nghost_left` ghost slabs, the owned slabs, and `nghost_right`
//! ghost slabs, in that order. The same bytes serve as the real field
//! (with two padding lanes at the end of every last-axis row, the
//! in-place real-to-complex layout) or as the Hermitian half of its
//! Fourier transform; a status tag records which interpretation is
//! current. The decomposition is a stack of first-axis slabs, one block
//! per process, and requires the mesh side to divide evenly across the
//! ring.

mod halo;
mod index;
mod io;
mod range;

pub use range::RealRange;

use crate::comm::MeshComm;
use crate::error::{CosmogridError, Result};
use crate::{ComplexType, FloatType};
use rayon::prelude::*;

/// Where field values live inside a cell.
///
/// The corner convention places the value of cell `c` at position `c/M`;
/// the centered convention shifts every axis by half a cell. The choice
/// changes the ghost-slab requirement of odd-order assignment kernels and
/// the stencil origin rules, so the interpolation entry points take it as
/// a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellLayout {
    #[default]
    Corner,
    Centered,
}

/// An N-dimensional grid of side `M`, slab-decomposed along its first
/// axis, with in-place real-to-complex storage.
#[derive(Clone)]
pub struct MeshGrid<const N: usize> {
    /// Cells per axis.
    nmesh: usize,
    /// Owned first-axis slabs on this process.
    local_nx: usize,
    /// Global index of the first owned slab.
    local_x_start: usize,
    nghost_left: usize,
    nghost_right: usize,
    /// Complex cells per slab: `(M/2+1) * M^(N-2)`.
    slab_complex: usize,
    /// Real cells per slab including padding: `2 * slab_complex`.
    slab_real: usize,
    /// Owned complex cells: `local_nx * slab_complex`.
    owned_complex: usize,
    /// Active (non-padding) real cells: `local_nx * M^(N-1)`.
    active_real: usize,
    rank: usize,
    nranks: usize,
    in_real_space: bool,
    /// `[left ghosts | owned | right ghosts]`, complex view.
    data: Vec<ComplexType>,
}

impl<const N: usize> MeshGrid<N> {
    /// Allocate a zeroed grid of side `nmesh` with the given ghost widths.
    ///
    /// The slab decomposition is read from `comm`: this process owns
    /// `nmesh / comm.size()` slabs starting at `rank * local_nx`. The
    /// grid starts out tagged as real space.
    pub fn new(
        nmesh: usize,
        nghost_left: usize,
        nghost_right: usize,
        comm: &dyn MeshComm,
    ) -> Result<Self> {
        if N < 2 {
            return Err(CosmogridError::UnsupportedShape(format!(
                "grid dimension must be at least 2, got {}",
                N
            )));
        }
        if nmesh == 0 {
            return Err(CosmogridError::UnsupportedShape(
                "mesh side must be positive".into(),
            ));
        }
        let nranks = comm.size();
        if nmesh % nranks != 0 {
            return Err(CosmogridError::UnsupportedShape(format!(
                "mesh side {nmesh} does not divide evenly across {nranks} processes"
            )));
        }

        let local_nx = nmesh / nranks;
        let rank = comm.rank();
        let slab_complex = (nmesh / 2 + 1) * nmesh.pow(N.saturating_sub(2) as u32);
        let owned_complex = local_nx * slab_complex;
        let alloc_complex = owned_complex + (nghost_left + nghost_right) * slab_complex;

        tracing::debug!(
            nmesh,
            local_nx,
            nghost_left,
            nghost_right,
            bytes = alloc_complex * std::mem::size_of::<ComplexType>(),
            "allocating mesh grid"
        );

        Ok(MeshGrid {
            nmesh,
            local_nx,
            local_x_start: rank * local_nx,
            nghost_left,
            nghost_right,
            slab_complex,
            slab_real: 2 * slab_complex,
            owned_complex,
            active_real: local_nx * nmesh.pow(N.saturating_sub(1) as u32),
            rank,
            nranks,
            in_real_space: true,
            data: vec![ComplexType::new(0.0, 0.0); alloc_complex],
        })
    }

    pub fn ndim(&self) -> usize {
        N
    }

    pub fn nmesh(&self) -> usize {
        self.nmesh
    }

    pub fn local_nx(&self) -> usize {
        self.local_nx
    }

    pub fn local_x_start(&self) -> usize {
        self.local_x_start
    }

    pub fn nghost_left(&self) -> usize {
        self.nghost_left
    }

    pub fn nghost_right(&self) -> usize {
        self.nghost_right
    }

    /// Real cells per slab, padding included. Useful to jump slab to slab.
    pub fn slab_real_len(&self) -> usize {
        self.slab_real
    }

    /// Complex cells per slab.
    pub fn slab_complex_len(&self) -> usize {
        self.slab_complex
    }

    /// Active (non-padding) real cells of the owned region.
    pub fn active_real_len(&self) -> usize {
        self.active_real
    }

    /// Complex cells of the owned region.
    pub fn owned_complex_len(&self) -> usize {
        self.owned_complex
    }

    /// Complex cells allocated, ghosts included.
    pub fn alloc_complex_len(&self) -> usize {
        self.data.len()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn nranks(&self) -> usize {
        self.nranks
    }

    /// Is the storage currently interpreted as a real-space field?
    pub fn status_real(&self) -> bool {
        self.in_real_space
    }

    /// Declare the storage interpretation without transforming.
    ///
    /// This is a statement by the caller that the bytes are now to be
    /// read the other way; misuse is a correctness bug, not a runtime
    /// failure.
    pub fn set_status_real(&mut self, real: bool) {
        self.in_real_space = real;
    }

    // ---- raw views -----------------------------------------------------

    /// The whole allocation as reals, left ghosts first.
    pub fn real_all(&self) -> &[FloatType] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn real_all_mut(&mut self) -> &mut [FloatType] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    /// The owned real region (ghosts skipped), padding included.
    pub fn owned_real(&self) -> &[FloatType] {
        let start = self.nghost_left * self.slab_real;
        &self.real_all()[start..start + self.local_nx * self.slab_real]
    }

    pub fn owned_real_mut(&mut self) -> &mut [FloatType] {
        let start = self.nghost_left * self.slab_real;
        let len = self.local_nx * self.slab_real;
        &mut self.real_all_mut()[start..start + len]
    }

    /// The left-ghost region (empty when `nghost_left` is zero).
    pub fn left_ghost_real(&self) -> &[FloatType] {
        &self.real_all()[..self.nghost_left * self.slab_real]
    }

    /// The right-ghost region (empty when `nghost_right` is zero).
    pub fn right_ghost_real(&self) -> &[FloatType] {
        let start = (self.nghost_left + self.local_nx) * self.slab_real;
        &self.real_all()[start..]
    }

    /// One real slab; ghost slabs are addressed by negative indices on
    /// the left and `local_nx..local_nx+nghost_right` on the right.
    pub fn real_slab(&self, slab: i64) -> &[FloatType] {
        let base = self.slab_offset(slab) * self.slab_real;
        &self.real_all()[base..base + self.slab_real]
    }

    pub fn real_slab_mut(&mut self, slab: i64) -> &mut [FloatType] {
        let base = self.slab_offset(slab) * self.slab_real;
        let end = base + self.slab_real;
        &mut self.real_all_mut()[base..end]
    }

    fn slab_offset(&self, slab: i64) -> usize {
        #[cfg(feature = "bounds-check")]
        assert!(
            slab >= -(self.nghost_left as i64)
                && slab < (self.local_nx + self.nghost_right) as i64,
            "slab index {slab} outside [-{}, {})",
            self.nghost_left,
            self.local_nx + self.nghost_right
        );
        (slab + self.nghost_left as i64) as usize
    }

    /// The owned Fourier region (aligned with the owned real region).
    pub fn owned_fourier(&self) -> &[ComplexType] {
        let start = self.nghost_left * self.slab_complex;
        &self.data[start..start + self.owned_complex]
    }

    pub fn owned_fourier_mut(&mut self) -> &mut [ComplexType] {
        let start = self.nghost_left * self.slab_complex;
        let end = start + self.owned_complex;
        &mut self.data[start..end]
    }

    // ---- element access ------------------------------------------------

    /// Value at a real coordinate; the first axis may address ghosts.
    pub fn get_real(&self, coord: &[i64; N]) -> FloatType {
        let idx = self.index_real(coord);
        self.real_all()[idx]
    }

    pub fn set_real(&mut self, coord: &[i64; N], value: FloatType) {
        let idx = self.index_real(coord);
        self.real_all_mut()[idx] = value;
    }

    pub fn add_real(&mut self, coord: &[i64; N], value: FloatType) {
        let idx = self.index_real(coord);
        self.real_all_mut()[idx] += value;
    }

    /// Value at an owned-relative real index as yielded by
    /// [`MeshGrid::real_range`].
    pub fn get_real_from_index(&self, index: usize) -> FloatType {
        self.real_all()[self.nghost_left * self.slab_real + index]
    }

    pub fn set_real_from_index(&mut self, index: usize, value: FloatType) {
        let at = self.nghost_left * self.slab_real + index;
        self.real_all_mut()[at] = value;
    }

    pub fn get_fourier(&self, coord: &[usize; N]) -> ComplexType {
        let idx = self.index_fourier(coord);
        self.data[self.nghost_left * self.slab_complex + idx]
    }

    pub fn set_fourier(&mut self, coord: &[usize; N], value: ComplexType) {
        let idx = self.index_fourier(coord);
        let at = self.nghost_left * self.slab_complex + idx;
        self.data[at] = value;
    }

    /// Value at an owned-relative Fourier index as yielded by
    /// [`MeshGrid::fourier_range`].
    pub fn get_fourier_from_index(&self, index: usize) -> ComplexType {
        self.data[self.nghost_left * self.slab_complex + index]
    }

    pub fn set_fourier_from_index(&mut self, index: usize, value: ComplexType) {
        let at = self.nghost_left * self.slab_complex + index;
        self.data[at] = value;
    }

    // ---- ranges --------------------------------------------------------

    /// Owned-relative indices of all active real cells, skipping the two
    /// padding lanes at the end of every last-axis row.
    pub fn real_range(&self) -> RealRange {
        self.warn_if_space(true, "real_range");
        RealRange::new(0, self.active_real, self.nmesh)
    }

    /// Owned-relative indices of all Fourier cells (contiguous).
    pub fn fourier_range(&self) -> std::ops::Range<usize> {
        self.warn_if_space(false, "fourier_range");
        0..self.owned_complex
    }

    // ---- fills ---------------------------------------------------------

    /// Write a constant to the whole real allocation, ghosts and padding
    /// included.
    pub fn fill_real(&mut self, value: FloatType) {
        self.warn_if_space(true, "fill_real");
        self.real_all_mut().fill(value);
    }

    /// Write a constant to the whole Fourier allocation.
    pub fn fill_fourier(&mut self, value: ComplexType) {
        self.warn_if_space(false, "fill_fourier");
        self.data.fill(value);
    }

    /// Fill the active real cells from a function of position (corner
    /// convention), then refresh the ghost slabs.
    pub fn fill_real_with(
        &mut self,
        f: impl Fn(&[f64; N]) -> FloatType,
        comm: &dyn MeshComm,
    ) {
        self.warn_if_space(true, "fill_real_with");
        for index in self.real_range() {
            let coord = self.coord_from_real_index(index);
            let pos = self.cell_position(&coord, CellLayout::Corner);
            self.set_real_from_index(index, f(&pos));
        }
        self.halo_exchange(comm);
    }

    /// Fill the Fourier cells from a function of the wave-vector.
    pub fn fill_fourier_with(&mut self, f: impl Fn(&[f64; N]) -> ComplexType) {
        self.warn_if_space(false, "fill_fourier_with");
        for index in self.fourier_range() {
            let kvec = self.wavevector_from_fourier_index(index);
            self.set_fourier_from_index(index, f(&kvec));
        }
    }

    // ---- diagnostics ---------------------------------------------------

    /// Position of a cell in `[0, 1)^N`, first axis in global coordinates.
    pub fn cell_position(&self, coord: &[i64; N], layout: CellLayout) -> [f64; N] {
        let shift = match layout {
            CellLayout::Corner => 0.0,
            CellLayout::Centered => 0.5,
        };
        let inv = 1.0 / self.nmesh as f64;
        let mut pos = [0.0; N];
        pos[0] = (self.local_x_start as f64 + coord[0] as f64 + shift) * inv;
        for d in 1..N {
            pos[d] = (coord[d] as f64 + shift) * inv;
        }
        pos
    }

    /// Scan the entire allocation (ghosts and padding included) for NaN.
    pub fn nan_check(&self) -> bool {
        let hit = self
            .data
            .par_iter()
            .position_any(|c| c.re.is_nan() || c.im.is_nan());
        if let Some(index) = hit {
            tracing::warn!(index, "found NaN in grid");
        }
        hit.is_some()
    }

    /// [`MeshGrid::nan_check`] as a hard failure.
    pub fn ensure_finite(&self) -> Result<()> {
        if self.nan_check() {
            return Err(CosmogridError::NumericAnomaly(
                "NaN in grid storage".into(),
            ));
        }
        Ok(())
    }

    /// Log the grid geometry and memory footprint (rank 0 only).
    pub fn info(&self) {
        if self.rank != 0 {
            return;
        }
        let status = if self.in_real_space {
            "real space"
        } else {
            "Fourier space"
        };
        tracing::info!(
            status,
            ndim = N,
            nmesh = self.nmesh,
            local_nx = self.local_nx,
            nghost_left = self.nghost_left,
            nghost_right = self.nghost_right,
            alloc_complex = self.data.len(),
            megabytes =
                self.data.len() as f64 * std::mem::size_of::<ComplexType>() as f64 / 1e6,
            "mesh grid"
        );
    }

    #[cfg(debug_assertions)]
    fn warn_if_space(&self, expect_real: bool, op: &str) {
        if self.in_real_space != expect_real {
            let status = if self.in_real_space {
                "real space"
            } else {
                "Fourier space"
            };
            tracing::warn!("{op}: grid status is {status}");
        }
    }

    #[cfg(not(debug_assertions))]
    fn warn_if_space(&self, _expect_real: bool, _op: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalComm;

    #[test]
    fn geometry_single_process() {
        let grid = MeshGrid::<3>::new(8, 1, 2, &LocalComm).unwrap();
        assert_eq!(grid.nmesh(), 8);
        assert_eq!(grid.local_nx(), 8);
        assert_eq!(grid.local_x_start(), 0);
        assert_eq!(grid.slab_complex_len(), 5 * 8);
        assert_eq!(grid.slab_real_len(), 2 * 5 * 8);
        assert_eq!(grid.owned_complex_len(), 8 * 5 * 8);
        assert_eq!(grid.active_real_len(), 8 * 64);
        assert_eq!(grid.alloc_complex_len(), (8 + 3) * 5 * 8);
        assert!(grid.status_real());
    }

    #[test]
    fn rejects_one_dimension() {
        assert!(matches!(
            MeshGrid::<1>::new(8, 0, 0, &LocalComm),
            Err(CosmogridError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn fill_and_access_round_trip() {
        let mut grid = MeshGrid::<2>::new(4, 0, 0, &LocalComm).unwrap();
        grid.fill_real(2.5);
        assert_eq!(grid.get_real(&[1, 3]), 2.5);
        grid.set_real(&[2, 1], -1.0);
        assert_eq!(grid.get_real(&[2, 1]), -1.0);
        grid.add_real(&[2, 1], 0.5);
        assert_eq!(grid.get_real(&[2, 1]), -0.5);
    }

    #[test]
    fn ghost_slabs_are_addressable() {
        let mut grid = MeshGrid::<2>::new(4, 1, 1, &LocalComm).unwrap();
        grid.set_real(&[-1, 2], 7.0);
        assert_eq!(grid.get_real(&[-1, 2]), 7.0);
        grid.set_real(&[4, 0], 8.0);
        assert_eq!(grid.get_real(&[4, 0]), 8.0);
        // The ghost writes land outside the owned region.
        assert_eq!(grid.get_real(&[0, 2]), 0.0);
    }

    #[test]
    fn fill_real_with_positions() {
        let mut grid = MeshGrid::<2>::new(4, 0, 0, &LocalComm).unwrap();
        grid.fill_real_with(|pos| (pos[0] * 4.0 + pos[1]) as FloatType, &LocalComm);
        assert_eq!(grid.get_real(&[2, 1]), 2.0 + 0.25);
    }

    #[test]
    fn fill_fourier_with_wavevectors() {
        let mut grid = MeshGrid::<2>::new(4, 0, 0, &LocalComm).unwrap();
        grid.set_status_real(false);
        grid.fill_fourier_with(|k| ComplexType::new(k[0] as FloatType, k[1] as FloatType));
        let twopi = 2.0 * std::f64::consts::PI;
        let cell = grid.get_fourier(&[1, 2]);
        assert!((cell.re as f64 - twopi).abs() < 1e-12);
        assert!((cell.im as f64 - 2.0 * twopi).abs() < 1e-12);
        // Above the Nyquist index the first axis wraps negative.
        assert!((grid.get_fourier(&[3, 0]).re as f64 + twopi).abs() < 1e-12);
    }

    #[test]
    fn nan_check_finds_poison() {
        let mut grid = MeshGrid::<2>::new(4, 0, 0, &LocalComm).unwrap();
        assert!(!grid.nan_check());
        assert!(grid.ensure_finite().is_ok());
        grid.set_real(&[0, 0], FloatType::NAN);
        assert!(grid.nan_check());
        assert!(matches!(
            grid.ensure_finite(),
            Err(CosmogridError::NumericAnomaly(_))
        ));
    }

    #[test]
    fn status_tag_flips() {
        let mut grid = MeshGrid::<2>::new(4, 0, 0, &LocalComm).unwrap();
        assert!(grid.status_real());
        grid.set_status_real(false);
        assert!(!grid.status_real());
    }
}
