//! Index algebra: coordinates, linear indices and wave-vectors.
//!
//! Two index spaces are in play. Coordinate lookups produce indices into
//! the full real-view buffer (left ghosts first), so the first axis may
//! run over `[-nghost_left, local_nx + nghost_right)`. The range
//! iterators and the `*_from_index` accessors instead use owned-relative
//! indices, matching the layout the FFT engine sees.

use super::MeshGrid;
use crate::error::{CosmogridError, Result};

use std::f64::consts::PI;

impl<const N: usize> MeshGrid<N> {
    /// Linear index of a real coordinate into the full real-view buffer.
    ///
    /// The innermost stride is `2*(M/2+1)`; the last coordinate must stay
    /// below `M` (the two padding lanes are never addressed by
    /// coordinate).
    pub fn index_real(&self, coord: &[i64; N]) -> usize {
        #[cfg(feature = "bounds-check")]
        if let Err(e) = self.check_real_coord(coord) {
            panic!("{e}");
        }
        let m = self.nmesh() as i64;
        let mut index = coord[0] + self.nghost_left() as i64;
        for c in &coord[1..N - 1] {
            index = index * m + c;
        }
        (index * (2 * (m / 2 + 1)) + coord[N - 1]) as usize
    }

    /// Linear index of a Fourier coordinate, owned-relative.
    ///
    /// The innermost stride is `M/2+1`; ghosts exist only in real space,
    /// so the first coordinate runs over `[0, local_nx)`.
    pub fn index_fourier(&self, coord: &[usize; N]) -> usize {
        #[cfg(feature = "bounds-check")]
        if let Err(e) = self.check_fourier_coord(coord) {
            panic!("{e}");
        }
        let m = self.nmesh();
        let mut index = coord[0];
        for c in &coord[1..N - 1] {
            index = index * m + c;
        }
        index * (m / 2 + 1) + coord[N - 1]
    }

    /// [`MeshGrid::index_real`] with validation.
    pub fn checked_index_real(&self, coord: &[i64; N]) -> Result<usize> {
        self.check_real_coord(coord)?;
        let m = self.nmesh() as i64;
        let mut index = coord[0] + self.nghost_left() as i64;
        for c in &coord[1..N - 1] {
            index = index * m + c;
        }
        Ok((index * (2 * (m / 2 + 1)) + coord[N - 1]) as usize)
    }

    /// [`MeshGrid::index_fourier`] with validation.
    pub fn checked_index_fourier(&self, coord: &[usize; N]) -> Result<usize> {
        self.check_fourier_coord(coord)?;
        let m = self.nmesh();
        let mut index = coord[0];
        for c in &coord[1..N - 1] {
            index = index * m + c;
        }
        Ok(index * (m / 2 + 1) + coord[N - 1])
    }

    fn check_real_coord(&self, coord: &[i64; N]) -> Result<()> {
        let first_lo = -(self.nghost_left() as i64);
        let first_hi = (self.local_nx() + self.nghost_right()) as i64;
        if coord[0] < first_lo || coord[0] >= first_hi {
            return Err(CosmogridError::OutOfBounds(format!(
                "first real coordinate {} outside [{first_lo}, {first_hi})",
                coord[0]
            )));
        }
        for (d, &c) in coord.iter().enumerate().skip(1) {
            if c < 0 || c >= self.nmesh() as i64 {
                return Err(CosmogridError::OutOfBounds(format!(
                    "real coordinate {c} on axis {d} outside [0, {})",
                    self.nmesh()
                )));
            }
        }
        Ok(())
    }

    fn check_fourier_coord(&self, coord: &[usize; N]) -> Result<()> {
        if coord[0] >= self.local_nx() {
            return Err(CosmogridError::OutOfBounds(format!(
                "first Fourier coordinate {} outside [0, {})",
                coord[0],
                self.local_nx()
            )));
        }
        for (d, &c) in coord.iter().enumerate().skip(1).take(N - 2) {
            if c >= self.nmesh() {
                return Err(CosmogridError::OutOfBounds(format!(
                    "Fourier coordinate {c} on axis {d} outside [0, {})",
                    self.nmesh()
                )));
            }
        }
        let last_hi = self.nmesh() / 2 + 1;
        if coord[N - 1] >= last_hi {
            return Err(CosmogridError::OutOfBounds(format!(
                "last Fourier coordinate {} outside [0, {last_hi})",
                coord[N - 1]
            )));
        }
        Ok(())
    }

    /// Coordinate of an owned-relative real index (first axis in
    /// `[0, local_nx + nghost_right)`).
    pub fn coord_from_real_index(&self, index: usize) -> [i64; N] {
        let m = self.nmesh();
        let row = 2 * (m / 2 + 1);
        let mut coord = [0i64; N];
        let mut rest = index;
        coord[N - 1] = (rest % row) as i64;
        rest /= row;
        for d in (1..N - 1).rev() {
            coord[d] = (rest % m) as i64;
            rest /= m;
        }
        coord[0] = rest as i64;
        coord
    }

    /// Coordinate of an owned-relative Fourier index.
    pub fn coord_from_fourier_index(&self, index: usize) -> [usize; N] {
        let m = self.nmesh();
        let half = m / 2 + 1;
        let mut coord = [0usize; N];
        let mut rest = index;
        coord[N - 1] = rest % half;
        rest /= half;
        for d in (1..N - 1).rev() {
            coord[d] = rest % m;
            rest /= m;
        }
        coord[0] = rest;
        coord
    }

    /// Wave-vector of a Fourier coordinate, in units of the inverse box
    /// size (multiply by `1/boxsize` for a physical `k`).
    ///
    /// Each axis maps its angular index as `c <= M/2 ? c : c - M`; the
    /// first axis is offset into the global grid first.
    pub fn wavevector(&self, coord: &[usize; N]) -> [f64; N] {
        let m = self.nmesh() as i64;
        let half = m / 2;
        let twopi = 2.0 * PI;
        let mut kvec = [0.0; N];
        let global0 = (self.local_x_start() + coord[0]) as i64;
        kvec[0] = twopi * (if global0 <= half { global0 } else { global0 - m }) as f64;
        for d in 1..N {
            let c = coord[d] as i64;
            kvec[d] = twopi * (if c <= half { c } else { c - m }) as f64;
        }
        kvec
    }

    /// Wave-vector of an owned-relative Fourier index.
    pub fn wavevector_from_fourier_index(&self, index: usize) -> [f64; N] {
        self.wavevector(&self.coord_from_fourier_index(index))
    }

    /// Wave-vector and its squared norm for an owned-relative Fourier
    /// index.
    pub fn wavevector_and_norm2_from_fourier_index(&self, index: usize) -> ([f64; N], f64) {
        let kvec = self.wavevector_from_fourier_index(index);
        let norm2 = kvec.iter().map(|k| k * k).sum();
        (kvec, norm2)
    }

    /// Wave-vector and its norm for an owned-relative Fourier index.
    pub fn wavevector_and_norm_from_fourier_index(&self, index: usize) -> ([f64; N], f64) {
        let (kvec, norm2) = self.wavevector_and_norm2_from_fourier_index(index);
        (kvec, norm2.sqrt())
    }
}
