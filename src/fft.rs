//! FFT driver: in-place transforms between the real and Fourier views.
//!
//! The transform itself is delegated through the [`FftEngine`] trait,
//! which mirrors what a slab-distributed FFT library provides: planning
//! at a chosen rigor, unnormalized in-place real-to-complex and
//! complex-to-real transforms over the padded layout, and opaque wisdom
//! blobs. The driver owns the conventions around the engine call: the
//! forward transform is normalized by `1/M^N`, the inverse is not, the
//! right-ghost cells clobbered by the in-place transform are saved and
//! restored, and the grid's space tag flips on success.
//!
//! [`LocalFftEngine`] (behind the default `fft` feature) implements the
//! trait with `rustfft` for the single-process layout; a distributed
//! engine plugs into the same seam.

use crate::comm::MeshComm;
use crate::error::Result;
use crate::mesh::MeshGrid;
use crate::FloatType;
use rayon::prelude::*;

/// Planning effort requested from the engine, in increasing rigor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanRigor {
    Estimate,
    Measure,
    Patient,
    Exhaustive,
}

/// The slab layout an engine transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FftShape {
    pub ndim: usize,
    pub nmesh: usize,
    pub local_nx: usize,
}

impl FftShape {
    pub fn of<const N: usize>(grid: &MeshGrid<N>) -> Self {
        FftShape {
            ndim: N,
            nmesh: grid.nmesh(),
            local_nx: grid.local_nx(),
        }
    }
}

/// In-place multi-dimensional transform provider.
///
/// Both transforms are unnormalized and operate on the owned real region
/// in the padded in-place layout (last-axis rows of `M` reals in a
/// stride of `2*(M/2+1)`, reinterpreted as `M/2+1` complex values after
/// the forward transform).
pub trait FftEngine: Send + Sync {
    fn r2c_in_place(&self, shape: &FftShape, data: &mut [FloatType]) -> Result<()>;

    fn c2r_in_place(&self, shape: &FftShape, data: &mut [FloatType]) -> Result<()>;

    /// Plan ahead of time at the given rigor. May clobber buffer
    /// contents in engines that measure on live data.
    fn plan(&self, shape: &FftShape, rigor: PlanRigor) -> Result<()>;

    /// Opaque planning state for persistence.
    fn export_wisdom(&self) -> Vec<u8>;

    fn import_wisdom(&self, blob: &[u8]) -> Result<()>;
}

/// The default engine, or `NotConfigured` when the crate was built
/// without one.
#[cfg(feature = "fft")]
pub fn default_engine() -> Result<std::sync::Arc<dyn FftEngine>> {
    Ok(std::sync::Arc::new(LocalFftEngine::new()))
}

#[cfg(not(feature = "fft"))]
pub fn default_engine() -> Result<std::sync::Arc<dyn FftEngine>> {
    Err(crate::error::CosmogridError::NotConfigured(
        "built without the `fft` feature, no transform engine available".into(),
    ))
}

/// Real → Fourier, in place, normalized by `1/M^N`.
pub fn forward<const N: usize>(grid: &mut MeshGrid<N>, engine: &dyn FftEngine) -> Result<()> {
    let _span = tracing::debug_span!("forward_fft", nmesh = grid.nmesh()).entered();
    #[cfg(debug_assertions)]
    if !grid.status_real() {
        tracing::warn!("forward transform of a grid already tagged Fourier space");
    }

    let saved = save_right_ghost_prefix(grid);
    engine.r2c_in_place(&FftShape::of(grid), grid.owned_real_mut())?;
    grid.set_status_real(false);

    let norm = (1.0 / (grid.nmesh() as f64).powi(N as i32)) as FloatType;
    grid.owned_fourier_mut()
        .par_iter_mut()
        .for_each(|c| *c = *c * norm);

    restore_right_ghost_prefix(grid, saved);
    Ok(())
}

/// Fourier → real, in place, unnormalized (the forward normalization
/// makes the pair an identity).
pub fn inverse<const N: usize>(grid: &mut MeshGrid<N>, engine: &dyn FftEngine) -> Result<()> {
    let _span = tracing::debug_span!("inverse_fft", nmesh = grid.nmesh()).entered();
    #[cfg(debug_assertions)]
    if grid.status_real() {
        tracing::warn!("inverse transform of a grid already tagged real space");
    }

    let saved = save_right_ghost_prefix(grid);
    engine.c2r_in_place(&FftShape::of(grid), grid.owned_real_mut())?;
    grid.set_status_real(true);

    restore_right_ghost_prefix(grid, saved);
    Ok(())
}

/// Transform into another grid: copy, then transform the copy in place.
pub fn forward_into<const N: usize>(
    in_grid: &MeshGrid<N>,
    out_grid: &mut MeshGrid<N>,
    engine: &dyn FftEngine,
) -> Result<()> {
    *out_grid = in_grid.clone();
    forward(out_grid, engine)
}

/// See [`forward_into`].
pub fn inverse_into<const N: usize>(
    in_grid: &MeshGrid<N>,
    out_grid: &mut MeshGrid<N>,
    engine: &dyn FftEngine,
) -> Result<()> {
    *out_grid = in_grid.clone();
    inverse(out_grid, engine)
}

/// Run the engine's planner against this grid's shape.
///
/// Depending on the engine, planning may overwrite the grid contents;
/// call this before filling the grid.
pub fn create_wisdom<const N: usize>(
    grid: &mut MeshGrid<N>,
    engine: &dyn FftEngine,
    rigor: PlanRigor,
) -> Result<()> {
    tracing::warn!(?rigor, "planning may clobber grid contents");
    engine.plan(&FftShape::of(grid), rigor)
}

/// Persist the engine's wisdom from rank 0.
pub fn save_wisdom(engine: &dyn FftEngine, path: &str, comm: &dyn MeshComm) -> Result<()> {
    if comm.rank() == 0 {
        std::fs::write(path, engine.export_wisdom())?;
    }
    comm.barrier();
    Ok(())
}

/// Load wisdom on rank 0 and broadcast it to every rank.
pub fn load_wisdom(engine: &dyn FftEngine, path: &str, comm: &dyn MeshComm) -> Result<()> {
    let mut blob = if comm.rank() == 0 {
        std::fs::read(path)?
    } else {
        Vec::new()
    };
    comm.broadcast_bytes(&mut blob, 0);
    engine.import_wisdom(&blob)
}

/// The in-place transform overwrites the first `M/2+1` reals of the
/// right-ghost region; the caller is owed ghost fidelity around the call.
fn save_right_ghost_prefix<const N: usize>(grid: &MeshGrid<N>) -> Option<Vec<FloatType>> {
    if grid.nghost_right() == 0 {
        return None;
    }
    let half = grid.nmesh() / 2 + 1;
    Some(grid.right_ghost_real()[..half].to_vec())
}

fn restore_right_ghost_prefix<const N: usize>(
    grid: &mut MeshGrid<N>,
    saved: Option<Vec<FloatType>>,
) {
    if let Some(values) = saved {
        let first_right = grid.local_nx() as i64;
        grid.real_slab_mut(first_right)[..values.len()].copy_from_slice(&values);
    }
}

#[cfg(feature = "fft")]
pub use local_engine::LocalFftEngine;

#[cfg(feature = "fft")]
mod local_engine {
    use super::{FftEngine, FftShape, PlanRigor};
    use crate::error::{CosmogridError, Result};
    use crate::{ComplexType, FloatType};
    use rustfft::{Fft, FftPlanner};
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    /// Single-process engine on `rustfft`.
    ///
    /// Transforms one axis at a time with cached one-dimensional plans;
    /// the last axis packs the Hermitian half into the padded rows, the
    /// remaining axes run full complex lines. Refuses slab-distributed
    /// shapes (`local_nx != M`): a distributed transform needs an engine
    /// that can transpose across ranks. Its wisdom is the set of planned
    /// lengths, enough to pre-plan a later run.
    pub struct LocalFftEngine {
        planner: Mutex<FftPlanner<FloatType>>,
        planned: Mutex<BTreeSet<usize>>,
    }

    impl LocalFftEngine {
        pub fn new() -> Self {
            LocalFftEngine {
                planner: Mutex::new(FftPlanner::new()),
                planned: Mutex::new(BTreeSet::new()),
            }
        }

        fn get_fft(&self, len: usize, forward: bool) -> Arc<dyn Fft<FloatType>> {
            self.planned.lock().unwrap().insert(len);
            let mut planner = self.planner.lock().unwrap();
            if forward {
                planner.plan_fft_forward(len)
            } else {
                planner.plan_fft_inverse(len)
            }
        }

        fn check_shape(&self, shape: &FftShape, data_len: usize) -> Result<()> {
            if shape.local_nx != shape.nmesh {
                return Err(CosmogridError::NotConfigured(
                    "the local FFT engine handles a single process only; \
                     slab-distributed transforms need a distributed engine"
                        .into(),
                ));
            }
            let stride = 2 * (shape.nmesh / 2 + 1);
            let rows = shape.local_nx * shape.nmesh.pow(shape.ndim as u32 - 2);
            if data_len != rows * stride {
                return Err(CosmogridError::UnsupportedShape(format!(
                    "buffer holds {data_len} reals, layout expects {}",
                    rows * stride
                )));
            }
            Ok(())
        }

        /// Complex-to-complex pass over every line of one non-last axis.
        fn transform_axis(
            &self,
            data: &mut [ComplexType],
            shape: &FftShape,
            axis: usize,
            forward: bool,
        ) {
            let m = shape.nmesh;
            let half = m / 2 + 1;
            let mut inner = 1usize;
            for d in axis + 1..shape.ndim {
                inner *= if d == shape.ndim - 1 { half } else { m };
            }
            let outer: usize = m.pow(axis as u32);

            let fft = self.get_fft(m, forward);
            let mut line: Vec<ComplexType> = vec![ComplexType::new(0.0, 0.0); m];
            for o in 0..outer {
                for i in 0..inner {
                    let base = o * m * inner + i;
                    for t in 0..m {
                        line[t] = data[base + t * inner];
                    }
                    fft.process(&mut line);
                    for t in 0..m {
                        data[base + t * inner] = line[t];
                    }
                }
            }
        }
    }

    impl Default for LocalFftEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FftEngine for LocalFftEngine {
        fn r2c_in_place(&self, shape: &FftShape, data: &mut [FloatType]) -> Result<()> {
            self.check_shape(shape, data.len())?;
            let m = shape.nmesh;
            let half = m / 2 + 1;
            let stride = 2 * half;

            // Last axis: transform each padded row of M reals, keep the
            // Hermitian half in place.
            let fft = self.get_fft(m, true);
            let mut line: Vec<ComplexType> = vec![ComplexType::new(0.0, 0.0); m];
            for row in data.chunks_exact_mut(stride) {
                for t in 0..m {
                    line[t] = ComplexType::new(row[t], 0.0);
                }
                fft.process(&mut line);
                let row_c: &mut [ComplexType] = bytemuck::cast_slice_mut(row);
                row_c.copy_from_slice(&line[..half]);
            }

            // Remaining axes run full complex lines.
            let complex: &mut [ComplexType] = bytemuck::cast_slice_mut(data);
            for axis in 0..shape.ndim - 1 {
                self.transform_axis(complex, shape, axis, true);
            }
            Ok(())
        }

        fn c2r_in_place(&self, shape: &FftShape, data: &mut [FloatType]) -> Result<()> {
            self.check_shape(shape, data.len())?;
            let m = shape.nmesh;
            let half = m / 2 + 1;
            let stride = 2 * half;

            let complex: &mut [ComplexType] = bytemuck::cast_slice_mut(data);
            for axis in 0..shape.ndim - 1 {
                self.transform_axis(complex, shape, axis, false);
            }

            // Last axis: rebuild the full spectrum from the Hermitian
            // half, inverse-transform, keep the real parts.
            let fft = self.get_fft(m, false);
            let mut line: Vec<ComplexType> = vec![ComplexType::new(0.0, 0.0); m];
            for row in data.chunks_exact_mut(stride) {
                {
                    let row_c: &[ComplexType] = bytemuck::cast_slice(row);
                    line[..half].copy_from_slice(&row_c[..half]);
                }
                for t in half..m {
                    line[t] = line[m - t].conj();
                }
                fft.process(&mut line);
                for t in 0..m {
                    row[t] = line[t].re;
                }
            }
            Ok(())
        }

        fn plan(&self, shape: &FftShape, rigor: PlanRigor) -> Result<()> {
            if shape.local_nx != shape.nmesh {
                return Err(CosmogridError::NotConfigured(
                    "the local FFT engine handles a single process only".into(),
                ));
            }
            tracing::debug!(?rigor, nmesh = shape.nmesh, "planning transforms");
            self.get_fft(shape.nmesh, true);
            self.get_fft(shape.nmesh, false);
            Ok(())
        }

        fn export_wisdom(&self) -> Vec<u8> {
            let mut blob = Vec::new();
            for &len in self.planned.lock().unwrap().iter() {
                blob.extend_from_slice(&(len as u64).to_ne_bytes());
            }
            blob
        }

        fn import_wisdom(&self, blob: &[u8]) -> Result<()> {
            if blob.len() % 8 != 0 {
                return Err(CosmogridError::NotConfigured(
                    "wisdom blob is not a list of transform lengths".into(),
                ));
            }
            for chunk in blob.chunks_exact(8) {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                let len = u64::from_ne_bytes(bytes) as usize;
                self.get_fft(len, true);
                self.get_fft(len, false);
            }
            Ok(())
        }
    }
}
