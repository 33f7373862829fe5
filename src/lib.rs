//! Distributed meshes and particle-grid transfer for cosmological field
//! computations.
//!
//! The crate provides three tightly coupled pieces:
//!
//! - [`mesh::MeshGrid`], an N-dimensional grid decomposed into slabs along
//!   its first axis, whose backing storage holds either the real field
//!   (with in-place real-to-complex padding) or its Hermitian Fourier
//!   transform,
//! - halo exchange and post-scatter ghost reduction between ring neighbors
//!   (see [`comm`] for the communication backends), and
//! - B-spline scatter/gather between particles and the grid, with the
//!   Fourier-space window deconvolution that inverts the scatter's
//!   smoothing (see [`interpolate`]).
//!
//! FFT execution is delegated through the [`fft::FftEngine`] seam; the
//! default `fft` feature provides a single-process engine on `rustfft`.
//! The `distributed` feature adds an MPI communication backend.

pub mod comm;
#[cfg(feature = "distributed")]
pub mod comm_mpi;
pub mod error;
pub mod fft;
pub mod halos;
pub mod interpolate;
pub mod mesh;
pub mod particle;

pub use error::{CosmogridError, Result};
pub use mesh::MeshGrid;

/// Grid storage scalar. `f64` by default, `f32` with the
/// `single-precision` feature. Positions and kernel weights are always
/// computed in `f64`; only the stored field values use this type.
#[cfg(not(feature = "single-precision"))]
pub type FloatType = f64;
#[cfg(feature = "single-precision")]
pub type FloatType = f32;

/// Complex grid storage scalar.
pub type ComplexType = num_complex::Complex<FloatType>;
