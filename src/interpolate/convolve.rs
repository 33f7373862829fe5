//! Real-space convolution of a grid with a stencil kernel.

use super::{check_ghosts, CellLayout};
use crate::comm::MeshComm;
use crate::error::Result;
use crate::mesh::MeshGrid;
use crate::FloatType;

/// Convolve `input` with a kernel of the integer cell offsets over an
/// `ORDER^N` stencil (for even orders the extra cells sit to the right).
///
/// The kernel receives the offset vector in cells and returns the tap
/// weight; a kernel returning `1 / ORDER^N` everywhere is a top-hat
/// smoothing of radius `ORDER / M`. The input's ghost slabs must be
/// fresh (run a halo exchange after the last write) and wide enough for
/// the stencil. Returns a new grid of the same shape.
pub fn convolve_with_kernel<const N: usize, const ORDER: usize>(
    input: &MeshGrid<N>,
    kernel: impl Fn(&[f64; N]) -> FloatType,
    comm: &dyn MeshComm,
) -> Result<MeshGrid<N>> {
    check_ghosts(input, ORDER, CellLayout::Corner)?;
    let mut output = MeshGrid::new(
        input.nmesh(),
        input.nghost_left(),
        input.nghost_right(),
        comm,
    )?;

    let nmesh = input.nmesh() as i64;
    let stencil_cells = ORDER.pow(N as u32);
    let first_offset = if ORDER % 2 == 0 {
        -(ORDER as i64) / 2 + 1
    } else {
        -(ORDER as i64) / 2
    };

    for index in input.real_range() {
        let ix = input.coord_from_real_index(index);
        let mut value = 0.0f64;
        for s in 0..stencil_cells {
            let mut offsets = [0.0f64; N];
            let mut coord = [0i64; N];
            let mut n = 1;
            for d in 0..N {
                let offset = first_offset + ((s / n) % ORDER) as i64;
                n *= ORDER;
                offsets[d] = offset as f64;
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
            value += kernel(&offsets) as f64 * input.get_real(&coord) as f64;
        }
        output.set_real_from_index(index, value as FloatType);
    }
    Ok(output)
}
