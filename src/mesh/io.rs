//! Grid persistence: one binary file per process.
//!
//! Files are named `<prefix>.<rank>` and use native endianness with no
//! checksum. The payload is the raw complex allocation, ghosts and
//! padding included, so a reloaded grid is bit-identical.

use super::MeshGrid;
use crate::error::{CosmogridError, Result};
use crate::ComplexType;
use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

impl<const N: usize> MeshGrid<N> {
    /// Write the grid to `<prefix>.<rank>`.
    ///
    /// A failed save is logged and otherwise ignored; the caller keeps
    /// the in-memory grid either way.
    pub fn save(&self, prefix: &str) {
        let filename = format!("{prefix}.{}", self.rank());
        if let Err(error) = self.write_file(&filename) {
            tracing::warn!(filename = %filename, error = %error, "failed to save grid, continuing");
        }
    }

    fn write_file(&self, filename: &str) -> Result<()> {
        let mut w = BufWriter::new(File::create(filename)?);
        w.write_i32::<NativeEndian>(N as i32)?;
        w.write_i32::<NativeEndian>(self.nmesh() as i32)?;
        w.write_i32::<NativeEndian>(self.nghost_left() as i32)?;
        w.write_i32::<NativeEndian>(self.nghost_right() as i32)?;
        w.write_i64::<NativeEndian>(self.local_nx() as i64)?;
        w.write_i64::<NativeEndian>(self.local_x_start() as i64)?;
        w.write_i64::<NativeEndian>(self.alloc_complex_len() as i64)?;
        w.write_i64::<NativeEndian>(2 * self.alloc_complex_len() as i64)?;
        w.write_i64::<NativeEndian>(self.owned_complex_len() as i64)?;
        w.write_i64::<NativeEndian>(self.slab_complex_len() as i64)?;
        w.write_i64::<NativeEndian>(self.slab_real_len() as i64)?;
        w.write_u8(self.status_real() as u8)?;
        w.write_all(bytemuck::cast_slice(&self.data))?;
        w.flush()?;
        Ok(())
    }

    /// Replace this grid with the contents of `<prefix>.<rank>`.
    ///
    /// Every geometry field and the full payload come from the file. A
    /// dimension mismatch is fatal.
    pub fn load(&mut self, prefix: &str) -> Result<()> {
        let filename = format!("{prefix}.{}", self.rank());
        let mut r = BufReader::new(File::open(&filename)?);

        let ndim = r.read_i32::<NativeEndian>()? as usize;
        if ndim != N {
            return Err(CosmogridError::ShapeMismatch {
                expected: N,
                found: ndim,
            });
        }
        self.nmesh = r.read_i32::<NativeEndian>()? as usize;
        self.nghost_left = r.read_i32::<NativeEndian>()? as usize;
        self.nghost_right = r.read_i32::<NativeEndian>()? as usize;
        self.local_nx = r.read_i64::<NativeEndian>()? as usize;
        self.local_x_start = r.read_i64::<NativeEndian>()? as usize;
        let alloc_complex = r.read_i64::<NativeEndian>()? as usize;
        let _alloc_real = r.read_i64::<NativeEndian>()?;
        self.owned_complex = r.read_i64::<NativeEndian>()? as usize;
        self.slab_complex = r.read_i64::<NativeEndian>()? as usize;
        self.slab_real = r.read_i64::<NativeEndian>()? as usize;
        self.in_real_space = r.read_u8()? != 0;
        self.active_real = self.local_nx * self.nmesh.pow(N as u32 - 1);

        self.data = vec![ComplexType::new(0.0, 0.0); alloc_complex];
        r.read_exact(bytemuck::cast_slice_mut(&mut self.data))?;
        Ok(())
    }
}
