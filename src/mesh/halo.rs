//! Halo exchange: replicate boundary slabs into neighbor ghost regions.

use super::MeshGrid;
use crate::comm::MeshComm;
use crate::FloatType;

impl<const N: usize> MeshGrid<N> {
    /// Refresh the ghost slabs from the ring neighbors.
    ///
    /// Each process receives `min(nghost_right, local_nx)` slabs into its
    /// right ghosts from the right neighbor and `min(nghost_left,
    /// local_nx)` into its left ghosts from the left neighbor. Slabs
    /// travel one at a time with their padding; the right-direction phase
    /// completes before the left-direction phase begins. Blocking and
    /// collective: every rank must call this together. With a single
    /// process the exchange wraps around locally, giving periodic
    /// boundaries.
    pub fn halo_exchange(&mut self, comm: &dyn MeshComm) {
        let n_recv_right = self.nghost_right().min(self.local_nx());
        let n_recv_left = self.nghost_left().min(self.local_nx());

        let _span =
            tracing::debug_span!("halo_exchange", n_recv_left, n_recv_right).entered();

        let size = comm.size();
        let rank = comm.rank();
        let right = (rank + 1) % size;
        let left = (rank + size - 1) % size;
        let local_nx = self.local_nx() as i64;

        let mut sendbuf: Vec<FloatType> = vec![0.0; self.slab_real_len()];
        let mut recvbuf: Vec<FloatType> = vec![0.0; self.slab_real_len()];

        // Leftmost owned slabs travel left; they land in the left
        // neighbor's right-ghost region while ours arrives from the right.
        for i in 0..n_recv_right as i64 {
            sendbuf.copy_from_slice(self.real_slab(i));
            comm.sendrecv(&sendbuf, left, &mut recvbuf, right);
            self.real_slab_mut(local_nx + i).copy_from_slice(&recvbuf);
        }

        // Rightmost owned slabs travel right, filling left ghosts.
        for i in 0..n_recv_left as i64 {
            sendbuf.copy_from_slice(self.real_slab(local_nx - 1 - i));
            comm.sendrecv(&sendbuf, right, &mut recvbuf, left);
            self.real_slab_mut(-1 - i).copy_from_slice(&recvbuf);
        }
    }
}
