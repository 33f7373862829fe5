//! MPI communication backend for the distributed mesh.
//!
//! Requires the `distributed` feature flag and an MPI installation.
//!
//! The caller must initialize MPI before constructing `MpiComm`:
//!
//! ```ignore
//! let universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new();
//! ```
//!
//! The slab exchange uses blocking send/receive ordered by rank (the
//! lower-ranked peer sends first) so that the pairwise exchanges of a
//! ring cannot deadlock.

use crate::comm::MeshComm;
use crate::FloatType;
use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

/// MPI-based communication backend.
///
/// Wraps the MPI world communicator. Requires `mpi::initialize()` to have
/// been called before construction.
pub struct MpiComm;

impl MpiComm {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MpiComm {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshComm for MpiComm {
    fn rank(&self) -> usize {
        SimpleCommunicator::world().rank() as usize
    }

    fn size(&self) -> usize {
        SimpleCommunicator::world().size() as usize
    }

    fn sendrecv(&self, send: &[FloatType], dest: usize, recv: &mut [FloatType], source: usize) {
        let world = SimpleCommunicator::world();
        let my_rank = world.rank();

        if dest as i32 == my_rank && source as i32 == my_rank {
            // Single-rank world: a blocking send to self would deadlock.
            recv.copy_from_slice(send);
            return;
        }

        let dest_proc = world.process_at_rank(dest as i32);
        let source_proc = world.process_at_rank(source as i32);
        if my_rank < dest as i32 {
            dest_proc.send(send);
            source_proc.receive_into(recv);
        } else {
            source_proc.receive_into(recv);
            dest_proc.send(send);
        }
    }

    fn all_reduce_sum(&self, local: f64) -> f64 {
        let world = SimpleCommunicator::world();
        let mut global = 0.0f64;
        world.all_reduce_into(&local, &mut global, SystemOperation::sum());
        global
    }

    fn broadcast_bytes(&self, data: &mut Vec<u8>, root: usize) {
        let world = SimpleCommunicator::world();
        let root_proc = world.process_at_rank(root as i32);
        let mut len = data.len() as u64;
        root_proc.broadcast_into(&mut len);
        data.resize(len as usize, 0);
        if len > 0 {
            root_proc.broadcast_into(&mut data[..]);
        }
    }

    fn barrier(&self) {
        SimpleCommunicator::world().barrier();
    }
}
