//! Communication backend abstraction for the distributed mesh.
//!
//! Provides a trait for ring communication between slab-owning processes
//! (combined send/receive of boundary slabs, scalar reductions, byte
//! broadcast) and two MPI-free implementations: a single-process backend
//! and a channel-based ring of in-process ranks for multi-rank testing.

use crate::FloatType;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Barrier, Mutex};

/// Abstraction over inter-process communication for the distributed mesh.
///
/// Implementations: [`LocalComm`] (single process), [`ThreadComm`]
/// (in-process ranks over channels), `MpiComm` (via the mpi crate, behind
/// the `distributed` feature).
pub trait MeshComm: Send + Sync {
    /// This process's rank (slab-block index).
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn size(&self) -> usize;

    /// Blocking combined send/receive: ship `send` to rank `dest` while
    /// filling `recv` from rank `source`. Every rank of the ring must call
    /// this collectively with matching peers, or the exchange deadlocks.
    fn sendrecv(&self, send: &[FloatType], dest: usize, recv: &mut [FloatType], source: usize);

    /// Sum a local scalar across all ranks.
    fn all_reduce_sum(&self, local: f64) -> f64;

    /// Replace `data` on every rank with rank `root`'s copy.
    fn broadcast_bytes(&self, data: &mut Vec<u8>, root: usize);

    /// Synchronization barrier.
    fn barrier(&self);
}

/// Single-process communication backend.
///
/// `sendrecv` degenerates to a memcpy from the send buffer into the
/// receive buffer, which gives halo exchange and ghost reduction their
/// periodic wrap-around semantics when only one process owns the mesh.
pub struct LocalComm;

impl MeshComm for LocalComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn sendrecv(&self, send: &[FloatType], dest: usize, recv: &mut [FloatType], source: usize) {
        debug_assert_eq!(dest, 0);
        debug_assert_eq!(source, 0);
        recv.copy_from_slice(send);
    }

    fn all_reduce_sum(&self, local: f64) -> f64 {
        local
    }

    fn broadcast_bytes(&self, _data: &mut Vec<u8>, _root: usize) {}

    fn barrier(&self) {}
}

struct ReduceSlots {
    values: Mutex<Vec<f64>>,
    barrier: Barrier,
}

/// In-process ring of ranks connected by channels.
///
/// [`ThreadComm::ring`] builds one endpoint per rank; each endpoint is
/// moved into its own thread, and the threads then behave like an MPI
/// ring. Used to exercise the multi-rank paths (halo exchange, ghost
/// reduction, mean-mass reduction) without an MPI launcher.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    /// tx[d]: dedicated channel from this rank to rank d.
    tx: Vec<Sender<Vec<u8>>>,
    /// rx[s]: receiving end of rank s's dedicated channel to this rank.
    rx: Vec<Mutex<Receiver<Vec<u8>>>>,
    reduce: Arc<ReduceSlots>,
}

impl ThreadComm {
    /// Create the endpoints of a `size`-rank ring.
    pub fn ring(size: usize) -> Vec<ThreadComm> {
        assert!(size > 0, "ring needs at least one rank");
        // Channel matrix: one dedicated pair per (sender, receiver).
        let mut senders: Vec<Vec<Option<Sender<Vec<u8>>>>> = Vec::new();
        let mut receivers: Vec<Vec<Option<Receiver<Vec<u8>>>>> = Vec::new();
        for _ in 0..size {
            senders.push((0..size).map(|_| None).collect());
            receivers.push((0..size).map(|_| None).collect());
        }
        for from in 0..size {
            for to in 0..size {
                let (tx, rx) = channel();
                senders[from][to] = Some(tx);
                // Indexed by source rank on the receiving side.
                receivers[to][from] = Some(rx);
            }
        }
        let reduce = Arc::new(ReduceSlots {
            values: Mutex::new(vec![0.0; size]),
            barrier: Barrier::new(size),
        });
        let mut comms = Vec::with_capacity(size);
        for rank in 0..size {
            let tx = senders[rank]
                .iter_mut()
                .map(|s| s.take().expect("sender already taken"))
                .collect();
            let rx = receivers[rank]
                .iter_mut()
                .map(|r| Mutex::new(r.take().expect("receiver already taken")))
                .collect();
            comms.push(ThreadComm {
                rank,
                size,
                tx,
                rx,
                reduce: Arc::clone(&reduce),
            });
        }
        comms
    }
}

impl MeshComm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn sendrecv(&self, send: &[FloatType], dest: usize, recv: &mut [FloatType], source: usize) {
        let bytes: Vec<u8> = bytemuck::cast_slice(send).to_vec();
        self.tx[dest].send(bytes).expect("ring peer hung up");
        let incoming = self.rx[source]
            .lock()
            .unwrap()
            .recv()
            .expect("ring peer hung up");
        // A byte buffer carries no alignment guarantee, so re-collect
        // instead of casting in place.
        let values: Vec<FloatType> = bytemuck::pod_collect_to_vec(&incoming);
        recv.copy_from_slice(&values);
    }

    fn all_reduce_sum(&self, local: f64) -> f64 {
        self.reduce.values.lock().unwrap()[self.rank] = local;
        self.reduce.barrier.wait();
        let sum: f64 = self.reduce.values.lock().unwrap().iter().sum();
        // Keep the slots alive until everyone has read them.
        self.reduce.barrier.wait();
        sum
    }

    fn broadcast_bytes(&self, data: &mut Vec<u8>, root: usize) {
        if self.rank == root {
            for dest in 0..self.size {
                if dest != root {
                    self.tx[dest].send(data.clone()).expect("ring peer hung up");
                }
            }
        } else {
            *data = self.rx[root]
                .lock()
                .unwrap()
                .recv()
                .expect("ring peer hung up");
        }
    }

    fn barrier(&self) {
        self.reduce.barrier.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn local_comm_rank_and_size() {
        let comm = LocalComm;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert_eq!(comm.all_reduce_sum(3.5), 3.5);
    }

    #[test]
    fn local_comm_sendrecv_is_memcpy() {
        let comm = LocalComm;
        let send = vec![1.0, 2.0, 3.0];
        let mut recv = vec![0.0; 3];
        comm.sendrecv(&send, 0, &mut recv, 0);
        assert_eq!(recv, send);
    }

    #[test]
    fn thread_comm_all_reduce() {
        let handles: Vec<_> = ThreadComm::ring(3)
            .into_iter()
            .map(|comm| thread::spawn(move || comm.all_reduce_sum(comm.rank() as f64 + 1.0)))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 6.0);
        }
    }

    #[test]
    fn thread_comm_ring_shift() {
        // Every rank sends its rank to the right and receives from the left.
        let size = 4;
        let handles: Vec<_> = ThreadComm::ring(size)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let right = (comm.rank() + 1) % size;
                    let left = (comm.rank() + size - 1) % size;
                    let send = vec![comm.rank() as FloatType];
                    let mut recv = vec![0.0 as FloatType];
                    comm.sendrecv(&send, right, &mut recv, left);
                    (comm.rank(), recv[0])
                })
            })
            .collect();
        for h in handles {
            let (rank, got) = h.join().unwrap();
            assert_eq!(got, ((rank + size - 1) % size) as FloatType);
        }
    }

    #[test]
    fn thread_comm_broadcast() {
        let handles: Vec<_> = ThreadComm::ring(3)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let mut data = if comm.rank() == 1 {
                        vec![7u8, 8, 9]
                    } else {
                        Vec::new()
                    };
                    comm.broadcast_bytes(&mut data, 1);
                    data
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec![7u8, 8, 9]);
        }
    }
}
