//! MPI-style collective communicator.
//!
//! A production deployment would delegate this to an external MPI binding.
//! Here we give the contract a concrete, in-process shape, built on
//! `std::sync::Barrier`/`Mutex` rather than a fabricated MPI dependency, so
//! the collective discipline (barriers, gather, broadcast) is actually
//! exercisable from tests.

use std::sync::{Arc, Barrier, Mutex};

/// A collective communicator shared by the `fnum` workers of one cluster.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Block until every rank has called `barrier`.
    fn barrier(&self);

    /// Every rank contributes `data`; rank 0 receives all contributions in
    /// ascending rank order. Non-root
    /// ranks receive `None`.
    fn gather(&self, data: Vec<u8>) -> Option<Vec<Vec<u8>>>;

    /// Rank `root` provides `data`; every rank (including root) receives a
    /// copy of it.
    fn broadcast(&self, root: usize, data: Option<Vec<u8>>) -> Vec<u8>;
}

struct LocalCommShared {
    size: usize,
    barrier: Barrier,
    gather_slots: Mutex<Vec<Option<Vec<u8>>>>,
    broadcast_slot: Mutex<Option<Vec<u8>>>,
}

/// In-process communicator: one instance per simulated rank, all sharing
/// one [`LocalCommShared`]. Built in groups via [`LocalComm::new_group`] so
/// every rank's handle is wired to the same barrier and buffers.
pub struct LocalComm {
    rank: usize,
    shared: Arc<LocalCommShared>,
}

impl LocalComm {
    /// Build `size` communicator handles, one per rank, all part of the same
    /// collective group.
    #[must_use]
    pub fn new_group(size: usize) -> Vec<LocalComm> {
        let shared = Arc::new(LocalCommShared {
            size,
            barrier: Barrier::new(size),
            gather_slots: Mutex::new(vec![None; size]),
            broadcast_slot: Mutex::new(None),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn gather(&self, data: Vec<u8>) -> Option<Vec<Vec<u8>>> {
        self.shared.gather_slots.lock().unwrap()[self.rank] = Some(data);
        self.shared.barrier.wait();

        let result = if self.rank == 0 {
            let slots = self.shared.gather_slots.lock().unwrap();
            Some(slots.iter().cloned().map(|s| s.unwrap()).collect())
        } else {
            None
        };
        self.shared.barrier.wait();

        if self.rank == 0 {
            let mut slots = self.shared.gather_slots.lock().unwrap();
            slots.iter_mut().for_each(|s| *s = None);
        }
        self.shared.barrier.wait();
        result
    }

    fn broadcast(&self, root: usize, data: Option<Vec<u8>>) -> Vec<u8> {
        if self.rank == root {
            *self.shared.broadcast_slot.lock().unwrap() = data;
        }
        self.shared.barrier.wait();

        let result = self
            .shared
            .broadcast_slot
            .lock()
            .unwrap()
            .clone()
            .expect("broadcast root did not provide data");
        self.shared.barrier.wait();

        if self.rank == root {
            *self.shared.broadcast_slot.lock().unwrap() = None;
        }
        self.shared.barrier.wait();
        result
    }
}
