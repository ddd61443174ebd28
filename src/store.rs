//! Shared-memory object store client" external collaborator): blob persistence,
//! named-object lookup, fragment-group assembly, deletion.

use crate::error::EngineError;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Client surface the dispatcher and fragment wrappers use to talk to the
/// shared object store. All methods are safe to call from any worker
/// concurrently; `construct_fragment_group` is the one collective-shaped
/// operation.
pub trait ObjectStore: Send + Sync {
    /// Persist a blob, returning its object id.
    fn put_blob(&self, bytes: Vec<u8>) -> Result<i64, EngineError>;

    /// Fetch a previously persisted blob.
    fn get_blob(&self, id: i64) -> Result<Vec<u8>, EngineError>;

    /// Delete a blob. Fails with `NotFound` if absent.
    fn delete_blob(&self, id: i64) -> Result<(), EngineError>;

    /// Register this worker's `fid` as a member of a fragment-group. When
    /// `group_id` is `None`, a new group is allocated (typically done by
    /// worker 0, whose id is then broadcast to the rest of the cluster).
    fn construct_fragment_group(
        &self,
        group_id: Option<i64>,
        fid: u32,
    ) -> Result<i64, EngineError>;

    /// Delete a fragment-group object. Fails with `NotFound` if absent.
    fn delete_fragment_group(&self, group_id: i64) -> Result<(), EngineError>;

    /// True if a fragment-group with this id has any registered member.
    fn has_fragment_group(&self, group_id: i64) -> bool;
}

#[derive(Default)]
struct MemoryStoreInner {
    blobs: HashMap<i64, Vec<u8>>,
    groups: HashMap<i64, HashSet<u32>>,
}

/// In-process object store, shared (via `Arc`) by every worker of one
/// [`crate::cluster::Cluster`].
#[derive(Default)]
pub struct MemoryStore {
    next_id: AtomicI64,
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl ObjectStore for MemoryStore {
    fn put_blob(&self, bytes: Vec<u8>) -> Result<i64, EngineError> {
        let id = self.alloc_id();
        self.inner.lock().unwrap().blobs.insert(id, bytes);
        Ok(id)
    }

    fn get_blob(&self, id: i64) -> Result<Vec<u8>, EngineError> {
        self.inner
            .lock()
            .unwrap()
            .blobs
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("blob {id}")))
    }

    fn delete_blob(&self, id: i64) -> Result<(), EngineError> {
        self.inner
            .lock()
            .unwrap()
            .blobs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("blob {id}")))
    }

    fn construct_fragment_group(
        &self,
        group_id: Option<i64>,
        fid: u32,
    ) -> Result<i64, EngineError> {
        let mut inner = self.inner.lock().unwrap();
        let id = match group_id {
            Some(id) => id,
            None => self.alloc_id(),
        };
        inner.groups.entry(id).or_default().insert(fid);
        Ok(id)
    }

    fn delete_fragment_group(&self, group_id: i64) -> Result<(), EngineError> {
        self.inner
            .lock()
            .unwrap()
            .groups
            .remove(&group_id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("fragment group {group_id}")))
    }

    fn has_fragment_group(&self, group_id: i64) -> bool {
        self.inner.lock().unwrap().groups.contains_key(&group_id)
    }
}
