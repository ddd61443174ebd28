//! The vertex map: translation table between original vertex ids (OIDs)
//! and global numeric ids (GIDs), shared by every fragment of one graph.
//!
//! A GID is partitioned by fragment id: fragment `f`'s inner vertices
//! occupy a contiguous numeric block, so for each (fid, label) the
//! inner-vertex block is always contiguous.

use std::collections::HashMap;

/// Per-fragment-id OID<->GID translation tables.
///
/// `o2g[f]` maps an OID owned by fragment `f` to its GID; `oid_arrays[f]`
/// is the inverse (GID's local offset within `f`'s block -> OID). Both
/// members are named explicitly because `AddColumn`'s consistency
/// precondition compares them directly against a context's vertex map.
#[derive(Clone, Debug, Default)]
pub struct VertexMap {
    fnum: u32,
    o2g: Vec<HashMap<String, u64>>,
    oid_arrays: Vec<Vec<String>>,
}

impl VertexMap {
    /// Build an empty vertex map for `fnum` fragments.
    #[must_use]
    pub fn empty(fnum: u32) -> Self {
        Self {
            fnum,
            o2g: vec![HashMap::new(); fnum as usize],
            oid_arrays: vec![Vec::new(); fnum as usize],
        }
    }

    #[must_use]
    pub fn fnum(&self) -> u32 {
        self.fnum
    }

    /// Block base GID for fragment `fid`: the sum of the sizes of all
    /// fragments with a lower id (keeps each fragment's block contiguous).
    fn block_base(&self, fid: u32) -> u64 {
        (0..fid).map(|f| self.oid_arrays[f as usize].len() as u64).sum()
    }

    /// Register an OID as owned by fragment `fid`, returning its GID.
    /// Idempotent: re-adding the same OID under the same fragment returns
    /// the existing GID.
    pub fn add_vertex(&mut self, fid: u32, oid: impl Into<String>) -> u64 {
        let oid = oid.into();
        if let Some(&gid) = self.o2g[fid as usize].get(&oid) {
            return gid;
        }
        let local = self.oid_arrays[fid as usize].len() as u64;
        let gid = self.block_base(fid) + local;
        self.oid_arrays[fid as usize].push(oid.clone());
        self.o2g[fid as usize].insert(oid, gid);
        gid
    }

    /// Resolve an OID to a GID, searching every fragment's table (a vertex
    /// map is shared cluster-wide, so ownership is irrelevant to lookups).
    #[must_use]
    pub fn get_gid(&self, oid: &str) -> Option<u64> {
        self.o2g.iter().find_map(|table| table.get(oid).copied())
    }

    /// Resolve a GID back to its OID.
    #[must_use]
    pub fn get_oid(&self, gid: u64) -> Option<&str> {
        let mut remaining = gid;
        for block in &self.oid_arrays {
            if (remaining as usize) < block.len() {
                return Some(block[remaining as usize].as_str());
            }
            remaining -= block.len() as u64;
        }
        None
    }

    /// Owning fragment id for a GID.
    #[must_use]
    pub fn fid_of(&self, gid: u64) -> Option<u32> {
        let mut remaining = gid;
        for (fid, block) in self.oid_arrays.iter().enumerate() {
            if (remaining as usize) < block.len() {
                return Some(fid as u32);
            }
            remaining -= block.len() as u64;
        }
        None
    }

    /// OIDs owned by fragment `fid`, in insertion (contiguous GID) order.
    #[must_use]
    pub fn oids_of(&self, fid: u32) -> &[String] {
        &self.oid_arrays[fid as usize]
    }

    /// Deep clone restricted to a single fragment id's tables -- used by
    /// the `fnum`-way parallel vertex-map copy: each
    /// spawned thread clones exactly one source fragment id's slice.
    #[must_use]
    pub fn clone_fragment_slice(&self, fid: u32) -> (HashMap<String, u64>, Vec<String>) {
        (
            self.o2g[fid as usize].clone(),
            self.oid_arrays[fid as usize].clone(),
        )
    }

    /// Reassemble a vertex map from per-fragment slices gathered from
    /// parallel clone threads, preserving fragment order.
    #[must_use]
    pub fn from_slices(fnum: u32, slices: Vec<(HashMap<String, u64>, Vec<String>)>) -> Self {
        debug_assert_eq!(slices.len(), fnum as usize);
        let mut o2g = Vec::with_capacity(fnum as usize);
        let mut oid_arrays = Vec::with_capacity(fnum as usize);
        for (table, arr) in slices {
            o2g.push(table);
            oid_arrays.push(arr);
        }
        Self {
            fnum,
            o2g,
            oid_arrays,
        }
    }

    /// Consistency check used by `AddColumn`: do two vertex
    /// maps agree on fragment count and, for every fragment id, on both the
    /// o2g table and the oid array?
    #[must_use]
    pub fn consistent_with(&self, other: &VertexMap) -> bool {
        self.fnum == other.fnum
            && self.o2g == other.o2g
            && self.oid_arrays == other.oid_arrays
    }
}

impl PartialEq for VertexMap {
    fn eq(&self, other: &Self) -> bool {
        self.consistent_with(other)
    }
}
