//! Process-local monotonic identifier generation.
//!
//! A private `u64` counter behind an atomic, handed out in order. Names
//! (graph/context/app ids) only ever need to be unique within one worker's
//! registry, so a process-local counter suffices.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic id generator, cheap to clone (shares the counter).
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Allocate the next raw counter value.
    pub fn next_raw(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate a fresh, prefixed, process-unique id such as `graph-0`,
    /// `ctx-7`, `app-2`.
    pub fn next_named(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_raw())
    }

    /// Allocate an id that must hold cluster-wide (composed with the
    /// fragment id), used when the coordinator cannot locally disambiguate
    /// two workers generating the same name independently.
    pub fn next_cluster_wide(&self, prefix: &str, fid: u32) -> String {
        format!("{prefix}-{fid}-{}", self.next_raw())
    }
}
