//! # Seen-Set
//! Process-wide record of every item id already examined or delivered.
//!
//! One instance is built at startup and shared by all sessions through an
//! `Arc`. Every operation runs under a single mutex, which totally orders the
//! delta computations of concurrent sessions: an id is reported as new to at
//! most one caller for the lifetime of the process. Entries are never removed.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::feed::types::ItemId;

#[derive(Debug, Default)]
pub struct SeenSet {
    inner: Mutex<HashSet<ItemId>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every candidate and return, in input order, those that were absent.
    ///
    /// All candidates are marked, including ones the caller will not deliver.
    pub fn mark_and_diff(&self, candidates: &[ItemId]) -> Vec<ItemId> {
        let mut seen = self.inner.lock().expect("seen-set mutex poisoned");
        candidates
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Insert a baseline without producing a diff.
    pub fn mark_seeded<I: IntoIterator<Item = ItemId>>(&self, ids: I) {
        let mut seen = self.inner.lock().expect("seen-set mutex poisoned");
        seen.extend(ids);
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.inner
            .lock()
            .expect("seen-set mutex poisoned")
            .contains(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("seen-set mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
