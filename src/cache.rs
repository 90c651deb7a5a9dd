// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Deduplicating cache for native state objects.
//!
//! Creating a native state object (a sampler, a blend state, ...) is expensive, while the number
//! of distinct states a renderer actually uses is small. [StateCache] keeps one native handle per
//! distinct descriptor so callers can ask for state per draw call without creating duplicates.
//!
//! # Layout
//!
//! Entries live in a flat array, packed with no gaps below [StateCache::len]. Lookups are a
//! linear scan by value equality, which beats hashing for the tens of entries seen in practice.
//! Removal swaps the last live entry into the hole, so it is O(1) but does not preserve
//! insertion order.
//!
//! # Ownership
//!
//! The cache owns its handles. A handle is released (dropped) exactly once: when it is replaced,
//! purged, evicted, or when the cache itself is dropped. The cache never creates handles; on a
//! miss the caller creates one and inserts it.

use crate::state::StateDescriptor;
use std::fmt::{Debug, Formatter};

const INITIAL_CAPACITY: usize = 8;

struct CacheEntry<D, H> {
    descriptor: D,
    handle: H,
}

pub struct StateCache<D, H> {
    entries: Vec<CacheEntry<D, H>>,
}

impl<D: StateDescriptor, H> StateCache<D, H> {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        StateCache {
            entries: Vec::with_capacity(capacity),
        }
    }

    fn position(&self, descriptor: &D) -> Option<usize> {
        self.entries.iter().position(|e| e.descriptor == *descriptor)
    }

    /// Looks up the handle created for a descriptor equal to `descriptor`.
    pub fn get(&self, descriptor: &D) -> Option<&H> {
        self.position(descriptor).map(|i| &self.entries[i].handle)
    }

    /**
    Stores `handle` for `descriptor`.

    If an equal descriptor is already cached its handle is replaced (and the old one released)
    without growing the cache. Otherwise the entry is appended at the end of the live range.
    */
    pub fn insert(&mut self, descriptor: D, handle: H) {
        if let Some(i) = self.position(&descriptor) {
            self.entries[i].handle = handle;
            return;
        }
        if self.entries.len() == self.entries.capacity() {
            //double rather than leaving growth to Vec's policy
            let grow_by = self.entries.capacity().max(1);
            self.entries.reserve_exact(grow_by);
        }
        self.entries.push(CacheEntry { descriptor, handle });
    }

    /// Returns the cached handle, creating and inserting it on a miss.
    ///
    /// Errors from `create` are returned untouched and leave the cache unchanged.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        descriptor: &D,
        create: impl FnOnce(usize) -> Result<H, E>,
    ) -> Result<&H, E> {
        let index = match self.position(descriptor) {
            Some(i) => {
                logwise::trace_sync!(
                    "state cache hit ({kind})",
                    kind = logwise::privacy::LogIt(D::KIND)
                );
                i
            }
            None => {
                logwise::trace_sync!(
                    "state cache miss ({kind}), {count} cached",
                    kind = logwise::privacy::LogIt(D::KIND),
                    count = self.entries.len()
                );
                let handle = create(self.entries.len())?;
                self.insert(descriptor.clone(), handle);
                self.entries.len() - 1
            }
        };
        Ok(&self.entries[index].handle)
    }

    /// Releases the handle for `descriptor`, if any.
    pub fn purge(&mut self, descriptor: &D) {
        if let Some(i) = self.position(descriptor) {
            //swap_remove moves the last entry into the hole, or just pops when `i` is last
            let removed = self.entries.swap_remove(i);
            drop(removed);
        }
    }

    /// Releases every handle. Capacity is kept for reuse.
    pub fn evict(&mut self) {
        if !self.entries.is_empty() {
            logwise::trace_sync!(
                "evicting {count} {kind} states",
                count = self.entries.len(),
                kind = logwise::privacy::LogIt(D::KIND)
            );
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Live entries in storage order. Purging reorders entries.
    pub fn iter(&self) -> impl Iterator<Item = (&D, &H)> {
        self.entries.iter().map(|e| (&e.descriptor, &e.handle))
    }
}

impl<D: StateDescriptor, H> Default for StateCache<D, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Debug, H> Debug for StateCache<D, H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.capacity())
            .field(
                "descriptors",
                &self.entries.iter().map(|e| &e.descriptor).collect::<Vec<_>>(),
            )
            .finish()
    }
}
