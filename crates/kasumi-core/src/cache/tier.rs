//! Cache tiers.
//!
//! A [`Tier`] is an unbounded id-to-entity map; a [`BoundedTier`] additionally
//! evicts in strict insertion order once it grows past its limit. Both guard
//! their map with a single reader-writer lock, and both hand out shared
//! `Arc`s: an id present in a tier always maps to exactly one live entity.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::CacheSettings;
use crate::foundation::snowflake::Snowflake;
use crate::model::Entity;

// =============================================================================
// Tier
// =============================================================================

/// An unbounded id-to-entity map.
pub struct Tier<E: Entity> {
    entries: RwLock<HashMap<Snowflake, Arc<E>>>,
}

impl<E: Entity> Tier<E> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: Snowflake) -> Option<Arc<E>> {
        self.entries.read().get(&id).cloned()
    }

    /// Upserts `data`.
    ///
    /// An existing entity is updated in place when `update` is set and
    /// returned unchanged otherwise; a missing one is created.
    pub fn put(&self, data: E::Data, update: bool, settings: &CacheSettings) -> Arc<E> {
        let id = E::data_id(&data);
        let mut entries = self.entries.write();
        match entries.entry(id) {
            Entry::Occupied(entry) => {
                if update {
                    entry.get().update(data);
                }
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => Arc::clone(entry.insert(Arc::new(E::create(data, settings)))),
        }
    }

    pub fn remove(&self, id: Snowflake) -> Option<Arc<E>> {
        self.entries.write().remove(&id)
    }

    /// Snapshot of every entity in the tier.
    pub fn list(&self) -> Vec<Arc<E>> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl<E: Entity> Default for Tier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> fmt::Debug for Tier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tier")
            .field("kind", &E::KIND)
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// Bounded Tier
// =============================================================================

struct Bounded<E> {
    entries: HashMap<Snowflake, (Arc<E>, u64)>,
    // Insertion log. An entry is stale once the id was removed or re-inserted
    // under a newer sequence number; stale entries are skipped on eviction.
    order: VecDeque<(Snowflake, u64)>,
    seq: u64,
}

impl<E> Bounded<E> {
    fn evict_oldest(&mut self) {
        while let Some((id, seq)) = self.order.pop_front() {
            if self.entries.get(&id).is_some_and(|(_, s)| *s == seq) {
                self.entries.remove(&id);
                return;
            }
        }
    }

    fn compact(&mut self) {
        let entries = &self.entries;
        self.order
            .retain(|(id, seq)| entries.get(id).is_some_and(|(_, s)| s == seq));
    }
}

/// A capacity-limited tier with strict FIFO eviction.
///
/// Reads never affect eviction order.
pub struct BoundedTier<E: Entity> {
    limit: usize,
    inner: RwLock<Bounded<E>>,
}

impl<E: Entity> BoundedTier<E> {
    /// Creates a tier holding at most `limit` entities.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            inner: RwLock::new(Bounded {
                entries: HashMap::new(),
                order: VecDeque::new(),
                seq: 0,
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn get(&self, id: Snowflake) -> Option<Arc<E>> {
        self.inner.read().entries.get(&id).map(|(e, _)| Arc::clone(e))
    }

    /// Upserts `data`, evicting the oldest entries past the limit.
    pub fn put(&self, data: E::Data, update: bool, settings: &CacheSettings) -> Arc<E> {
        let id = E::data_id(&data);
        let mut inner = self.inner.write();

        if let Some((entity, _)) = inner.entries.get(&id) {
            let entity = Arc::clone(entity);
            if update {
                entity.update(data);
            }
            return entity;
        }

        inner.seq += 1;
        let seq = inner.seq;
        let entity = Arc::new(E::create(data, settings));
        inner.entries.insert(id, (Arc::clone(&entity), seq));
        inner.order.push_back((id, seq));

        while inner.entries.len() > self.limit {
            inner.evict_oldest();
        }
        if inner.order.len() > self.limit.saturating_mul(2).max(16) {
            inner.compact();
        }
        entity
    }

    pub fn remove(&self, id: Snowflake) -> Option<Arc<E>> {
        self.inner.write().entries.remove(&id).map(|(e, _)| e)
    }

    /// Entities in insertion order, oldest first.
    pub fn list(&self) -> Vec<Arc<E>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|(id, seq)| match inner.entries.get(id) {
                Some((e, s)) if s == seq => Some(Arc::clone(e)),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.order.clear();
    }
}

impl<E: Entity> fmt::Debug for BoundedTier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedTier")
            .field("kind", &E::KIND)
            .field("len", &self.len())
            .field("limit", &self.limit)
            .finish()
    }
}
