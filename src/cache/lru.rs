//! The second-level album-art cache: bounded capacity, CLOCK (second-chance)
//! eviction.
//!
//! A single mutex guards the map, the circular access order, and the
//! per-key "used" bit together, so a get-then-evict sequence is never torn
//! by a concurrent writer -- simpler to reason about than lock-free CAS
//! retries, and the cache is not hot enough to need one.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use crate::model::{AlbumArt, DataRef};

struct Inner {
    map: HashMap<DataRef, AlbumArt>,
    /// Circular order of keys; the front is the clock hand's current
    /// position.
    order: VecDeque<DataRef>,
    used: HashSet<DataRef>,
    capacity: usize,
}

impl Inner {
    /// Advance the clock hand until it finds (and evicts) an unused entry,
    /// clearing the used bit of everything it passes over along the way.
    fn evict_one(&mut self) {
        while let Some(candidate) = self.order.pop_front() {
            if self.used.remove(&candidate) {
                self.order.push_back(candidate);
            } else {
                self.map.remove(&candidate);
                return;
            }
        }
    }
}

/// A bounded, concurrent cache of album art keyed by [`DataRef`], evicted
/// by the CLOCK algorithm once it reaches capacity.
pub struct AlbumArtLru {
    inner: Mutex<Inner>,
}

impl AlbumArtLru {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
                used: HashSet::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Look up `key`, marking it used (giving it a second chance) on a hit.
    pub fn get(&self, key: DataRef) -> Option<AlbumArt> {
        let mut inner = self.inner.lock();
        if let Some(art) = inner.map.get(&key).cloned() {
            inner.used.insert(key);
            Some(art)
        } else {
            None
        }
    }

    /// Insert or overwrite `key`. Overwriting an existing key counts as a
    /// use (it stays unevicted at least one more sweep) but does not grow
    /// the cache past capacity.
    pub fn put(&self, key: DataRef, art: AlbumArt) {
        let mut inner = self.inner.lock();
        if inner.map.contains_key(&key) {
            inner.map.insert(key, art);
            inner.used.insert(key);
            return;
        }
        if inner.map.len() >= inner.capacity {
            inner.evict_one();
        }
        inner.map.insert(key, art);
        inner.order.push_back(key);
    }

    /// Remove `key` unconditionally, e.g. because its media was unmounted.
    pub fn remove(&self, key: DataRef) {
        let mut inner = self.inner.lock();
        inner.map.remove(&key);
        inner.used.remove(&key);
        inner.order.retain(|k| *k != key);
    }

    /// Remove every entry belonging to `slot` (its media was unmounted).
    pub fn remove_slot(&self, slot: crate::model::SlotRef) {
        let mut inner = self.inner.lock();
        let doomed: Vec<DataRef> = inner
            .map
            .keys()
            .filter(|k| k.slot == slot)
            .copied()
            .collect();
        for key in doomed {
            inner.map.remove(&key);
            inner.used.remove(&key);
            inner.order.retain(|k| *k != key);
        }
    }

    /// Remove every entry belonging to any slot of `player` (device-lost).
    pub fn remove_player(&self, player: crate::model::PlayerId) {
        let mut inner = self.inner.lock();
        let doomed: Vec<DataRef> = inner
            .map
            .keys()
            .filter(|k| k.slot.player == player)
            .copied()
            .collect();
        for key in doomed {
            inner.map.remove(&key);
            inner.used.remove(&key);
            inner.order.retain(|k| *k != key);
        }
    }

    /// Resize to `n` (clamped to a minimum of 1, same as `new()`): evict
    /// down to the new capacity, then lower the bound so future inserts
    /// respect it.
    pub fn resize(&self, n: usize) {
        let n = n.max(1);
        let mut inner = self.inner.lock();
        while inner.map.len() > n {
            inner.evict_one();
        }
        inner.capacity = n;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Slot, SlotRef};

    fn key(id: u32) -> DataRef {
        DataRef::new(SlotRef::new(1, Slot::Usb), id)
    }

    fn art(id: u32) -> AlbumArt {
        AlbumArt::new(key(id), vec![id as u8])
    }

    #[test]
    fn respects_capacity() {
        let cache = AlbumArtLru::new(2);
        cache.put(key(1), art(1));
        cache.put(key(2), art(2));
        cache.put(key(3), art(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn used_entries_survive_one_sweep_unused_do_not() {
        let cache = AlbumArtLru::new(2);
        cache.put(key(1), art(1));
        cache.put(key(2), art(2));
        // Touch key(1) so it gets a second chance.
        cache.get(key(1));
        // Inserting key(3) should evict key(2), the only untouched entry.
        cache.put(key(3), art(3));
        assert!(cache.get(key(1)).is_some());
        assert!(cache.get(key(2)).is_none());
        assert!(cache.get(key(3)).is_some());
    }

    #[test]
    fn remove_slot_drops_only_that_slots_entries() {
        let cache = AlbumArtLru::new(10);
        cache.put(key(1), art(1));
        let other_key = DataRef::new(SlotRef::new(2, Slot::Sd), 1);
        cache.put(other_key, AlbumArt::new(other_key, vec![9]));
        cache.remove_slot(SlotRef::new(1, Slot::Usb));
        assert!(cache.get(key(1)).is_none());
        assert!(cache.get(other_key).is_some());
    }

    #[test]
    fn resize_shrinks_and_evicts_down_to_the_new_capacity() {
        let cache = AlbumArtLru::new(5);
        cache.put(key(1), art(1));
        cache.put(key(2), art(2));
        cache.put(key(3), art(3));
        cache.resize(1);
        assert_eq!(cache.len(), 1);
        cache.put(key(4), art(4));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn resize_clamps_below_one_to_one() {
        let cache = AlbumArtLru::new(5);
        cache.put(key(1), art(1));
        cache.resize(0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_player_drops_entries_from_every_slot_of_that_player() {
        let cache = AlbumArtLru::new(10);
        cache.put(key(1), art(1));
        let sd_key = DataRef::new(SlotRef::new(1, Slot::Sd), 1);
        cache.put(sd_key, AlbumArt::new(sd_key, vec![9]));
        let other_player_key = DataRef::new(SlotRef::new(2, Slot::Usb), 1);
        cache.put(other_player_key, AlbumArt::new(other_player_key, vec![5]));

        cache.remove_player(1);
        assert!(cache.get(key(1)).is_none());
        assert!(cache.get(sd_key).is_none());
        assert!(cache.get(other_player_key).is_some());
    }
}
