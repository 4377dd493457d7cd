//! [RobinMap] is an open addressing hash map with `u32` keys using Robin Hood probing.
use crate::{
    error::TableError,
    raw::{slot_count, Entry, InsertResult, RawTable, Slot, MAX_SIZE_EXP, MIN_SIZE_EXP},
    stats::TableStats,
    util::impl_iterator,
};
use std::{
    hash::{BuildHasher, BuildHasherDefault},
    ops::Index,
};
use zwohash::ZwoHasher;

/// Mixes a key down to the 32-bit hash used for slot selection.
#[inline(always)]
fn mix<S: BuildHasher>(build_hasher: &S, key: u32) -> u32 {
    let hash = build_hasher.hash_one(key);
    (hash ^ (hash >> 32)) as u32
}

/// A hash map from `u32` keys to values of type `V`.
///
/// In `RobinMap<V, S>`, `S: BuildHasher` is used to mix keys, it defaults to the deterministic
/// [`ZwoHasher`].
///
/// The table has `2 << size_exp` slots and grows once more than `1 << size_exp` keys are stored,
/// so at most half of the slots are live. Removed keys leave tombstones behind, which are
/// compacted away when they accumulate. The table shrinks again as it empties, but never below
/// the reserved capacity exponent (see [`reserve`](RobinMap::reserve)).
#[derive(Clone)]
pub struct RobinMap<V, S = BuildHasherDefault<ZwoHasher>> {
    table: RawTable<V>,
    reserve_exp: u32,
    build_hasher: S,
}

impl<V: std::fmt::Debug, S> std::fmt::Debug for RobinMap<V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V, S: Default> Default for RobinMap<V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<V, S: Default> RobinMap<V, S> {
    /// Returns an empty map reserving the minimum capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an empty map that never shrinks below the capacity exponent `reserve_exp`.
    pub fn with_reserve(reserve_exp: u32) -> Result<Self, TableError> {
        Self::with_reserve_and_hasher(reserve_exp, S::default())
    }
}

impl<V, S> RobinMap<V, S> {
    /// Returns an empty map reserving the minimum capacity, using the provided BuildHasher.
    pub fn with_hasher(build_hasher: S) -> Self {
        RobinMap {
            table: RawTable::new(MIN_SIZE_EXP),
            reserve_exp: MIN_SIZE_EXP,
            build_hasher,
        }
    }

    /// Returns an empty map that never shrinks below the capacity exponent `reserve_exp`, using
    /// the provided BuildHasher.
    pub fn with_reserve_and_hasher(reserve_exp: u32, build_hasher: S) -> Result<Self, TableError> {
        check_size_exp(reserve_exp)?;
        Ok(RobinMap {
            table: RawTable::new(reserve_exp),
            reserve_exp,
            build_hasher,
        })
    }

    /// Returns the number of keys in the map.
    pub fn len(&self) -> usize {
        self.table.members()
    }

    /// Returns `true` if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.table.members() == 0
    }

    /// Returns the number of slots of the table.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns the current capacity exponent.
    pub fn size_exp(&self) -> u32 {
        self.table.size_exp()
    }

    /// Returns the capacity exponent the table never shrinks below.
    pub fn reserve_exp(&self) -> u32 {
        self.reserve_exp
    }

    /// Removes all entries and shrinks the table back to the reserved capacity.
    pub fn clear(&mut self) {
        self.table.reset(self.reserve_exp);
    }

    /// Returns a snapshot of the table's occupancy.
    pub fn stats(&self) -> TableStats {
        TableStats {
            members: self.table.members(),
            tombstones: self.table.tombstones(),
            capacity: self.table.capacity(),
            max_live: self.table.max_live(),
            size_exp: self.table.size_exp(),
            reserve_exp: self.reserve_exp,
            max_probe_distance: self.table.max_probe_distance(),
            rebuilds: self.table.rebuilds(),
        }
    }
}

fn check_size_exp(size_exp: u32) -> Result<(), TableError> {
    if size_exp < MIN_SIZE_EXP {
        Err(TableError::InvalidReservation { size_exp })
    } else if size_exp > MAX_SIZE_EXP || slot_count(size_exp).is_none() {
        Err(TableError::CapacityExhausted { size_exp })
    } else {
        Ok(())
    }
}

impl<V, S: BuildHasher> RobinMap<V, S> {
    #[inline(always)]
    fn hash(&self, key: u32) -> u32 {
        mix(&self.build_hasher, key)
    }

    /// Rebuilds the table at `size_exp`, which must already be checked.
    fn rebuild(&mut self, size_exp: u32) {
        let build_hasher = &self.build_hasher;
        self.table.rebuild(size_exp, &|key| mix(build_hasher, key));
    }

    /// Grows the table by one capacity exponent.
    fn grow(&mut self) -> Result<(), TableError> {
        let size_exp = self.table.size_exp() + 1;
        if size_exp > MAX_SIZE_EXP || slot_count(size_exp).is_none() {
            return Err(TableError::CapacityExhausted { size_exp });
        }
        self.rebuild(size_exp);
        Ok(())
    }

    /// Raises the table's capacity exponent to at least `min_exp` and makes it the floor the
    /// table never shrinks below.
    ///
    /// Requests below [`MIN_SIZE_EXP`] or above [`MAX_SIZE_EXP`] are rejected without changing
    /// the map. A request below the current floor lowers the floor, allowing the table to shrink
    /// further.
    pub fn reserve(&mut self, min_exp: u32) -> Result<(), TableError> {
        check_size_exp(min_exp)?;
        self.reserve_exp = min_exp;
        if min_exp > self.table.size_exp() {
            self.rebuild(min_exp);
        }
        Ok(())
    }

    /// Inserts a key-value pair, returning the previous value of `key` if present.
    ///
    /// # Panics
    /// Panics if the table has to grow beyond [`MAX_SIZE_EXP`], see [`try_put`](Self::try_put).
    pub fn put(&mut self, key: u32, value: V) -> Option<V> {
        match self.try_put(key, value) {
            Ok(old) => old,
            Err(err) => panic!("{err}"),
        }
    }

    /// Inserts a key-value pair, returning the previous value of `key` if present.
    ///
    /// Returns an error, without changing the map, if storing a new key requires growing the
    /// table beyond [`MAX_SIZE_EXP`].
    ///
    /// # Panics
    /// Panics if probe sequences keep saturating while the table is already at
    /// [`MAX_SIZE_EXP`] after an entry was displaced.
    pub fn try_put(&mut self, key: u32, value: V) -> Result<Option<V>, TableError> {
        let hash = self.hash(key);
        if self.table.members() >= self.table.max_live() {
            // Updates never grow, only a new key would exceed the load limit.
            if let Some((index, _)) = self.table.find(hash, key) {
                let entry = self.table.entry_mut(index);
                return Ok(entry.map(|entry| std::mem::replace(&mut entry.value, value)));
            }
            self.grow()?;
        }
        match self.table.insert(hash, key, value) {
            InsertResult::Inserted => Ok(None),
            InsertResult::Updated(old) => Ok(Some(old)),
            InsertResult::Saturated {
                key,
                value,
                displaced,
            } => {
                log::warn!(
                    "probe distance saturated at size_exp {}, growing",
                    self.table.size_exp()
                );
                if displaced {
                    // `key` was evicted by the new entry, which is already stored, so the
                    // insertion can't be undone.
                    if let Err(err) = self.grow() {
                        panic!("{err}");
                    }
                    let build_hasher = &self.build_hasher;
                    self.table
                        .insert_unique(key, value, &|key| mix(build_hasher, key));
                    Ok(None)
                } else {
                    self.grow()?;
                    self.try_put(key, value)
                }
            }
        }
    }

    /// Returns a reference to the value of `key`, if present.
    pub fn get(&self, key: u32) -> Option<&V> {
        let (index, _) = self.table.find(self.hash(key), key)?;
        self.table.entry(index).map(|entry| &entry.value)
    }

    /// Returns a mutable reference to the value of `key`, if present.
    pub fn get_mut(&mut self, key: u32) -> Option<&mut V> {
        let (index, _) = self.table.find(self.hash(key), key)?;
        self.table.entry_mut(index).map(|entry| &mut entry.value)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains(&self, key: u32) -> bool {
        self.table.find(self.hash(key), key).is_some()
    }

    /// Returns the number of probe steps a lookup of `key` takes, if present.
    ///
    /// This equals the distance of `key`'s slot from the slot its hash selects.
    pub fn probe_distance(&self, key: u32) -> Option<u8> {
        self.table.find(self.hash(key), key).map(|(_, dist)| dist)
    }

    /// Removes `key` from the map. Returns `true` if it was present.
    pub fn remove(&mut self, key: u32) -> bool {
        self.take(key).is_some()
    }

    /// Removes `key` from the map and returns its value, if it was present.
    pub fn take(&mut self, key: u32) -> Option<V> {
        let size_exp = self.table.size_exp();
        let max_live = self.table.max_live();
        if self.table.members() < max_live / 4 && size_exp > self.reserve_exp {
            self.rebuild(size_exp - 1);
        } else if self.table.tombstones() > max_live / 2 {
            self.rebuild(size_exp);
        }

        let hash = self.hash(key);
        let value = self.table.remove(hash, key)?;
        if self.table.members() == 0
            && (self.table.tombstones() > 0 || self.table.size_exp() > self.reserve_exp)
        {
            self.table.reset(self.reserve_exp);
        }
        Some(value)
    }
}

impl<V, S: BuildHasher> Index<u32> for RobinMap<V, S> {
    type Output = V;

    fn index(&self, key: u32) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key {key} not present in map"),
        }
    }
}

impl<V, S: BuildHasher> Extend<(u32, V)> for RobinMap<V, S> {
    fn extend<IntoIter: IntoIterator<Item = (u32, V)>>(&mut self, iter: IntoIter) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

impl<V, S: BuildHasher + Default> FromIterator<(u32, V)> for RobinMap<V, S> {
    fn from_iter<IntoIter: IntoIterator<Item = (u32, V)>>(iter: IntoIter) -> Self {
        let mut map = RobinMap::default();
        map.extend(iter);
        map
    }
}

/// An iterator that returns references into a map.
///
/// This struct is created by the [`iter`](RobinMap::iter) method on [`RobinMap`]. Entries are
/// yielded in slot order, which is unrelated to insertion order.
pub struct Iter<'a, V> {
    slots: std::slice::Iter<'a, Slot<V>>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (u32, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            if let Slot::Live(entry) = slot {
                self.remaining -= 1;
                return Some((entry.key, &entry.value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

/// An iterator that moves out of a map.
///
/// This struct is created by the `into_iter` method on [`RobinMap`].
pub struct IntoIter<V> {
    slots: std::vec::IntoIter<Slot<V>>,
    remaining: usize,
}

impl<V> Iterator for IntoIter<V> {
    type Item = (u32, V);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            if let Slot::Live(Entry { key, value, .. }) = slot {
                self.remaining -= 1;
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IntoIter<V> {}

/// An iterator over the keys of a map, see [`keys`](RobinMap::keys).
pub struct Keys<'a, V> {
    inner: Iter<'a, V>,
}

impl<V> Iterator for Keys<'_, V> {
    type Item = u32;
    impl_iterator!(|(key, _)| key);
}

impl<V> ExactSizeIterator for Keys<'_, V> {}

/// An iterator over the values of a map, see [`values`](RobinMap::values).
pub struct Values<'a, V> {
    inner: Iter<'a, V>,
}

impl<'a, V> Iterator for Values<'a, V> {
    type Item = &'a V;
    impl_iterator!(|(_, value)| value);
}

impl<V> ExactSizeIterator for Values<'_, V> {}

impl<V, S> RobinMap<V, S> {
    /// Returns an iterator over all key-value pairs, in no particular order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            slots: self.table.slots().iter(),
            remaining: self.table.members(),
        }
    }

    /// Returns an iterator over all keys, in no particular order.
    pub fn keys(&self) -> Keys<'_, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over all values, in no particular order.
    pub fn values(&self) -> Values<'_, V> {
        Values { inner: self.iter() }
    }
}

impl<'a, V, S> IntoIterator for &'a RobinMap<V, S> {
    type Item = (u32, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V, S> IntoIterator for RobinMap<V, S> {
    type Item = (u32, V);
    type IntoIter = IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        let remaining = self.table.members();
        IntoIter {
            slots: self.table.into_slots().into_iter(),
            remaining,
        }
    }
}

impl<V, S: BuildHasher> RobinMap<V, S> {
    #[cfg(test)]
    pub(crate) fn check(&self) {
        let build_hasher = &self.build_hasher;
        self.table.check(|key| mix(build_hasher, key));
        assert!(self.table.size_exp() >= self.reserve_exp);
        for (key, _) in self.iter() {
            let (index, dist) = self.table.find(self.hash(key), key).unwrap();
            assert_eq!(self.table.entry(index).map(|entry| entry.dist), Some(dist));
        }
    }

    #[cfg(test)]
    pub(crate) fn home_slot(&self, key: u32) -> usize {
        self.hash(key) as usize & (self.table.capacity() - 1)
    }

    /// Finds the slot of `key` by scanning, without walking its probe sequence.
    #[cfg(test)]
    pub(crate) fn slot_index(&self, key: u32) -> Option<usize> {
        self.table
            .slots()
            .iter()
            .position(|slot| matches!(slot, Slot::Live(entry) if entry.key == key))
    }
}
