//! Slot buffer and probe walks with explicit hashing.
//!
//! [`RawTable`] knows nothing about how keys are hashed. Callers pass the 32-bit hash of the key
//! for every operation, and a hasher closure whenever entries have to be moved into a table of a
//! different size.
use std::mem;

/// Smallest supported capacity exponent, also the default reserved floor.
pub const MIN_SIZE_EXP: u32 = 7;
/// Largest supported capacity exponent.
pub const MAX_SIZE_EXP: u32 = 31;
/// Probe distances are stored in a byte, reaching this value forces a growing rebuild.
pub(crate) const PROBE_LIMIT: u8 = u8::MAX;

/// Number of slots for a capacity exponent, `None` if it doesn't fit the address space.
#[inline(always)]
pub(crate) fn slot_count(size_exp: u32) -> Option<usize> {
    1usize.checked_shl(size_exp + 1)
}

#[derive(Clone, Debug)]
pub(crate) struct Entry<V> {
    pub key: u32,
    pub dist: u8,
    pub value: V,
}

#[derive(Clone, Debug)]
#[allow(dead_code)] // tombstone keys are only inspected when debugging
pub(crate) enum Slot<V> {
    Empty,
    Live(Entry<V>),
    Tombstone { key: u32, dist: u8 },
}

impl<V> Slot<V> {
    /// Stored probe distance, `None` for empty slots.
    #[inline(always)]
    pub fn dist(&self) -> Option<u8> {
        match self {
            Slot::Empty => None,
            Slot::Live(entry) => Some(entry.dist),
            Slot::Tombstone { dist, .. } => Some(*dist),
        }
    }
}

pub(crate) enum InsertResult<V> {
    Inserted,
    Updated(V),
    /// The probe distance hit [`PROBE_LIMIT`] while placing `key`.
    ///
    /// When `displaced` is `false`, `key` is the inserted key and the table is unchanged.
    /// Otherwise the inserted key was stored and `key` is an evicted entry that still needs a
    /// slot.
    Saturated {
        key: u32,
        value: V,
        displaced: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Reclaim,
    Vacant,
    Displace,
}

#[derive(Clone, Debug)]
pub(crate) struct RawTable<V> {
    slots: Vec<Slot<V>>,
    size_exp: u32,
    members: usize,
    tombstones: usize,
    rebuilds: usize,
}

fn empty_slots<V>(size_exp: u32) -> Vec<Slot<V>> {
    let Some(len) = slot_count(size_exp) else {
        panic!("capacity exponent {size_exp} exceeds the address space");
    };
    let mut slots = Vec::with_capacity(len);
    slots.resize_with(len, || Slot::Empty);
    slots
}

impl<V> RawTable<V> {
    pub fn new(size_exp: u32) -> Self {
        RawTable {
            slots: empty_slots(size_exp),
            size_exp,
            members: 0,
            tombstones: 0,
            rebuilds: 0,
        }
    }

    #[inline(always)]
    fn mesh(&self) -> usize {
        self.slots.len() - 1
    }

    #[inline(always)]
    pub fn size_exp(&self) -> u32 {
        self.size_exp
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub fn max_live(&self) -> usize {
        self.slots.len() >> 1
    }

    #[inline(always)]
    pub fn members(&self) -> usize {
        self.members
    }

    #[inline(always)]
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    #[inline(always)]
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    #[inline(always)]
    pub fn slots(&self) -> &[Slot<V>] {
        &self.slots
    }

    pub fn into_slots(self) -> Vec<Slot<V>> {
        self.slots
    }

    /// Returns the index of the live slot holding `key` and the number of probe steps taken.
    pub fn find(&self, hash: u32, key: u32) -> Option<(usize, u8)> {
        let mesh = self.mesh();
        let mut index = hash as usize & mesh;
        let mut dist = 0u8;
        loop {
            match &self.slots[index] {
                Slot::Live(entry) if entry.key == key => return Some((index, dist)),
                Slot::Empty => return None,
                Slot::Live(Entry { dist: stored, .. }) | Slot::Tombstone { dist: stored, .. }
                    if dist > *stored =>
                {
                    return None
                }
                _ => {}
            }
            index = (index + 1) & mesh;
            dist = dist.checked_add(1)?;
        }
    }

    #[inline(always)]
    pub fn entry(&self, index: usize) -> Option<&Entry<V>> {
        match &self.slots[index] {
            Slot::Live(entry) => Some(entry),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn entry_mut(&mut self, index: usize) -> Option<&mut Entry<V>> {
        match &mut self.slots[index] {
            Slot::Live(entry) => Some(entry),
            _ => None,
        }
    }

    fn occupy(&mut self, index: usize, entry: Entry<V>) {
        if let Slot::Tombstone { .. } = mem::replace(&mut self.slots[index], Slot::Live(entry)) {
            self.tombstones -= 1;
        }
        self.members += 1;
    }

    /// Inserts or updates `key`.
    ///
    /// Does not grow the table, except for saturation the caller is responsible for keeping
    /// enough empty slots around.
    pub fn insert(&mut self, hash: u32, key: u32, value: V) -> InsertResult<V> {
        let mesh = self.mesh();
        let mut index = hash as usize & mesh;
        let mut dist = 0u8;
        // First tombstone we may take over, once we know `key` isn't stored further along.
        let mut reclaim: Option<(usize, u8)> = None;

        loop {
            let step = match &mut self.slots[index] {
                Slot::Live(entry) if entry.key == key => {
                    return InsertResult::Updated(mem::replace(&mut entry.value, value));
                }
                Slot::Live(entry) if dist > entry.dist => Step::Displace,
                Slot::Live(_) => Step::Continue,
                Slot::Tombstone { dist: stored, .. } if dist > *stored => Step::Vacant,
                Slot::Tombstone { dist: stored, .. } if dist == *stored => Step::Reclaim,
                Slot::Tombstone { .. } => Step::Continue,
                Slot::Empty => Step::Vacant,
            };

            match step {
                Step::Continue => {}
                Step::Reclaim => {
                    reclaim.get_or_insert((index, dist));
                }
                Step::Vacant | Step::Displace => {
                    if let Some((index, dist)) = reclaim {
                        self.occupy(index, Entry { key, dist, value });
                        return InsertResult::Inserted;
                    }
                    let entry = Entry { key, dist, value };
                    if step == Step::Vacant {
                        self.occupy(index, entry);
                        return InsertResult::Inserted;
                    }
                    return self.displace(index, entry);
                }
            }

            index = (index + 1) & mesh;
            dist += 1;
            if dist == PROBE_LIMIT {
                // Nothing is ever stored this far out, so `key` is absent.
                if let Some((index, dist)) = reclaim {
                    self.occupy(index, Entry { key, dist, value });
                    return InsertResult::Inserted;
                }
                return InsertResult::Saturated {
                    key,
                    value,
                    displaced: false,
                };
            }
        }
    }

    /// Stores `carried` at `index`, evicting the poorer occupant and walking on with it.
    fn displace(&mut self, mut index: usize, mut carried: Entry<V>) -> InsertResult<V> {
        let mesh = self.mesh();
        loop {
            let vacant = match &mut self.slots[index] {
                Slot::Live(entry) => {
                    if carried.dist > entry.dist {
                        mem::swap(entry, &mut carried);
                    }
                    false
                }
                Slot::Tombstone { dist, .. } => carried.dist >= *dist,
                Slot::Empty => true,
            };
            if vacant {
                self.occupy(index, carried);
                return InsertResult::Inserted;
            }

            index = (index + 1) & mesh;
            carried.dist += 1;
            if carried.dist == PROBE_LIMIT {
                return InsertResult::Saturated {
                    key: carried.key,
                    value: carried.value,
                    displaced: true,
                };
            }
        }
    }

    /// Inserts a key known to be absent, growing the table as often as saturation demands.
    ///
    /// # Panics
    /// Panics if saturation persists at [`MAX_SIZE_EXP`].
    pub fn insert_unique(&mut self, key: u32, value: V, hasher: &impl Fn(u32) -> u32) {
        let (mut key, mut value) = (key, value);
        loop {
            match self.insert(hasher(key), key, value) {
                InsertResult::Inserted => return,
                InsertResult::Updated(_) => unreachable!("key inserted twice"),
                InsertResult::Saturated {
                    key: pending_key,
                    value: pending_value,
                    ..
                } => {
                    log::warn!(
                        "probe distance saturated at size_exp {}, growing",
                        self.size_exp
                    );
                    self.rebuild(self.size_exp + 1, hasher);
                    key = pending_key;
                    value = pending_value;
                }
            }
        }
    }

    /// Removes `key`, leaving a tombstone behind.
    pub fn remove(&mut self, hash: u32, key: u32) -> Option<V> {
        let (index, _) = self.find(hash, key)?;
        let slot = &mut self.slots[index];
        let Slot::Live(entry) = mem::replace(slot, Slot::Empty) else {
            unreachable!()
        };
        *slot = Slot::Tombstone {
            key: entry.key,
            dist: entry.dist,
        };
        self.members -= 1;
        self.tombstones += 1;
        Some(entry.value)
    }

    /// Moves all live entries into a fresh buffer sized for `size_exp`, dropping tombstones.
    ///
    /// # Panics
    /// Panics if `size_exp` exceeds [`MAX_SIZE_EXP`], callers check this upfront.
    pub fn rebuild(&mut self, size_exp: u32, hasher: &impl Fn(u32) -> u32) {
        assert!(
            size_exp <= MAX_SIZE_EXP,
            "capacity exponent {size_exp} exceeds the maximum of {MAX_SIZE_EXP}"
        );
        log::debug!(
            "rebuilding table: size_exp {} -> {}, {} members, {} tombstones",
            self.size_exp,
            size_exp,
            self.members,
            self.tombstones
        );
        let old_slots = mem::replace(&mut self.slots, empty_slots(size_exp));
        let members = self.members;
        self.size_exp = size_exp;
        self.members = 0;
        self.tombstones = 0;
        self.rebuilds += 1;

        for slot in old_slots {
            if let Slot::Live(entry) = slot {
                self.insert_unique(entry.key, entry.value, hasher);
            }
        }
        debug_assert_eq!(self.members, members);
    }

    /// Drops all entries and reallocates at `size_exp`.
    pub fn reset(&mut self, size_exp: u32) {
        self.slots = empty_slots(size_exp);
        self.size_exp = size_exp;
        self.members = 0;
        self.tombstones = 0;
    }

    /// Largest stored probe distance of any occupied slot.
    pub fn max_probe_distance(&self) -> u8 {
        self.slots
            .iter()
            .filter_map(Slot::dist)
            .max()
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn check(&self, hasher: impl Fn(u32) -> u32) {
        let mesh = self.mesh();
        let mut members = 0;
        let mut tombstones = 0;
        for (index, slot) in self.slots.iter().enumerate() {
            let (key, dist) = match slot {
                Slot::Empty => continue,
                Slot::Live(entry) => {
                    members += 1;
                    (entry.key, entry.dist)
                }
                Slot::Tombstone { key, dist } => {
                    tombstones += 1;
                    (*key, *dist)
                }
            };
            let home = hasher(key) as usize & mesh;
            assert_eq!(
                index.wrapping_sub(home) & mesh,
                dist as usize,
                "stored distance of key {key} doesn't match its position"
            );
            if let Slot::Live(_) = slot {
                assert_eq!(self.find(hasher(key), key), Some((index, dist)));
            }
            if dist > 0 {
                let prev = self.slots[index.wrapping_sub(1) & mesh].dist();
                assert!(
                    prev.is_some_and(|prev| prev + 1 >= dist),
                    "robin hood ordering violated before slot {index}"
                );
            }
        }
        assert_eq!(members, self.members);
        assert_eq!(tombstones, self.tombstones);
        assert!(self.members <= self.max_live());
        assert!(self.members + self.tombstones <= self.capacity());
    }
}
