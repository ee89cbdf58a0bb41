//! The raw table: slot array, bucket directory, allocation frontier, and the
//! deletion free-stack, together with the locking protocol that ties them
//! together.
//!
//! Two kinds of locks exist. The *structural* lock serializes every mutation
//! of the bucket directory, the frontier, and the free-stack. Each slot
//! additionally carries its own mutex guarding that slot's key and value, and
//! the occupancy transitions of the slot. The lock hierarchy is structural
//! before slot, never the reverse.
//!
//! Lookups and iteration touch neither the structural lock nor, unless a
//! candidate's full hash matches, any slot lock. They read the atomic bucket
//! and occupancy fields directly and tolerate torn combinations, because every
//! result is re-verified under the owning slot's lock before it is acted on.

use std::borrow::Borrow;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Reserved index meaning "no slot". Doubles as the vacant occupancy marker,
/// so no valid slot index or bucket id may ever equal it.
pub(crate) const NIL: u32 = u32::MAX;

/// A fixed-capacity concurrent table of key/value slots.
pub(crate) struct RawTable<K, V> {
    /// The structural lock. The guarded vector is the deletion stack: indices
    /// of freed slots awaiting reuse, most recently freed on top.
    structural: Mutex<Vec<u32>>,

    /// The smallest slot index that has never been allocated. Advanced (and
    /// occasionally retreated) only under the structural lock; read without
    /// synchronization by iterators.
    frontier: AtomicUsize,

    slots: Box<[Slot<K, V>]>,

    /// One entry per bucket; `buckets.len()` is the capacity rounded up to a
    /// power of two.
    buckets: Box<[Bucket]>,

    /// `buckets.len() - 1`, for masking hashes into bucket ids.
    mask: u64,
}

/// A single storage cell.
struct Slot<K, V> {
    /// The bucket id this slot belongs to, or `NIL` while the slot is vacant.
    /// Transitions only happen while `data` is locked.
    home: AtomicU32,

    /// The full hash of the stored key, cached so that lookups can reject
    /// candidates without touching the slot lock. Meaningful only while the
    /// slot is occupied.
    hash: AtomicU64,

    /// The slot lock. Anything reading or writing the key or value holds it.
    data: Mutex<SlotData<K, V>>,
}

struct SlotData<K, V> {
    key: MaybeUninit<K>,
    value: MaybeUninit<V>,
}

/// Bucket directory entry. `first` and `last` bracket the span of slot
/// indices holding this bucket's members; slots strictly between them may
/// belong to other buckets. With a single member only `first` is meaningful,
/// and `last` stays `NIL`.
struct Bucket {
    count: AtomicU32,
    first: AtomicU32,
    last: AtomicU32,
}

impl Bucket {
    fn new() -> Bucket {
        Bucket {
            count: AtomicU32::new(0),
            first: AtomicU32::new(NIL),
            last: AtomicU32::new(NIL),
        }
    }
}

impl<K, V> Slot<K, V> {
    fn new() -> Slot<K, V> {
        Slot {
            home: AtomicU32::new(NIL),
            hash: AtomicU64::new(0),
            data: Mutex::new(SlotData {
                key: MaybeUninit::uninit(),
                value: MaybeUninit::uninit(),
            }),
        }
    }
}

impl<K, V> RawTable<K, V> {
    /// Creates a table with room for exactly `capacity` entries.
    pub(crate) fn new(capacity: usize) -> RawTable<K, V> {
        assert!(
            capacity < NIL as usize,
            "capacity must be below the sentinel index"
        );

        let buckets = capacity.next_power_of_two();
        RawTable {
            structural: Mutex::new(Vec::new()),
            frontier: AtomicUsize::new(0),
            slots: (0..capacity).map(|_| Slot::new()).collect(),
            buckets: (0..buckets).map(|_| Bucket::new()).collect(),
            mask: (buckets - 1) as u64,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The number of live entries. Consistent only until the structural lock
    /// is released again.
    pub(crate) fn len(&self) -> usize {
        let free = self.structural.lock();
        self.frontier.load(Ordering::Relaxed) - free.len()
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> u32 {
        (hash & self.mask) as u32
    }

    /// Checks whether the slot at `index` currently holds `key`, taking the
    /// slot lock for the comparison. The atomic pre-checks reject slots that
    /// are vacant or whose cached hash differs, so the lock is only contended
    /// for true candidates.
    fn is_match<Q>(&self, index: u32, probe: u64, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let slot = &self.slots[index as usize];
        if slot.home.load(Ordering::Acquire) == NIL || slot.hash.load(Ordering::Relaxed) != probe {
            return false;
        }

        let data = slot.data.lock();
        if slot.home.load(Ordering::Relaxed) == NIL || slot.hash.load(Ordering::Relaxed) != probe {
            return false;
        }

        // Safety: the slot is occupied and its lock is held, so the key is
        // initialized and stays in place for the duration of the comparison.
        unsafe { data.key.assume_init_ref().borrow() == key }
    }

    /// Finds the slot currently holding `key`, or `NIL`.
    ///
    /// Never touches the structural lock. The returned index is advisory: the
    /// slot may be vacated or reused the moment this returns, so callers must
    /// re-verify under the slot lock before acting on it.
    pub(crate) fn find_index<Q>(&self, hash: u64, key: &Q) -> u32
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let h = self.bucket_of(hash);
        let bucket = &self.buckets[h as usize];

        let count = bucket.count.load(Ordering::Acquire);
        if count == 0 {
            return NIL;
        }

        let first = bucket.first.load(Ordering::Relaxed);
        if first != NIL && self.is_match(first, hash, key) {
            return first;
        }

        let last = bucket.last.load(Ordering::Relaxed);
        if last != NIL && last != first && self.is_match(last, hash, key) {
            return last;
        }

        if count < 3 || first == NIL || last == NIL || last <= first + 1 {
            return NIL;
        }

        // The span between the endpoints interleaves members of other
        // buckets. Counting the members seen lets the scan stop as soon as
        // the whole bucket population is accounted for.
        let mut seen = 2;
        for index in first + 1..last {
            if self.slots[index as usize].home.load(Ordering::Acquire) != h {
                continue;
            }
            if self.is_match(index, hash, key) {
                return index;
            }
            seen += 1;
            if seen >= count {
                break;
            }
        }

        NIL
    }

    /// Runs `f` on the value in `index` if that slot still holds `key`.
    ///
    /// The slot lock is held for the duration of `f`, pinning the entry: no
    /// other thread can delete, overwrite, or relocate it. Returns `None`
    /// without running `f` when `index` is the sentinel or the slot no longer
    /// holds `key`.
    pub(crate) fn with_found<Q, T, F>(&self, key: &Q, index: u32, f: F) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        F: FnOnce(&mut V) -> T,
    {
        // The sentinel is out of range for any real table, so a plain bounds
        // check covers it.
        let slot = self.slots.get(index as usize)?;

        let mut data = slot.data.lock();
        if slot.home.load(Ordering::Relaxed) == NIL {
            return None;
        }

        let SlotData { key: stored, value } = &mut *data;
        // Safety: the slot is occupied and its lock is held.
        unsafe {
            if stored.assume_init_ref().borrow() != key {
                return None;
            }
            Some(f(value.assume_init_mut()))
        }
    }

    /// Lookup followed by [`RawTable::with_found`] on the result.
    pub(crate) fn with_value<Q, T, F>(&self, hash: u64, key: &Q, f: F) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        F: FnOnce(&mut V) -> T,
    {
        self.with_found(key, self.find_index(hash, key), f)
    }

    /// Pops a free slot, or advances the frontier, or reports exhaustion.
    /// Requires the structural lock.
    fn reserve_slot(&self, free: &mut Vec<u32>) -> u32 {
        if let Some(index) = free.pop() {
            debug_assert_eq!(self.slots[index as usize].home.load(Ordering::Relaxed), NIL);
            return index;
        }

        let frontier = self.frontier.load(Ordering::Relaxed);
        if frontier < self.slots.len() {
            self.frontier.store(frontier + 1, Ordering::Release);
            frontier as u32
        } else {
            NIL
        }
    }

    /// Records `index` as a member of bucket `h`, widening the span if the
    /// index falls outside it. Requires the structural lock.
    fn use_slot(&self, h: u32, index: u32) {
        let bucket = &self.buckets[h as usize];
        let first = bucket.first.load(Ordering::Relaxed);
        let last = bucket.last.load(Ordering::Relaxed);

        if first == NIL || index < first {
            if last == NIL {
                bucket.last.store(first, Ordering::Relaxed);
            }
            bucket.first.store(index, Ordering::Relaxed);
        } else if last == NIL || index > last {
            bucket.last.store(index, Ordering::Relaxed);
        }

        bucket.count.fetch_add(1, Ordering::Release);
    }

    /// Removes `index` from bucket `h`, narrowing the span when the removed
    /// slot was an endpoint. Requires the structural lock.
    ///
    /// The endpoint stores happen before the lower `count` is published, the
    /// mirror image of [`RawTable::use_slot`]: a lock-free lookup that
    /// Acquire-loads the new count never pairs it with a staler span.
    fn remove_from_bucket(&self, h: u32, index: u32) {
        let bucket = &self.buckets[h as usize];
        let count = bucket.count.load(Ordering::Relaxed) - 1;

        if count == 0 {
            // A lone member never has a `last`, so only `first` needs resetting.
            bucket.first.store(NIL, Ordering::Relaxed);
        } else {
            let first = bucket.first.load(Ordering::Relaxed);
            let last = bucket.last.load(Ordering::Relaxed);

            if index == first {
                if count == 1 {
                    bucket.first.store(last, Ordering::Relaxed);
                    bucket.last.store(NIL, Ordering::Relaxed);
                } else {
                    let mut next = last;
                    for i in first + 1..last {
                        if self.slots[i as usize].home.load(Ordering::Relaxed) == h {
                            next = i;
                            break;
                        }
                    }
                    bucket.first.store(next, Ordering::Relaxed);
                }
            } else if index == last {
                if count == 1 {
                    bucket.last.store(NIL, Ordering::Relaxed);
                } else {
                    let mut prev = first;
                    for i in (first + 1..last).rev() {
                        if self.slots[i as usize].home.load(Ordering::Relaxed) == h {
                            prev = i;
                            break;
                        }
                    }
                    bucket.last.store(prev, Ordering::Relaxed);
                }
            }
        }

        bucket.count.store(count, Ordering::Release);
    }

    /// Writes a fresh entry into the vacant slot `index`. Requires the
    /// structural lock; takes and releases the slot lock.
    fn occupy(&self, h: u32, hash: u64, index: u32, key: K, value: V) {
        let slot = &self.slots[index as usize];
        let mut data = slot.data.lock();
        debug_assert_eq!(slot.home.load(Ordering::Relaxed), NIL);

        data.key.write(key);
        data.value.write(value);
        slot.hash.store(hash, Ordering::Relaxed);
        slot.home.store(h, Ordering::Release);
        self.use_slot(h, index);
    }

    /// Insert that never overwrites, against an already-held structural lock.
    fn insert_with(&self, free: &mut Vec<u32>, hash: u64, key: K, value: V) -> (u32, bool)
    where
        K: Eq,
    {
        let existing = self.find_index(hash, &key);
        if existing != NIL {
            return (existing, false);
        }

        let index = self.reserve_slot(free);
        if index == NIL {
            return (NIL, false);
        }

        self.occupy(self.bucket_of(hash), hash, index, key, value);
        (index, true)
    }

    /// Insert-or-overwrite, against an already-held structural lock.
    fn upsert_with(&self, free: &mut Vec<u32>, hash: u64, key: K, value: V) -> (u32, bool)
    where
        K: Eq,
    {
        let existing = self.find_index(hash, &key);
        if existing != NIL {
            let slot = &self.slots[existing as usize];
            let mut data = slot.data.lock();
            // The structural lock pins occupancy, so the slot found a moment
            // ago still holds this key, and its index already sits inside the
            // bucket span. Only the value changes.
            debug_assert_ne!(slot.home.load(Ordering::Relaxed), NIL);

            // Safety: the slot is occupied and its lock is held.
            unsafe {
                data.value.assume_init_drop();
            }
            data.value.write(value);
            return (existing, false);
        }

        let index = self.reserve_slot(free);
        if index == NIL {
            return (NIL, false);
        }

        self.occupy(self.bucket_of(hash), hash, index, key, value);
        (index, true)
    }

    /// Inserts `key` unless it is already present. Returns the slot and
    /// whether a new entry was created; `(NIL, false)` when the table is full.
    pub(crate) fn insert(&self, hash: u64, key: K, value: V) -> (u32, bool)
    where
        K: Eq,
    {
        let mut free = self.structural.lock();
        self.insert_with(&mut free, hash, key, value)
    }

    /// Inserts `key`, overwriting the value of an existing entry in place.
    pub(crate) fn upsert(&self, hash: u64, key: K, value: V) -> (u32, bool)
    where
        K: Eq,
    {
        let mut free = self.structural.lock();
        self.upsert_with(&mut free, hash, key, value)
    }

    /// Deletes `key` if present; silently a no-op otherwise.
    pub(crate) fn remove<Q>(&self, hash: u64, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut free = self.structural.lock();

        let index = self.find_index(hash, key);
        if index == NIL {
            return;
        }

        let h = self.bucket_of(hash);
        let slot = &self.slots[index as usize];
        {
            let mut data = slot.data.lock();
            if slot.home.load(Ordering::Relaxed) == NIL {
                // Cannot happen while the structural lock pins occupancy,
                // but a stale index must never reach the drops below.
                return;
            }

            // Safety: the slot is occupied and its lock is held.
            unsafe {
                data.key.assume_init_drop();
                data.value.assume_init_drop();
            }
            slot.home.store(NIL, Ordering::Release);
        }

        let frontier = self.frontier.load(Ordering::Relaxed);
        if (index as usize) + 1 == frontier {
            self.frontier.store(frontier - 1, Ordering::Release);
        } else {
            free.push(index);
        }

        self.remove_from_bucket(h, index);
    }

    /// Drops every entry and resets the directory, the frontier, and the
    /// free-stack. Slot locks stay alive; only their contents are discarded.
    pub(crate) fn clear(&self) {
        let mut free = self.structural.lock();

        let frontier = self.frontier.load(Ordering::Relaxed);
        for slot in &self.slots[..frontier] {
            let mut data = slot.data.lock();
            if slot.home.load(Ordering::Relaxed) == NIL {
                continue;
            }
            // Safety: the slot is occupied and its lock is held.
            unsafe {
                data.key.assume_init_drop();
                data.value.assume_init_drop();
            }
            slot.home.store(NIL, Ordering::Release);
        }

        self.frontier.store(0, Ordering::Release);
        free.clear();

        for bucket in self.buckets.iter() {
            bucket.count.store(0, Ordering::Relaxed);
            bucket.first.store(NIL, Ordering::Relaxed);
            bucket.last.store(NIL, Ordering::Relaxed);
        }
    }

    /// Copies every entry of `src` into `self`, holding both structural locks
    /// in address order for the whole operation. With `upsert` false, keys
    /// already present in `self` keep their value. Returns `false` when
    /// `self` runs out of capacity, keeping whatever was copied so far.
    pub(crate) fn add_all<H>(&self, src: &RawTable<K, V>, upsert: bool, hash: H) -> bool
    where
        K: Clone + Eq,
        V: Clone,
        H: Fn(&K) -> u64,
    {
        // A table trivially contains its own entries, and taking the same
        // structural lock twice would deadlock.
        if ptr::eq(self, src) {
            return true;
        }

        let (mut dst_free, _src_free);
        if (self as *const Self as usize) < (src as *const Self as usize) {
            dst_free = self.structural.lock();
            _src_free = src.structural.lock();
        } else {
            _src_free = src.structural.lock();
            dst_free = self.structural.lock();
        }

        let frontier = src.frontier.load(Ordering::Relaxed) as u32;
        for index in 0..frontier {
            let slot = &src.slots[index as usize];
            if slot.home.load(Ordering::Acquire) == NIL {
                continue;
            }

            let data = slot.data.lock();
            // Safety: holding `src`'s structural lock rules out concurrent
            // deletion, so the occupied slot is still initialized.
            let (key, value) = unsafe {
                (
                    data.key.assume_init_ref().clone(),
                    data.value.assume_init_ref().clone(),
                )
            };
            drop(data);

            let hashed = hash(&key);
            let (target, _) = if upsert {
                self.upsert_with(&mut dst_free, hashed, key, value)
            } else {
                self.insert_with(&mut dst_free, hashed, key, value)
            };
            if target == NIL {
                return false;
            }
        }

        true
    }

    /// Runs `f` over every live entry, taking each slot's lock around the
    /// call. The view is per-slot consistent but not table-wide consistent.
    pub(crate) fn try_for_each<E, F>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&K, &V) -> Result<(), E>,
    {
        let frontier = self.frontier.load(Ordering::Acquire);
        for slot in &self.slots[..frontier] {
            if slot.home.load(Ordering::Acquire) == NIL {
                continue;
            }
            let data = slot.data.lock();
            if slot.home.load(Ordering::Relaxed) == NIL {
                continue;
            }
            // Safety: the slot is occupied and its lock is held.
            unsafe { f(data.key.assume_init_ref(), data.value.assume_init_ref())? }
        }
        Ok(())
    }

    /// An iterator over the live entries at the time each one is visited.
    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            table: self,
            index: 0,
            frontier: self.frontier.load(Ordering::Acquire) as u32,
        }
    }
}

impl<K, V> Drop for RawTable<K, V> {
    fn drop(&mut self) {
        let frontier = *self.frontier.get_mut();
        for slot in &mut self.slots[..frontier] {
            if *slot.home.get_mut() == NIL {
                continue;
            }
            let data = slot.data.get_mut();
            // Safety: exclusive access, and the slot is occupied.
            unsafe {
                data.key.assume_init_drop();
                data.value.assume_init_drop();
            }
        }
    }
}

/// A walk of the slot array that takes no structural lock and holds each
/// slot's lock only long enough to clone the key out.
///
/// The yielded view is not a snapshot: entries inserted or deleted while the
/// walk is in progress may or may not appear.
pub(crate) struct Iter<'a, K, V> {
    table: &'a RawTable<K, V>,
    index: u32,
    frontier: u32,
}

impl<K, V> Iterator for Iter<'_, K, V>
where
    K: Clone,
{
    type Item = (K, u32);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.frontier {
            let index = self.index;
            self.index += 1;

            let slot = &self.table.slots[index as usize];
            if slot.home.load(Ordering::Acquire) == NIL {
                continue;
            }

            let data = slot.data.lock();
            if slot.home.load(Ordering::Relaxed) == NIL {
                continue;
            }

            // Safety: the slot is occupied and its lock is held.
            let key = unsafe { data.key.assume_init_ref().clone() };
            return Some((key, index));
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some((self.frontier - self.index) as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hashes are passed in directly here, so bucket placement is under test
    // control: with capacity 8 the mask is 7 and hashes 0, 8, 16, 24 all land
    // in bucket 0.
    fn bucket(table: &RawTable<&'static str, u32>, h: u32) -> (u32, u32, u32) {
        let bucket = &table.buckets[h as usize];
        (
            bucket.count.load(Ordering::Relaxed),
            bucket.first.load(Ordering::Relaxed),
            bucket.last.load(Ordering::Relaxed),
        )
    }

    fn check_invariants<K: Eq, V>(table: &RawTable<K, V>) {
        let free = table.structural.lock();
        let frontier = table.frontier.load(Ordering::Relaxed);

        // Untouched and freed slots are vacant; the rest are occupied.
        let mut live = 0;
        for (i, slot) in table.slots.iter().enumerate() {
            let home = slot.home.load(Ordering::Relaxed);
            if i >= frontier || free.contains(&(i as u32)) {
                assert_eq!(home, NIL, "slot {i} should be vacant");
            } else {
                assert_ne!(home, NIL, "slot {i} should be occupied");
                live += 1;
            }
        }
        assert_eq!(live, frontier - free.len());

        // Every occupied slot sits inside its bucket's span, and the counts
        // tally up.
        for (h, bucket) in table.buckets.iter().enumerate() {
            let count = bucket.count.load(Ordering::Relaxed);
            let first = bucket.first.load(Ordering::Relaxed);
            let last = bucket.last.load(Ordering::Relaxed);

            let members: Vec<u32> = (0..frontier as u32)
                .filter(|&i| table.slots[i as usize].home.load(Ordering::Relaxed) == h as u32)
                .collect();
            assert_eq!(members.len() as u32, count, "bucket {h} count");

            if count == 0 {
                assert_eq!(first, NIL);
            } else {
                let span_end = if last == NIL { first } else { last };
                for &i in &members {
                    assert!(first <= i && i <= span_end, "bucket {h} span");
                }
            }
        }
    }

    #[test]
    fn endpoint_repair_and_reuse() {
        let table: RawTable<&'static str, u32> = RawTable::new(8);

        assert_eq!(table.insert(0, "a", 1), (0, true));
        assert_eq!(table.insert(8, "b", 2), (1, true));
        assert_eq!(table.insert(16, "c", 3), (2, true));
        assert_eq!(bucket(&table, 0), (3, 0, 2));

        // Deleting the middle member leaves the endpoints alone and stacks
        // the slot for reuse.
        table.remove(8, "b");
        assert_eq!(bucket(&table, 0), (2, 0, 2));
        assert_eq!(table.find_index(8, "b"), NIL);
        check_invariants(&table);

        // The next collider reclaims the freed middle slot.
        assert_eq!(table.insert(24, "d", 4), (1, true));
        assert_eq!(bucket(&table, 0), (3, 0, 2));
        assert_eq!(table.find_index(24, "d"), 1);
        check_invariants(&table);
    }

    #[test]
    fn endpoint_repair_at_extremes() {
        let table: RawTable<&'static str, u32> = RawTable::new(8);
        table.insert(0, "a", 1);
        table.insert(8, "b", 2);
        table.insert(16, "c", 3);

        // Removing the first endpoint promotes the next member.
        table.remove(0, "a");
        assert_eq!(bucket(&table, 0), (2, 1, 2));
        check_invariants(&table);

        // Removing the last endpoint narrows back to a single member.
        table.remove(16, "c");
        assert_eq!(bucket(&table, 0), (1, 1, NIL));
        check_invariants(&table);
    }

    #[test]
    fn frontier_retreats_on_trailing_delete() {
        let table: RawTable<&'static str, u32> = RawTable::new(4);
        table.insert(0, "a", 1);
        table.insert(1, "b", 2);
        table.insert(2, "c", 3);
        assert_eq!(table.frontier.load(Ordering::Relaxed), 3);

        // The highest allocated slot rolls the frontier back instead of
        // landing on the free-stack.
        table.remove(2, "c");
        assert_eq!(table.frontier.load(Ordering::Relaxed), 2);
        assert!(table.structural.lock().is_empty());
        check_invariants(&table);

        table.remove(0, "a");
        assert_eq!(table.frontier.load(Ordering::Relaxed), 2);
        assert_eq!(*table.structural.lock(), vec![0]);
        check_invariants(&table);
    }

    #[test]
    fn exhaustion_and_recovery() {
        let table: RawTable<&'static str, u32> = RawTable::new(2);
        assert_eq!(table.insert(0, "a", 1), (0, true));
        assert_eq!(table.insert(1, "b", 2), (1, true));
        assert_eq!(table.insert(2, "c", 3), (NIL, false));

        // The failed insert left everything in place.
        assert_eq!(table.find_index(0, "a"), 0);
        assert_eq!(table.find_index(1, "b"), 1);
        check_invariants(&table);

        table.remove(0, "a");
        assert_eq!(table.insert(2, "c", 3), (0, true));
        check_invariants(&table);
    }

    #[test]
    fn clear_resets_everything() {
        let table: RawTable<&'static str, u32> = RawTable::new(8);
        table.insert(0, "a", 1);
        table.insert(8, "b", 2);
        table.remove(0, "a");

        table.clear();
        assert_eq!(table.len(), 0);
        assert_eq!(table.frontier.load(Ordering::Relaxed), 0);
        assert_eq!(bucket(&table, 0), (0, NIL, NIL));
        check_invariants(&table);

        // The table stays fully usable.
        assert_eq!(table.insert(0, "a", 9), (0, true));
        assert_eq!(table.with_value(0, "a", |v| *v), Some(9));
    }

    #[test]
    fn scan_between_endpoints() {
        // Interleave two buckets so that bucket 0's middle member sits
        // strictly between its endpoints next to foreign slots.
        let table: RawTable<&'static str, u32> = RawTable::new(8);
        table.insert(0, "a", 1);
        table.insert(1, "x", 10);
        table.insert(8, "b", 2);
        table.insert(9, "y", 11);
        table.insert(16, "c", 3);

        assert_eq!(bucket(&table, 0), (3, 0, 4));
        assert_eq!(table.find_index(8, "b"), 2);
        assert_eq!(table.find_index(9, "y"), 3);
        assert_eq!(table.find_index(17, "z"), NIL);
        check_invariants(&table);
    }
}
