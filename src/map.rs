use crate::raw::{self, NIL};

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};

/// A fixed-capacity concurrent hash table.
///
/// The table is created with a fixed number of slots and never grows. Every
/// slot carries its own lock, so many threads can hold and mutate different
/// values at the same time, including across blocking work, while lookups and
/// iteration proceed without taking any table-wide lock. See the
/// [crate-level documentation](crate) for the concurrency contract.
pub struct StashTable<K, V, S = RandomState> {
    raw: raw::RawTable<K, V>,
    hasher: S,
}

/// An opaque handle to a slot of a [`StashTable`].
///
/// A `SlotRef` is advisory, not owning: between obtaining one (from
/// [`StashTable::find_index`] or [`StashTable::insert`]) and using it, another
/// thread may have deleted the entry and reused the slot for a different key.
/// [`StashTable::with_found`] re-verifies the slot before touching it, so a
/// stale handle degrades into a no-op rather than an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef(pub(crate) u32);

/// The reserved [`SlotRef`] meaning "no such slot".
///
/// Returned by [`StashTable::find_index`] on a miss and by
/// [`StashTable::insert`]/[`StashTable::upsert`] when the table is full.
pub const NOT_IN_STASH: SlotRef = SlotRef(NIL);

impl fmt::Debug for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == NIL {
            f.write_str("NOT_IN_STASH")
        } else {
            f.debug_tuple("SlotRef").field(&self.0).finish()
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == NIL {
            f.write_str("NOT_IN_STASH")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl<K, V> StashTable<K, V, RandomState> {
    /// Creates a table with room for exactly `capacity` entries.
    ///
    /// The capacity is fixed for the lifetime of the table. Once it is
    /// reached, insertions report exhaustion until an entry is removed. To
    /// "grow", create a larger table, [`add_all`](StashTable::add_all) into
    /// it, and swap references at the application level.
    ///
    /// # Examples
    ///
    /// ```
    /// use stashtable::StashTable;
    /// let table: StashTable<&str, i32> = StashTable::with_capacity(128);
    /// ```
    pub fn with_capacity(capacity: usize) -> StashTable<K, V> {
        StashTable::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<K, V, S> StashTable<K, V, S> {
    /// Creates a table with room for exactly `capacity` entries, using
    /// `hasher` to hash keys.
    ///
    /// Warning: `hasher` is normally randomly generated, and is designed to
    /// allow the table to be resistant to attacks that cause many collisions
    /// and very poor performance. Setting it manually using this function can
    /// expose a DoS attack vector.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> StashTable<K, V, S> {
        StashTable {
            raw: raw::RawTable::new(capacity),
            hasher,
        }
    }

    /// Returns the fixed number of slots in the table.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Returns a reference to the table's `BuildHasher`.
    #[inline]
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Returns the number of live entries.
    ///
    /// The count is exact at the instant it is taken (it briefly holds the
    /// structural lock) but is already stale by the time it is returned if
    /// other threads are writing.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the table holds no entries. See
    /// [`len`](StashTable::len) for the consistency caveat.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V, S> StashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash<Q>(&self, key: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        self.hasher.hash_one(key)
    }

    /// Finds the slot currently holding `key`, returning [`NOT_IN_STASH`] on
    /// a miss.
    ///
    /// This never blocks on the structural lock, so it runs to completion
    /// regardless of concurrent insertions and deletions. The returned handle
    /// is advisory; pass it to [`with_found`](StashTable::with_found) to act
    /// on the value, which re-verifies the slot under its lock.
    #[inline]
    pub fn find_index<Q>(&self, key: &Q) -> SlotRef
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        SlotRef(self.raw.find_index(self.hash(key), key))
    }

    /// Returns `true` if the table currently contains `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_index(key) != NOT_IN_STASH
    }

    /// Returns a clone of the value for `key`, if present.
    ///
    /// The clone happens under the slot lock; the original never escapes the
    /// table.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.with_value(key, |value| value.clone())
    }

    /// Inserts `key` unless it is already present.
    ///
    /// Returns the slot holding the key and whether this call created the
    /// entry. An existing entry keeps its value (`insert` never overwrites);
    /// use [`upsert`](StashTable::upsert) to overwrite. When the table is
    /// full, returns `(NOT_IN_STASH, false)` and leaves the table untouched.
    pub fn insert(&self, key: K, value: V) -> (SlotRef, bool) {
        let hash = self.hash(&key);
        let (index, inserted) = self.raw.insert(hash, key, value);
        (SlotRef(index), inserted)
    }

    /// Inserts `key`, overwriting the value of an existing entry in place.
    ///
    /// Returns the slot holding the key and whether this call created a new
    /// entry (`false` means an existing value was overwritten). When the
    /// table is full and `key` is absent, returns `(NOT_IN_STASH, false)`.
    pub fn upsert(&self, key: K, value: V) -> (SlotRef, bool) {
        let hash = self.hash(&key);
        let (index, inserted) = self.raw.upsert(hash, key, value);
        (SlotRef(index), inserted)
    }

    /// Inserts or overwrites `key`, discarding the slot handle.
    ///
    /// Exactly [`upsert`](StashTable::upsert) with the return value dropped;
    /// a full table is silently a no-op.
    #[inline]
    pub fn set(&self, key: K, value: V) {
        self.upsert(key, value);
    }

    /// Removes `key` from the table. Removing an absent key is a no-op.
    ///
    /// The freed slot becomes available for reuse by later insertions.
    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.raw.remove(self.hash(key), key);
    }

    /// Removes every entry.
    ///
    /// Holds the structural lock for the duration, and takes each slot's lock
    /// while dropping its contents.
    pub fn clear(&self) {
        self.raw.clear();
    }

    /// Runs `f` on the value in `slot` if that slot still holds `key`,
    /// returning `f`'s result.
    ///
    /// The slot's lock is held for the duration of `f`, pinning the entry: no
    /// other thread can delete, overwrite, or relocate it, while operations
    /// on *other* slots proceed unhindered. Blocking work inside `f` is fine.
    /// Returns `None` without running `f` when `slot` is [`NOT_IN_STASH`] or
    /// the slot no longer holds `key` (it was removed or reused since the
    /// handle was obtained).
    ///
    /// # Deadlock
    ///
    /// From inside `f`, calling any operation of this table that takes the
    /// structural lock (`insert`, `upsert`, `set`, `remove`, `clear`, `len`,
    /// `add_all`) or pinning a second slot (nested `with_found`/`with_value`,
    /// or a lookup of a key hashing identically to a pinned one) deadlocks.
    /// This is not detected.
    #[inline]
    pub fn with_found<Q, T, F>(&self, key: &Q, slot: SlotRef, f: F) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        F: FnOnce(&mut V) -> T,
    {
        self.raw.with_found(key, slot.0, f)
    }

    /// Looks up `key` and runs `f` on its value, returning `f`'s result, or
    /// `None` if the key is absent.
    ///
    /// Equivalent to [`find_index`](StashTable::find_index) followed by
    /// [`with_found`](StashTable::with_found); the same pinning guarantees
    /// and deadlock caveats apply. An absent-key fallback chains naturally:
    ///
    /// ```
    /// use stashtable::StashTable;
    ///
    /// let table: StashTable<&str, i32> = StashTable::with_capacity(8);
    /// table.insert("a", 1);
    ///
    /// let doubled = table.with_value("a", |v| *v * 2).unwrap_or(0);
    /// assert_eq!(doubled, 2);
    /// let missing = table.with_value("b", |v| *v * 2).unwrap_or(0);
    /// assert_eq!(missing, 0);
    /// ```
    #[inline]
    pub fn with_value<Q, T, F>(&self, key: &Q, f: F) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut V) -> T,
    {
        self.raw.with_value(self.hash(key), key, f)
    }

    /// Copies every entry of `src` into `self`.
    ///
    /// Holds both tables' structural locks (in a globally consistent order)
    /// for the whole copy, so neither table changes shape underneath it. With
    /// `upsert` false, keys already present in `self` keep their value;
    /// otherwise `src`'s value wins. Returns `false` if `self` runs out of
    /// capacity part-way, keeping the entries copied so far.
    pub fn add_all<S2>(&self, src: &StashTable<K, V, S2>, upsert: bool) -> bool
    where
        K: Clone,
        V: Clone,
        S2: BuildHasher,
    {
        self.raw
            .add_all(&src.raw, upsert, |key| self.hasher.hash_one(key))
    }

    /// An iterator over the live entries, yielding each key together with the
    /// slot holding it.
    ///
    /// The walk takes no structural lock and is never blocked by writers
    /// except while cloning a key out of the slot being visited, so it can
    /// run during heavy mutation. The price is a non-serializable view: keys
    /// that never coexisted may appear in one enumeration, and entries
    /// inserted or removed mid-walk may or may not appear. Insertion order is
    /// preserved only if no deletion has ever freed a slot for reuse. For a
    /// consistent snapshot, [`add_all`](StashTable::add_all) into a fresh
    /// table first.
    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            raw: self.raw.iter(),
        }
    }

    pub(crate) fn try_for_each<E, F>(&self, f: F) -> Result<(), E>
    where
        F: FnMut(&K, &V) -> Result<(), E>,
    {
        self.raw.try_for_each(f)
    }
}

impl<K, V, S> fmt::Debug for StashTable<K, V, S>
where
    K: Hash + Eq + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        let _ = self.raw.try_for_each::<(), _>(|key, value| {
            map.entry(key, value);
            Ok(())
        });
        map.finish()
    }
}

impl<K, V, S> PartialEq for StashTable<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        // Comparing a table with itself would otherwise deadlock on the
        // nested lock of each visited slot.
        if std::ptr::eq(self, other) {
            return true;
        }

        if self.len() != other.len() {
            return false;
        }

        // The walk holds one table's slot lock while taking the other's, so
        // both directions of the comparison order the two tables by address,
        // as add_all orders its structural locks.
        let (outer, inner) = if (self as *const Self as usize) < (other as *const Self as usize) {
            (self, other)
        } else {
            (other, self)
        };

        // The lengths match and keys are unique, so containment one way is
        // containment both ways.
        outer
            .raw
            .try_for_each(|key, value| match inner.with_value(key, |v| *v == *value) {
                Some(true) => Ok(()),
                _ => Err(()),
            })
            .is_ok()
    }
}

impl<K, V, S> Eq for StashTable<K, V, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<'a, K, V, S> IntoIterator for &'a StashTable<K, V, S>
where
    K: Clone + Hash + Eq,
    S: BuildHasher,
{
    type Item = (K, SlotRef);
    type IntoIter = Keys<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys()
    }
}

/// An iterator over a table's keys and the slots holding them.
///
/// This struct is created by the [`keys`](StashTable::keys) method on
/// [`StashTable`]. See its documentation for details.
pub struct Keys<'a, K, V> {
    raw: raw::Iter<'a, K, V>,
}

impl<K, V> Iterator for Keys<'_, K, V>
where
    K: Clone,
{
    type Item = (K, SlotRef);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (key, index) = self.raw.next()?;
        Some((key, SlotRef(index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

impl<K, V> fmt::Debug for Keys<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys").finish_non_exhaustive()
    }
}
