//! Robin-Hood open-addressed index from `i32` key to an owned byte blob.
//!
//! This is the authoritative in-memory state; everything else in this crate
//! exists to make it durable. Three parallel arrays back each bucket
//! (flags, keys, owned value buffers) rather than one array of a combined
//! struct, matching the "parallel arrays" wording of the data model this
//! implements.

use parking_lot::RwLock;

const INITIAL_CAPACITY: usize = 16;
const MAX_LOAD_FACTOR_NUM: usize = 7;
const MAX_LOAD_FACTOR_DEN: usize = 10;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    Occupied,
    Deleted,
}

struct Table {
    flags: Vec<Slot>,
    keys: Vec<i32>,
    values: Vec<Box<[u8]>>,
    /// Probe distance of the entry currently at this bucket, used for the
    /// Robin-Hood displacement comparison. Meaningless for non-Occupied slots.
    distances: Vec<u32>,
    len: usize,
}

impl Table {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(1);
        Table {
            flags: vec![Slot::Empty; capacity],
            keys: vec![0; capacity],
            values: (0..capacity).map(|_| Box::from([] as [u8; 0])).collect(),
            distances: vec![0; capacity],
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.flags.len()
    }

    fn mask(&self) -> usize {
        self.capacity() - 1
    }
}

/// Reversible 32-bit integer mix (xor-shift + odd multiplies), per the spec.
fn mix(key: i32) -> u32 {
    let mut x = key as u32;
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

/// The index itself. Internally synchronized with a single [`RwLock`] since
/// within one worker it is touched by exactly one event loop plus (in
/// batched AOF mode) snapshot/rewrite readers that only ever read it.
pub struct Index {
    table: RwLock<Table>,
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    /// Create an empty index with the default initial capacity.
    #[must_use]
    pub fn new() -> Self {
        Index {
            table: RwLock::new(Table::with_capacity(INITIAL_CAPACITY)),
        }
    }

    /// Number of live (non-tombstone) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len
    }

    /// True when there are no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Idempotent upsert. Copies `bytes` into an owned buffer; triggers a
    /// rehash first if the load factor would exceed 0.7.
    pub fn save(&self, key: i32, bytes: &[u8]) {
        let mut table = self.table.write();
        if (table.len + 1) * MAX_LOAD_FACTOR_DEN > table.capacity() * MAX_LOAD_FACTOR_NUM {
            rehash(&mut table);
        }
        // Look up first: a key can sit anywhere along its probe chain past
        // any number of tombstones, so reusing the first Deleted/Empty slot
        // blindly could otherwise create a second, shadowed entry for a key
        // that already exists further down the chain.
        if let Some(idx) = probe(&table, key) {
            table.values[idx] = bytes.into();
            return;
        }
        insert_new(&mut table, key, bytes.into());
    }

    /// Linear probe from the hashed slot; copies the value into `out_buf` if
    /// the key is present and the buffer is large enough.
    ///
    /// Returns `true` iff the key was found. When found but `out_buf` is too
    /// small, returns `false` without copying, per the spec's "otherwise
    /// returns false without copy" edge case.
    pub fn get(&self, key: i32, out_buf: &mut [u8]) -> bool {
        let table = self.table.read();
        match probe(&table, key) {
            Some(idx) => {
                let value = &table.values[idx];
                if value.len() > out_buf.len() {
                    return false;
                }
                out_buf[..value.len()].copy_from_slice(value);
                true
            }
            None => false,
        }
    }

    /// Fetch a copy of the value for `key`, or `None` if absent. Convenience
    /// wrapper around [`Index::get`] for callers (the HTTP collaborator) that
    /// do not already own a reusable buffer.
    #[must_use]
    pub fn get_owned(&self, key: i32) -> Option<Vec<u8>> {
        let table = self.table.read();
        probe(&table, key).map(|idx| table.values[idx].to_vec())
    }

    /// Remove `key` if present. Releases the buffer and marks the bucket
    /// Deleted (tombstone) without shifting neighbors. Returns whether a
    /// live entry was removed.
    pub fn remove(&self, key: i32) -> bool {
        let mut table = self.table.write();
        match probe(&table, key) {
            Some(idx) => {
                table.flags[idx] = Slot::Deleted;
                table.values[idx] = Box::from([] as [u8; 0]);
                table.len -= 1;
                true
            }
            None => false,
        }
    }

    /// Visit every Occupied slot exactly once, in capacity order. Order is
    /// not required to be stable across rehashes and is not stable here.
    pub fn iterate<F: FnMut(i32, &[u8])>(&self, mut f: F) {
        let table = self.table.read();
        for idx in 0..table.capacity() {
            if table.flags[idx] == Slot::Occupied {
                f(table.keys[idx], &table.values[idx]);
            }
        }
    }
}

fn probe(table: &Table, key: i32) -> Option<usize> {
    let mask = table.mask();
    let mut idx = (mix(key) as usize) & mask;
    let mut dist = 0u32;
    loop {
        match table.flags[idx] {
            Slot::Empty => return None,
            Slot::Occupied if table.keys[idx] == key => return Some(idx),
            Slot::Occupied | Slot::Deleted => {
                // Robin-Hood guarantees no live entry sits further than its
                // own probe distance past a slot whose recorded distance is
                // already smaller, but tombstones carry no such guarantee,
                // so deleted slots are simply stepped over.
                idx = (idx + 1) & mask;
                dist += 1;
                if dist as usize > table.capacity() {
                    return None;
                }
            }
        }
    }
}

/// Robin-Hood insertion: walk from the hashed slot, swapping the incoming
/// entry into any slot whose incumbent has a smaller probe distance, and
/// continuing to insert the displaced incumbent.
///
/// Precondition: `key` does not already occupy a slot in `table` (callers
/// must confirm this with [`probe`] first — see [`Index::save`]).
fn insert_new(table: &mut Table, key: i32, mut bytes: Box<[u8]>) {
    let mask = table.mask();
    let mut idx = (mix(key) as usize) & mask;
    let mut probe_key = key;
    let mut probe_dist = 0u32;

    loop {
        match table.flags[idx] {
            Slot::Empty | Slot::Deleted => {
                table.flags[idx] = Slot::Occupied;
                table.keys[idx] = probe_key;
                table.values[idx] = bytes;
                table.distances[idx] = probe_dist;
                table.len += 1;
                return;
            }
            Slot::Occupied => {
                if table.distances[idx] < probe_dist {
                    std::mem::swap(&mut table.keys[idx], &mut probe_key);
                    std::mem::swap(&mut table.values[idx], &mut bytes);
                    std::mem::swap(&mut table.distances[idx], &mut probe_dist);
                }
                idx = (idx + 1) & mask;
                probe_dist += 1;
            }
        }
    }
}

fn rehash(table: &mut Table) {
    let new_capacity = table.capacity() * 2;
    let mut fresh = Table::with_capacity(new_capacity);
    for idx in 0..table.capacity() {
        if table.flags[idx] == Slot::Occupied {
            let key = table.keys[idx];
            let bytes = std::mem::replace(&mut table.values[idx], Box::from([] as [u8; 0]));
            insert_new(&mut fresh, key, bytes);
        }
    }
    *table = fresh;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_get_round_trips() {
        let index = Index::new();
        index.save(1, b"neo");
        let mut buf = [0u8; 16];
        assert!(index.get(1, &mut buf));
        assert_eq!(&buf[..3], b"neo");
    }

    #[test]
    fn get_missing_key_returns_false() {
        let index = Index::new();
        let mut buf = [0u8; 16];
        assert!(!index.get(99, &mut buf));
    }

    #[test]
    fn get_with_undersized_buffer_returns_false_without_copy() {
        let index = Index::new();
        index.save(1, b"hello world");
        let mut buf = [0u8; 4];
        assert!(!index.get(1, &mut buf));
    }

    #[test]
    fn zero_length_value_round_trips() {
        let index = Index::new();
        index.save(1, b"");
        assert_eq!(index.get_owned(1), Some(Vec::new()));
    }

    #[test]
    fn save_is_idempotent_overwrite() {
        let index = Index::new();
        index.save(1, b"a");
        index.save(1, b"bb");
        assert_eq!(index.len(), 1);
        assert_eq!(index.get_owned(1), Some(b"bb".to_vec()));
    }

    #[test]
    fn remove_then_get_returns_false() {
        let index = Index::new();
        index.save(1, b"a");
        assert!(index.remove(1));
        let mut buf = [0u8; 4];
        assert!(!index.get(1, &mut buf));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn remove_missing_key_returns_false() {
        let index = Index::new();
        assert!(!index.remove(42));
    }

    #[test]
    fn rehash_preserves_all_entries() {
        let index = Index::new();
        for key in 0..200 {
            index.save(key, &key.to_le_bytes());
        }
        assert_eq!(index.len(), 200);
        for key in 0..200 {
            assert_eq!(index.get_owned(key), Some(key.to_le_bytes().to_vec()));
        }
    }

    #[test]
    fn iterate_visits_every_live_key_once() {
        let index = Index::new();
        for key in 0..50 {
            index.save(key, b"v");
        }
        index.remove(10);
        let mut seen = Vec::new();
        index.iterate(|k, _| seen.push(k));
        seen.sort_unstable();
        let mut expected: Vec<i32> = (0..50).filter(|&k| k != 10).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn tombstones_do_not_break_probing_past_them() {
        let index = Index::new();
        index.save(1, b"a");
        index.save(2, b"b");
        index.remove(1);
        let mut buf = [0u8; 4];
        assert!(index.get(2, &mut buf));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Save(i32, Vec<u8>),
        Remove(i32),
    }

    fn op_strategy() -> impl proptest::strategy::Strategy<Value = Op> {
        use proptest::prelude::*;
        prop_oneof![
            (any::<i32>(), prop::collection::vec(any::<u8>(), 0..16))
                .prop_map(|(k, v)| Op::Save(k, v)),
            any::<i32>().prop_map(Op::Remove),
        ]
    }

    proptest::proptest! {
        /// Any sequence of `save`/`remove` leaves the index's iterated
        /// key/value set equal to the same sequence applied to a reference
        /// `HashMap`, per spec.md §8 property 5 (cold-restart equivalence
        /// is the on-disk half of this; this is the in-memory half).
        #[test]
        fn matches_hashmap_model(ops in proptest::collection::vec(op_strategy(), 0..200)) {
            use std::collections::HashMap;
            let index = Index::new();
            let mut model: HashMap<i32, Vec<u8>> = HashMap::new();
            for op in ops {
                match op {
                    Op::Save(k, v) => {
                        index.save(k, &v);
                        model.insert(k, v);
                    }
                    Op::Remove(k) => {
                        index.remove(k);
                        model.remove(&k);
                    }
                }
            }
            let mut actual: HashMap<i32, Vec<u8>> = HashMap::new();
            index.iterate(|k, bytes| {
                actual.insert(k, bytes.to_vec());
            });
            proptest::prop_assert_eq!(actual, model);
        }
    }
}
