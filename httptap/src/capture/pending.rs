//! # Pending-Read Correlation Table
//!
//! Links the entry-time arguments of a `read`/`recvfrom` to its exit. Keyed by
//! thread ID: a thread can only be blocked in one syscall at a time, so a new
//! entry for the same thread simply replaces the old one.
//!
//! The table is split into shards selected by thread ID, each a small
//! mutex-guarded map, so operations on different threads almost never contend.
//! Capacity is shared by the whole table. Once it is reached, inserting a new
//! thread evicts the least recently recorded entry, wherever it lives, so an
//! entry whose exit never arrives cannot stay forever.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use httptap_common::PendingRead;

use crate::domain::Tid;

const SHARD_COUNT: usize = 16;

/// Entries of one shard plus their recording order
#[derive(Debug, Default)]
struct Shard {
    entries: HashMap<u32, (u64, PendingRead)>,
    order: BTreeMap<u64, u32>,
}

impl Shard {
    /// Returns `true` if `tid` was not present before
    fn insert(&mut self, tid: u32, seq: u64, entry: PendingRead) -> bool {
        let previous = self.entries.insert(tid, (seq, entry));
        if let Some((old_seq, _)) = previous {
            self.order.remove(&old_seq);
        }
        self.order.insert(seq, tid);
        previous.is_none()
    }

    fn remove(&mut self, tid: u32) -> bool {
        let Some((seq, _)) = self.entries.remove(&tid) else {
            return false;
        };
        self.order.remove(&seq);
        true
    }

    fn oldest(&self) -> Option<u64> {
        self.order.keys().next().copied()
    }

    fn pop_oldest(&mut self) -> bool {
        let Some((_, tid)) = self.order.pop_first() else {
            return false;
        };
        self.entries.remove(&tid);
        true
    }
}

#[derive(Debug)]
pub struct PendingTable {
    shards: Vec<Mutex<Shard>>,
    capacity: usize,
    len: AtomicUsize,
    next_seq: AtomicU64,
    evicted: AtomicU64,
}

fn lock(shard: &Mutex<Shard>) -> MutexGuard<'_, Shard> {
    // A panic while holding a shard cannot leave it half-updated.
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PendingTable {
    /// Create a table holding at most `capacity` entries (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(Shard::default())).collect();
        Self {
            shards,
            capacity: capacity.max(1),
            len: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    fn shard(&self, tid: Tid) -> MutexGuard<'_, Shard> {
        lock(&self.shards[tid.0 as usize % SHARD_COUNT])
    }

    fn try_reserve(&self) -> bool {
        self.len
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .is_ok()
    }

    fn insert_within_capacity(&self, tid: Tid, seq: u64, entry: PendingRead) -> bool {
        let mut shard = self.shard(tid);
        if !shard.entries.contains_key(&tid.0) && !self.try_reserve() {
            return false;
        }
        shard.insert(tid.0, seq, entry);
        true
    }

    /// Drop the least recently recorded entry of the whole table
    fn evict_oldest(&self) -> bool {
        let oldest = self
            .shards
            .iter()
            .enumerate()
            .filter_map(|(index, shard)| lock(shard).oldest().map(|seq| (seq, index)))
            .min();
        let Some((_, index)) = oldest else {
            return false;
        };

        if !lock(&self.shards[index]).pop_oldest() {
            return false;
        }
        self.len.fetch_sub(1, Ordering::Relaxed);
        self.evicted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Record an in-flight read for `tid`, replacing any previous entry
    ///
    /// A new thread arriving at a full table evicts the oldest entry. Returns
    /// `false` only if concurrent inserts took the freed slot first.
    pub fn put(&self, tid: Tid, entry: PendingRead) -> bool {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        if self.insert_within_capacity(tid, seq, entry) {
            return true;
        }
        self.evict_oldest();
        self.insert_within_capacity(tid, seq, entry)
    }

    /// Look up the in-flight read for `tid` without removing it
    pub fn get(&self, tid: Tid) -> Option<PendingRead> {
        self.shard(tid).entries.get(&tid.0).map(|&(_, entry)| entry)
    }

    /// Remove the entry for `tid`; returns whether one was present
    pub fn delete(&self, tid: Tid) -> bool {
        let removed = self.shard(tid).remove(tid.0);
        if removed {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of entries the table can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped to make room for new threads
    pub fn evictions(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let table = PendingTable::with_capacity(64);
        assert!(table.put(Tid(7), PendingRead::new(5, 0x1000)));

        assert_eq!(table.get(Tid(7)), Some(PendingRead::new(5, 0x1000)));
        // get does not consume
        assert_eq!(table.get(Tid(7)), Some(PendingRead::new(5, 0x1000)));

        assert!(table.delete(Tid(7)));
        assert_eq!(table.get(Tid(7)), None);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let table = PendingTable::with_capacity(64);
        table.put(Tid(1), PendingRead::new(3, 0x10));

        assert!(table.delete(Tid(1)));
        assert!(!table.delete(Tid(1)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_second_put_overwrites() {
        let table = PendingTable::with_capacity(64);
        table.put(Tid(9), PendingRead::new(3, 0x10));
        table.put(Tid(9), PendingRead::new(4, 0x20));

        assert_eq!(table.get(Tid(9)), Some(PendingRead::new(4, 0x20)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_capacity_is_exact() {
        assert_eq!(PendingTable::with_capacity(65_535).capacity(), 65_535);
        assert_eq!(PendingTable::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_threads_sharing_a_shard_use_whole_capacity() {
        // tids 0 and 16 land in the same shard
        let table = PendingTable::with_capacity(SHARD_COUNT);

        assert!(table.put(Tid(0), PendingRead::new(1, 0x1)));
        assert!(table.put(Tid(16), PendingRead::new(2, 0x2)));

        assert_eq!(table.get(Tid(0)), Some(PendingRead::new(1, 0x1)));
        assert_eq!(table.get(Tid(16)), Some(PendingRead::new(2, 0x2)));
        assert_eq!(table.len(), 2);
        assert_eq!(table.evictions(), 0);
    }

    #[test]
    fn test_full_table_evicts_oldest_entry() {
        let table = PendingTable::with_capacity(4);
        for tid in 1..=4 {
            assert!(table.put(Tid(tid), PendingRead::new(tid as i32, 0x100)));
        }
        // Re-recording tid 1 makes tid 2 the oldest
        table.put(Tid(1), PendingRead::new(10, 0x200));

        assert!(table.put(Tid(5), PendingRead::new(5, 0x500)));
        assert_eq!(table.len(), 4);
        assert_eq!(table.evictions(), 1);
        assert_eq!(table.get(Tid(2)), None);
        assert_eq!(table.get(Tid(1)), Some(PendingRead::new(10, 0x200)));
        assert_eq!(table.get(Tid(5)), Some(PendingRead::new(5, 0x500)));
    }

    #[test]
    fn test_orphaned_entry_is_evicted_at_capacity() {
        let table = PendingTable::with_capacity(8);
        // Entry whose exit never arrives
        table.put(Tid(3), PendingRead::new(7, 0x70));

        // Other threads complete their reads normally
        for tid in 100..107 {
            table.put(Tid(tid), PendingRead::new(1, 0x10));
        }
        assert_eq!(table.len(), 8);
        assert!(table.get(Tid(3)).is_some());

        // Table is at capacity; the next new thread pushes the orphan out
        assert!(table.put(Tid(200), PendingRead::new(2, 0x20)));
        assert_eq!(table.get(Tid(3)), None);
        assert_eq!(table.len(), 8);
    }

    #[test]
    fn test_full_table_still_overwrites_without_evicting() {
        let table = PendingTable::with_capacity(2);
        table.put(Tid(1), PendingRead::new(1, 0x1));
        table.put(Tid(2), PendingRead::new(2, 0x2));

        assert!(table.put(Tid(1), PendingRead::new(3, 0x3)));
        assert_eq!(table.evictions(), 0);
        assert_eq!(table.get(Tid(2)), Some(PendingRead::new(2, 0x2)));
    }

    #[test]
    fn test_concurrent_threads_do_not_interfere() {
        let table = std::sync::Arc::new(PendingTable::with_capacity(1024));
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let table = std::sync::Arc::clone(&table);
                std::thread::spawn(move || {
                    for i in 0..1000u64 {
                        let tid = Tid(t);
                        table.put(tid, PendingRead::new(t as i32, i));
                        assert_eq!(table.get(tid).map(|e| e.fd), Some(t as i32));
                        table.delete(tid);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_concurrent_inserts_never_exceed_capacity() {
        let table = std::sync::Arc::new(PendingTable::with_capacity(32));
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let table = std::sync::Arc::clone(&table);
                std::thread::spawn(move || {
                    for i in 0..200u32 {
                        table.put(Tid(t * 1000 + i), PendingRead::new(1, u64::from(i)));
                        assert!(table.len() <= 32);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(table.len() <= 32);
        assert!(table.evictions() > 0);
    }
}
