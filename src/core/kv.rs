// src/core/kv.rs

//! A thin wrapper over the concurrent hash table spec.md treats as a given
//! collaborator ("used as a black box with insert/lookup/remove/iterate and
//! per-key locking"). Backed by `dashmap::DashMap`, which shards its
//! internal storage and takes a per-shard `RwLock` on every access — the
//! same reach for `dashmap` the teacher uses wherever independent keys need
//! concurrent, lock-free-between-keys access (`GlobalWardenState::masters`).

use bytes::Bytes;
use dashmap::DashMap;

/// One of a server's two key sets (its primary set, or its secondary set).
#[derive(Debug, Default)]
pub struct KvTable {
    inner: DashMap<Bytes, Bytes>,
}

impl KvTable {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn get(&self, key: &Bytes) -> Option<Bytes> {
        self.inner.get(key).map(|v| v.clone())
    }

    /// Inserts `value` under `key`, returning the previous value if any.
    /// `DashMap::insert` takes the shard's write lock for the duration of
    /// the call, which is exactly the per-key critical section spec.md §5
    /// requires around the local half of a PUT.
    pub fn insert(&self, key: Bytes, value: Bytes) -> Option<Bytes> {
        self.inner.insert(key, value)
    }

    pub fn remove(&self, key: &Bytes) -> Option<Bytes> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// A point-in-time snapshot of every entry, used to stream a key set
    /// during recovery. `DashMap`'s own iterator cannot be held across an
    /// `.await` (it pins a shard's read lock), so recovery streaming clones
    /// the whole set up front — acceptable for the in-memory shard sizes
    /// this system targets, and it guarantees the stream sees a single
    /// consistent cut rather than an interleaving of later PUTs.
    pub fn snapshot(&self) -> Vec<(Bytes, Bytes)> {
        self.inner
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Removes every entry, used when a recovery stream fully repopulates
    /// a table that may hold stale data from a previous incarnation.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_round_trip() {
        let table = KvTable::new();
        let key = Bytes::from_static(b"k");
        assert_eq!(table.get(&key), None);

        table.insert(key.clone(), Bytes::from_static(b"v1"));
        assert_eq!(table.get(&key), Some(Bytes::from_static(b"v1")));

        // Idempotent PUT: re-inserting the same value yields the same state.
        table.insert(key.clone(), Bytes::from_static(b"v1"));
        assert_eq!(table.get(&key), Some(Bytes::from_static(b"v1")));

        table.insert(key.clone(), Bytes::from_static(b"v2"));
        assert_eq!(table.get(&key), Some(Bytes::from_static(b"v2")));

        assert_eq!(table.remove(&key), Some(Bytes::from_static(b"v2")));
        assert_eq!(table.get(&key), None);
    }

    #[test]
    fn snapshot_reflects_all_entries() {
        let table = KvTable::new();
        for i in 0..5u8 {
            table.insert(Bytes::from(vec![i]), Bytes::from(vec![i, i]));
        }
        let mut snap = table.snapshot();
        snap.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(snap.len(), 5);
        assert_eq!(snap[2].0, Bytes::from(vec![2u8]));
    }
}
