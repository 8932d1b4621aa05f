use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Key = Bytes;
type Hash = HashMap<Bytes, Bytes>;

/// The Store holds the two keyspaces served by the commands: plain string values and hashes of
/// field/value pairs. Each keyspace sits behind its own reader/writer lock, so a string write
/// never waits on a hash write and vice versa. The store is cheap to clone; clones share the
/// same underlying tables. Keys and fields are binary safe.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<InnerStore>,
}

#[derive(Default)]
struct InnerStore {
    strings: RwLock<HashMap<Key, Bytes>>,
    hashes: RwLock<HashMap<Key, Hash>>,
}

impl Store {
    pub fn new() -> Store {
        Self::default()
    }

    pub fn set(&self, key: impl Into<Key>, value: Bytes) {
        self.strings_mut().insert(key.into(), value);
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<Bytes> {
        self.strings().get(key.as_ref()).cloned()
    }

    /// Sets `field` in the hash stored at `key`, creating the hash first if needed.
    pub fn hset(&self, key: impl Into<Key>, field: impl Into<Bytes>, value: Bytes) {
        self.hashes_mut()
            .entry(key.into())
            .or_default()
            .insert(field.into(), value);
    }

    pub fn hget(&self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> Option<Bytes> {
        self.hashes()
            .get(key.as_ref())
            .and_then(|hash| hash.get(field.as_ref()))
            .cloned()
    }

    /// Returns every field/value pair of the hash at `key`, in no particular order.
    pub fn hgetall(&self, key: impl AsRef<[u8]>) -> Option<Vec<(Bytes, Bytes)>> {
        self.hashes().get(key.as_ref()).map(|hash| {
            hash.iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()
        })
    }

    /// Number of keys across both tables. The two locks are taken one after the other.
    pub fn len(&self) -> usize {
        let strings = self.strings().len();
        let hashes = self.hashes().len();

        strings + hashes
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every mutation is a single map insert, so a poisoned lock still guards a consistent table.
    fn strings(&self) -> RwLockReadGuard<'_, HashMap<Key, Bytes>> {
        self.inner
            .strings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn strings_mut(&self) -> RwLockWriteGuard<'_, HashMap<Key, Bytes>> {
        self.inner
            .strings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn hashes(&self) -> RwLockReadGuard<'_, HashMap<Key, Hash>> {
        self.inner
            .hashes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn hashes_mut(&self) -> RwLockWriteGuard<'_, HashMap<Key, Hash>> {
        self.inner
            .hashes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
