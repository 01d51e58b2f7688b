use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError, atomic::{AtomicI64, Ordering}},
};

use crate::model::Key;
use super::{Document, Filter, Kind, Stored};


/// Non-persistent backend keeping all documents in a map. Keys are assigned
/// from one counter shared by all kinds, starting at 1.
pub(super) struct MemoryStore {
    collections: Mutex<HashMap<Kind, BTreeMap<Key, Document>>>,
    next_key: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            next_key: AtomicI64::new(1),
        }
    }
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, HashMap<Kind, BTreeMap<Key, Document>>> {
        // A panic while holding the lock cannot leave a map half-modified, as
        // all modifications are single `insert` calls.
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn find_by_id(&self, kind: Kind, key: Key) -> Option<Stored> {
        self.lock()
            .get(&kind)
            .and_then(|docs| docs.get(&key))
            .map(|doc| Stored { key, doc: doc.clone() })
    }

    pub(super) fn find(&self, kind: Kind, filter: &Filter) -> Vec<Stored> {
        self.lock()
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|(_, doc)| filter.matches(doc))
            .map(|(key, doc)| Stored { key: *key, doc: doc.clone() })
            .collect()
    }

    pub(super) fn save(&self, kind: Kind, doc: Document) -> Stored {
        let key = Key(self.next_key.fetch_add(1, Ordering::SeqCst));
        self.lock().entry(kind).or_default().insert(key, doc.clone());
        Stored { key, doc }
    }
}
