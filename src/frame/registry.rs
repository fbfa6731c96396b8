use ahash::AHashMap;
use std::sync::Arc;

use crate::error::ReactorError;

/// Uid + name registry. Backs both a frame's connectors and the system's
/// frames; callers provide the synchronisation.
pub struct UniqueStore<T> {
    prefix: &'static str,
    next_uid: u64,
    by_id: AHashMap<u64, StoreEntry<T>>,
    by_name: AHashMap<Arc<str>, u64>,
}

struct StoreEntry<T> {
    name: Arc<str>,
    value: T,
}

impl<T> UniqueStore<T> {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next_uid: 1,
            by_id: AHashMap::new(),
            by_name: AHashMap::new(),
        }
    }

    /// Reserve the next uid without storing anything yet.
    pub fn reserve_id(&mut self) -> u64 {
        let uid = self.next_uid;
        self.next_uid += 1;
        uid
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Produce an unused name from the store prefix and a uid.
    pub fn synthesize(&self, uid: u64) -> Arc<str> {
        let base = format!("{}-{}", self.prefix, uid);
        if !self.contains_name(&base) {
            return Arc::from(base.as_str());
        }
        let mut k = 1u32;
        loop {
            let candidate = format!("{base}-{k}");
            if !self.contains_name(&candidate) {
                return Arc::from(candidate.as_str());
            }
            k += 1;
        }
    }

    /// Store `value` under a reserved uid and resolved name. Duplicate
    /// names are rejected and leave the store untouched.
    pub fn try_store(&mut self, uid: u64, name: Arc<str>, value: T) -> Result<(), ReactorError> {
        if self.by_name.contains_key(&*name) {
            return Err(ReactorError::DuplicateName(name.to_string()));
        }
        self.by_name.insert(name.clone(), uid);
        self.by_id.insert(uid, StoreEntry { name, value });
        Ok(())
    }

    pub fn for_id(&self, uid: u64) -> Option<&T> {
        self.by_id.get(&uid).map(|e| &e.value)
    }

    pub fn for_name(&self, name: &str) -> Option<&T> {
        self.by_name.get(name).and_then(|uid| self.for_id(*uid))
    }

    /// Remove the entry for `uid` together with its name mapping.
    pub fn try_release_by_id(&mut self, uid: u64) -> Option<T> {
        let entry = self.by_id.remove(&uid)?;
        self.by_name.remove(&entry.name);
        Some(entry.value)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.by_id.values().map(|e| &e.value)
    }

    /// Remove and return every stored value.
    pub fn drain(&mut self) -> Vec<T> {
        self.by_name.clear();
        self.by_id.drain().map(|(_, e)| e.value).collect()
    }
}
