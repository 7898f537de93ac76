use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::store::be_u64;

/// Append-only text -> id table backed by a pair of sled trees, with a
/// lock-guarded in-memory cache in front.
///
/// Ids are dense, start at 1, and are assigned in first-sighting order.
/// Allocation is the one serialization point in the pipeline: concurrent
/// first sightings of the same text must resolve to a single id, enforced
/// here by the allocation lock plus an insert-if-absent against the store.
pub struct Registry {
    forward: sled::Tree,
    reverse: sled::Tree,
    cache: RwLock<HashMap<Box<str>, u64>>,
    alloc: Mutex<u64>,
}

impl Registry {
    /// Open a registry over its forward (text -> id) and reverse
    /// (id -> text) trees, resuming the id sequence from the store.
    pub fn open(forward: sled::Tree, reverse: sled::Tree) -> Result<Self> {
        let next = match reverse.last()? {
            Some((key, _)) => be_u64(&key)? + 1,
            None => 1,
        };
        Ok(Self {
            forward,
            reverse,
            cache: RwLock::new(HashMap::new()),
            alloc: Mutex::new(next),
        })
    }

    /// Resolve text to its stable id, allocating the next unused id on
    /// first sighting. A store failure here leaves no partial entry: the
    /// forward insert is the single point of commitment, and the caller
    /// aborts the document it was processing.
    pub fn resolve(&self, text: &str) -> Result<u64> {
        if let Some(&id) = self.cache.read().get(text) {
            return Ok(id);
        }
        let mut next = self.alloc.lock();
        // Re-check the store under the allocation lock: another caller may
        // have won the first-sighting race before we acquired it.
        if let Some(existing) = self.forward.get(text.as_bytes())? {
            let id = be_u64(&existing)?;
            self.cache.write().insert(text.into(), id);
            return Ok(id);
        }
        let id = *next;
        match self
            .forward
            .compare_and_swap(text.as_bytes(), None as Option<&[u8]>, Some(&id.to_be_bytes()[..]))?
        {
            Ok(()) => {
                self.reverse.insert(&id.to_be_bytes()[..], text.as_bytes())?;
                *next = id + 1;
                self.cache.write().insert(text.into(), id);
                Ok(id)
            }
            Err(cas) => {
                // Lost the race against another handle on the same trees.
                let current = cas
                    .current
                    .ok_or(Error::Corrupt("registry entry vanished during insert"))?;
                let id = be_u64(&current)?;
                self.cache.write().insert(text.into(), id);
                Ok(id)
            }
        }
    }

    /// Look up an id without allocating one.
    pub fn get(&self, text: &str) -> Result<Option<u64>> {
        if let Some(&id) = self.cache.read().get(text) {
            return Ok(Some(id));
        }
        match self.forward.get(text.as_bytes())? {
            Some(raw) => Ok(Some(be_u64(&raw)?)),
            None => Ok(None),
        }
    }

    /// Text for an allocated id.
    pub fn text(&self, id: u64) -> Result<Option<String>> {
        Ok(self
            .reverse
            .get(id.to_be_bytes())?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned()))
    }

    /// Number of ids allocated so far.
    pub fn len(&self) -> u64 {
        *self.alloc.lock() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize the full id -> text mapping (used by the exporters).
    pub fn id_to_text(&self) -> Result<HashMap<u64, String>> {
        let mut out = HashMap::new();
        for entry in self.reverse.iter() {
            let (key, value) = entry?;
            out.insert(be_u64(&key)?, String::from_utf8_lossy(&value).into_owned());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, Registry) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let reg = Registry::open(db.open_tree("fwd").unwrap(), db.open_tree("rev").unwrap()).unwrap();
        (dir, reg)
    }

    #[test]
    fn ids_are_stable_and_dense() {
        let (_dir, reg) = registry();
        assert_eq!(reg.resolve("alpha").unwrap(), 1);
        assert_eq!(reg.resolve("beta").unwrap(), 2);
        assert_eq!(reg.resolve("alpha").unwrap(), 1);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.text(2).unwrap().as_deref(), Some("beta"));
    }

    #[test]
    fn get_does_not_allocate() {
        let (_dir, reg) = registry();
        assert_eq!(reg.get("alpha").unwrap(), None);
        assert!(reg.is_empty());
        reg.resolve("alpha").unwrap();
        assert_eq!(reg.get("alpha").unwrap(), Some(1));
    }
}
