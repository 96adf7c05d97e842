use ahash::AHashMap;

use crate::error::NativeError;
use crate::request::{CacheObject, ObjId};

/// Object table of the native engine: which objects are resident and how
/// many bytes they occupy. Each object is charged its size plus a fixed
/// metadata overhead.
///
/// The table never decides what to evict; it only enforces its own
/// accounting invariants.
pub(crate) struct ObjectTable {
    map: AHashMap<ObjId, CacheObject>,
    occupied: u64,
    md_size: u64,
}

impl ObjectTable {
    pub(crate) fn with_capacity(capacity: usize, md_size: u64) -> Self {
        ObjectTable {
            map: AHashMap::with_capacity(capacity),
            occupied: 0,
            md_size,
        }
    }

    #[inline]
    fn charge(&self, obj: &CacheObject) -> u64 {
        obj.obj_size.saturating_add(self.md_size)
    }

    #[inline]
    pub(crate) fn get(&self, obj_id: ObjId) -> Option<&CacheObject> {
        self.map.get(&obj_id)
    }

    #[inline]
    pub(crate) fn contains(&self, obj_id: ObjId) -> bool {
        self.map.contains_key(&obj_id)
    }

    pub(crate) fn insert(&mut self, obj: CacheObject) -> Result<(), NativeError> {
        if self.map.contains_key(&obj.obj_id) {
            return Err(NativeError::Cache(format!(
                "object {} is already resident",
                obj.obj_id
            )));
        }
        self.occupied = self.occupied.checked_add(self.charge(&obj)).ok_or_else(|| {
            NativeError::Overflow(format!(
                "occupied bytes overflow inserting object {}",
                obj.obj_id
            ))
        })?;
        self.map.insert(obj.obj_id, obj);
        Ok(())
    }

    pub(crate) fn remove(&mut self, obj_id: ObjId) -> Result<Option<CacheObject>, NativeError> {
        let Some(obj) = self.map.remove(&obj_id) else {
            return Ok(None);
        };
        self.occupied = self.occupied.checked_sub(self.charge(&obj)).ok_or_else(|| {
            NativeError::Cache(format!(
                "occupied bytes underflow removing object {obj_id}: index is corrupted"
            ))
        })?;
        Ok(Some(obj))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &CacheObject> {
        self.map.values()
    }

    #[inline]
    pub(crate) fn occupied(&self) -> u64 {
        self.occupied
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
