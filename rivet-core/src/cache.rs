use crate::{CommandIdentity, JoinPlan, Materializer, Result, SplitPlan};
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::{self, Debug},
    hash::Hash,
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Memoization map that builds each key at most once.
///
/// Every key owns a slot. Concurrent first requests for the same key serialize on the slot, the
/// first one builds and the others receive its result. Entries rejected by `is_valid` are rebuilt
/// in place.
pub struct Memo<K, V> {
    slots: RwLock<HashMap<K, Arc<Mutex<Option<V>>>>>,
    builds: AtomicUsize,
}

impl<K: Eq + Hash + Clone, V: Clone> Memo<K, V> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn get_or_try_build(
        &self,
        key: &K,
        is_valid: impl FnOnce(&V) -> bool,
        build: impl FnOnce() -> Result<V>,
    ) -> Result<V> {
        let slot = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        let slot = match slot {
            Some(slot) => slot,
            None => self
                .slots
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key.clone())
                .or_default()
                .clone(),
        };
        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = entry.as_ref() {
            if is_valid(value) {
                return Ok(value.clone());
            }
            log::warn!("Cached entry no longer matches the result shape, rebuilding it");
        }
        let value = build()?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        *entry = Some(value.clone());
        Ok(value)
    }

    /// Number of successful builds since creation.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for Memo<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies one result shape read as one type: the command, the connection and the column range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterializerKey {
    pub type_id: TypeId,
    pub command: CommandIdentity,
    pub offset: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SplitKey {
    pub types: Box<[TypeId]>,
    pub command: CommandIdentity,
}

/// Caches derived from one mapping configuration.
#[derive(Default)]
pub struct MapperCache {
    pub(crate) metadata: Memo<TypeId, Arc<dyn Any + Send + Sync>>,
    pub(crate) materializers: Memo<MaterializerKey, Arc<dyn Materializer>>,
    pub(crate) splits: Memo<SplitKey, Arc<SplitPlan>>,
    pub(crate) joins: Memo<Box<[TypeId]>, Arc<JoinPlan>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub metadata: usize,
    pub materializers: usize,
    pub splits: usize,
    pub joins: usize,
}

impl MapperCache {
    /// Builds performed so far, per cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            metadata: self.metadata.builds(),
            materializers: self.materializers.builds(),
            splits: self.splits.builds(),
            joins: self.joins.builds(),
        }
    }
}

impl Debug for MapperCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperCache")
            .field("metadata", &self.metadata.len())
            .field("materializers", &self.materializers.len())
            .field("splits", &self.splits.len())
            .field("joins", &self.joins.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Barrier, thread};

    #[test]
    fn builds_once_per_key() {
        let memo = Arc::new(Memo::<u32, Arc<String>>::new());
        let barrier = Arc::new(Barrier::new(8));
        let results = (0..8)
            .map(|_| {
                let memo = memo.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    memo.get_or_try_build(
                        &1,
                        |_| true,
                        || {
                            thread::sleep(std::time::Duration::from_millis(10));
                            Ok(Arc::new("built".to_string()))
                        },
                    )
                    .unwrap()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(memo.builds(), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn failed_build_is_retried() {
        let memo = Memo::<&str, i32>::new();
        assert!(
            memo.get_or_try_build(&"k", |_| true, || Err(crate::Error::msg("boom")))
                .is_err()
        );
        assert_eq!(memo.get_or_try_build(&"k", |_| true, || Ok(3)).unwrap(), 3);
        assert_eq!(memo.get_or_try_build(&"k", |_| true, || Ok(4)).unwrap(), 3);
        assert_eq!(memo.builds(), 1);
    }

    #[test]
    fn invalid_entry_is_rebuilt() {
        let memo = Memo::<&str, i32>::new();
        memo.get_or_try_build(&"k", |_| true, || Ok(1)).unwrap();
        assert_eq!(
            memo.get_or_try_build(&"k", |v| *v == 2, || Ok(2)).unwrap(),
            2
        );
        assert_eq!(memo.builds(), 2);
    }
}
