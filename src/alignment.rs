//! Write-once alignment builders and their frozen, shareable stores.
//!
//! An [`AlignmentBuilder`] is filled by one construction pass on a single
//! thread. [`AlignmentBuilder::freeze`] consumes it and yields an
//! [`AlignmentStore`] behind an `Arc`; from then on the store is read-only
//! and can be read from any number of threads without locking.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::conditions::Iov;
use crate::error::AlignError;
use crate::identity::{CacheId, CacheKey, ElementHash};
use crate::technology::DetectorTechnology;
use crate::transform::Transform;

/// A frozen alignment store, shared between worker threads.
pub type SharedAlignmentStore = Arc<AlignmentStore>;

#[derive(Debug, Clone, Copy)]
struct AlignedEntry {
    hash: ElementHash,
    transform: Transform,
}

/// Mutable staging area for one technology's alignment pass.
///
/// Holds two maps:
/// - raw per-element corrections (`deltas`), the input that transform
///   functions read while computing aligned placements;
/// - resolved per-cache transforms (`entries`), each written exactly once.
#[derive(Debug)]
pub struct AlignmentBuilder {
    technology: DetectorTechnology,
    iov: Option<Iov>,
    deltas: HashMap<ElementHash, Transform>,
    entries: HashMap<CacheId, AlignedEntry>,
}

impl AlignmentBuilder {
    /// Creates an empty builder for `technology`.
    #[must_use]
    pub fn new(technology: DetectorTechnology) -> Self {
        Self {
            technology,
            iov: None,
            deltas: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    /// Records the validity interval the resulting store will cover.
    #[must_use]
    pub fn for_iov(mut self, iov: Iov) -> Self {
        self.iov = Some(iov);
        self
    }

    /// Technology this builder collects alignments for.
    #[must_use]
    pub const fn technology(&self) -> DetectorTechnology {
        self.technology
    }

    /// Validity interval, if one was recorded.
    #[must_use]
    pub const fn iov(&self) -> Option<Iov> {
        self.iov
    }

    /// Sets the raw alignment correction for an element.
    ///
    /// Corrections are input data; setting one again replaces it.
    pub fn set_delta(&mut self, hash: ElementHash, delta: Transform) {
        self.deltas.insert(hash, delta);
    }

    /// Returns the raw alignment correction for an element, if any.
    #[must_use]
    pub fn delta(&self, hash: ElementHash) -> Option<&Transform> {
        self.deltas.get(&hash)
    }

    /// Writes the aligned transform for one cache.
    ///
    /// # Errors
    /// - `TechnologyMismatch`: the key belongs to a different technology
    /// - `DuplicateAlignmentWrite`: the key was already written in this pass;
    ///   the first value is kept
    pub fn set(&mut self, key: CacheKey, transform: Transform) -> Result<(), AlignError> {
        if key.technology != self.technology {
            return Err(AlignError::TechnologyMismatch {
                expected: self.technology,
                actual: key.technology,
                hash: key.hash,
            });
        }
        if self.entries.contains_key(&key.id) {
            return Err(AlignError::DuplicateAlignmentWrite {
                technology: self.technology,
                hash: key.hash,
            });
        }
        self.entries.insert(
            key.id,
            AlignedEntry {
                hash: key.hash,
                transform,
            },
        );
        Ok(())
    }

    /// Returns the transform already written for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Transform> {
        self.entries.get(&key.id).map(|e| e.transform)
    }

    /// Number of resolved entries written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no resolved entries have been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the builder and publishes an immutable store.
    ///
    /// Raw corrections are dropped; only resolved entries survive.
    #[must_use]
    pub fn freeze(self) -> SharedAlignmentStore {
        debug!(
            technology = %self.technology,
            entries = self.entries.len(),
            iov = ?self.iov,
            "freezing alignment store"
        );
        Arc::new(AlignmentStore {
            technology: self.technology,
            iov: self.iov,
            entries: self.entries,
        })
    }
}

/// Read-only mapping from cache identity to aligned transform.
///
/// There is no API to mutate a store once frozen.
#[derive(Debug)]
pub struct AlignmentStore {
    technology: DetectorTechnology,
    iov: Option<Iov>,
    entries: HashMap<CacheId, AlignedEntry>,
}

impl AlignmentStore {
    /// Looks up the aligned transform for a cache.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Transform> {
        self.entries.get(&key.id).map(|e| e.transform)
    }

    /// True if the store has an entry for `key`.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(&key.id)
    }

    /// Technology this store belongs to.
    #[must_use]
    pub const fn technology(&self) -> DetectorTechnology {
        self.technology
    }

    /// Validity interval, if one was recorded at build time.
    #[must_use]
    pub const fn iov(&self) -> Option<Iov> {
        self.iov
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(element hash, transform)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementHash, Transform)> + '_ {
        self.entries.values().map(|e| (e.hash, e.transform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(hash: u32) -> CacheKey {
        CacheKey::new(ElementHash::new(hash), DetectorTechnology::Strip)
    }

    #[test]
    fn second_write_fails_and_keeps_first_value() {
        let mut builder = AlignmentBuilder::new(DetectorTechnology::Strip);
        let k = key(1);
        let t1 = Transform::from_translation(1.0, 0.0, 0.0);
        let t2 = Transform::from_translation(2.0, 0.0, 0.0);

        builder.set(k, t1).unwrap();
        let err = builder.set(k, t2).unwrap_err();
        assert_eq!(
            err,
            AlignError::DuplicateAlignmentWrite {
                technology: DetectorTechnology::Strip,
                hash: ElementHash::new(1),
            }
        );
        assert_eq!(builder.get(&k), Some(t1));

        let store = builder.freeze();
        assert_eq!(store.get(&k), Some(t1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn equal_hashes_from_distinct_caches_are_separate_entries() {
        let mut builder = AlignmentBuilder::new(DetectorTechnology::Strip);
        let a = key(5);
        let b = key(5);
        builder.set(a, Transform::from_translation(1.0, 0.0, 0.0)).unwrap();
        builder.set(b, Transform::from_translation(0.0, 1.0, 0.0)).unwrap();

        let store = builder.freeze();
        assert_eq!(store.len(), 2);
        assert_ne!(store.get(&a), store.get(&b));
    }

    #[test]
    fn rejects_foreign_technology() {
        let mut builder = AlignmentBuilder::new(DetectorTechnology::Pixel);
        let err = builder.set(key(3), Transform::identity()).unwrap_err();
        assert!(matches!(
            err,
            AlignError::TechnologyMismatch {
                expected: DetectorTechnology::Pixel,
                actual: DetectorTechnology::Strip,
                ..
            }
        ));
        assert!(builder.is_empty());
    }

    #[test]
    fn deltas_are_replaceable_and_dropped_on_freeze() {
        let mut builder = AlignmentBuilder::new(DetectorTechnology::Strip);
        let h = ElementHash::new(9);
        builder.set_delta(h, Transform::from_translation(0.1, 0.0, 0.0));
        builder.set_delta(h, Transform::from_translation(0.2, 0.0, 0.0));
        assert_eq!(builder.delta(h), Some(&Transform::from_translation(0.2, 0.0, 0.0)));
        assert!(builder.delta(ElementHash::new(10)).is_none());

        let store = builder.freeze();
        assert!(store.is_empty());
    }

    #[test]
    fn store_carries_iov_and_lists_entries() {
        let iov = Iov::new(100, 200).unwrap();
        let mut builder = AlignmentBuilder::new(DetectorTechnology::Strip).for_iov(iov);
        builder.set(key(1), Transform::identity()).unwrap();
        builder.set(key(2), Transform::identity()).unwrap();

        let store = builder.freeze();
        assert_eq!(store.iov(), Some(iov));
        assert_eq!(store.technology(), DetectorTechnology::Strip);

        let mut hashes: Vec<u32> = store.iter().map(|(h, _)| h.value()).collect();
        hashes.sort_unstable();
        assert_eq!(hashes, vec![1, 2]);
    }

    #[test]
    fn frozen_store_is_readable_from_many_threads() {
        let mut builder = AlignmentBuilder::new(DetectorTechnology::Strip);
        let keys: Vec<CacheKey> = (0..64).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            builder
                .set(*k, Transform::from_translation(f64::from(i as u32), 0.0, 0.0))
                .unwrap();
        }
        let store = builder.freeze();

        let results: Vec<Vec<Option<Transform>>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let keys = &keys;
                    s.spawn(move || keys.iter().map(|k| store.get(k)).collect())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for r in &results {
            assert_eq!(r, &results[0]);
        }
        assert!(results[0].iter().all(Option::is_some));
    }
}
