//! Per-call geometry context.

use std::collections::{BTreeMap, HashSet};

use tracing::error;

use crate::alignment::{AlignmentStore, SharedAlignmentStore};
use crate::error::AlignError;
use crate::technology::DetectorTechnology;

/// Bundle of frozen alignment stores, at most one per technology.
///
/// A technology without a store resolves to nominal geometry. Cloning is
/// cheap (the stores are reference counted) and the context is safe to share
/// across threads processing different events.
#[derive(Debug, Clone, Default)]
pub struct GeometryContext {
    stores: BTreeMap<DetectorTechnology, SharedAlignmentStore>,
}

impl GeometryContext {
    /// A context with no alignment: every technology resolves to nominal.
    #[must_use]
    pub fn nominal() -> Self {
        Self::default()
    }

    /// Adds `store` under its own technology, replacing any previous one.
    #[must_use]
    pub fn with_store(mut self, store: SharedAlignmentStore) -> Self {
        self.insert(store);
        self
    }

    /// Adds `store` under its own technology, returning the one it replaced.
    pub fn insert(&mut self, store: SharedAlignmentStore) -> Option<SharedAlignmentStore> {
        self.stores.insert(store.technology(), store)
    }

    /// Returns the store for `technology`, if any.
    #[must_use]
    pub fn store(&self, technology: DetectorTechnology) -> Option<&AlignmentStore> {
        self.stores.get(&technology).map(|store| &**store)
    }

    /// Returns a shared handle to the store for `technology`, if any.
    #[must_use]
    pub fn shared_store(&self, technology: DetectorTechnology) -> Option<SharedAlignmentStore> {
        self.stores.get(&technology).cloned()
    }

    /// True if the context carries a store for `technology`.
    #[must_use]
    pub fn has_store(&self, technology: DetectorTechnology) -> bool {
        self.stores.contains_key(&technology)
    }

    /// Technologies with a store, in order.
    pub fn technologies(&self) -> impl Iterator<Item = DetectorTechnology> + '_ {
        self.stores.keys().copied()
    }

    /// True if the context carries no stores at all.
    #[must_use]
    pub fn is_nominal(&self) -> bool {
        self.stores.is_empty()
    }

    /// Checks that every active technology expecting alignment has a store.
    ///
    /// Technologies in `no_alignment` are skipped.
    ///
    /// # Errors
    /// `IncompleteAlignment` naming the first technology without a store.
    pub fn check_complete(
        &self,
        active: impl IntoIterator<Item = DetectorTechnology>,
        no_alignment: &HashSet<DetectorTechnology>,
    ) -> Result<(), AlignError> {
        let mut active: Vec<DetectorTechnology> = active.into_iter().collect();
        active.sort_unstable();
        active.dedup();

        for technology in active {
            if no_alignment.contains(&technology) {
                continue;
            }
            if !self.has_store(technology) {
                error!(%technology, "no alignment constants have been defined");
                return Err(AlignError::IncompleteAlignment { technology });
            }
        }
        Ok(())
    }
}
