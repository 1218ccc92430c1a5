//! Per-technology element registry.
//!
//! Owns the caches of one detector technology, keyed by element hash, and
//! drives alignment passes over all of them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::alignment::{AlignmentBuilder, SharedAlignmentStore};
use crate::cache::{AlignableElement, TransformCache};
use crate::conditions::Iov;
use crate::error::AlignError;
use crate::identity::ElementHash;
use crate::technology::DetectorTechnology;
use crate::transform::Transform;

/// Geometry manager for one technology.
#[derive(Debug)]
pub struct ElementRegistry<E = TransformCache> {
    technology: DetectorTechnology,
    elements: BTreeMap<ElementHash, Arc<E>>,
}

impl<E: AlignableElement> ElementRegistry<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(technology: DetectorTechnology) -> Self {
        Self {
            technology,
            elements: BTreeMap::new(),
        }
    }

    /// Technology every registered element belongs to.
    #[must_use]
    pub const fn technology(&self) -> DetectorTechnology {
        self.technology
    }

    /// Takes ownership of `element` and returns a shared handle to it.
    ///
    /// # Errors
    /// - `TechnologyMismatch`: the element belongs to another technology
    /// - `DuplicateElement`: the hash is already registered
    pub fn register(&mut self, element: E) -> Result<Arc<E>, AlignError> {
        let hash = element.identity_hash();
        if element.technology() != self.technology {
            return Err(AlignError::TechnologyMismatch {
                expected: self.technology,
                actual: element.technology(),
                hash,
            });
        }
        if self.elements.contains_key(&hash) {
            return Err(AlignError::DuplicateElement {
                technology: self.technology,
                hash,
            });
        }
        let element = Arc::new(element);
        self.elements.insert(hash, Arc::clone(&element));
        Ok(element)
    }

    /// Element registered under `hash`, if any.
    #[must_use]
    pub fn get(&self, hash: ElementHash) -> Option<&Arc<E>> {
        self.elements.get(&hash)
    }

    /// Number of registered elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in ascending hash order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<E>> + '_ {
        self.elements.values()
    }

    /// Writes every element's aligned transform into `builder`.
    ///
    /// Returns the number of entries written. Stops at the first failure.
    ///
    /// # Errors
    /// Any write-once or technology check raised by the builder.
    pub fn populate_alignment(&self, builder: &mut AlignmentBuilder) -> Result<usize, AlignError> {
        debug!(technology = %self.technology, "populating alignment store with all detector elements");
        let mut written = 0;
        for element in self.elements.values() {
            written += element.store_alignment(builder)?;
        }
        debug!(technology = %self.technology, written, "populated alignment store");
        Ok(written)
    }

    /// Runs a full alignment pass and freezes the result.
    ///
    /// `deltas` are the raw per-element corrections the transform
    /// functions read.
    ///
    /// # Errors
    /// As for [`populate_alignment`](Self::populate_alignment).
    pub fn build_store(
        &self,
        deltas: impl IntoIterator<Item = (ElementHash, Transform)>,
        iov: Option<Iov>,
    ) -> Result<SharedAlignmentStore, AlignError> {
        let mut builder = AlignmentBuilder::new(self.technology);
        if let Some(iov) = iov {
            builder = builder.for_iov(iov);
        }
        for (hash, delta) in deltas {
            builder.set_delta(hash, delta);
        }
        self.populate_alignment(&mut builder)?;
        Ok(builder.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cache::TransformFunction;
    use crate::context::GeometryContext;
    use crate::surface::{Surface, SurfaceBounds, SurfaceCache};

    const TECH: DetectorTechnology = DetectorTechnology::Trt;

    fn straw(hash: u32) -> TransformCache {
        TransformCache::new(
            ElementHash::new(hash),
            TECH,
            TransformFunction::with_delta(Transform::from_translation(0.0, f64::from(hash), 0.0)),
        )
    }

    #[test]
    fn register_rejects_duplicates_and_foreign_technology() {
        let mut registry = ElementRegistry::new(TECH);
        registry.register(straw(1)).unwrap();
        assert!(matches!(
            registry.register(straw(1)),
            Err(AlignError::DuplicateElement { .. })
        ));

        let foreign = TransformCache::new(
            ElementHash::new(2),
            DetectorTechnology::Pixel,
            TransformFunction::fixed(Transform::identity()),
        );
        assert!(matches!(
            registry.register(foreign),
            Err(AlignError::TechnologyMismatch { .. })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn build_store_covers_every_element() {
        let mut registry = ElementRegistry::new(TECH);
        let handles: Vec<_> = (0..10).map(|h| registry.register(straw(h)).unwrap()).collect();

        let deltas = [(ElementHash::new(3), Transform::from_translation(0.0, 0.0, 0.25))];
        let store = registry.build_store(deltas, Some(Iov::open_ended(0))).unwrap();
        assert_eq!(store.len(), 10);
        assert_eq!(store.iov(), Some(Iov::open_ended(0)));

        let ctx = GeometryContext::nominal().with_store(store);
        assert_eq!(
            handles[3].resolve(&ctx).unwrap(),
            Transform::from_translation(0.0, 3.0, 0.25)
        );
        assert_eq!(handles[4].resolve(&ctx).unwrap(), handles[4].resolve_nominal());
    }

    #[test]
    fn second_pass_into_same_builder_fails() {
        let mut registry = ElementRegistry::new(TECH);
        registry.register(straw(1)).unwrap();
        let mut builder = AlignmentBuilder::new(TECH);
        assert_eq!(registry.populate_alignment(&mut builder).unwrap(), 1);
        assert!(matches!(
            registry.populate_alignment(&mut builder),
            Err(AlignError::DuplicateAlignmentWrite { .. })
        ));
    }

    #[test]
    fn registry_of_surface_caches() {
        let mut registry: ElementRegistry<SurfaceCache> = ElementRegistry::new(TECH);
        let surface = Surface::new(SurfaceBounds::Straw { radius: 2.0, half_z: 350.0 }, 0.035);
        let element = registry
            .register(SurfaceCache::with_surface(straw(7), surface))
            .unwrap();
        assert!(registry.get(ElementHash::new(7)).is_some());

        let store = registry.build_store([], None).unwrap();
        let ctx = GeometryContext::nominal().with_store(store);
        assert_eq!(element.transform(&ctx).unwrap(), Transform::from_translation(0.0, 7.0, 0.0));
        assert_eq!(element.surface().unwrap(), &surface);
    }
}
