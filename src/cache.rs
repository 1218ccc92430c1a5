//! Alignment-aware transform caches.
//!
//! A [`TransformCache`] resolves the placement of one detector element. With
//! an alignment store for its technology in the [`GeometryContext`], the
//! aligned entry wins. Without one, the nominal placement is computed on
//! first demand and memoized for the lifetime of the cache.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::trace;

use crate::alignment::AlignmentBuilder;
use crate::context::GeometryContext;
use crate::error::AlignError;
use crate::identity::{CacheKey, ElementHash};
use crate::technology::DetectorTechnology;
use crate::transform::Transform;

type TransformFn = dyn Fn(Option<&AlignmentBuilder>, ElementHash) -> Transform + Send + Sync;

/// Computes an element's transform from scratch.
///
/// Called with `None` for the nominal placement and with the alignment
/// builder of the current pass for the aligned one. Must be deterministic:
/// equal inputs yield equal transforms, since the nominal result is
/// memoized and a racing first access may evaluate it more than once.
#[derive(Clone)]
pub struct TransformFunction(Arc<TransformFn>);

impl TransformFunction {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&AlignmentBuilder>, ElementHash) -> Transform + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A function that ignores alignment and always returns `transform`.
    #[must_use]
    pub fn fixed(transform: Transform) -> Self {
        Self::new(move |_, _| transform)
    }

    /// A function that applies the builder's raw correction for the element
    /// on top of `nominal`, or returns `nominal` when there is none.
    #[must_use]
    pub fn with_delta(nominal: Transform) -> Self {
        Self::new(move |builder, hash| {
            match builder.and_then(|b| b.delta(hash)) {
                Some(delta) => nominal * *delta,
                None => nominal,
            }
        })
    }

    /// Evaluates the function.
    #[must_use]
    pub fn call(&self, builder: Option<&AlignmentBuilder>, hash: ElementHash) -> Transform {
        (self.0)(builder, hash)
    }
}

impl fmt::Debug for TransformFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransformFunction(..)")
    }
}

/// Something whose placement can be written into an alignment pass.
///
/// Implemented by [`TransformCache`] and by every type composing one, so a
/// geometry manager can drive an alignment pass over heterogeneous elements.
pub trait AlignableElement: Send + Sync {
    /// Technology the element belongs to.
    fn technology(&self) -> DetectorTechnology;

    /// Element hash within the technology.
    fn identity_hash(&self) -> ElementHash;

    /// Writes the element's aligned transforms into `builder`.
    ///
    /// Returns how many entries were written.
    ///
    /// # Errors
    /// Propagates the builder's write-once and technology checks.
    fn store_alignment(&self, builder: &mut AlignmentBuilder) -> Result<usize, AlignError>;
}

/// Per-element transform cache.
///
/// Owns its identity, its transform function and its nominal cell. The
/// nominal cell is filled at most once and never invalidated.
pub struct TransformCache {
    key: CacheKey,
    function: TransformFunction,
    nominal: OnceLock<Transform>,
}

impl fmt::Debug for TransformCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformCache")
            .field("key", &self.key)
            .field("nominal", &self.nominal.get())
            .finish_non_exhaustive()
    }
}

impl TransformCache {
    /// Creates a cache with an empty nominal cell.
    #[must_use]
    pub fn new(hash: ElementHash, technology: DetectorTechnology, function: TransformFunction) -> Self {
        Self {
            key: CacheKey::new(hash, technology),
            function,
            nominal: OnceLock::new(),
        }
    }

    /// Key under which this cache is written into alignment stores.
    #[must_use]
    pub const fn key(&self) -> CacheKey {
        self.key
    }

    /// Element hash.
    #[must_use]
    pub const fn hash(&self) -> ElementHash {
        self.key.hash
    }

    /// Technology tag.
    #[must_use]
    pub const fn technology(&self) -> DetectorTechnology {
        self.key.technology
    }

    /// Resolves the placement under `context`.
    ///
    /// - Store present with an entry: the aligned entry, even if the nominal
    ///   value was computed before. The nominal cell is left untouched.
    /// - Store present without an entry: `MissingAlignmentEntry`.
    /// - No store for this technology: the memoized nominal value.
    ///
    /// # Errors
    /// `MissingAlignmentEntry` when an alignment pass ran for this
    /// technology but did not cover this cache.
    pub fn resolve(&self, context: &GeometryContext) -> Result<Transform, AlignError> {
        let Some(store) = context.store(self.key.technology) else {
            return Ok(self.resolve_nominal());
        };
        store.get(&self.key).ok_or(AlignError::MissingAlignmentEntry {
            technology: self.key.technology,
            hash: self.key.hash,
        })
    }

    /// Resolves the nominal placement, ignoring any alignment.
    ///
    /// Computes and memoizes on first call; later calls return the stored
    /// value without re-evaluating the function.
    pub fn resolve_nominal(&self) -> Transform {
        *self.nominal.get_or_init(|| {
            trace!(technology = %self.key.technology, hash = %self.key.hash, "materializing nominal transform");
            self.function.call(None, self.key.hash)
        })
    }

    /// True once the nominal cell has been filled.
    #[must_use]
    pub fn is_nominal_cached(&self) -> bool {
        self.nominal.get().is_some()
    }

    /// Computes the aligned placement from `builder` and writes it there.
    ///
    /// # Errors
    /// - `DuplicateAlignmentWrite`: this cache was already written in this pass
    /// - `TechnologyMismatch`: the builder belongs to another technology
    pub fn store_alignment(&self, builder: &mut AlignmentBuilder) -> Result<(), AlignError> {
        let aligned = self.function.call(Some(&*builder), self.key.hash);
        builder.set(self.key, aligned)
    }
}

impl AlignableElement for TransformCache {
    fn technology(&self) -> DetectorTechnology {
        self.key.technology
    }

    fn identity_hash(&self) -> ElementHash {
        self.key.hash
    }

    fn store_alignment(&self, builder: &mut AlignmentBuilder) -> Result<usize, AlignError> {
        TransformCache::store_alignment(self, builder)?;
        Ok(1)
    }
}
