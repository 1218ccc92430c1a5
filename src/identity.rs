//! Element and cache identities.
//!
//! Two identities are in play. An [`ElementHash`] names a detector element
//! within its technology and is handed to transform functions. A [`CacheId`]
//! names one [`TransformCache`](crate::TransformCache) instance and is what
//! alignment stores are keyed by, so two caches that happen to share an
//! element hash never collide in a store.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::technology::DetectorTechnology;

/// Dense, stable identifier of a detector element within one technology.
///
/// Assigned once during geometry construction and immutable thereafter.
///
/// # Examples
///
/// ```
/// use geoalign::ElementHash;
///
/// let hash = ElementHash::new(42);
/// assert_eq!(hash.value(), 42);
/// assert!(ElementHash::new(1) < hash);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHash(u32);

impl ElementHash {
    /// Creates an element hash from its raw value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns the raw value as a dense index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ElementHash {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ElementHash> for u32 {
    fn from(hash: ElementHash) -> Self {
        hash.0
    }
}

/// Process-unique identifier of one transform cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheId(Uuid);

impl CacheId {
    /// Creates a new random cache ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CacheId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key under which a cache's aligned transform is written into a builder.
///
/// Equality and hashing use only the [`CacheId`]. The element hash and
/// technology travel along for diagnostics and for the builder's
/// technology check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheKey {
    /// Identity of the owning cache.
    pub id: CacheId,
    /// Element the cache describes.
    pub hash: ElementHash,
    /// Technology the cache belongs to.
    pub technology: DetectorTechnology,
}

impl CacheKey {
    /// Creates a key for a freshly constructed cache.
    #[must_use]
    pub fn new(hash: ElementHash, technology: DetectorTechnology) -> Self {
        Self {
            id: CacheId::new(),
            hash,
            technology,
        }
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.technology, self.hash)
    }
}
