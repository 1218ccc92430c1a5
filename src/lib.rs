//! # geoalign - Alignment-aware detector geometry transforms
//!
//! geoalign resolves the 3D placement of detector elements either from a
//! lazily computed nominal value or from a per-event alignment context,
//! computing each nominal placement at most once and sharing everything
//! safely across concurrent readers.
//!
//! ## Core Concepts
//!
//! - **TransformCache**: Per-element cache owning an identity, a transform
//!   function and a memoized nominal placement
//! - **AlignmentBuilder**: Write-once staging area for one alignment pass
//! - **AlignmentStore**: The frozen, shareable result of a pass
//! - **GeometryContext**: Per-call bundle of stores, one per technology
//! - **SurfaceCache**: A transform cache composed with the surface it places
//!
//! ## Usage
//!
//! ```
//! use geoalign::{
//!     AlignmentBuilder, DetectorTechnology, ElementHash, GeometryContext, Transform,
//!     TransformCache, TransformFunction,
//! };
//!
//! let cache = TransformCache::new(
//!     ElementHash::new(42),
//!     DetectorTechnology::Pixel,
//!     TransformFunction::new(|builder, _| match builder {
//!         None => Transform::identity(),
//!         Some(_) => Transform::from_translation(1.0, 0.0, 0.0),
//!     }),
//! );
//! assert_eq!(cache.resolve_nominal(), Transform::identity());
//!
//! let mut builder = AlignmentBuilder::new(DetectorTechnology::Pixel);
//! cache.store_alignment(&mut builder)?;
//! let context = GeometryContext::nominal().with_store(builder.freeze());
//!
//! assert_eq!(cache.resolve(&context)?, Transform::from_translation(1.0, 0.0, 0.0));
//! assert_eq!(cache.resolve_nominal(), Transform::identity());
//! # Ok::<(), geoalign::AlignError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Identities and values
pub mod error;
pub mod identity;
pub mod technology;
pub mod transform;

// Caches, stores and contexts
pub mod alignment;
pub mod cache;
pub mod context;
pub mod surface;

// Construction and conditions plumbing
pub mod conditions;
pub mod config;
pub mod registry;

// Re-export primary types at crate root for convenience
pub use alignment::{AlignmentBuilder, AlignmentStore, SharedAlignmentStore};
pub use cache::{AlignableElement, TransformCache, TransformFunction};
pub use conditions::{run_lumi, AlignmentConditions, ContextProvider, InMemoryAlignmentConditions, Iov};
pub use config::AlignmentConfig;
pub use context::GeometryContext;
pub use error::{AlignError, ConfigError, GeoError, GeoResult};
pub use identity::{CacheId, CacheKey, ElementHash};
pub use registry::ElementRegistry;
pub use surface::{Surface, SurfaceBounds, SurfaceCache};
pub use technology::DetectorTechnology;
pub use transform::Transform;
