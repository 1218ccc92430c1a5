//! Surface caches: a transform cache plus the surface it places.
//!
//! Construction is two-phase: the cache exists before the surface geometry
//! is final, and the surface is attached once afterwards. The slot is an
//! explicit `Unattached | Attached` state rather than a nullable pointer.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::alignment::AlignmentBuilder;
use crate::cache::{AlignableElement, TransformCache};
use crate::context::GeometryContext;
use crate::error::AlignError;
use crate::identity::ElementHash;
use crate::technology::DetectorTechnology;
use crate::transform::Transform;

/// Extent of a sensitive surface in its local frame. Lengths in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceBounds {
    /// Planar rectangle.
    Rectangle { half_x: f64, half_y: f64 },
    /// Planar trapezoid, symmetric about the local y axis.
    Trapezoid {
        min_half_x: f64,
        max_half_x: f64,
        half_y: f64,
    },
    /// Planar annulus.
    Disc { r_min: f64, r_max: f64 },
    /// Cylinder around the local z axis.
    Cylinder { radius: f64, half_z: f64 },
    /// Drift tube or straw around the local z axis.
    Straw { radius: f64, half_z: f64 },
}

impl SurfaceBounds {
    /// True if every extent is finite and positive and ranges are ordered.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let pos = |v: f64| v.is_finite() && v > 0.0;
        match *self {
            Self::Rectangle { half_x, half_y } => pos(half_x) && pos(half_y),
            Self::Trapezoid {
                min_half_x,
                max_half_x,
                half_y,
            } => pos(min_half_x) && pos(max_half_x) && min_half_x <= max_half_x && pos(half_y),
            Self::Disc { r_min, r_max } => r_min.is_finite() && r_min >= 0.0 && pos(r_max) && r_min < r_max,
            Self::Cylinder { radius, half_z } | Self::Straw { radius, half_z } => pos(radius) && pos(half_z),
        }
    }

    /// True if the local point lies within the bounds.
    ///
    /// Planar bounds ignore the local z; cylindrical bounds test the
    /// local z against the half length and the radius with `tolerance`.
    #[must_use]
    pub fn contains(&self, local: &Point3<f64>, tolerance: f64) -> bool {
        match *self {
            Self::Rectangle { half_x, half_y } => {
                local.x.abs() <= half_x + tolerance && local.y.abs() <= half_y + tolerance
            }
            Self::Trapezoid {
                min_half_x,
                max_half_x,
                half_y,
            } => {
                if local.y.abs() > half_y + tolerance {
                    return false;
                }
                let frac = (local.y + half_y) / (2.0 * half_y);
                let half_x = min_half_x + frac.clamp(0.0, 1.0) * (max_half_x - min_half_x);
                local.x.abs() <= half_x + tolerance
            }
            Self::Disc { r_min, r_max } => {
                let r = local.x.hypot(local.y);
                r >= r_min - tolerance && r <= r_max + tolerance
            }
            Self::Cylinder { radius, half_z } | Self::Straw { radius, half_z } => {
                let r = local.x.hypot(local.y);
                (r - radius).abs() <= tolerance && local.z.abs() <= half_z + tolerance
            }
        }
    }
}

/// Immutable description of a detector element's sensitive surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    /// Local extent.
    pub bounds: SurfaceBounds,
    /// Thickness of the sensitive material, in millimetres.
    pub thickness: f64,
}

impl Surface {
    /// Creates a surface description.
    #[must_use]
    pub const fn new(bounds: SurfaceBounds, thickness: f64) -> Self {
        Self { bounds, thickness }
    }
}

#[derive(Debug)]
enum SurfaceSlot<S> {
    Unattached,
    Attached(S),
}

/// A [`TransformCache`] composed with the surface it places.
#[derive(Debug)]
pub struct SurfaceCache<S = Surface> {
    cache: TransformCache,
    slot: SurfaceSlot<S>,
}

impl<S> SurfaceCache<S> {
    /// Creates a cache whose surface is not attached yet.
    #[must_use]
    pub fn new(cache: TransformCache) -> Self {
        Self {
            cache,
            slot: SurfaceSlot::Unattached,
        }
    }

    /// Creates a cache with its surface already attached.
    #[must_use]
    pub fn with_surface(cache: TransformCache, surface: S) -> Self {
        Self {
            cache,
            slot: SurfaceSlot::Attached(surface),
        }
    }

    /// The inner transform cache.
    #[must_use]
    pub const fn cache(&self) -> &TransformCache {
        &self.cache
    }

    /// Element hash of the inner cache.
    #[must_use]
    pub const fn identity_hash(&self) -> ElementHash {
        self.cache.hash()
    }

    /// Technology of the inner cache.
    #[must_use]
    pub const fn technology(&self) -> DetectorTechnology {
        self.cache.technology()
    }

    /// Resolves the placement; see [`TransformCache::resolve`].
    ///
    /// # Errors
    /// `MissingAlignmentEntry` as for the inner cache.
    pub fn transform(&self, context: &GeometryContext) -> Result<Transform, AlignError> {
        self.cache.resolve(context)
    }

    /// True once a surface has been attached.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        matches!(self.slot, SurfaceSlot::Attached(_))
    }

    /// The attached surface.
    ///
    /// # Errors
    /// `MissingSurface` before [`set_surface`](Self::set_surface).
    pub fn surface(&self) -> Result<&S, AlignError> {
        match &self.slot {
            SurfaceSlot::Attached(surface) => Ok(surface),
            SurfaceSlot::Unattached => Err(self.missing()),
        }
    }

    /// Mutable access to the attached surface.
    ///
    /// # Errors
    /// `MissingSurface` before [`set_surface`](Self::set_surface).
    pub fn surface_mut(&mut self) -> Result<&mut S, AlignError> {
        let missing = self.missing();
        match &mut self.slot {
            SurfaceSlot::Attached(surface) => Ok(surface),
            SurfaceSlot::Unattached => Err(missing),
        }
    }

    /// Attaches the surface. Allowed once.
    ///
    /// # Errors
    /// `SurfaceAlreadyAttached` on a second call; the first surface is kept.
    pub fn set_surface(&mut self, surface: S) -> Result<(), AlignError> {
        if self.is_attached() {
            return Err(AlignError::SurfaceAlreadyAttached {
                technology: self.technology(),
                hash: self.identity_hash(),
            });
        }
        self.slot = SurfaceSlot::Attached(surface);
        Ok(())
    }

    /// Maps a surface-local point into global coordinates.
    ///
    /// # Errors
    /// `MissingAlignmentEntry` as for the inner cache.
    pub fn global_position(
        &self,
        context: &GeometryContext,
        local: &Point3<f64>,
    ) -> Result<Point3<f64>, AlignError> {
        Ok(self.transform(context)?.apply_point(local))
    }

    /// Global position of the surface's local origin.
    ///
    /// # Errors
    /// `MissingAlignmentEntry` as for the inner cache.
    pub fn center(&self, context: &GeometryContext) -> Result<Point3<f64>, AlignError> {
        self.global_position(context, &Point3::origin())
    }

    fn missing(&self) -> AlignError {
        AlignError::MissingSurface {
            technology: self.technology(),
            hash: self.identity_hash(),
        }
    }
}

impl<S: Send + Sync> AlignableElement for SurfaceCache<S> {
    fn technology(&self) -> DetectorTechnology {
        self.cache.technology()
    }

    fn identity_hash(&self) -> ElementHash {
        self.cache.hash()
    }

    fn store_alignment(&self, builder: &mut AlignmentBuilder) -> Result<usize, AlignError> {
        self.cache.store_alignment(builder)?;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cache::TransformFunction;

    fn strip_cache(hash: u32) -> TransformCache {
        TransformCache::new(
            ElementHash::new(hash),
            DetectorTechnology::Strip,
            TransformFunction::with_delta(Transform::from_translation(0.0, 0.0, 100.0)),
        )
    }

    fn module() -> Surface {
        Surface::new(SurfaceBounds::Rectangle { half_x: 30.0, half_y: 60.0 }, 0.285)
    }

    #[test]
    fn surface_before_attach_is_missing() {
        let mut sc: SurfaceCache = SurfaceCache::new(strip_cache(1));
        assert!(!sc.is_attached());
        assert_eq!(
            sc.surface().unwrap_err(),
            AlignError::MissingSurface {
                technology: DetectorTechnology::Strip,
                hash: ElementHash::new(1),
            }
        );
        assert!(sc.surface_mut().is_err());
    }

    #[test]
    fn attach_then_read_back() {
        let mut sc = SurfaceCache::new(strip_cache(2));
        sc.set_surface(module()).unwrap();
        assert!(sc.is_attached());
        assert_eq!(sc.surface().unwrap(), &module());

        sc.surface_mut().unwrap().thickness = 0.3;
        assert!((sc.surface().unwrap().thickness - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn second_attach_is_rejected() {
        let mut sc = SurfaceCache::with_surface(strip_cache(3), module());
        let other = Surface::new(SurfaceBounds::Disc { r_min: 10.0, r_max: 20.0 }, 0.2);
        assert!(matches!(
            sc.set_surface(other),
            Err(AlignError::SurfaceAlreadyAttached { .. })
        ));
        assert_eq!(sc.surface().unwrap(), &module());
    }

    #[test]
    fn transform_and_center_follow_alignment() {
        let sc = SurfaceCache::with_surface(strip_cache(4), module());
        assert_eq!(sc.identity_hash(), ElementHash::new(4));

        let nominal = GeometryContext::nominal();
        assert_eq!(sc.center(&nominal).unwrap(), Point3::new(0.0, 0.0, 100.0));

        let mut builder = AlignmentBuilder::new(DetectorTechnology::Strip);
        builder.set_delta(ElementHash::new(4), Transform::from_translation(0.0, 0.0, 0.5));
        assert_eq!(AlignableElement::store_alignment(&sc, &mut builder).unwrap(), 1);
        let aligned = GeometryContext::nominal().with_store(builder.freeze());

        assert_eq!(sc.center(&aligned).unwrap(), Point3::new(0.0, 0.0, 100.5));
        let corner = sc.global_position(&aligned, &Point3::new(30.0, 60.0, 0.0)).unwrap();
        assert_eq!(corner, Point3::new(30.0, 60.0, 100.5));
    }

    #[test]
    fn bounds_validation_and_containment() {
        assert!(module().bounds.is_valid());
        assert!(!SurfaceBounds::Disc { r_min: 20.0, r_max: 10.0 }.is_valid());
        assert!(!SurfaceBounds::Rectangle { half_x: -1.0, half_y: 1.0 }.is_valid());

        let trap = SurfaceBounds::Trapezoid {
            min_half_x: 10.0,
            max_half_x: 20.0,
            half_y: 50.0,
        };
        assert!(trap.is_valid());
        assert!(trap.contains(&Point3::new(19.0, 49.0, 0.0), 0.0));
        assert!(!trap.contains(&Point3::new(19.0, -49.0, 0.0), 0.0));

        let straw = SurfaceBounds::Straw { radius: 2.0, half_z: 700.0 };
        assert!(straw.contains(&Point3::new(0.0, 2.0, 600.0), 1e-9));
        assert!(!straw.contains(&Point3::new(0.0, 2.0, 701.0), 1e-9));
    }

    #[test]
    fn bounds_serialize_with_kind_tag() {
        let json = serde_json::to_value(SurfaceBounds::Cylinder { radius: 33.0, half_z: 400.0 }).unwrap();
        assert_eq!(json["kind"], "cylinder");
        assert_eq!(json["radius"], 33.0);
    }
}
