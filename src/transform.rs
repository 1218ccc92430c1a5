//! Rigid 3D placement of a detector element.
//! Rotation followed by translation, backed by nalgebra's isometry.

use std::fmt;
use std::ops::Mul;

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Immutable rigid transformation (rotation + translation).
///
/// Value type: cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transform(Isometry3<f64>);

impl Transform {
    /// The identity placement.
    #[must_use]
    pub fn identity() -> Self {
        Self(Isometry3::identity())
    }

    /// A pure translation.
    #[must_use]
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self(Isometry3::translation(x, y, z))
    }

    /// A pure rotation of `angle` radians about `axis`.
    ///
    /// A zero axis yields the identity rotation.
    #[must_use]
    pub fn from_axis_angle(axis: Vector3<f64>, angle: f64) -> Self {
        let rotation = nalgebra::Unit::try_new(axis, f64::EPSILON)
            .map_or_else(UnitQuaternion::identity, |a| UnitQuaternion::from_axis_angle(&a, angle));
        Self(Isometry3::from_parts(Translation3::identity(), rotation))
    }

    /// Builds a transform from a translation and a rotation.
    #[must_use]
    pub fn from_parts(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self(Isometry3::from_parts(Translation3::from(translation), rotation))
    }

    /// Returns the translation component.
    #[must_use]
    pub fn translation(&self) -> Vector3<f64> {
        self.0.translation.vector
    }

    /// Returns the rotation component.
    #[must_use]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.0.rotation
    }

    /// Returns the underlying isometry.
    #[must_use]
    pub const fn as_isometry(&self) -> &Isometry3<f64> {
        &self.0
    }

    /// Composes two placements: `self` applied after `inner`.
    #[must_use]
    pub fn then(&self, inner: &Self) -> Self {
        Self(self.0 * inner.0)
    }

    /// Returns the inverse placement.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self(self.0.inverse())
    }

    /// Maps a point from local into global coordinates.
    #[must_use]
    pub fn apply_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.0.transform_point(point)
    }

    /// Rotates a direction vector; translation does not apply.
    #[must_use]
    pub fn apply_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.0.transform_vector(vector)
    }

    /// True if both translation and rotation agree within `tolerance`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.translation() - other.translation()).norm() <= tolerance
            && self.rotation().angle_to(&other.rotation()) <= tolerance
    }

    /// True if this is the identity within `tolerance`.
    #[must_use]
    pub fn is_identity(&self, tolerance: f64) -> bool {
        self.approx_eq(&Self::identity(), tolerance)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Isometry3<f64>> for Transform {
    fn from(iso: Isometry3<f64>) -> Self {
        Self(iso)
    }
}

impl From<Transform> for Isometry3<f64> {
    fn from(t: Transform) -> Self {
        t.0
    }
}

impl Mul for Transform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.then(&rhs)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation();
        let (axis, angle) = self
            .rotation()
            .axis_angle()
            .map_or((Vector3::z(), 0.0), |(axis, angle)| (axis.into_inner(), angle));
        write!(
            f,
            "T({:.4}, {:.4}, {:.4}) R({:.4} about [{:.3}, {:.3}, {:.3}])",
            t.x, t.y, t.z, angle, axis.x, axis.y, axis.z
        )
    }
}
