//! Spatial transform.
//!
//! [`Transform`] is owned by the native engine. The scripting layer only copies
//! it across the boundary when asked and never caches it.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A position, rotation and per-axis scale.
///
/// The memory layout is `#[repr(C)]` so the value can be copied verbatim
/// through the native boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[repr(C)]
#[serde(default)]
pub struct Transform {
    /// World-space position.
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform {
    /// The identity transform: origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Create a transform from a position and rotation with unit scale.
    #[must_use]
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    /// Create a new transform with the given position and default rotation/scale.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Compute the 4×4 model matrix for this transform.
    #[must_use]
    pub fn to_matrix(&self) -> glam::Mat4 {
        glam::Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Map a point from this transform's local space into world space.
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (point * self.scale)
    }

    /// Map a world-space point into this transform's local space.
    #[must_use]
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        (self.rotation.inverse() * (point - self.position)) / self.scale
    }

    /// Treat `self` as local to `parent` and return the combined world transform.
    #[must_use]
    pub fn transform_by(&self, parent: &Transform) -> Self {
        Self {
            position: parent.transform_point(self.position),
            rotation: parent.rotation * self.rotation,
            scale: self.scale * parent.scale,
        }
    }

    /// Express this world transform relative to `parent`.
    ///
    /// Inverse of [`Transform::transform_by`].
    #[must_use]
    pub fn transform_by_inverse(&self, parent: &Transform) -> Self {
        Self {
            position: parent.inverse_transform_point(self.position),
            rotation: parent.rotation.inverse() * self.rotation,
            scale: self.scale / parent.scale,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
