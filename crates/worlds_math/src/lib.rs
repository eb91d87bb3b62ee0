//! # worlds_math
//!
//! Math types for the Worlds scripting layer. Re-exports [`glam`] for linear
//! algebra and defines [`Transform`], the spatial value the native engine owns
//! and the managed side marshals on demand.

pub mod quat;
pub mod transform;

// Re-export glam types for convenience.
pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

pub use quat::{angle_to_err, decompose_twist, from_to, safe_look_at, single_cover};
pub use transform::Transform;

/// Engine axis conventions: +Y up, +Z forward, +X left.
pub mod dir {
    use glam::Vec3;

    /// World up.
    pub const UP: Vec3 = Vec3::Y;
    /// World down.
    pub const DOWN: Vec3 = Vec3::NEG_Y;
    /// World forward.
    pub const FORWARD: Vec3 = Vec3::Z;
    /// World backward.
    pub const BACKWARD: Vec3 = Vec3::NEG_Z;
    /// World left.
    pub const LEFT: Vec3 = Vec3::X;
    /// World right.
    pub const RIGHT: Vec3 = Vec3::NEG_X;
}
