//! Quaternion helpers used by gameplay steering and grip alignment.

use std::f32::consts::{PI, TAU};

use glam::{Mat3, Quat, Vec3};

use crate::dir;

/// Rotation whose forward axis points along `direction`, keeping +Y up where
/// possible.
///
/// Degenerate input (zero length or NaN) yields [`Quat::IDENTITY`]. When the
/// direction is (anti)parallel to up, forward is used as the reference up axis.
#[must_use]
pub fn safe_look_at(direction: Vec3) -> Quat {
    let forward = direction.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }

    let reference_up = if forward.dot(dir::UP).abs() > 0.999 {
        dir::FORWARD
    } else {
        dir::UP
    };

    let x = reference_up.cross(forward).normalize();
    let y = forward.cross(x);
    Quat::from_mat3(&Mat3::from_cols(x, y, forward)).normalize()
}

/// Twist component of `rotation` about `axis` (swing-twist decomposition).
#[must_use]
pub fn decompose_twist(rotation: Quat, axis: Vec3) -> Quat {
    let axis = axis.normalize_or_zero();
    let projected = axis * Vec3::new(rotation.x, rotation.y, rotation.z).dot(axis);
    let twist = Quat::from_xyzw(projected.x, projected.y, projected.z, rotation.w);
    if twist.length_squared() < f32::EPSILON {
        return Quat::IDENTITY;
    }
    twist.normalize()
}

/// Shortest-arc rotation taking direction `from` onto direction `to`.
#[must_use]
pub fn from_to(from: Vec3, to: Vec3) -> Quat {
    Quat::from_rotation_arc(from.normalize(), to.normalize())
}

/// Representative of `q` with a non-negative scalar part.
#[must_use]
pub fn single_cover(q: Quat) -> Quat {
    if q.w < 0.0 { -q } else { q }
}

/// Map an angle in `[0, 2π)` to a signed error in `(-π, π]`.
#[must_use]
pub fn angle_to_err(angle: f32) -> f32 {
    if angle > PI { angle - TAU } else { angle }
}
