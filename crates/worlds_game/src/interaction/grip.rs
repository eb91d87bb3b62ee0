//! Grip points on holdable objects: which hands may use them, where a hand
//! ends up when it attaches, and how attractive a grip is to a nearby hand.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use worlds_math::{Quat, Transform, Vec3, decompose_twist, dir, from_to};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GripHand {
    Left,
    Right,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GripType {
    /// Fixed attach pose.
    #[default]
    Manual,
    /// Hand slides over the surface of an oriented box.
    Box,
    Cylinder,
}

/// Set of hands currently holding a grip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttachedHands(u8);

impl AttachedHands {
    pub const NONE: Self = Self(0);
    pub const LEFT: Self = Self(1);
    pub const RIGHT: Self = Self(2);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for AttachedHands {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GripError {
    #[error("grip is exclusive and already in use")]
    InUse,

    #[error("grip has no attached hands")]
    NotAttached,
}

/// A grip on an object, expressed in the object's local space.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Grip {
    pub hand: GripHand,
    pub grip_type: GripType,
    pub position: Vec3,
    pub rotation: Quat,
    /// Half extents of a [`GripType::Box`] grip along its local axes.
    pub box_extents: Vec3,
    /// Only one hand at a time.
    pub exclusive: bool,

    #[serde(skip)]
    currently_attached: u32,
    #[serde(skip)]
    attached_hands: AttachedHands,
}

impl Grip {
    #[must_use]
    pub fn in_use(&self) -> bool {
        self.currently_attached > 0
    }

    #[must_use]
    pub fn can_attach(&self) -> bool {
        !self.exclusive || !self.in_use()
    }

    #[must_use]
    pub fn currently_attached(&self) -> u32 {
        self.currently_attached
    }

    #[must_use]
    pub fn attached_hands(&self) -> AttachedHands {
        self.attached_hands
    }

    /// # Errors
    ///
    /// Returns [`GripError::InUse`] if the grip is exclusive and already held.
    pub fn attach(&mut self, hand: AttachedHands) -> Result<(), GripError> {
        if !self.can_attach() {
            return Err(GripError::InUse);
        }
        self.currently_attached += 1;
        self.attached_hands.insert(hand);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`GripError::NotAttached`] if no hand holds the grip.
    pub fn detach(&mut self, hand: AttachedHands) -> Result<(), GripError> {
        if self.currently_attached == 0 {
            return Err(GripError::NotAttached);
        }
        self.currently_attached -= 1;
        self.attached_hands.remove(hand);
        Ok(())
    }

    /// Higher is better. The inverse of the distance from the hand to the
    /// grip's attach point, both in world space.
    #[must_use]
    pub fn calculate_grip_score(&self, object: &Transform, hand: &Transform) -> f32 {
        let attach_point = match self.grip_type {
            GripType::Box => {
                let local_hand = hand.transform_by_inverse(object);
                object.transform_point(self.box_attach_point(local_hand.position))
            }
            GripType::Manual | GripType::Cylinder => object.transform_point(self.position),
        };
        1.0 / hand.position.distance(attach_point)
    }

    /// Pose the hand should take relative to the object when attaching.
    #[must_use]
    pub fn attach_transform(&self, hand: &Transform, object: &Transform, is_right_hand: bool) -> Transform {
        if self.grip_type != GripType::Box {
            return Transform::new(self.position, self.rotation);
        }

        let local_hand = hand.transform_by_inverse(object);
        let position = self.box_attach_point(local_hand.position);
        let normal = self.box_normal(local_hand.position);

        // Keep the hand's roll around the surface normal.
        let twist = decompose_twist(local_hand.rotation, normal);
        let palm = if is_right_hand { dir::RIGHT } else { dir::LEFT };
        Transform::new(position, twist * from_to(palm, normal))
    }

    fn box_axes(&self) -> [Vec3; 3] {
        [
            self.rotation * dir::LEFT,
            self.rotation * dir::UP,
            self.rotation * dir::FORWARD,
        ]
    }

    /// Offsets of `point` from the box center along each box axis, clamped to
    /// the extents.
    fn box_offsets(&self, point: Vec3) -> [f32; 3] {
        let delta = point - self.position;
        let [x, y, z] = self.box_axes();
        [
            x.dot(delta).clamp(-self.box_extents.x, self.box_extents.x),
            y.dot(delta).clamp(-self.box_extents.y, self.box_extents.y),
            z.dot(delta).clamp(-self.box_extents.z, self.box_extents.z),
        ]
    }

    /// Closest point on or in the box to `point`, in object space.
    fn box_attach_point(&self, point: Vec3) -> Vec3 {
        let axes = self.box_axes();
        let offsets = self.box_offsets(point);
        axes.iter()
            .zip(offsets)
            .fold(self.position, |acc, (axis, offset)| acc + *axis * offset)
    }

    /// Face normal of the box nearest `point`. Ties go to x, then y, then z.
    fn box_normal(&self, point: Vec3) -> Vec3 {
        let [x_axis, y_axis, z_axis] = self.box_axes();
        let [x, y, z] = self.box_offsets(point);
        let (ax, ay, az) = (x.abs(), y.abs(), z.abs());

        if ax >= ay && ax >= az {
            return x_axis * sign(x);
        }
        if ay >= ax && ay >= az {
            return y_axis * sign(y);
        }
        if az >= ax && az >= ay {
            return z_axis * sign(z);
        }
        y_axis
    }
}

/// Like `f32::signum` but zero for zero.
fn sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_grip() -> Grip {
        Grip {
            grip_type: GripType::Box,
            rotation: Quat::IDENTITY,
            box_extents: Vec3::new(0.5, 0.1, 0.2),
            ..Grip::default()
        }
    }

    #[test]
    fn test_attach_detach() {
        let mut grip = Grip::default();
        assert!(!grip.in_use());

        grip.attach(AttachedHands::LEFT).unwrap();
        grip.attach(AttachedHands::RIGHT).unwrap();
        assert_eq!(grip.currently_attached(), 2);
        assert_eq!(grip.attached_hands(), AttachedHands::LEFT | AttachedHands::RIGHT);

        grip.detach(AttachedHands::LEFT).unwrap();
        assert!(grip.in_use());
        assert!(grip.attached_hands().contains(AttachedHands::RIGHT));
        assert!(!grip.attached_hands().contains(AttachedHands::LEFT));

        grip.detach(AttachedHands::RIGHT).unwrap();
        assert!(grip.attached_hands().is_empty());
        assert_eq!(grip.detach(AttachedHands::RIGHT), Err(GripError::NotAttached));
    }

    #[test]
    fn test_exclusive_grip_rejects_second_hand() {
        let mut grip = Grip {
            exclusive: true,
            ..Grip::default()
        };
        grip.attach(AttachedHands::LEFT).unwrap();
        assert!(!grip.can_attach());
        assert_eq!(grip.attach(AttachedHands::RIGHT), Err(GripError::InUse));
        assert_eq!(grip.currently_attached(), 1);
    }

    #[test]
    fn test_manual_score_prefers_closer_hand() {
        let grip = Grip {
            position: Vec3::new(0.0, 1.0, 0.0),
            ..Grip::default()
        };
        let object = Transform::from_position(Vec3::new(2.0, 0.0, 0.0));
        let near = Transform::from_position(Vec3::new(2.0, 1.5, 0.0));
        let far = Transform::from_position(Vec3::new(2.0, 3.0, 0.0));

        let near_score = grip.calculate_grip_score(&object, &near);
        assert!((near_score - 2.0).abs() < 1e-5);
        assert!(near_score > grip.calculate_grip_score(&object, &far));
    }

    #[test]
    fn test_box_score_uses_world_space_attach_point() {
        let grip = box_grip();
        let object = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));
        let hand = Transform::from_position(Vec3::new(10.0, 1.1, 0.0));

        // Closest point on the box is its top face, one meter below the hand.
        let score = grip.calculate_grip_score(&object, &hand);
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_box_attach_point_clamps_to_extents() {
        let grip = box_grip();
        let point = grip.box_attach_point(Vec3::new(3.0, -2.0, 0.1));
        assert!((point - Vec3::new(0.5, -0.1, 0.1)).length() < 1e-6);
    }

    #[test]
    fn test_box_normal_picks_dominant_axis() {
        let grip = Grip {
            box_extents: Vec3::ONE,
            ..box_grip()
        };
        assert_eq!(grip.box_normal(Vec3::new(0.0, 0.0, -0.8)), -dir::FORWARD);
        assert_eq!(grip.box_normal(Vec3::new(0.2, 0.9, 0.1)), dir::UP);
        assert_eq!(grip.box_normal(Vec3::new(-0.7, 0.1, 0.1)), -dir::LEFT);
    }

    #[test]
    fn test_box_normal_tie_prefers_x_then_y() {
        let grip = Grip {
            box_extents: Vec3::ONE,
            ..box_grip()
        };
        assert_eq!(grip.box_normal(Vec3::new(0.5, 0.5, 0.5)), dir::LEFT);
        assert_eq!(grip.box_normal(Vec3::new(0.1, 0.5, 0.5)), dir::UP);
        // At the center every offset is zero; the x branch wins with no sign.
        assert_eq!(grip.box_normal(Vec3::ZERO), Vec3::ZERO);
    }

    #[test]
    fn test_manual_attach_transform_is_fixed() {
        let grip = Grip {
            position: Vec3::new(0.0, 0.2, 0.0),
            rotation: Quat::from_rotation_y(1.0),
            ..Grip::default()
        };
        let hand = Transform::from_position(Vec3::new(5.0, 5.0, 5.0));
        let attach = grip.attach_transform(&hand, &Transform::IDENTITY, true);
        assert_eq!(attach.position, grip.position);
        assert_eq!(attach.rotation, grip.rotation);
    }

    #[test]
    fn test_box_attach_transform_faces_palm_into_surface() {
        let grip = box_grip();
        let hand = Transform::from_position(Vec3::new(0.0, 1.0, 0.0));

        let right = grip.attach_transform(&hand, &Transform::IDENTITY, true);
        assert!((right.position - Vec3::new(0.0, 0.1, 0.0)).length() < 1e-6);
        let palm = right.rotation * dir::RIGHT;
        assert!((palm - dir::UP).length() < 1e-5);

        let left = grip.attach_transform(&hand, &Transform::IDENTITY, false);
        let palm = left.rotation * dir::LEFT;
        assert!((palm - dir::UP).length() < 1e-5);
    }
}
