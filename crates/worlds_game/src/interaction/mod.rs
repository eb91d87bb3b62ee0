//! Hand interaction with held objects.

pub mod grip;

pub use grip::{AttachedHands, Grip, GripError, GripHand, GripType};
