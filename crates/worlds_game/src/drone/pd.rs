//! Controllers used to steer physics bodies.

use serde::{Deserialize, Serialize};
use worlds_math::Vec3;

/// Stable PD controller (Tan, Liu & Turk): evaluates the damping term
/// against the predicted next-step position so high gains don't oscillate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StablePd {
    pub p: f32,
    pub d: f32,
}

impl StablePd {
    #[must_use]
    pub fn new(p: f32, d: f32) -> Self {
        Self { p, d }
    }

    /// Force that drives `position` towards `target` from `velocity`.
    #[must_use]
    pub fn calculate_force(&self, position: Vec3, target: Vec3, velocity: Vec3, dt: f32) -> Vec3 {
        let g = 1.0 / (1.0 + self.d * dt + self.p * dt * dt);
        let ks_g = self.p * g;
        let kd_g = (self.d + self.p * dt) * g;
        (target - position) * ks_g - velocity * kd_g
    }
}

/// Per-axis PID controller on a vector error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct V3PidController {
    pub p: f32,
    pub i: f32,
    pub d: f32,
    #[serde(skip)]
    integral: Vec3,
    #[serde(skip)]
    last_error: Option<Vec3>,
}

impl V3PidController {
    #[must_use]
    pub fn new(p: f32, i: f32, d: f32) -> Self {
        Self {
            p,
            i,
            d,
            ..Self::default()
        }
    }

    pub fn calculate_force(&mut self, error: Vec3, dt: f32) -> Vec3 {
        self.integral += error * dt;
        let derivative = match self.last_error {
            Some(last) if dt > 0.0 => (error - last) / dt,
            _ => Vec3::ZERO,
        };
        self.last_error = Some(error);
        error * self.p + self.integral * self.i + derivative * self.d
    }

    pub fn reset(&mut self) {
        self.integral = Vec3::ZERO;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_pd_pulls_towards_target() {
        let pd = StablePd::new(10.0, 1.0);
        let force = pd.calculate_force(Vec3::ZERO, Vec3::X, Vec3::ZERO, 0.02);
        assert!(force.x > 0.0);
        assert_eq!(force.y, 0.0);
    }

    #[test]
    fn test_stable_pd_damps_velocity() {
        let pd = StablePd::new(0.0, 4.0);
        let force = pd.calculate_force(Vec3::ZERO, Vec3::ZERO, Vec3::X, 0.02);
        assert!(force.x < 0.0);
    }

    #[test]
    fn test_pid_proportional_and_derivative() {
        let mut pid = V3PidController::new(2.0, 0.0, 1.0);
        assert_eq!(pid.calculate_force(Vec3::X, 0.5), Vec3::new(2.0, 0.0, 0.0));
        // Error dropped by 1 over 0.5 s: derivative is -2.
        assert_eq!(pid.calculate_force(Vec3::ZERO, 0.5), Vec3::new(-2.0, 0.0, 0.0));

        pid.reset();
        assert_eq!(pid.calculate_force(Vec3::ZERO, 0.5), Vec3::ZERO);
    }
}
