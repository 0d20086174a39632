use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f64 {
        (other - self).length()
    }

    pub fn lerp(self, other: Vec3, t: f64) -> Vec3 {
        self + (other - self) * t
    }

    pub fn midpoint(self, other: Vec3) -> Vec3 {
        self.lerp(other, 0.5)
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unit vector in the same direction, or `None` for a zero vector.
    pub fn normalized(self) -> Option<Vec3> {
        let len = self.length();
        (len > f64::EPSILON).then(|| self * (1.0 / len))
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Spherical orbit parameters around a look-at target.
///
/// `alpha` is the azimuth measured from +Z towards +X, `beta` the polar
/// angle from +Y. The eye sits at
/// `target + radius * (sin β sin α, cos β, sin β cos α)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub target: Vec3,
    pub radius: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl CameraState {
    /// Derive orbit parameters from an eye position looking at `target`.
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let d = eye - target;
        let distance = d.length();
        if distance <= f64::EPSILON {
            return Self {
                target,
                radius: 0.0,
                alpha: 0.0,
                beta: 0.0,
            };
        }
        Self {
            target,
            radius: distance,
            alpha: d.x.atan2(d.z),
            beta: (d.y / distance).clamp(-1.0, 1.0).acos(),
        }
    }

    /// World-space eye position.
    pub fn eye(&self) -> Vec3 {
        let (sb, cb) = self.beta.sin_cos();
        let (sa, ca) = self.alpha.sin_cos();
        self.target + Vec3::new(sb * sa, cb, sb * ca) * self.radius
    }

    /// Interpolate all four parameters. `alpha` turns the short way round
    /// and lands exactly on `other.alpha` at `t >= 1`.
    pub fn lerp(&self, other: &CameraState, t: f64) -> CameraState {
        let alpha = if t >= 1.0 {
            other.alpha
        } else {
            self.alpha + shortest_turn(self.alpha, other.alpha) * t
        };
        CameraState {
            target: self.target.lerp(other.target, t),
            radius: self.radius + (other.radius - self.radius) * t,
            alpha,
            beta: self.beta + (other.beta - self.beta) * t,
        }
    }
}

/// Signed angle in `[-π, π)` that turns `from` onto `to`.
fn shortest_turn(from: f64, to: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    (to - from + PI).rem_euclid(TAU) - PI
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            radius: 60.0,
            alpha: -std::f64::consts::FRAC_PI_4,
            beta: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looking_at_round_trips_eye() {
        let target = Vec3::new(1.0, 2.0, 3.0);
        let eye = Vec3::new(-4.0, 9.0, 11.0);
        let cam = CameraState::looking_at(eye, target);
        let back = cam.eye();
        assert!(back.distance(eye) < 1e-9);
    }

    #[test]
    fn lerp_endpoints_are_exact() {
        let a = CameraState::default();
        let b = CameraState {
            target: Vec3::new(5.0, 1.0, -2.0),
            radius: 17.5,
            alpha: 2.0,
            beta: 0.4,
        };
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0).radius, b.radius);
        assert_eq!(a.lerp(&b, 1.0).alpha, b.alpha);
    }

    #[test]
    fn lerp_crosses_the_seam_the_short_way() {
        use std::f64::consts::PI;
        let a = CameraState {
            alpha: PI - 0.1,
            ..CameraState::default()
        };
        let b = CameraState {
            alpha: -PI + 0.1,
            ..CameraState::default()
        };
        let mid = a.lerp(&b, 0.5);
        assert!((mid.alpha.sin() - PI.sin()).abs() < 1e-9);
        assert!(mid.alpha.cos() < -0.99);
        assert_eq!(a.lerp(&b, 1.0).alpha, b.alpha);
    }

    #[test]
    fn cross_follows_the_right_hand_rule() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(x.dot(y), 0.0);
        assert!(Vec3::ZERO.normalized().is_none());
    }

    #[test]
    fn degenerate_eye_on_target() {
        let p = Vec3::new(1.0, 1.0, 1.0);
        let cam = CameraState::looking_at(p, p);
        assert_eq!(cam.radius, 0.0);
    }
}
