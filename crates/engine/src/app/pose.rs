use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Returns the zero vector for zero-length or non-finite input.
    pub fn normalized_or_zero(self) -> Self {
        let length = self.length();
        if !length.is_finite() || length <= f32::EPSILON {
            return Self::ZERO;
        }
        Self::new(self.x / length, self.y / length, self.z / length)
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (self - other).length()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
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

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Unit quaternion. Y is up; yaw rotates about +Y and a zero yaw faces +Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn from_yaw_radians(yaw: f32) -> Self {
        let half = yaw * 0.5;
        Self {
            x: 0.0,
            y: half.sin(),
            z: 0.0,
            w: half.cos(),
        }
    }

    pub fn from_yaw_degrees(yaw_degrees: f32) -> Self {
        Self::from_yaw_radians(yaw_degrees.to_radians())
    }

    pub fn rotate(self, v: Vec3) -> Vec3 {
        // v' = v + 2w(q x v) + 2(q x (q x v))
        let q = Vec3::new(self.x, self.y, self.z);
        let t = cross(q, v) * 2.0;
        v + t * self.w + cross(q, t)
    }

    pub fn forward(self) -> Vec3 {
        self.rotate(Vec3::new(0.0, 0.0, 1.0))
    }

    pub fn right(self) -> Vec3 {
        self.rotate(Vec3::new(1.0, 0.0, 0.0))
    }
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub const fn at(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }

    pub fn with_yaw_degrees(position: Vec3, yaw_degrees: f32) -> Self {
        Self {
            position,
            orientation: Quat::from_yaw_degrees(yaw_degrees),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 0.0001
    }

    #[test]
    fn identity_rotation_is_noop() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert!(approx(Quat::IDENTITY.rotate(v), v));
    }

    #[test]
    fn quarter_yaw_turns_forward_to_right() {
        let q = Quat::from_yaw_degrees(90.0);
        assert!(approx(q.forward(), Vec3::new(1.0, 0.0, 0.0)));
        assert!(approx(q.right(), Vec3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn normalized_or_zero_handles_degenerate_input() {
        assert_eq!(Vec3::ZERO.normalized_or_zero(), Vec3::ZERO);
        assert_eq!(
            Vec3::new(f32::NAN, 0.0, 0.0).normalized_or_zero(),
            Vec3::ZERO
        );
        let n = Vec3::new(3.0, 0.0, 4.0).normalized_or_zero();
        assert!((n.length() - 1.0).abs() < 0.0001);
    }
}
