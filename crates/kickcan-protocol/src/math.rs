use std::f32::consts::{PI, TAU};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// World-space vector. `y` is up; gameplay distances use the horizontal plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Vector with `y` dropped.
    #[inline]
    pub fn flat(self) -> Self {
        Self::new(self.x, 0.0, self.z)
    }

    #[inline]
    pub fn horizontal_distance(self, other: Self) -> f32 {
        (other - self).flat().length()
    }

    pub fn normalized_or_zero(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            self * (1.0 / len)
        }
    }

    /// Yaw (radians, clockwise from +z) that faces along this vector.
    pub fn yaw(self) -> Option<f32> {
        let flat = self.flat();
        if flat.length() <= f32::EPSILON {
            return None;
        }
        Some(flat.x.atan2(flat.z))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Position plus heading. Avatars only ever rotate around the up axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    /// Radians, clockwise from +z.
    pub yaw: f32,
}

impl Transform {
    pub const fn new(position: Vec3, yaw: f32) -> Self {
        Self { position, yaw }
    }

    pub const fn at(position: Vec3) -> Self {
        Self { position, yaw: 0.0 }
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    /// Maps an offset expressed in this transform's local frame to world space.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        let (sin, cos) = self.yaw.sin_cos();
        let x = local.x * cos + local.z * sin;
        let z = -local.x * sin + local.z * cos;
        self.position + Vec3::new(x, local.y, z)
    }
}

/// Wraps an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = (angle + PI).rem_euclid(TAU) - PI;
    if a <= -PI {
        a += TAU;
    }
    a
}

/// Shortest signed difference `to - from`.
pub fn angle_delta(from: f32, to: f32) -> f32 {
    wrap_angle(to - from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn horizontal_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 10.0, 4.0);
        assert!(close(a.horizontal_distance(b), 5.0));
    }

    #[test]
    fn forward_matches_yaw() {
        let t = Transform::new(Vec3::ZERO, std::f32::consts::FRAC_PI_2);
        let f = t.forward();
        assert!(close(f.x, 1.0));
        assert!(close(f.z, 0.0));
        assert!(close(Vec3::new(1.0, 0.0, 0.0).yaw().unwrap_or(0.0), t.yaw));
    }

    #[test]
    fn local_offset_follows_heading() {
        let t = Transform::new(Vec3::new(1.0, 0.0, 1.0), std::f32::consts::FRAC_PI_2);
        let p = t.transform_point(Vec3::new(0.0, 1.0, 2.0));
        assert!(close(p.x, 3.0));
        assert!(close(p.y, 1.0));
        assert!(close(p.z, 1.0));
    }

    #[test]
    fn angle_delta_takes_short_way_round() {
        assert!(close(angle_delta(3.0, -3.0), TAU - 6.0));
        assert!(close(angle_delta(-3.0, 3.0), 6.0 - TAU));
        assert!(close(angle_delta(0.5, 0.25), -0.25));
    }
}
