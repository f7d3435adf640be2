//! # Frame Geometry
//!
//! Minimal 3D vector, unit quaternion and rigid transform used to move
//! telemetry between the vehicle's local NED frame, a user-chosen world
//! frame and the body frame.
//!
//! Quaternions are stored `[w, x, y, z]` and rotate vectors from the frame
//! they are expressed in to the parent frame, so an attitude quaternion maps
//! body vectors into NED.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Cartesian 3-vector
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

    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [x, y, z] => Some(Self::new(*x, *y, *z)),
            _ => None,
        }
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn scale(&self, k: f64) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn approx_eq(&self, other: &Vec3, tol: f64) -> bool {
        (self.x - other.x).abs() <= tol
            && (self.y - other.y).abs() <= tol
            && (self.z - other.z).abs() <= tol
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

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Rotation quaternion [w, x, y, z]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle` radians about `axis`
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let n = axis.norm();
        if n == 0.0 {
            return Self::identity();
        }
        let (s, c) = (angle / 2.0).sin_cos();
        let a = axis.scale(s / n);
        Self::new(c, a.x, a.y, a.z)
    }

    /// ZYX (yaw, pitch, roll) Euler angles, radians
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll / 2.0).sin_cos();
        let (sp, cp) = (pitch / 2.0).sin_cos();
        let (sy, cy) = (yaw / 2.0).sin_cos();
        Self::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }

    /// (roll, pitch, yaw) in radians
    pub fn to_euler(&self) -> (f64, f64, f64) {
        let Quaternion { w, x, y, z } = *self;
        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
        let sinp = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0);
        let pitch = sinp.asin();
        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
        (roll, pitch, yaw)
    }

    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit quaternion, identity for a degenerate input
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n == 0.0 || !n.is_finite() {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Inverse rotation (conjugate of the normalised quaternion)
    pub fn inverse(&self) -> Self {
        self.normalized().conjugate()
    }

    /// Rotate a vector by this quaternion
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        let q = self.normalized();
        let u = Vec3::new(q.x, q.y, q.z);
        let t = u.cross(&v).scale(2.0);
        v + t.scale(q.w) + u.cross(&t)
    }

    pub fn approx_eq(&self, other: &Quaternion, tol: f64) -> bool {
        // q and -q encode the same rotation
        let same = (self.w - other.w).abs() <= tol
            && (self.x - other.x).abs() <= tol
            && (self.y - other.y).abs() <= tol
            && (self.z - other.z).abs() <= tol;
        let flipped = (self.w + other.w).abs() <= tol
            && (self.x + other.x).abs() <= tol
            && (self.y + other.y).abs() <= tol
            && (self.z + other.z).abs() <= tol;
        same || flipped
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;
    /// Hamilton product: `self * rhs` applies `rhs` first
    fn mul(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }
}

/// Rigid transform: rotate, then translate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform {
    pub const fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub const fn identity() -> Self {
        Self::new(Vec3::ZERO, Quaternion::identity())
    }

    /// Map a point from the child frame into the parent frame
    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p) + self.translation
    }

    /// Map a free vector (velocity, acceleration); translation does not apply
    pub fn apply_vector(&self, v: Vec3) -> Vec3 {
        self.rotation.rotate(v)
    }

    /// Express a child-frame orientation in the parent frame
    pub fn apply_rotation(&self, q: Quaternion) -> Quaternion {
        (self.rotation * q).normalized()
    }

    pub fn inverse(&self) -> Transform {
        let inv = self.rotation.inverse();
        Transform::new(-inv.rotate(self.translation), inv)
    }
}
