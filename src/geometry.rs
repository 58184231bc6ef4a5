// Passive coordinate types shared by bodies and the compartment box

use serde::{Deserialize, Serialize};
use ultraviolet::{DVec2, DVec3};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointInSpace {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PointInSpace {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vec(self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    pub fn from_vec(v: DVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    pub fn distance_squared(&self, other: &PointInSpace) -> f64 {
        (self.to_vec() - other.to_vec()).mag_sq()
    }

    pub fn distance(&self, other: &PointInSpace) -> f64 {
        (self.to_vec() - other.to_vec()).mag()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointInPlane {
    pub x: f64,
    pub y: f64,
}

impl PointInPlane {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_vec(self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn distance(&self, other: &PointInPlane) -> f64 {
        (self.to_vec() - other.to_vec()).mag()
    }
}

/// Axis-aligned bounding box, min <= max per axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxSizeInfo {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl BoxSizeInfo {
    /// Sorts each axis pair so the min <= max invariant always holds.
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64, z_min: f64, z_max: f64) -> Self {
        Self {
            x_min: x_min.min(x_max),
            x_max: x_min.max(x_max),
            y_min: y_min.min(y_max),
            y_max: y_min.max(y_max),
            z_min: z_min.min(z_max),
            z_max: z_min.max(z_max),
        }
    }

    /// Box anchored at the origin.
    pub fn from_lengths(x: f64, y: f64, z: f64) -> Self {
        Self::new(0.0, x, 0.0, y, 0.0, z)
    }

    pub fn x_length(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn y_length(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn z_length(&self) -> f64 {
        self.z_max - self.z_min
    }

    pub fn volume(&self) -> f64 {
        self.x_length() * self.y_length() * self.z_length()
    }

    pub fn center(&self) -> PointInSpace {
        PointInSpace::new(
            0.5 * (self.x_min + self.x_max),
            0.5 * (self.y_min + self.y_max),
            0.5 * (self.z_min + self.z_max),
        )
    }

    pub fn contains(&self, point: &PointInSpace) -> bool {
        point.x >= self.x_min
            && point.x <= self.x_max
            && point.y >= self.y_min
            && point.y <= self.y_max
            && point.z >= self.z_min
            && point.z <= self.z_max
    }
}
