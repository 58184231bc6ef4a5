// body/xy_layer.rs
// Axis-aligned slab ("xy-layer") geometry

use super::sphere::{place_non_overlapping_spheres, sample_excluding, BodySphere};
use crate::config;
use crate::error::{CompartmentError, Result};
use crate::geometry::PointInSpace;
use rand::Rng;
use serde::{Deserialize, Serialize};
use ultraviolet::DVec3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyXyLayer {
    pub center: PointInSpace,
    pub x_length: f64,
    pub y_length: f64,
    pub z_length: f64,
}

/// Faces of a layer, named after the box view they face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerFace {
    XyTop,
    XyBottom,
    YzLeft,
    YzRight,
    XzFront,
    XzBack,
}

impl LayerFace {
    pub const ALL: [LayerFace; 6] = [
        LayerFace::XyTop,
        LayerFace::XyBottom,
        LayerFace::YzLeft,
        LayerFace::YzRight,
        LayerFace::XzFront,
        LayerFace::XzBack,
    ];
}

impl BodyXyLayer {
    pub fn new(center: PointInSpace, x_length: f64, y_length: f64, z_length: f64) -> Result<Self> {
        for (axis, length) in [("x", x_length), ("y", y_length), ("z", z_length)] {
            if !(length > 0.0) || !length.is_finite() {
                return Err(CompartmentError::invalid(format!(
                    "layer {axis} length must be positive, got {length}"
                )));
            }
        }
        if !center.is_finite() {
            return Err(CompartmentError::invalid("layer center must be finite"));
        }
        Ok(Self { center, x_length, y_length, z_length })
    }

    /// Geometry records start with z length 0 until molecules are assigned.
    pub fn from_record(center: PointInSpace, x_length: f64, y_length: f64, z_length: f64) -> Result<Self> {
        for length in [x_length, y_length, z_length] {
            if !(length >= 0.0) || !length.is_finite() {
                return Err(CompartmentError::invalid(format!(
                    "layer record lengths must be non-negative, got {length}"
                )));
            }
        }
        if !center.is_finite() {
            return Err(CompartmentError::invalid("layer center must be finite"));
        }
        Ok(Self { center, x_length, y_length, z_length })
    }

    pub fn volume(&self) -> f64 {
        self.x_length * self.y_length * self.z_length
    }

    pub fn half_lengths(&self) -> DVec3 {
        DVec3::new(self.x_length, self.y_length, self.z_length) * 0.5
    }

    pub fn is_in_volume(&self, point: &PointInSpace) -> bool {
        let half = self.half_lengths() * config::FACTOR_FOR_GRAPHICS_NUMBER_CORRECTION;
        let d = point.to_vec() - self.center.to_vec();
        d.x.abs() <= half.x && d.y.abs() <= half.y && d.z.abs() <= half.z
    }

    /// Closest point of the layer to `point`.
    fn clamp_point(&self, point: &PointInSpace) -> PointInSpace {
        let half = self.half_lengths();
        let c = self.center.to_vec();
        let min = c - half;
        let max = c + half;
        PointInSpace::new(
            point.x.clamp(min.x, max.x),
            point.y.clamp(min.y, max.y),
            point.z.clamp(min.z, max.z),
        )
    }

    pub fn is_overlap_sphere(&self, sphere: &BodySphere) -> bool {
        let closest = self.clamp_point(&sphere.center);
        closest.distance(&sphere.center) <= sphere.radius + config::OVERLAP_EPSILON
    }

    pub fn is_overlap_layer(&self, other: &BodyXyLayer) -> bool {
        let d = self.center.to_vec() - other.center.to_vec();
        let reach = self.half_lengths() + other.half_lengths();
        d.x.abs() <= reach.x + config::OVERLAP_EPSILON
            && d.y.abs() <= reach.y + config::OVERLAP_EPSILON
            && d.z.abs() <= reach.z + config::OVERLAP_EPSILON
    }

    pub fn random_point_in_volume<R: Rng + ?Sized>(&self, rng: &mut R) -> PointInSpace {
        let half = self.half_lengths() * config::DECREASE_FACTOR;
        PointInSpace::new(
            self.center.x + symmetric(rng, half.x),
            self.center.y + symmetric(rng, half.y),
            self.center.z + symmetric(rng, half.z),
        )
    }

    /// Volume points that avoid `excluded`, see
    /// [`BodySphere::random_points_in_volume_excluding`].
    pub fn random_points_in_volume_excluding<R: Rng + ?Sized>(
        &self,
        count: usize,
        excluded: &[BodySphere],
        number_of_trials: usize,
        rng: &mut R,
    ) -> Vec<PointInSpace> {
        (0..count)
            .map(|_| sample_excluding(excluded, number_of_trials, rng, |rng| self.random_point_in_volume(rng)))
            .collect()
    }

    /// `count` simple cubic lattice sites filling the layer from the top
    /// plane down. Site counts per axis start at `length / bond_length` and
    /// are shrunk (x, y, z in turn) until they fit, then grown the same way
    /// until they hold `count` sites; the spacing per axis is
    /// `length / sites`. The first site sits half a spacing inside each face.
    /// Returns `None` for a zero count or a bond length that is not positive
    /// or exceeds a layer length.
    pub fn simple_cubic_lattice_points(&self, count: usize, bond_length: f64) -> Option<Vec<PointInSpace>> {
        let lengths = [self.x_length, self.y_length, self.z_length];
        if count == 0 || !(bond_length > 0.0) || lengths.iter().any(|l| bond_length > *l) {
            return None;
        }
        let mut sites = lengths.map(|l| ((l - bond_length) / bond_length).floor() as usize + 1);
        let product = |n: &[usize; 3]| n[0] * n[1] * n[2];
        let mut axis = 0;
        while product(&sites) > count {
            if sites[axis] > 1 {
                sites[axis] -= 1;
            }
            axis = (axis + 1) % 3;
        }
        while product(&sites) < count {
            sites[axis] += 1;
            axis = (axis + 1) % 3;
        }
        let spacing = [0, 1, 2].map(|i| lengths[i] / sites[i] as f64);
        let half = self.half_lengths();
        let (x0, y0) = (self.center.x - half.x, self.center.y - half.y);
        let top = self.center.z + half.z;
        let mut points = Vec::with_capacity(count);
        'fill: for k in 0..sites[2] {
            let z = top - (k as f64 + 0.5) * spacing[2];
            for j in 0..sites[1] {
                let y = y0 + (j as f64 + 0.5) * spacing[1];
                for i in 0..sites[0] {
                    if points.len() == count {
                        break 'fill;
                    }
                    points.push(PointInSpace::new(x0 + (i as f64 + 0.5) * spacing[0], y, z));
                }
            }
        }
        Some(points)
    }

    fn face_area(&self, face: LayerFace) -> f64 {
        match face {
            LayerFace::XyTop | LayerFace::XyBottom => self.x_length * self.y_length,
            LayerFace::YzLeft | LayerFace::YzRight => self.y_length * self.z_length,
            LayerFace::XzFront | LayerFace::XzBack => self.x_length * self.z_length,
        }
    }

    /// Uniform point on the union of `faces`, weighted by face area.
    /// Returns `None` when no face is given or all faces are degenerate.
    pub fn random_point_on_faces<R: Rng + ?Sized>(
        &self,
        faces: &[LayerFace],
        rng: &mut R,
    ) -> Option<PointInSpace> {
        let total: f64 = faces.iter().map(|f| self.face_area(*f)).sum();
        if !(total > 0.0) {
            return None;
        }
        let mut pick = rng.random_range(0.0..total);
        let mut face = *faces.last()?;
        for f in faces {
            let area = self.face_area(*f);
            if pick < area {
                face = *f;
                break;
            }
            pick -= area;
        }
        let half = self.half_lengths();
        let c = self.center;
        let point = match face {
            LayerFace::XyTop | LayerFace::XyBottom => {
                let z = if face == LayerFace::XyTop { c.z + half.z } else { c.z - half.z };
                PointInSpace::new(c.x + symmetric(rng, half.x), c.y + symmetric(rng, half.y), z)
            }
            LayerFace::YzLeft | LayerFace::YzRight => {
                let x = if face == LayerFace::YzRight { c.x + half.x } else { c.x - half.x };
                PointInSpace::new(x, c.y + symmetric(rng, half.y), c.z + symmetric(rng, half.z))
            }
            LayerFace::XzFront | LayerFace::XzBack => {
                let y = if face == LayerFace::XzBack { c.y + half.y } else { c.y - half.y };
                PointInSpace::new(c.x + symmetric(rng, half.x), y, c.z + symmetric(rng, half.z))
            }
        };
        Some(point)
    }

    /// Resize along x. With constant volume the z length compensates.
    pub fn magnified_x(&self, offset: f64, minimum: f64, constant_volume: bool) -> Option<BodyXyLayer> {
        let x = (self.x_length + offset).max(minimum);
        let mut layer = BodyXyLayer { x_length: x, ..*self };
        if constant_volume {
            layer.z_length = self.volume() / (x * self.y_length);
        }
        layer.is_valid().then_some(layer)
    }

    /// Resize along y. With constant volume the z length compensates.
    pub fn magnified_y(&self, offset: f64, minimum: f64, constant_volume: bool) -> Option<BodyXyLayer> {
        let y = (self.y_length + offset).max(minimum);
        let mut layer = BodyXyLayer { y_length: y, ..*self };
        if constant_volume {
            layer.z_length = self.volume() / (self.x_length * y);
        }
        layer.is_valid().then_some(layer)
    }

    /// Resize along z. With constant volume x and y grow by the same `a`
    /// solving `(x + a)(y + a) z' = V`.
    pub fn magnified_z(&self, offset: f64, minimum: f64, constant_volume: bool) -> Option<BodyXyLayer> {
        let z = (self.z_length + offset).max(minimum);
        let mut layer = BodyXyLayer { z_length: z, ..*self };
        if constant_volume {
            if !(z > 0.0) {
                return None;
            }
            let (x, y) = (self.x_length, self.y_length);
            let root_z = z.sqrt();
            let a = (-(x + y) * root_z + (4.0 * self.volume() + (x - y) * (x - y) * z).sqrt())
                / (2.0 * root_z);
            log::debug!("constant volume z magnification: a = {a}");
            layer.x_length = x + a;
            layer.y_length = y + a;
        }
        layer.is_valid().then_some(layer)
    }

    fn is_valid(&self) -> bool {
        [self.x_length, self.y_length, self.z_length]
            .iter()
            .all(|l| l.is_finite() && *l > 0.0)
    }

    /// Packs `count` spheres of `radius` inside this layer.
    pub fn non_overlapping_random_spheres<R: Rng + ?Sized>(
        &self,
        count: usize,
        radius: f64,
        number_of_trials: usize,
        rng: &mut R,
    ) -> Option<Vec<BodySphere>> {
        let half = self.half_lengths();
        let radius = radius.min(half.x.min(half.y).min(half.z));
        let center = self.center;
        place_non_overlapping_spheres(
            count,
            radius,
            number_of_trials,
            rng,
            |rng| {
                PointInSpace::new(
                    center.x + symmetric(rng, half.x - radius),
                    center.y + symmetric(rng, half.y - radius),
                    center.z + symmetric(rng, half.z - radius),
                )
            },
            |_| false,
        )
    }
}

fn symmetric<R: Rng + ?Sized>(rng: &mut R, half: f64) -> f64 {
    if half > 0.0 {
        rng.random_range(-half..=half)
    } else {
        0.0
    }
}
