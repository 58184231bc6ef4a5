// The simulation box holding compartment bodies.
// Box corner sits at the origin; the box owns its bodies, the excluded spheres
// reserved by random placement, the selection and the display cache.

mod display;
mod sampling;


use crate::body::{Body, BodyGeometry, BodySphere, BoxView};
use crate::config::{self, CompartmentConfig};
use crate::error::{CompartmentError, Result};
use crate::geometry::{BoxSizeInfo, PointInSpace};
use crate::profile_scope;
use broccoli::aabb::Rect;
use ultraviolet::DVec3;

pub use display::DisplayCache;

/// Axis along which a body is magnified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Clone, Debug)]
pub struct CompartmentBox {
    lengths: DVec3,
    volume: f64,
    bodies: Vec<Body>,
    box_view: BoxView,
    third_dimension_value: f64,
    depth_attenuation: f64,
    constant_volume: bool,
    selected: Option<String>,
    excluded_spheres: Vec<BodySphere>,
    display_cache: Option<DisplayCache>,
}

impl CompartmentBox {
    pub fn new(x_length: f64, y_length: f64, z_length: f64) -> Result<Self> {
        for (axis, length) in [("x", x_length), ("y", y_length), ("z", z_length)] {
            if !(length > 0.0) || !length.is_finite() {
                return Err(CompartmentError::invalid(format!(
                    "box {axis} length must be positive, got {length}"
                )));
            }
        }
        Ok(Self {
            lengths: DVec3::new(x_length, y_length, z_length),
            volume: x_length * y_length * z_length,
            bodies: Vec::with_capacity(config::INITIAL_NUMBER_OF_BODIES),
            box_view: BoxView::XzFront,
            third_dimension_value: 0.0,
            depth_attenuation: config::COLOR_SHAPE_ATTENUATION_COMPARTMENT_DEFAULT,
            constant_volume: config::IS_CONSTANT_COMPARTMENT_BODY_VOLUME_DEFAULT,
            selected: None,
            excluded_spheres: Vec::new(),
            display_cache: None,
        })
    }

    pub fn with_config(mut self, config: &CompartmentConfig) -> Self {
        self.constant_volume = config.constant_volume;
        self.depth_attenuation = config::clamp_depth_attenuation(config.depth_attenuation);
        self
    }

    pub fn x_length(&self) -> f64 {
        self.lengths.x
    }

    pub fn y_length(&self) -> f64 {
        self.lengths.y
    }

    pub fn z_length(&self) -> f64 {
        self.lengths.z
    }

    pub fn lengths(&self) -> DVec3 {
        self.lengths
    }

    pub fn size_info(&self) -> BoxSizeInfo {
        BoxSizeInfo::from_lengths(self.lengths.x, self.lengths.y, self.lengths.z)
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_constant_volume(&self) -> bool {
        self.constant_volume
    }

    pub fn set_constant_volume(&mut self, value: bool) {
        self.constant_volume = value;
    }

    // ---- body set ----

    /// Adds a body; duplicates (same key) are rejected.
    pub fn add_body(&mut self, mut body: Body) -> bool {
        if self.contains_body(body.key()) {
            return false;
        }
        body.set_box_view(self.box_view);
        body.update_attenuation(self.third_dimension_value, self.lengths, self.depth_attenuation);
        self.bodies.push(body);
        self.invalidate_display_cache();
        true
    }

    pub fn get_body(&self, key: &str) -> Option<&Body> {
        self.bodies.iter().find(|b| b.key() == key)
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn contains_body(&self, key: &str) -> bool {
        self.bodies.iter().any(|b| b.key() == key)
    }

    pub fn has_bodies(&self) -> bool {
        !self.bodies.is_empty()
    }

    pub fn remove_body(&mut self, key: &str) -> bool {
        let Some(index) = self.bodies.iter().position(|b| b.key() == key) else {
            return false;
        };
        if self.selected.as_deref() == Some(key) {
            self.selected = None;
        }
        self.bodies.remove(index);
        self.invalidate_display_cache();
        true
    }

    /// Removes all bodies, excluded spheres and the selection.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.excluded_spheres.clear();
        self.selected = None;
        self.invalidate_display_cache();
    }

    /// Replaces the geometry of a body, keeping its display state.
    pub fn update_body_geometry(&mut self, key: &str, geometry: BodyGeometry) -> bool {
        let (third, lengths, attenuation) =
            (self.third_dimension_value, self.lengths, self.depth_attenuation);
        let Some(body) = self.bodies.iter_mut().find(|b| b.key() == key) else {
            return false;
        };
        body.set_geometry(geometry);
        body.update_attenuation(third, lengths, attenuation);
        self.invalidate_display_cache();
        true
    }

    pub fn free_volume(&self) -> f64 {
        self.volume - self.bodies.iter().map(Body::volume).sum::<f64>()
    }

    // ---- containment ----

    pub fn is_in_container(&self, point: &PointInSpace) -> bool {
        point.x >= 0.0
            && point.y >= 0.0
            && point.z >= 0.0
            && point.x <= self.lengths.x
            && point.y <= self.lengths.y
            && point.z <= self.lengths.z
    }

    /// Inside the box and inside no body and no excluded sphere.
    pub fn is_in_free_volume(&self, point: &PointInSpace) -> bool {
        if self.bodies.iter().any(|b| b.is_in_volume(point)) {
            return false;
        }
        if self.excluded_spheres.iter().any(|s| s.is_in_volume(point)) {
            return false;
        }
        self.is_in_container(point)
    }

    /// Whether `geometry`, moved to `coords`, would cross the box boundary.
    /// Layers must additionally stay centred in x and y.
    pub fn is_out_of_box_at(&self, coords: &PointInSpace, geometry: &BodyGeometry) -> bool {
        if coords.x < 0.0 || coords.y < 0.0 || coords.z < 0.0 {
            return true;
        }
        match geometry {
            BodyGeometry::Sphere(s) => {
                let r = s.radius;
                coords.x < r
                    || coords.y < r
                    || coords.z < r
                    || coords.x + r > self.lengths.x
                    || coords.y + r > self.lengths.y
                    || coords.z + r > self.lengths.z
            }
            BodyGeometry::XyLayer(l) => {
                let half_z = 0.5 * l.z_length;
                !self.is_centred(coords.x, self.lengths.x)
                    || !self.is_centred(coords.y, self.lengths.y)
                    || coords.z < half_z
                    || coords.z + half_z > self.lengths.z
            }
        }
    }

    pub fn is_out_of_box(&self, geometry: &BodyGeometry) -> bool {
        self.is_out_of_box_at(&geometry.center(), geometry)
    }

    fn is_centred(&self, value: f64, length: f64) -> bool {
        (value - 0.5 * length).abs() <= 1.0e-9 * length
    }

    /// Clamps `coords` so `geometry` fits inside the box, with a small inward
    /// correction against boundary round-off. Layers are re-centred in x and y.
    pub fn correct_out_of_box(&self, coords: &PointInSpace, geometry: &BodyGeometry) -> PointInSpace {
        let extent = geometry.half_extent();
        let correction = 1.0 + config::MINIMUM_COMPARTMENT_FACTOR;
        let fit = |c: f64, e: f64, size: f64| -> f64 {
            if c < e {
                e * correction
            } else if c + e > size {
                size - e * correction
            } else {
                c
            }
        };
        match geometry {
            BodyGeometry::Sphere(_) => PointInSpace::new(
                fit(coords.x, extent.x, self.lengths.x),
                fit(coords.y, extent.y, self.lengths.y),
                fit(coords.z, extent.z, self.lengths.z),
            ),
            BodyGeometry::XyLayer(_) => PointInSpace::new(
                0.5 * self.lengths.x,
                0.5 * self.lengths.y,
                fit(coords.z, extent.z, self.lengths.z),
            ),
        }
    }

    fn top_bottom_offset(&self) -> f64 {
        self.lengths.z * (config::FACTOR_FOR_GRAPHICS_NUMBER_CORRECTION - 1.0)
    }

    pub fn is_near_top_of_box(&self, geometry: &BodyGeometry) -> bool {
        let reach = geometry.half_extent().z * config::FACTOR_FOR_GRAPHICS_NUMBER_CORRECTION;
        geometry.center().z + reach >= self.lengths.z - self.top_bottom_offset()
    }

    pub fn is_near_bottom_of_box(&self, geometry: &BodyGeometry) -> bool {
        let reach = geometry.half_extent().z * config::FACTOR_FOR_GRAPHICS_NUMBER_CORRECTION;
        geometry.center().z - reach <= self.top_bottom_offset()
    }

    /// Geometry snapped against the top face.
    pub fn moved_to_top_of_box(&self, geometry: &BodyGeometry) -> BodyGeometry {
        let mut moved = geometry.clone();
        let mut center = geometry.center();
        center.z = self.lengths.z
            - geometry.half_extent().z * config::FACTOR_FOR_GRAPHICS_NUMBER_CORRECTION;
        moved.set_center(center);
        moved
    }

    /// Geometry snapped against the bottom face.
    pub fn moved_to_bottom_of_box(&self, geometry: &BodyGeometry) -> BodyGeometry {
        let mut moved = geometry.clone();
        let mut center = geometry.center();
        center.z = geometry.half_extent().z * config::FACTOR_FOR_GRAPHICS_NUMBER_CORRECTION;
        moved.set_center(center);
        moved
    }

    /// Grows or shrinks a body along `axis`. Spheres only change when
    /// constant-volume mode is off. The edit is dropped (returns `None`)
    /// if the result would leave the box.
    pub fn magnify_body(&mut self, key: &str, axis: Axis, offset: f64) -> Option<BodyGeometry> {
        let body = self.get_body(key)?;
        let factor = config::MINIMUM_COMPARTMENT_FACTOR;
        let magnified = match body.geometry() {
            BodyGeometry::Sphere(s) => {
                if self.constant_volume {
                    return None;
                }
                let minimum = self.lengths.x.min(self.lengths.y).min(self.lengths.z) * factor;
                BodyGeometry::Sphere(s.magnified(offset, minimum)?)
            }
            BodyGeometry::XyLayer(l) => {
                let layer = match axis {
                    Axis::X => l.magnified_x(offset, self.lengths.x * factor, self.constant_volume),
                    Axis::Y => l.magnified_y(offset, self.lengths.y * factor, self.constant_volume),
                    Axis::Z => l.magnified_z(offset, self.lengths.z * factor, self.constant_volume),
                }?;
                BodyGeometry::XyLayer(layer)
            }
        };
        if self.fits_after_magnification(&magnified) {
            self.update_body_geometry(key, magnified.clone());
            Some(magnified)
        } else {
            log::debug!("magnification of {key} along {axis:?} rejected: body would leave the box");
            None
        }
    }

    fn fits_after_magnification(&self, geometry: &BodyGeometry) -> bool {
        let c = geometry.center();
        let e = geometry.half_extent();
        c.x - e.x >= 0.0
            && c.y - e.y >= 0.0
            && c.z - e.z >= 0.0
            && c.x + e.x <= self.lengths.x
            && c.y + e.y <= self.lengths.y
            && c.z + e.z <= self.lengths.z
    }

    // ---- overlap ----

    /// Overlap of `body` with any other contained body (self excluded by key).
    pub fn is_overlap(&self, body: &Body) -> bool {
        self.bodies
            .iter()
            .any(|other| other.key() != body.key() && other.is_overlap(body))
    }

    pub fn bodies_with_overlap(&self, body: &Body) -> Option<Vec<&Body>> {
        let hits: Vec<&Body> = self
            .bodies
            .iter()
            .filter(|other| other.key() != body.key() && other.is_overlap(body))
            .collect();
        if hits.is_empty() {
            None
        } else {
            Some(hits)
        }
    }

    /// Any pair of bodies overlapping. Candidate pairs come from a broad
    /// phase over the xy bounding rectangles.
    pub fn has_overlap(&self) -> bool {
        profile_scope!("has_overlap");
        if self.bodies.len() < 2 {
            return false;
        }
        let pad = config::OVERLAP_EPSILON;
        let mut rects = self
            .bodies
            .iter()
            .enumerate()
            .map(|(index, body)| {
                let c = body.body_center().to_vec();
                let e = body.geometry().half_extent();
                let min = c - e - DVec3::broadcast(pad);
                let max = c + e + DVec3::broadcast(pad);
                (Rect::new(min.x, max.x, min.y, max.y), index)
            })
            .collect::<Vec<_>>();

        let mut tree = broccoli::Tree::new(&mut rects);
        let bodies = &self.bodies;
        let mut found = false;
        tree.find_colliding_pairs(|a, b| {
            if found {
                return;
            }
            let i = *a.unpack_inner();
            let j = *b.unpack_inner();
            if bodies[i].is_overlap(&bodies[j]) {
                found = true;
            }
        });
        found
    }

    // ---- excluded spheres ----

    pub fn excluded_spheres(&self) -> &[BodySphere] {
        &self.excluded_spheres
    }

    pub fn has_excluded_spheres(&self) -> bool {
        !self.excluded_spheres.is_empty()
    }

    pub fn clear_excluded_spheres(&mut self) {
        self.excluded_spheres.clear();
        for body in &mut self.bodies {
            body.clear_excluded_spheres();
        }
    }

    fn invalidate_display_cache(&mut self) {
        self.display_cache = None;
    }
}
