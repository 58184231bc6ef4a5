// Compartment bodies (spheres and xy-layers) placed inside the simulation box.
// A body carries its geometry plus display state: active box view, selection
// flag and the depth-cue attenuation for the current slice value.

pub mod shape;
pub(crate) mod sphere;
mod xy_layer;


pub use shape::Shape2D;
pub use sphere::BodySphere;
pub use xy_layer::{BodyXyLayer, LayerFace};

use crate::composition::Orientation;
use crate::config;
use crate::error::{CompartmentError, Result};
use crate::geometry::{PointInPlane, PointInSpace};
use palette::Srgb;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use ultraviolet::DVec3;

/// One of six axis-aligned 2D projections of the box.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default, Serialize, Deserialize)]
pub enum BoxView {
    #[default]
    XzFront,
    XzBack,
    YzLeft,
    YzRight,
    XyTop,
    XyBottom,
}

impl BoxView {
    pub const ALL: [BoxView; 6] = [
        BoxView::XzFront,
        BoxView::XzBack,
        BoxView::YzLeft,
        BoxView::YzRight,
        BoxView::XyTop,
        BoxView::XyBottom,
    ];

    /// Projects a point into the plane of this view.
    pub fn project(&self, point: &PointInSpace) -> PointInPlane {
        match self {
            BoxView::XzFront | BoxView::XzBack => PointInPlane::new(point.x, point.z),
            BoxView::YzLeft | BoxView::YzRight => PointInPlane::new(point.y, point.z),
            BoxView::XyTop | BoxView::XyBottom => PointInPlane::new(point.x, point.y),
        }
    }

    /// Coordinate along the viewing axis, i.e. the slice coordinate.
    pub fn third_coordinate(&self, point: &PointInSpace) -> f64 {
        match self {
            BoxView::XzFront | BoxView::XzBack => point.y,
            BoxView::YzLeft | BoxView::YzRight => point.x,
            BoxView::XyTop | BoxView::XyBottom => point.z,
        }
    }

    /// Signed depth key; ascending order runs from the viewer into the box.
    pub fn depth_key(&self, point: &PointInSpace) -> f64 {
        match self {
            BoxView::XzFront => point.y,
            BoxView::XzBack => -point.y,
            BoxView::YzLeft => point.x,
            BoxView::YzRight => -point.x,
            BoxView::XyTop => -point.z,
            BoxView::XyBottom => point.z,
        }
    }

    /// Whether a center lies on the visible side of the slicing plane.
    pub fn is_behind_slice(&self, center: &PointInSpace, third_dimension_value: f64) -> bool {
        match self {
            BoxView::XzFront => center.y >= third_dimension_value,
            BoxView::XzBack => center.y <= third_dimension_value,
            BoxView::YzLeft => center.x >= third_dimension_value,
            BoxView::YzRight => center.x <= third_dimension_value,
            BoxView::XyTop => center.z <= third_dimension_value,
            BoxView::XyBottom => center.z >= third_dimension_value,
        }
    }
}

/// Geometry of a body as a closed sum type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BodyGeometry {
    Sphere(BodySphere),
    XyLayer(BodyXyLayer),
}

impl BodyGeometry {
    pub fn center(&self) -> PointInSpace {
        match self {
            BodyGeometry::Sphere(s) => s.center,
            BodyGeometry::XyLayer(l) => l.center,
        }
    }

    pub fn set_center(&mut self, center: PointInSpace) {
        match self {
            BodyGeometry::Sphere(s) => s.center = center,
            BodyGeometry::XyLayer(l) => l.center = center,
        }
    }

    /// Distance from the center to the body surface along each axis.
    pub fn half_extent(&self) -> DVec3 {
        match self {
            BodyGeometry::Sphere(s) => DVec3::broadcast(s.radius),
            BodyGeometry::XyLayer(l) => l.half_lengths(),
        }
    }

    pub fn volume(&self) -> f64 {
        match self {
            BodyGeometry::Sphere(s) => s.volume(),
            BodyGeometry::XyLayer(l) => l.volume(),
        }
    }

    pub fn is_in_volume(&self, point: &PointInSpace) -> bool {
        match self {
            BodyGeometry::Sphere(s) => s.is_in_volume(point),
            BodyGeometry::XyLayer(l) => l.is_in_volume(point),
        }
    }

    pub fn is_overlap(&self, other: &BodyGeometry) -> bool {
        match (self, other) {
            (BodyGeometry::Sphere(a), BodyGeometry::Sphere(b)) => a.is_overlap_sphere(b),
            (BodyGeometry::Sphere(s), BodyGeometry::XyLayer(l))
            | (BodyGeometry::XyLayer(l), BodyGeometry::Sphere(s)) => l.is_overlap_sphere(s),
            (BodyGeometry::XyLayer(a), BodyGeometry::XyLayer(b)) => a.is_overlap_layer(b),
        }
    }

    pub fn is_overlap_sphere(&self, sphere: &BodySphere) -> bool {
        match self {
            BodyGeometry::Sphere(s) => s.is_overlap_sphere(sphere),
            BodyGeometry::XyLayer(l) => l.is_overlap_sphere(sphere),
        }
    }

    pub fn shape_in_view(&self, view: BoxView) -> Shape2D {
        match self {
            BodyGeometry::Sphere(s) => Shape2D::Circle {
                center: view.project(&s.center),
                radius: s.radius,
            },
            BodyGeometry::XyLayer(l) => {
                let (width, height) = match view {
                    BoxView::XzFront | BoxView::XzBack => (l.x_length, l.z_length),
                    BoxView::YzLeft | BoxView::YzRight => (l.y_length, l.z_length),
                    BoxView::XyTop | BoxView::XyBottom => (l.x_length, l.y_length),
                };
                Shape2D::Rectangle {
                    center: view.project(&l.center),
                    half_width: 0.5 * width,
                    half_height: 0.5 * height,
                }
            }
        }
    }
}

/// A compartment body. `key` is the block name of the owning compartment and
/// is the identity used by the box for duplicate detection and lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    key: String,
    geometry: BodyGeometry,
    box_view: BoxView,
    selected: bool,
    attenuation: f64,
    excluded_spheres: Vec<BodySphere>,
}

impl Body {
    pub fn new(key: impl Into<String>, geometry: BodyGeometry) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(CompartmentError::invalid("body key must not be empty"));
        }
        Ok(Self {
            key,
            geometry,
            box_view: BoxView::default(),
            selected: false,
            attenuation: 0.0,
            excluded_spheres: Vec::new(),
        })
    }

    pub fn sphere(key: impl Into<String>, sphere: BodySphere) -> Result<Self> {
        Self::new(key, BodyGeometry::Sphere(sphere))
    }

    pub fn xy_layer(key: impl Into<String>, layer: BodyXyLayer) -> Result<Self> {
        Self::new(key, BodyGeometry::XyLayer(layer))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn geometry(&self) -> &BodyGeometry {
        &self.geometry
    }

    /// Replaces the geometry; used by the container when a geometry record changes.
    pub fn set_geometry(&mut self, geometry: BodyGeometry) {
        self.geometry = geometry;
    }

    pub fn is_sphere(&self) -> bool {
        matches!(self.geometry, BodyGeometry::Sphere(_))
    }

    pub fn is_xy_layer(&self) -> bool {
        matches!(self.geometry, BodyGeometry::XyLayer(_))
    }

    pub fn body_center(&self) -> PointInSpace {
        self.geometry.center()
    }

    pub fn volume(&self) -> f64 {
        self.geometry.volume()
    }

    pub fn box_view(&self) -> BoxView {
        self.box_view
    }

    pub fn set_box_view(&mut self, view: BoxView) {
        self.box_view = view;
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Selection changes must go through the box so at most one body is selected.
    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn is_overlap(&self, other: &Body) -> bool {
        self.geometry.is_overlap(&other.geometry)
    }

    pub fn is_in_volume(&self, point: &PointInSpace) -> bool {
        self.geometry.is_in_volume(point)
    }

    pub fn shape_in_box_view(&self) -> Shape2D {
        self.geometry.shape_in_view(self.box_view)
    }

    /// Back-to-front ordering key for the active view.
    pub fn compare_depth(&self, other: &Body) -> Ordering {
        let a = self.box_view.depth_key(&self.body_center());
        let b = self.box_view.depth_key(&other.body_center());
        a.total_cmp(&b)
    }

    pub fn attenuation(&self) -> f64 {
        self.attenuation
    }

    /// Recomputes the depth cue from the slice value. `box_lengths` are the
    /// box edge lengths, `depth_attenuation` the configured strength.
    pub fn update_attenuation(
        &mut self,
        third_dimension_value: f64,
        box_lengths: DVec3,
        depth_attenuation: f64,
    ) {
        let center = self.body_center();
        let extent = self.geometry.half_extent();
        let raw = match self.box_view {
            BoxView::XzFront => (center.y - extent.y - third_dimension_value) / box_lengths.y,
            BoxView::XzBack => (third_dimension_value - center.y - extent.y) / box_lengths.y,
            BoxView::YzLeft => (center.x - extent.x - third_dimension_value) / box_lengths.x,
            BoxView::YzRight => (third_dimension_value - center.x - extent.x) / box_lengths.x,
            BoxView::XyTop => (third_dimension_value - center.z - extent.z) / box_lengths.z,
            BoxView::XyBottom => (center.z - extent.z - third_dimension_value) / box_lengths.z,
        };
        let value = raw * config::clamp_depth_attenuation(depth_attenuation);
        self.attenuation = if value.is_finite() { value.max(0.0) } else { 0.0 };
    }

    pub fn excluded_spheres(&self) -> &[BodySphere] {
        &self.excluded_spheres
    }

    pub fn add_excluded_spheres(&mut self, spheres: impl IntoIterator<Item = BodySphere>) {
        self.excluded_spheres.extend(spheres);
    }

    pub fn clear_excluded_spheres(&mut self) {
        self.excluded_spheres.clear();
    }

    /// Volume positions avoiding the spheres reserved in this body.
    pub fn random_points_in_volume<R: Rng + ?Sized>(
        &self,
        count: usize,
        number_of_trials: usize,
        rng: &mut R,
    ) -> Vec<PointInSpace> {
        match &self.geometry {
            BodyGeometry::Sphere(s) => {
                s.random_points_in_volume_excluding(count, &self.excluded_spheres, number_of_trials, rng)
            }
            BodyGeometry::XyLayer(l) => {
                l.random_points_in_volume_excluding(count, &self.excluded_spheres, number_of_trials, rng)
            }
        }
    }

    /// Surface positions for an orientation choice. Spheres fall back to the
    /// whole surface and layers to their top and bottom faces when the choice
    /// names no surface. `None` for a collapsed layer.
    pub fn random_points_on_surface<R: Rng + ?Sized>(
        &self,
        orientation: Orientation,
        count: usize,
        rng: &mut R,
    ) -> Option<Vec<PointInSpace>> {
        match &self.geometry {
            BodyGeometry::Sphere(s) => Some(match orientation {
                Orientation::UpperSphereSurface => s.random_points_on_upper_surface(count, rng),
                Orientation::MiddleSphereSurface => s.random_points_on_middle_surface(count, rng),
                _ => (0..count).map(|_| s.random_point_on_surface(rng)).collect(),
            }),
            BodyGeometry::XyLayer(l) => {
                let faces = orientation
                    .layer_faces()
                    .unwrap_or(&[LayerFace::XyTop, LayerFace::XyBottom]);
                (0..count).map(|_| l.random_point_on_faces(faces, rng)).collect()
            }
        }
    }

    /// Display color of the body for `base` under its current depth cue.
    pub fn display_color(&self, base: Srgb<f32>) -> Srgb<f32> {
        shape::attenuated_color(base, self.attenuation)
    }
}
