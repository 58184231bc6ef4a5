// body/sphere.rs
// Sphere geometry: volume, containment, overlap and random sampling

use crate::config;
use crate::error::{CompartmentError, Result};
use crate::geometry::PointInSpace;
use rand::Rng;
use serde::{Deserialize, Serialize};
use ultraviolet::DVec3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodySphere {
    pub center: PointInSpace,
    pub radius: f64,
}

impl BodySphere {
    /// Strict constructor: radius must be positive and finite.
    pub fn new(center: PointInSpace, radius: f64) -> Result<Self> {
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(CompartmentError::invalid(format!(
                "sphere radius must be positive, got {radius}"
            )));
        }
        if !center.is_finite() {
            return Err(CompartmentError::invalid("sphere center must be finite"));
        }
        Ok(Self { center, radius })
    }

    /// Constructor for geometry records, which start collapsed at radius 0
    /// until molecules are assigned.
    pub fn from_record(center: PointInSpace, radius: f64) -> Result<Self> {
        if !(radius >= 0.0) || !radius.is_finite() || !center.is_finite() {
            return Err(CompartmentError::invalid(format!(
                "sphere record radius must be non-negative, got {radius}"
            )));
        }
        Ok(Self { center, radius })
    }

    pub fn volume(&self) -> f64 {
        config::FACTOR_4_PI_DIV_3 * self.radius * self.radius * self.radius
    }

    pub fn is_in_volume(&self, point: &PointInSpace) -> bool {
        let r = self.radius * config::FACTOR_FOR_GRAPHICS_NUMBER_CORRECTION;
        self.center.distance_squared(point) <= r * r
    }

    pub fn is_overlap_sphere(&self, other: &BodySphere) -> bool {
        self.center.distance(&other.center) <= self.radius + other.radius + config::OVERLAP_EPSILON
    }

    /// Uniform point inside a slightly shrunk copy of the sphere
    /// (rejection from the bounding cube).
    pub fn random_point_in_volume<R: Rng + ?Sized>(&self, rng: &mut R) -> PointInSpace {
        let r = self.radius * config::DECREASE_FACTOR;
        if r <= 0.0 {
            return self.center;
        }
        loop {
            let dx = rng.random_range(-r..=r);
            let dy = rng.random_range(-r..=r);
            let dz = rng.random_range(-r..=r);
            if dx * dx + dy * dy + dz * dz <= r * r {
                return PointInSpace::new(self.center.x + dx, self.center.y + dy, self.center.z + dz);
            }
        }
    }

    /// Uniform point on the sphere surface (Marsaglia).
    pub fn random_point_on_surface<R: Rng + ?Sized>(&self, rng: &mut R) -> PointInSpace {
        loop {
            let u: f64 = rng.random_range(-1.0..1.0);
            let v: f64 = rng.random_range(-1.0..1.0);
            let s = u * u + v * v;
            if s < 1.0 {
                let root = (1.0 - s).sqrt();
                return PointInSpace::new(
                    self.center.x + self.radius * 2.0 * u * root,
                    self.center.y + self.radius * 2.0 * v * root,
                    self.center.z + self.radius * (1.0 - 2.0 * s),
                );
            }
        }
    }

    /// Points on the two polar caps, `|dz| >= r/2` of the shrunk radius.
    /// Surface molecules of an "upper" sphere orientation sit here.
    pub fn random_points_on_upper_surface<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<PointInSpace> {
        let r = self.radius * config::DECREASE_FACTOR;
        (0..count)
            .map(|_| loop {
                let offset = spherical_offset(r, rng);
                if offset.z.abs() >= 0.5 * r {
                    break PointInSpace::from_vec(self.center.to_vec() + offset);
                }
            })
            .collect()
    }

    /// Points on the equatorial band, `|dz| <= r/2` of the shrunk radius.
    pub fn random_points_on_middle_surface<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<PointInSpace> {
        let r = self.radius * config::DECREASE_FACTOR;
        (0..count)
            .map(|_| loop {
                let offset = spherical_offset(r, rng);
                if offset.z.abs() <= 0.5 * r {
                    break PointInSpace::from_vec(self.center.to_vec() + offset);
                }
            })
            .collect()
    }

    /// Volume points that avoid `excluded`. Each point gets `number_of_trials`
    /// draws; when they run out the last draw is kept even if excluded.
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

    /// Sphere with radius grown by `offset`, floored at `minimum_radius`.
    pub fn magnified(&self, offset: f64, minimum_radius: f64) -> Option<BodySphere> {
        let radius = (self.radius + offset).max(minimum_radius);
        if !radius.is_finite() || radius <= 0.0 {
            return None;
        }
        Some(BodySphere { center: self.center, radius })
    }

    /// Packs `count` spheres of `radius` inside this sphere. See
    /// [`place_non_overlapping_spheres`] for the degradation rules.
    pub fn non_overlapping_random_spheres<R: Rng + ?Sized>(
        &self,
        count: usize,
        radius: f64,
        number_of_trials: usize,
        rng: &mut R,
    ) -> Option<Vec<BodySphere>> {
        let radius = radius.min(self.radius);
        let inner = BodySphere { center: self.center, radius: self.radius - radius };
        place_non_overlapping_spheres(
            count,
            radius,
            number_of_trials,
            rng,
            |rng| inner.random_point_in_volume(rng),
            |_| false,
        )
    }
}

/// Uniform direction scaled to `radius` (inverse-cosine polar angle).
fn spherical_offset<R: Rng + ?Sized>(radius: f64, rng: &mut R) -> DVec3 {
    let phi = (2.0 * rng.random::<f64>() - 1.0).acos();
    let theta = rng.random::<f64>() * std::f64::consts::TAU;
    let planar = radius * phi.sin();
    DVec3::new(planar * theta.cos(), planar * theta.sin(), radius * phi.cos())
}

/// Draws from `sample` until the point is outside every excluded sphere or
/// the trial budget is spent.
pub(crate) fn sample_excluding<R, S>(
    excluded: &[BodySphere],
    number_of_trials: usize,
    rng: &mut R,
    mut sample: S,
) -> PointInSpace
where
    R: Rng + ?Sized,
    S: FnMut(&mut R) -> PointInSpace,
{
    let mut point = sample(rng);
    let mut trials = 1;
    while trials < number_of_trials && excluded.iter().any(|s| s.is_in_volume(&point)) {
        point = sample(rng);
        trials += 1;
    }
    point
}

/// Rejection placement of `count` equal spheres. Centers come from
/// `sample_center`, `is_blocked` reports collisions with anything outside the
/// batch. The trial counter resets after each accepted sphere. When the budget
/// runs out the remaining spheres reuse accepted centers cyclically (or fresh
/// samples if nothing was accepted), so the result may overlap but always has
/// `count` entries. Returns `None` for a zero count, radius or budget.
pub(crate) fn place_non_overlapping_spheres<R, S, B>(
    count: usize,
    radius: f64,
    number_of_trials: usize,
    rng: &mut R,
    mut sample_center: S,
    is_blocked: B,
) -> Option<Vec<BodySphere>>
where
    R: Rng + ?Sized,
    S: FnMut(&mut R) -> PointInSpace,
    B: Fn(&BodySphere) -> bool,
{
    if count == 0 || !(radius > 0.0) || !radius.is_finite() || number_of_trials == 0 {
        return None;
    }
    let mut placed: Vec<BodySphere> = Vec::with_capacity(count);
    let mut trials = 0;
    while placed.len() < count && trials < number_of_trials {
        let candidate = BodySphere { center: sample_center(rng), radius };
        let collides = placed.iter().any(|s| s.is_overlap_sphere(&candidate)) || is_blocked(&candidate);
        if collides {
            trials += 1;
        } else {
            placed.push(candidate);
            trials = 0;
        }
    }
    if placed.len() < count {
        log::debug!(
            "sphere placement budget exhausted after {} of {} spheres",
            placed.len(),
            count
        );
        let accepted = placed.len();
        let mut index = 0;
        while placed.len() < count {
            let center = if accepted > 0 {
                let c = placed[index % accepted].center;
                index += 1;
                c
            } else {
                sample_center(rng)
            };
            placed.push(BodySphere { center, radius });
        }
    }
    Some(placed)
}
