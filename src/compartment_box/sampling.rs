// compartment_box/sampling.rs
// Rejection sampling of free-volume points and non-overlapping spheres.
// The random generator is always owned by the caller.

use super::CompartmentBox;
use crate::body::sphere::place_non_overlapping_spheres;
use crate::body::{BodyGeometry, BodySphere};
use crate::geometry::PointInSpace;
use crate::profile_scope;
use rand::Rng;

impl CompartmentBox {
    fn random_point_in_box<R: Rng + ?Sized>(&self, rng: &mut R) -> PointInSpace {
        PointInSpace::new(
            rng.random::<f64>() * self.lengths.x,
            rng.random::<f64>() * self.lengths.y,
            rng.random::<f64>() * self.lengths.z,
        )
    }

    /// Uniform draw retried while it lands in occupied volume, at most
    /// `number_of_trials` times. The last draw is returned even if occupied.
    pub fn random_point_in_free_volume<R: Rng + ?Sized>(
        &self,
        number_of_trials: usize,
        rng: &mut R,
    ) -> PointInSpace {
        let mut point = self.random_point_in_box(rng);
        let mut counter = 0;
        while !self.is_in_free_volume(&point) && counter < number_of_trials {
            point = self.random_point_in_box(rng);
            counter += 1;
        }
        point
    }

    pub fn fill_free_volume_random_points<R: Rng + ?Sized>(
        &self,
        count: usize,
        number_of_trials: usize,
        rng: &mut R,
    ) -> Vec<PointInSpace> {
        profile_scope!("fill_free_volume_random_points");
        (0..count)
            .map(|_| self.random_point_in_free_volume(number_of_trials, rng))
            .collect()
    }

    /// Places `count` spheres in the box avoiding bodies, previously excluded
    /// spheres and each other. Accepted spheres join the excluded list.
    /// Best effort: once the budget is exhausted spheres may overlap.
    pub fn non_overlapping_random_spheres<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        radius: f64,
        number_of_trials: usize,
        rng: &mut R,
    ) -> Option<Vec<BodySphere>> {
        profile_scope!("non_overlapping_random_spheres");
        let max_radius = 0.5 * self.lengths.x.min(self.lengths.y).min(self.lengths.z);
        let radius = radius.min(max_radius);
        let lengths = self.lengths;
        let spheres = {
            let bodies = &self.bodies;
            let excluded = &self.excluded_spheres;
            place_non_overlapping_spheres(
                count,
                radius,
                number_of_trials,
                rng,
                |rng| {
                    PointInSpace::new(
                        radius + rng.random::<f64>() * (lengths.x - 2.0 * radius),
                        radius + rng.random::<f64>() * (lengths.y - 2.0 * radius),
                        radius + rng.random::<f64>() * (lengths.z - 2.0 * radius),
                    )
                },
                |candidate| {
                    bodies.iter().any(|b| b.geometry().is_overlap_sphere(candidate))
                        || excluded.iter().any(|s| s.is_overlap_sphere(candidate))
                },
            )
        }?;
        self.excluded_spheres.extend(spheres.iter().copied());
        Some(spheres)
    }

    /// Places spheres inside the body `key`, avoiding spheres already
    /// reserved in that body. Accepted spheres join the body's list.
    pub fn non_overlapping_random_spheres_in_body<R: Rng + ?Sized>(
        &mut self,
        key: &str,
        count: usize,
        radius: f64,
        number_of_trials: usize,
        rng: &mut R,
    ) -> Option<Vec<BodySphere>> {
        let body = self.bodies.iter_mut().find(|b| b.key() == key)?;
        let spheres = match body.geometry() {
            BodyGeometry::Sphere(s) => {
                let radius = radius.min(s.radius);
                let inner = BodySphere { center: s.center, radius: s.radius - radius };
                let reserved = body.excluded_spheres();
                place_non_overlapping_spheres(
                    count,
                    radius,
                    number_of_trials,
                    rng,
                    |rng| inner.random_point_in_volume(rng),
                    |candidate| reserved.iter().any(|r| r.is_overlap_sphere(candidate)),
                )
            }
            BodyGeometry::XyLayer(l) => {
                let reserved = body.excluded_spheres();
                let half = l.half_lengths();
                let radius = radius.min(half.x.min(half.y).min(half.z));
                let center = l.center;
                place_non_overlapping_spheres(
                    count,
                    radius,
                    number_of_trials,
                    rng,
                    |rng| {
                        PointInSpace::new(
                            center.x + (2.0 * rng.random::<f64>() - 1.0) * (half.x - radius),
                            center.y + (2.0 * rng.random::<f64>() - 1.0) * (half.y - radius),
                            center.z + (2.0 * rng.random::<f64>() - 1.0) * (half.z - radius),
                        )
                    },
                    |candidate| reserved.iter().any(|r| r.is_overlap_sphere(candidate)),
                )
            }
        }?;
        body.add_excluded_spheres(spheres.iter().copied());
        Some(spheres)
    }
}
