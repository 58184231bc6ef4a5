// body/shape.rs
// 2D projections of bodies used for hit-testing and display colors

use crate::geometry::PointInPlane;
use palette::{LinSrgb, Srgb};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape2D {
    Circle {
        center: PointInPlane,
        radius: f64,
    },
    Rectangle {
        center: PointInPlane,
        half_width: f64,
        half_height: f64,
    },
}

impl Shape2D {
    pub fn center(&self) -> PointInPlane {
        match self {
            Shape2D::Circle { center, .. } | Shape2D::Rectangle { center, .. } => *center,
        }
    }

    /// Circles include their rim, rectangles exclude their edges.
    pub fn contains(&self, point: &PointInPlane) -> bool {
        match self {
            Shape2D::Circle { center, radius } => center.distance(point) <= *radius,
            Shape2D::Rectangle { center, half_width, half_height } => {
                (point.x - center.x).abs() < *half_width && (point.y - center.y).abs() < *half_height
            }
        }
    }
}

/// Darkens `base` in linear light by the depth-cue attenuation
/// (0 = unchanged, 1 or more = black).
pub fn attenuated_color(base: Srgb<f32>, attenuation: f64) -> Srgb<f32> {
    let keep = (1.0 - attenuation.clamp(0.0, 1.0)) as f32;
    let linear: LinSrgb<f32> = base.into_linear();
    let dimmed = LinSrgb::new(linear.red * keep, linear.green * keep, linear.blue * keep);
    Srgb::from_linear(dimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_contains_rim_point() {
        let circle = Shape2D::Circle { center: PointInPlane::new(1.0, 1.0), radius: 2.0 };
        assert!(circle.contains(&PointInPlane::new(3.0, 1.0)));
        assert!(!circle.contains(&PointInPlane::new(3.1, 1.0)));
    }

    #[test]
    fn rectangle_excludes_edges() {
        let rect = Shape2D::Rectangle {
            center: PointInPlane::new(0.0, 0.0),
            half_width: 1.0,
            half_height: 2.0,
        };
        assert!(rect.contains(&PointInPlane::new(0.99, 1.99)));
        assert!(!rect.contains(&PointInPlane::new(1.0, 0.0)));
    }

    #[test]
    fn attenuation_darkens_monotonically() {
        let base = Srgb::new(0.8f32, 0.6, 0.4);
        let none = attenuated_color(base, 0.0);
        let half = attenuated_color(base, 0.5);
        let full = attenuated_color(base, 3.0);
        assert!((none.red - base.red).abs() < 1e-4);
        assert!(half.red < none.red && half.green < none.green);
        assert!(full.red.abs() < 1e-6 && full.blue.abs() < 1e-6);
    }
}
