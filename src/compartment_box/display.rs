// compartment_box/display.rs
// Box view, slice value, display ordering and selection

use super::CompartmentBox;
use crate::body::{Body, BoxView};
use crate::error::{CompartmentError, Result};
use crate::geometry::PointInSpace;

/// Body indices in back-to-front order for one slice value.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayCache {
    third_dimension_value: f64,
    order: Vec<usize>,
}

impl CompartmentBox {
    pub fn box_view(&self) -> BoxView {
        self.box_view
    }

    /// Switches the active view, pushes it to every body and drops the cache.
    pub fn set_box_view(&mut self, view: BoxView) {
        self.box_view = view;
        self.display_cache = None;
        let (third, lengths, attenuation) =
            (self.third_dimension_value, self.lengths, self.depth_attenuation);
        for body in &mut self.bodies {
            body.set_box_view(view);
            body.update_attenuation(third, lengths, attenuation);
        }
    }

    pub fn third_dimension_value(&self) -> f64 {
        self.third_dimension_value
    }

    pub fn set_third_dimension_value(&mut self, value: f64) {
        self.third_dimension_value = value;
        let (lengths, attenuation) = (self.lengths, self.depth_attenuation);
        for body in &mut self.bodies {
            body.update_attenuation(value, lengths, attenuation);
        }
    }

    pub fn depth_attenuation(&self) -> f64 {
        self.depth_attenuation
    }

    pub fn set_depth_attenuation(&mut self, value: f64) {
        self.depth_attenuation = crate::config::clamp_depth_attenuation(value);
        let (third, lengths, attenuation) =
            (self.third_dimension_value, self.lengths, self.depth_attenuation);
        for body in &mut self.bodies {
            body.update_attenuation(third, lengths, attenuation);
        }
    }

    fn refresh_display_cache(&mut self, third_dimension_value: f64) {
        if let Some(cache) = &self.display_cache {
            if cache.third_dimension_value == third_dimension_value {
                return;
            }
        }
        let view = self.box_view;
        let mut order: Vec<usize> = self
            .bodies
            .iter()
            .enumerate()
            .filter(|(_, b)| view.is_behind_slice(&b.body_center(), third_dimension_value))
            .map(|(i, _)| i)
            .collect();
        order.sort_by(|&a, &b| self.bodies[a].compare_depth(&self.bodies[b]));
        order.reverse();
        self.display_cache = Some(DisplayCache { third_dimension_value, order });
    }

    /// Bodies visible behind the slice plane, farthest first. `None` if no
    /// body is visible.
    pub fn bodies_for_display(&mut self, third_dimension_value: f64) -> Option<Vec<&Body>> {
        self.refresh_display_cache(third_dimension_value);
        let cache = self.display_cache.as_ref()?;
        if cache.order.is_empty() {
            return None;
        }
        Some(cache.order.iter().map(|&i| &self.bodies[i]).collect())
    }

    pub fn selected_body(&self) -> Option<&Body> {
        let key = self.selected.as_deref()?;
        self.get_body(key)
    }

    pub fn deselect_body(&mut self) {
        if let Some(key) = self.selected.take() {
            if let Some(body) = self.bodies.iter_mut().find(|b| b.key() == key) {
                body.set_selected(false);
            }
        }
    }

    /// Programmatic selection; any previous selection is cleared first.
    pub fn select_body_by_key(&mut self, key: &str) -> bool {
        if !self.contains_body(key) {
            return false;
        }
        self.deselect_body();
        if let Some(body) = self.bodies.iter_mut().find(|b| b.key() == key) {
            body.set_selected(true);
        }
        self.selected = Some(key.to_string());
        true
    }

    /// Hit-tests the point against the displayed bodies, nearest first, and
    /// selects the first hit. Deselects when nothing is hit.
    pub fn select_body(&mut self, x: f64, y: f64, z: f64) -> Result<bool> {
        self.select_body_at(&PointInSpace::new(x, y, z))
    }

    pub fn select_body_at(&mut self, point: &PointInSpace) -> Result<bool> {
        if point.x < 0.0 || point.y < 0.0 || point.z < 0.0 {
            return Err(CompartmentError::invalid(format!(
                "selection point must not be negative: {point:?}"
            )));
        }
        let view = self.box_view;
        let third = view.third_coordinate(point);
        let projected = view.project(point);
        let hit = self.bodies_for_display(third).and_then(|bodies| {
            bodies
                .iter()
                .rev()
                .find(|b| b.shape_in_box_view().contains(&projected))
                .map(|b| b.key().to_string())
        });
        match hit {
            Some(key) => Ok(self.select_body_by_key(&key)),
            None => {
                self.deselect_body();
                Ok(false)
            }
        }
    }
}
