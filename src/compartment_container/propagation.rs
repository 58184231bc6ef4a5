// compartment_container/propagation.rs
// Dependency updates after a composition edit: bulk/compartment percentages,
// molecule counts, compartment size, percent upper bounds, the volume/surface
// split and orientation options.

use super::{ChangeSet, CompartmentContainer, GeometrySource};
use crate::body::BodyGeometry;
use crate::composition::orientation::{self, Orientation, RowFacts};
use crate::composition::{self as comp, JobDefinition};
use crate::config;
use crate::error::{CompartmentError, Result};

impl CompartmentContainer {
    fn check_row(&self, index: usize, row: usize) -> Result<()> {
        if row >= self.compartments[index].rows.len() {
            return Err(CompartmentError::RowOutOfRange {
                block: self.compartments[index].block_name.clone(),
                row,
            });
        }
        Ok(())
    }

    /// Moves molecules of one row between bulk and the compartment so the
    /// compartment holds `percent` of them.
    pub fn set_composition_percent(&mut self, block_name: &str, row: usize, percent: f64) -> Result<ChangeSet> {
        let index = self.compartment_index(block_name)?;
        self.check_row(index, row)?;
        let decimals = self.config.composition_decimals;
        let percent = comp::round_to(percent, decimals);
        let current = &self.compartments[index].rows[row];
        if !(percent >= 0.0) || percent > current.max_percent {
            return Err(CompartmentError::invalid(format!(
                "percent {percent} outside 0..={} for {block_name} row {row}",
                current.max_percent
            )));
        }
        if percent == current.percent {
            return Ok(ChangeSet::default());
        }
        let mut changes = self.apply_percent(index, row, percent);
        changes.merge(self.update_distribution_and_orientation(index, row));
        Ok(changes)
    }

    /// Sets the share of a row's molecules placed on the compartment surface.
    pub fn set_surface_percent(&mut self, block_name: &str, row: usize, percent: f64) -> Result<ChangeSet> {
        let index = self.compartment_index(block_name)?;
        self.check_row(index, row)?;
        let percent = comp::round_to(percent, self.config.composition_decimals);
        if !(0.0..=100.0).contains(&percent) {
            return Err(CompartmentError::invalid(format!(
                "surface percent {percent} outside 0..=100"
            )));
        }
        if percent == self.compartments[index].rows[row].surface_percent {
            return Ok(ChangeSet::default());
        }
        self.compartments[index].rows[row].surface_percent = percent;
        Ok(self.update_distribution_and_orientation(index, row))
    }

    /// Picks one of the currently offered orientations.
    pub fn set_orientation(&mut self, block_name: &str, row: usize, orientation: Orientation) -> Result<bool> {
        let index = self.compartment_index(block_name)?;
        self.check_row(index, row)?;
        Ok(self.compartments[index].rows[row].orientation.select(orientation))
    }

    /// Re-derives size, split and orientation of every row of a compartment
    /// from the current percentages. A second call changes nothing.
    pub fn refresh_compartment(&mut self, block_name: &str) -> Result<ChangeSet> {
        let index = self.compartment_index(block_name)?;
        let mut changes = self.resize_compartment(index);
        for row in 0..self.compartments[index].rows.len() {
            changes.merge(self.update_distribution_and_orientation(index, row));
        }
        Ok(changes)
    }

    /// Bulk gets the difference, counts are split by the new percentages and
    /// the compartment is resized to its new particle count.
    fn apply_percent(&mut self, index: usize, row: usize, percent: f64) -> ChangeSet {
        let decimals = self.config.composition_decimals;
        let block = self.compartments[index].block_name.clone();
        let bulk = &mut self.bulk[row];
        let target = &mut self.compartments[index].rows[row];
        bulk.percent = comp::round_to(bulk.percent + target.percent - percent, decimals).max(0.0);
        target.percent = percent;
        let total = bulk.quantity + target.quantity;
        let (bulk_quantity, compartment_quantity) = comp::split_quantities(bulk.percent, percent, total);
        bulk.quantity = bulk_quantity;
        target.quantity = compartment_quantity;

        let mut changes = self.resize_compartment(index);
        changes.bulk_rows.insert(row);
        changes.composition_rows.insert((block, row));
        changes.merge(self.update_percent_range(row));
        changes
    }

    /// Radius or z-length from the particle count, truncated to the geometry
    /// precision, written to both records.
    pub(crate) fn resize_compartment(&mut self, index: usize) -> ChangeSet {
        let density = self.job.density;
        let decimals = self.config.geometry_decimals;
        let box_lengths = self.compartment_box.lengths();
        let particles = self.compartments[index].number_of_particles(&self.job.molecules);
        let compartment = &mut self.compartments[index];
        match &mut compartment.geometry {
            BodyGeometry::Sphere(s) => {
                let minimum = box_lengths.x.min(box_lengths.y).min(box_lengths.z)
                    * config::MINIMUM_COMPARTMENT_FACTOR;
                s.radius = comp::sphere_radius(particles, density, decimals, minimum);
            }
            BodyGeometry::XyLayer(l) => {
                let minimum = box_lengths.z * config::MINIMUM_COMPARTMENT_FACTOR;
                l.z_length =
                    comp::layer_z_length(particles, density, l.x_length, l.y_length, decimals, minimum);
            }
        }
        self.check_compartment_geometry(index, GeometrySource::Data)
    }

    /// Upper bound of `row` in every compartment: own percent plus bulk.
    pub(crate) fn update_percent_range(&mut self, row: usize) -> ChangeSet {
        let decimals = self.config.composition_decimals;
        let bulk_percent = self.bulk[row].percent;
        for compartment in &mut self.compartments {
            if let Some(r) = compartment.rows.get_mut(row) {
                r.max_percent = comp::round_to(r.percent + bulk_percent, decimals);
            }
        }
        let mut changes = ChangeSet::default();
        changes.percent_ranges.insert(row);
        changes
    }

    fn row_facts(&self, index: usize, row: usize) -> RowFacts {
        let r = &self.compartments[index].rows[row];
        RowFacts {
            protein: self.job.molecules[row].protein,
            quantity_in_volume: r.quantity_in_volume,
            quantity_on_surface: r.quantity_on_surface,
            surface_occupied: r.is_surface_occupied(),
        }
    }

    fn update_distribution_and_orientation(&mut self, index: usize, row: usize) -> ChangeSet {
        let block = self.compartments[index].block_name.clone();
        let before: Vec<_> = self.compartments[index]
            .rows
            .iter()
            .map(|r| (r.quantity_in_volume, r.quantity_on_surface, r.orientation.clone()))
            .collect();

        self.compartments[index].rows[row].update_distribution();
        let facts = self.row_facts(index, row);
        if self.compartments[index].is_sphere() {
            let current = &self.compartments[index].rows[row].orientation;
            self.compartments[index].rows[row].orientation = orientation::sphere_orientation(current, facts);
        } else {
            let lattice = comp::is_lattice_possible(&self.compartments[index].rows, &self.job.molecules);
            let current = &self.compartments[index].rows[row].orientation;
            self.compartments[index].rows[row].orientation =
                orientation::layer_orientation(current, facts, lattice);
            for other in 0..self.compartments[index].rows.len() {
                if other == row {
                    continue;
                }
                let facts = self.row_facts(index, other);
                let current = &self.compartments[index].rows[other].orientation;
                self.compartments[index].rows[other].orientation =
                    orientation::reoption_layer_row(current, facts, lattice);
            }
        }

        let mut changes = ChangeSet::default();
        for (i, (volume, surface, orientation)) in before.into_iter().enumerate() {
            let r = &self.compartments[index].rows[i];
            if i == row
                || r.quantity_in_volume != volume
                || r.quantity_on_surface != surface
                || r.orientation != orientation
            {
                changes.composition_rows.insert((block.clone(), i));
            }
        }
        changes
    }

    /// Rebuilds this container's compartments on top of a changed job. Only
    /// possible while the molecule catalog is unchanged; compositions are
    /// replayed and layers that sat at the top or bottom stay there.
    pub fn get_modified_compartment_container(&self, job: JobDefinition) -> Option<CompartmentContainer> {
        if !self.has_compartments() {
            return None;
        }
        match self.modified_container(job) {
            Ok(Some(container)) => Some(container),
            Ok(None) => {
                log::info!("molecules changed, compartments cannot be carried over");
                None
            }
            Err(e) => {
                log::warn!(
                    "compartment container could not be modified ({e}); as a safeguard all compartments are removed"
                );
                None
            }
        }
    }

    fn modified_container(&self, mut job: JobDefinition) -> Result<Option<CompartmentContainer>> {
        if job.random_seed.is_none() {
            job.random_seed = Some(self.random_seed);
        }
        let mut modified = CompartmentContainer::new(job, self.config.clone())?;
        if !self.job.has_same_molecules(&modified.job) {
            return Ok(None);
        }
        let decimals = self.config.composition_decimals;
        for old in &self.compartments {
            let block = if old.is_sphere() {
                modified.add_compartment_sphere(&old.specified_name)?
            } else {
                modified.add_compartment_xy_layer(&old.specified_name)?
            };
            let index = modified.compartment_index(&block)?;
            let near_top = self.is_xy_layer_near_top(&old.block_name);
            let near_bottom = self.is_xy_layer_near_bottom(&old.block_name);
            for (row, old_row) in old.rows.iter().enumerate() {
                let fresh = &modified.compartments[index].rows[row];
                if old_row.percent == fresh.percent && old_row.surface_percent == fresh.surface_percent {
                    continue;
                }
                let bulk = &mut modified.bulk[row];
                bulk.percent = comp::round_to(bulk.percent - old_row.percent, decimals);
                if bulk.percent < 0.0 {
                    return Err(CompartmentError::invalid(format!(
                        "bulk percent of {} would become negative",
                        old_row.molecule
                    )));
                }
                let target = &mut modified.compartments[index].rows[row];
                target.percent = old_row.percent;
                let total = target.quantity + bulk.quantity;
                let (bulk_quantity, compartment_quantity) =
                    comp::split_quantities(bulk.percent, old_row.percent, total);
                bulk.quantity = bulk_quantity;
                target.quantity = compartment_quantity;

                modified.resize_compartment(index);
                if near_top {
                    modified.move_xy_layer_to_top(&block)?;
                } else if near_bottom {
                    modified.move_xy_layer_to_bottom(&block)?;
                }
                modified.update_percent_range(row);

                let target = &mut modified.compartments[index].rows[row];
                target.surface_percent = old_row.surface_percent;
                target.update_distribution();
                target.orientation = old_row.orientation.clone();
            }
        }
        Ok(Some(modified))
    }
}
