// Compartment container: bulk and per-compartment chemical composition, the
// geometry records of each compartment in DPD and Angstrom units, and the
// compartment box holding the matching bodies.
//
// Edits return a `ChangeSet` naming every record they touched; the caller
// decides what to refresh. Nothing here calls back into the caller.

mod propagation;
mod schema;

#[cfg(test)]
mod tests;

use crate::body::{Body, BodyGeometry, BodySphere, BodyXyLayer};
use crate::compartment_box::{Axis, CompartmentBox};
use crate::composition::{BulkRow, CompositionRow, JobDefinition, MoleculeInfo, Orientation};
use crate::config::{self, CompartmentConfig};
use crate::error::{CompartmentError, Result};
use crate::geometry::PointInSpace;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Records touched by one edit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub bulk_rows: BTreeSet<usize>,
    pub composition_rows: BTreeSet<(String, usize)>,
    /// Rows whose percent upper bound was recomputed (all compartments).
    pub percent_ranges: BTreeSet<usize>,
    pub geometry: BTreeSet<String>,
    /// Blocks whose out-of-box flag flipped.
    pub errors: BTreeSet<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.bulk_rows.is_empty()
            && self.composition_rows.is_empty()
            && self.percent_ranges.is_empty()
            && self.geometry.is_empty()
            && self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ChangeSet) {
        self.bulk_rows.extend(other.bulk_rows);
        self.composition_rows.extend(other.composition_rows);
        self.percent_ranges.extend(other.percent_ranges);
        self.geometry.extend(other.geometry);
        self.errors.extend(other.errors);
    }
}

/// Which geometry record an edit came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometrySource {
    /// DPD units
    Data,
    /// Angstrom
    Display,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Compartment {
    block_name: String,
    index: usize,
    specified_name: String,
    rows: Vec<CompositionRow>,
    geometry: BodyGeometry,
    display: BodyGeometry,
    error: Option<String>,
}

impl Compartment {
    pub fn block_name(&self) -> &str {
        &self.block_name
    }

    /// Sortable index shared by the block name and all record names.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn specified_name(&self) -> &str {
        &self.specified_name
    }

    pub fn rows(&self) -> &[CompositionRow] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> Option<&CompositionRow> {
        self.rows.get(row)
    }

    /// Geometry in DPD units.
    pub fn geometry(&self) -> &BodyGeometry {
        &self.geometry
    }

    /// Geometry in Angstrom.
    pub fn display_geometry(&self) -> &BodyGeometry {
        &self.display
    }

    pub fn is_sphere(&self) -> bool {
        matches!(self.geometry, BodyGeometry::Sphere(_))
    }

    pub fn is_xy_layer(&self) -> bool {
        matches!(self.geometry, BodyGeometry::XyLayer(_))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_out_of_box(&self) -> bool {
        self.error.is_some()
    }

    pub fn number_of_particles(&self, molecules: &[MoleculeInfo]) -> u64 {
        crate::composition::number_of_particles(&self.rows, molecules)
    }
}

/// `geometry` with center and sizes multiplied by `factor`.
pub fn scaled_geometry(geometry: &BodyGeometry, factor: f64) -> BodyGeometry {
    let c = geometry.center();
    let center = PointInSpace::new(c.x * factor, c.y * factor, c.z * factor);
    match geometry {
        BodyGeometry::Sphere(s) => BodyGeometry::Sphere(BodySphere { center, radius: s.radius * factor }),
        BodyGeometry::XyLayer(l) => BodyGeometry::XyLayer(BodyXyLayer {
            center,
            x_length: l.x_length * factor,
            y_length: l.y_length * factor,
            z_length: l.z_length * factor,
        }),
    }
}

fn validated_record(geometry: &BodyGeometry) -> Result<BodyGeometry> {
    Ok(match geometry {
        BodyGeometry::Sphere(s) => BodyGeometry::Sphere(BodySphere::from_record(s.center, s.radius)?),
        BodyGeometry::XyLayer(l) => BodyGeometry::XyLayer(BodyXyLayer::from_record(
            l.center, l.x_length, l.y_length, l.z_length,
        )?),
    })
}

#[derive(Clone, Debug)]
pub struct CompartmentContainer {
    job: JobDefinition,
    config: CompartmentConfig,
    length_conversion_factor: f64,
    random_seed: u64,
    bulk: Vec<BulkRow>,
    compartments: Vec<Compartment>,
    compartment_box: CompartmentBox,
}

impl CompartmentContainer {
    pub fn new(job: JobDefinition, config: CompartmentConfig) -> Result<Self> {
        job.validate()?;
        let config = config.sanitized();
        let compartment_box =
            CompartmentBox::new(job.x_length, job.y_length, job.z_length)?.with_config(&config);
        let bulk = job.molecules.iter().map(BulkRow::for_molecule).collect();
        Ok(Self {
            length_conversion_factor: job.length_conversion_factor(),
            random_seed: job.random_seed(),
            job,
            config,
            bulk,
            compartments: Vec::new(),
            compartment_box,
        })
    }

    pub fn job(&self) -> &JobDefinition {
        &self.job
    }

    pub fn config(&self) -> &CompartmentConfig {
        &self.config
    }

    pub fn molecules(&self) -> &[MoleculeInfo] {
        &self.job.molecules
    }

    pub fn compartment_box(&self) -> &CompartmentBox {
        &self.compartment_box
    }

    /// Mutable box for view, selection and sampling. Body geometry must be
    /// edited through the container so records stay in sync.
    pub fn compartment_box_mut(&mut self) -> &mut CompartmentBox {
        &mut self.compartment_box
    }

    pub fn length_conversion_factor(&self) -> f64 {
        self.length_conversion_factor
    }

    pub fn geometry_random_seed(&self) -> u64 {
        self.random_seed
    }

    pub fn set_geometry_random_seed(&mut self, seed: u64) {
        self.random_seed = seed;
    }

    pub fn bulk(&self) -> &[BulkRow] {
        &self.bulk
    }

    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    pub fn compartment(&self, block_name: &str) -> Option<&Compartment> {
        self.compartments.iter().find(|c| c.block_name == block_name)
    }

    pub fn block_names(&self) -> Vec<&str> {
        self.compartments.iter().map(|c| c.block_name.as_str()).collect()
    }

    pub fn has_compartments(&self) -> bool {
        !self.compartments.is_empty()
    }

    pub fn is_compartment(&self, block_name: &str) -> bool {
        self.compartment(block_name).is_some()
    }

    pub fn is_sphere_compartment(&self, block_name: &str) -> bool {
        self.compartment(block_name).is_some_and(Compartment::is_sphere)
    }

    pub fn is_xy_layer_compartment(&self, block_name: &str) -> bool {
        self.compartment(block_name).is_some_and(Compartment::is_xy_layer)
    }

    pub fn has_error(&self) -> bool {
        self.compartments.iter().any(Compartment::is_out_of_box)
    }

    pub fn has_protein_data(&self) -> bool {
        self.job.molecules.iter().any(|m| m.protein)
    }

    pub fn total_number_of_particles(&self) -> u64 {
        self.job.total_number_of_particles()
    }

    /// Standard particle radius in DPD units (sphere of volume 1/density).
    pub fn standard_particle_radius(&self) -> f64 {
        (config::FACTOR_3_DIV_4_PI / self.job.density).cbrt()
    }

    /// Start positions for the molecules of composition row `row` in
    /// `block`: `quantity_in_volume` points in the body volume avoiding its
    /// reserved spheres, then `quantity_on_surface` points on the surface the
    /// orientation selects. A simple cubic lattice row fills the layer with
    /// all of its molecules at a bond length of two standard particle radii.
    pub fn molecule_positions<R: Rng + ?Sized>(
        &self,
        block_name: &str,
        row: usize,
        rng: &mut R,
    ) -> Result<Vec<PointInSpace>> {
        let compartment = self
            .compartment(block_name)
            .ok_or_else(|| CompartmentError::UnknownBlock(block_name.to_string()))?;
        let composition = compartment.rows.get(row).ok_or_else(|| CompartmentError::RowOutOfRange {
            block: block_name.to_string(),
            row,
        })?;
        let body = self
            .compartment_box
            .get_body(block_name)
            .ok_or_else(|| CompartmentError::UnknownBlock(block_name.to_string()))?;
        let in_volume = composition.quantity_in_volume as usize;
        let on_surface = composition.quantity_on_surface as usize;
        let selected = composition.orientation.selected;

        if selected == Orientation::SimpleCubicLattice {
            let BodyGeometry::XyLayer(layer) = &compartment.geometry else {
                return Err(CompartmentError::invalid("a simple cubic lattice needs an xy-layer"));
            };
            if in_volume + on_surface == 0 {
                return Ok(Vec::new());
            }
            let bond_length = 2.0 * self.standard_particle_radius();
            return layer
                .simple_cubic_lattice_points(in_volume + on_surface, bond_length)
                .ok_or_else(|| {
                    CompartmentError::invalid(format!(
                        "{block_name} is too thin for a lattice with bond length {bond_length}"
                    ))
                });
        }

        let mut positions = body.random_points_in_volume(in_volume, self.config.number_of_trials, rng);
        if on_surface > 0 {
            let surface = body
                .random_points_on_surface(selected, on_surface, rng)
                .ok_or_else(|| CompartmentError::invalid(format!("{block_name} has no surface")))?;
            positions.extend(surface);
        }
        Ok(positions)
    }

    pub(crate) fn compartment_index(&self, block_name: &str) -> Result<usize> {
        self.compartments
            .iter()
            .position(|c| c.block_name == block_name)
            .ok_or_else(|| CompartmentError::UnknownBlock(block_name.to_string()))
    }

    // ---- compartment lifecycle ----

    /// Adds an empty sphere compartment centred in the box; returns its block name.
    pub fn add_compartment_sphere(&mut self, specified_name: &str) -> Result<String> {
        let (x, y, z) = (self.job.x_length, self.job.y_length, self.job.z_length);
        let center = PointInSpace::new(0.5 * x, 0.5 * y, 0.5 * z);
        let geometry = BodyGeometry::Sphere(BodySphere::from_record(center, 0.0)?);
        self.add_compartment(config::COMPARTMENT_BLOCK_SPHERE, specified_name, geometry)
    }

    /// Adds an empty xy-layer spanning the box in x and y; returns its block name.
    pub fn add_compartment_xy_layer(&mut self, specified_name: &str) -> Result<String> {
        let (x, y, z) = (self.job.x_length, self.job.y_length, self.job.z_length);
        let center = PointInSpace::new(0.5 * x, 0.5 * y, 0.5 * z);
        let geometry = BodyGeometry::XyLayer(BodyXyLayer::from_record(center, x, y, 0.0)?);
        self.add_compartment(config::COMPARTMENT_BLOCK_XY_LAYER, specified_name, geometry)
    }

    fn next_block_index(&self, prefix: &str) -> Result<usize> {
        (1..=config::MAXIMUM_NUMBER_OF_COMPARTMENTS)
            .find(|&i| !self.is_compartment(&block_name(prefix, i)))
            .ok_or_else(|| CompartmentError::invalid("maximum number of compartments reached"))
    }

    fn add_compartment(
        &mut self,
        prefix: &str,
        specified_name: &str,
        geometry: BodyGeometry,
    ) -> Result<String> {
        let index = self.next_block_index(prefix)?;
        let block = block_name(prefix, index);
        let rows = self
            .job
            .molecules
            .iter()
            .zip(&self.bulk)
            .map(|(molecule, bulk)| CompositionRow::empty(molecule, bulk.percent))
            .collect();
        let compartment = Compartment {
            block_name: block.clone(),
            index,
            specified_name: specified_name.to_string(),
            rows,
            display: scaled_geometry(&geometry, self.length_conversion_factor),
            geometry,
            error: None,
        };
        self.insert_compartment(compartment)?;
        log::debug!("added compartment {block}");
        Ok(block)
    }

    /// Registers a compartment and its body, keeping block-name order.
    fn insert_compartment(&mut self, compartment: Compartment) -> Result<()> {
        let body = Body::new(compartment.block_name.clone(), compartment.geometry.clone())?;
        if !self.compartment_box.add_body(body) {
            return Err(CompartmentError::invalid(format!(
                "duplicate compartment block {}",
                compartment.block_name
            )));
        }
        let position = self
            .compartments
            .partition_point(|c| c.block_name < compartment.block_name);
        self.compartments.insert(position, compartment);
        Ok(())
    }

    /// Returns the compartment's molecules to the bulk and drops its body.
    pub fn remove_compartment(&mut self, block_name: &str) -> bool {
        let Ok(index) = self.compartment_index(block_name) else {
            return false;
        };
        let compartment = self.compartments.remove(index);
        let decimals = self.config.composition_decimals;
        for (bulk, row) in self.bulk.iter_mut().zip(&compartment.rows) {
            bulk.percent = crate::composition::round_to(bulk.percent + row.percent, decimals);
            bulk.quantity += row.quantity;
        }
        for row in 0..self.bulk.len() {
            self.update_percent_range(row);
        }
        self.compartment_box.remove_body(block_name);
        log::debug!("removed compartment {block_name}");
        true
    }

    /// Removes every compartment.
    pub fn clear(&mut self) {
        let blocks: Vec<String> = self.compartments.iter().map(|c| c.block_name.clone()).collect();
        for block in blocks {
            self.remove_compartment(&block);
        }
        self.compartment_box.clear();
    }

    // ---- geometry ----

    /// Replaces a compartment's geometry from either record and re-derives
    /// the other one. The body kind must match.
    pub fn set_geometry(
        &mut self,
        block_name: &str,
        source: GeometrySource,
        geometry: BodyGeometry,
    ) -> Result<ChangeSet> {
        let index = self.compartment_index(block_name)?;
        let geometry = validated_record(&geometry)?;
        let compartment = &mut self.compartments[index];
        if std::mem::discriminant(&compartment.geometry) != std::mem::discriminant(&geometry) {
            return Err(CompartmentError::invalid(format!(
                "geometry kind does not match compartment {block_name}"
            )));
        }
        match source {
            GeometrySource::Data => compartment.geometry = geometry,
            GeometrySource::Display => compartment.display = geometry,
        }
        Ok(self.check_compartment_geometry(index, source))
    }

    pub fn set_geometry_data(&mut self, block_name: &str, geometry: BodyGeometry) -> Result<ChangeSet> {
        self.set_geometry(block_name, GeometrySource::Data, geometry)
    }

    pub fn set_geometry_display(&mut self, block_name: &str, geometry: BodyGeometry) -> Result<ChangeSet> {
        self.set_geometry(block_name, GeometrySource::Display, geometry)
    }

    /// Brings both records in line with the edited one, pushes the geometry
    /// into the box and sets or clears the out-of-box flag.
    pub(crate) fn check_compartment_geometry(&mut self, index: usize, source: GeometrySource) -> ChangeSet {
        let factor = self.length_conversion_factor;
        let compartment = &mut self.compartments[index];
        match source {
            GeometrySource::Data => compartment.display = scaled_geometry(&compartment.geometry, factor),
            GeometrySource::Display => {
                compartment.geometry = scaled_geometry(&compartment.display, 1.0 / factor)
            }
        }
        let block = compartment.block_name.clone();
        let geometry = compartment.geometry.clone();
        let out_of_box = self.compartment_box.is_out_of_box(&geometry);
        self.compartment_box.update_body_geometry(&block, geometry);

        let compartment = &mut self.compartments[index];
        let mut changes = ChangeSet::default();
        changes.geometry.insert(block.clone());
        let was_out = compartment.error.is_some();
        compartment.error = out_of_box.then(|| config::OUT_OF_BOX_ERROR.to_string());
        if was_out != out_of_box {
            if out_of_box {
                log::warn!("compartment {block} is out of the simulation box");
            }
            changes.errors.insert(block);
        }
        changes
    }

    /// Moves an out-of-box compartment back inside.
    pub fn correct_out_of_box(&mut self, block_name: &str) -> Result<ChangeSet> {
        let index = self.compartment_index(block_name)?;
        let geometry = &self.compartments[index].geometry;
        let center = self.compartment_box.correct_out_of_box(&geometry.center(), geometry);
        self.compartments[index].geometry.set_center(center);
        Ok(self.check_compartment_geometry(index, GeometrySource::Data))
    }

    pub fn is_xy_layer_near_top(&self, block_name: &str) -> bool {
        self.compartment(block_name)
            .filter(|c| c.is_xy_layer())
            .is_some_and(|c| self.compartment_box.is_near_top_of_box(&c.geometry))
    }

    pub fn is_xy_layer_near_bottom(&self, block_name: &str) -> bool {
        self.compartment(block_name)
            .filter(|c| c.is_xy_layer())
            .is_some_and(|c| self.compartment_box.is_near_bottom_of_box(&c.geometry))
    }

    pub fn move_xy_layer_to_top(&mut self, block_name: &str) -> Result<ChangeSet> {
        let index = self.layer_index(block_name)?;
        let moved = self.compartment_box.moved_to_top_of_box(&self.compartments[index].geometry);
        self.compartments[index].geometry = moved;
        Ok(self.check_compartment_geometry(index, GeometrySource::Data))
    }

    pub fn move_xy_layer_to_bottom(&mut self, block_name: &str) -> Result<ChangeSet> {
        let index = self.layer_index(block_name)?;
        let moved = self.compartment_box.moved_to_bottom_of_box(&self.compartments[index].geometry);
        self.compartments[index].geometry = moved;
        Ok(self.check_compartment_geometry(index, GeometrySource::Data))
    }

    fn layer_index(&self, block_name: &str) -> Result<usize> {
        let index = self.compartment_index(block_name)?;
        if !self.compartments[index].is_xy_layer() {
            return Err(CompartmentError::invalid(format!("{block_name} is not an xy-layer")));
        }
        Ok(index)
    }

    /// Magnifies a compartment body along `axis`. `None` when the box rejects
    /// the edit; the records are left untouched in that case.
    pub fn magnify_compartment(&mut self, block_name: &str, axis: Axis, offset: f64) -> Option<ChangeSet> {
        let index = self.compartment_index(block_name).ok()?;
        let geometry = self.compartment_box.magnify_body(block_name, axis, offset)?;
        self.compartments[index].geometry = geometry;
        Some(self.check_compartment_geometry(index, GeometrySource::Data))
    }

    /// Serializes to the versioned XML form.
    pub fn to_xml_string(&self) -> Result<String> {
        crate::io::write_value_items_xml(&self.to_value_items())
    }

    pub fn try_from_xml_str(xml: &str, config: CompartmentConfig) -> Result<Self> {
        let items = crate::io::read_value_items_xml(xml)?;
        Self::from_value_items(&items, config)
    }

    /// Rebuilds a container from XML; failures are logged and yield `None`.
    pub fn from_xml_str(xml: &str, config: CompartmentConfig) -> Option<Self> {
        match Self::try_from_xml_str(xml, config) {
            Ok(container) => Some(container),
            Err(e) => {
                log::warn!("compartment container could not be read from XML: {e}");
                None
            }
        }
    }
}

pub(crate) fn block_name(prefix: &str, index: usize) -> String {
    let width = config::MAXIMUM_NUMBER_OF_COMPARTMENTS.to_string().len();
    format!("{prefix}{index:0width$}")
}
