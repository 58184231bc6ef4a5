// compartment_container/schema.rs
// Typed container <-> block/name addressed value items.
//
// Hidden block: box, density, molecule and particle catalogs, length
// conversion factor, random seed. Bulk block: one composition row per
// molecule. Compartment blocks: composition (position 0), geometry data in DPD
// units (1), geometry display in Angstrom followed by the DPD mirror (2) and
// the specified name (3).

use super::{block_name, Compartment, CompartmentContainer, GeometrySource};
use crate::body::{BodyGeometry, BodySphere, BodyXyLayer};
use crate::composition::orientation::{self, Orientation, OrientationChoice, OrientationOptions};
use crate::composition::{BulkRow, CompositionRow, JobDefinition, MoleculeInfo, ParticleInfo};
use crate::config::{self, CompartmentConfig};
use crate::error::{CompartmentError, Result};
use crate::geometry::PointInSpace;
use crate::value_item::{ValueItem, ValueItemContainer};

const SPHERE_COLUMNS: usize = 4;
const XY_LAYER_COLUMNS: usize = 6;
const OPTION_SEPARATOR: char = '|';

fn options_to_string(options: &OrientationOptions) -> String {
    options
        .iter()
        .map(Orientation::as_str)
        .collect::<Vec<_>>()
        .join(&OPTION_SEPARATOR.to_string())
}

fn options_from_str(raw: &str) -> Result<OrientationOptions> {
    raw.split(OPTION_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Option set for saves that only stored the selection.
fn legacy_options(selected: Orientation) -> OrientationOptions {
    [
        orientation::none_only(),
        orientation::random_only(),
        orientation::random_3d(),
        orientation::sphere_surfaces(),
        orientation::layer_surfaces_with_lattice(),
    ]
    .into_iter()
    .find(|set| set.contains(&selected))
    .unwrap_or_else(|| smallvec::smallvec![selected])
}

fn orientation_from_cells(item: &ValueItem, row: usize, column: usize) -> Result<OrientationChoice> {
    let selected: Orientation = item.cell(row, column)?.parse()?;
    let options = match item.cell(row, column + 1) {
        Ok(raw) => options_from_str(raw)?,
        Err(_) => legacy_options(selected),
    };
    Ok(OrientationChoice::new(selected, options))
}

fn geometry_cells(geometry: &BodyGeometry) -> Vec<String> {
    let c = geometry.center();
    let mut cells = vec![c.x, c.y, c.z];
    match geometry {
        BodyGeometry::Sphere(s) => cells.push(s.radius),
        BodyGeometry::XyLayer(l) => cells.extend([l.x_length, l.y_length, l.z_length]),
    }
    cells.into_iter().map(|v| v.to_string()).collect()
}

fn geometry_from_record(item: &ValueItem, sphere: bool) -> Result<BodyGeometry> {
    let v = |column: usize| item.parse_cell::<f64>(0, column);
    let center = PointInSpace::new(v(0)?, v(1)?, v(2)?);
    Ok(if sphere {
        BodyGeometry::Sphere(BodySphere::from_record(center, v(3)?)?)
    } else {
        BodyGeometry::XyLayer(BodyXyLayer::from_record(center, v(3)?, v(4)?, v(5)?)?)
    })
}

/// Rows keyed by molecule name, returned in catalog order.
fn reorder_rows<T>(rows: Vec<(String, T)>, molecules: &[MoleculeInfo], record: &str) -> Result<Vec<T>> {
    let mut rows: Vec<Option<(String, T)>> = rows.into_iter().map(Some).collect();
    molecules
        .iter()
        .map(|m| {
            rows.iter_mut()
                .find(|r| r.as_ref().is_some_and(|(name, _)| *name == m.name))
                .and_then(Option::take)
                .map(|(_, row)| row)
                .ok_or_else(|| {
                    CompartmentError::malformed(format!("{record} has no row for molecule {}", m.name))
                })
        })
        .collect()
}

struct RecordNames {
    composition: String,
    data: String,
    display: String,
    specified_name: String,
}

fn record_names(sphere: bool, index: usize) -> RecordNames {
    let (part, specified) = if sphere {
        (config::COMPARTMENT_SPHERE_NAME_PART, config::COMPARTMENT_SPHERE_SPECIFIED_NAME)
    } else {
        (config::COMPARTMENT_XY_LAYER_NAME_PART, config::COMPARTMENT_XY_LAYER_SPECIFIED_NAME)
    };
    let geometry = |record: &str| format!("{}{part}{record}{index}", config::GEOMETRY_PREFIX_NAME);
    RecordNames {
        composition: format!("{}{part}{index}", config::CHEMICAL_COMPOSITION_PREFIX_NAME),
        data: geometry(config::GEOMETRY_DATA_NAME_PART),
        display: geometry(config::GEOMETRY_DISPLAY_NAME_PART),
        specified_name: format!("{specified}_{index}"),
    }
}

impl CompartmentContainer {
    pub fn to_value_items(&self) -> ValueItemContainer {
        let mut items = ValueItemContainer::new();
        let hidden = config::COMPARTMENT_BLOCK_HIDDEN;
        let job = &self.job;
        items.insert(ValueItem::matrix(
            config::BOX_INFO_NAME,
            hidden,
            0,
            vec![vec![job.x_length.to_string(), job.y_length.to_string(), job.z_length.to_string()]],
        ));
        items.insert(ValueItem::scalar(config::DENSITY_INFO_NAME, hidden, 1, job.density));
        items.insert(ValueItem::matrix(
            config::MOLECULE_INFO_NAME,
            hidden,
            2,
            job.molecules
                .iter()
                .map(|m| {
                    vec![
                        m.name.clone(),
                        m.structure.clone(),
                        m.quantity.to_string(),
                        m.particles_per_molecule.to_string(),
                        m.protein.to_string(),
                    ]
                })
                .collect(),
        ));
        items.insert(ValueItem::matrix(
            config::PARTICLE_INFO_NAME,
            hidden,
            3,
            job.particles
                .iter()
                .map(|p| vec![p.symbol.clone(), p.name.clone(), p.volume.to_string()])
                .collect(),
        ));
        items.insert(ValueItem::scalar(
            config::COMPARTMENT_LENGTH_CONVERSION_NAME,
            hidden,
            4,
            self.length_conversion_factor,
        ));
        items.insert(ValueItem::scalar(
            config::COMPARTMENT_GEOMETRY_RANDOM_SEED_NAME,
            hidden,
            5,
            self.random_seed,
        ));

        items.insert(ValueItem::matrix(
            config::COMPARTMENT_BULK_NAME,
            config::COMPARTMENT_BLOCK_BULK,
            0,
            self.bulk
                .iter()
                .map(|b| {
                    vec![
                        b.molecule.clone(),
                        b.structure.clone(),
                        b.percent.to_string(),
                        b.quantity.to_string(),
                        b.orientation.selected.as_str().to_string(),
                        options_to_string(&b.orientation.options),
                    ]
                })
                .collect(),
        ));

        for compartment in &self.compartments {
            let names = record_names(compartment.is_sphere(), compartment.index);
            let block = compartment.block_name.as_str();
            let rows = compartment
                .rows
                .iter()
                .map(|r| {
                    vec![
                        r.molecule.clone(),
                        r.structure.clone(),
                        r.percent.to_string(),
                        r.quantity.to_string(),
                        r.surface_percent.to_string(),
                        r.quantity_in_volume.to_string(),
                        r.quantity_on_surface.to_string(),
                        r.orientation.selected.as_str().to_string(),
                        options_to_string(&r.orientation.options),
                    ]
                })
                .collect();
            items.insert(ValueItem::matrix(names.composition, block, 0, rows));
            let data = geometry_cells(&compartment.geometry);
            let mut display = geometry_cells(&compartment.display);
            display.extend(data.iter().cloned());
            items.insert(
                ValueItem::matrix(names.data, block, 1, vec![data]).with_error(compartment.error.clone()),
            );
            items.insert(
                ValueItem::matrix(names.display, block, 2, vec![display])
                    .with_error(compartment.error.clone()),
            );
            items.insert(ValueItem::scalar(
                names.specified_name,
                block,
                3,
                &compartment.specified_name,
            ));
        }
        items
    }

    /// Rebuilds a container from persisted records, filling defaults for
    /// fields older saves lack.
    pub fn from_value_items(items: &ValueItemContainer, config: CompartmentConfig) -> Result<Self> {
        let box_info = items.require(config::BOX_INFO_NAME)?;
        let molecules = items
            .require(config::MOLECULE_INFO_NAME)?
            .rows()?
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let cell = |c: usize| {
                    row.get(c).ok_or_else(|| {
                        CompartmentError::malformed(format!("molecule row {i} lacks column {c}"))
                    })
                };
                let parse_err = |c: usize| CompartmentError::malformed(format!("molecule row {i} column {c}"));
                Ok(MoleculeInfo {
                    name: cell(0)?.clone(),
                    structure: cell(1)?.clone(),
                    quantity: cell(2)?.parse().map_err(|_| parse_err(2))?,
                    particles_per_molecule: cell(3)?.parse().map_err(|_| parse_err(3))?,
                    protein: row.get(4).map(|p| p == "true").unwrap_or(false),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let particles = match items.get(config::PARTICLE_INFO_NAME) {
            Some(item) => (0..item.row_count())
                .map(|r| {
                    Ok(ParticleInfo {
                        symbol: item.cell(r, 0)?.to_string(),
                        name: item.cell(r, 1)?.to_string(),
                        volume: item.parse_cell(r, 2)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let random_seed = match items.get(config::COMPARTMENT_GEOMETRY_RANDOM_SEED_NAME) {
            Some(item) => item.parse_scalar()?,
            None => {
                log::debug!("no geometry random seed stored, using default");
                config::DETERMINISTIC_RANDOM_SEED_DEFAULT
            }
        };
        let job = JobDefinition {
            x_length: box_info.parse_cell(0, 0)?,
            y_length: box_info.parse_cell(0, 1)?,
            z_length: box_info.parse_cell(0, 2)?,
            density: items.require(config::DENSITY_INFO_NAME)?.parse_scalar()?,
            molecules,
            particles,
            length_conversion_factor: Some(
                items.require(config::COMPARTMENT_LENGTH_CONVERSION_NAME)?.parse_scalar()?,
            ),
            random_seed: Some(random_seed),
        };
        let mut container = CompartmentContainer::new(job, config)?;

        let bulk_item = items.require(config::COMPARTMENT_BULK_NAME)?;
        let bulk_rows = (0..bulk_item.row_count())
            .map(|r| {
                let row = BulkRow {
                    molecule: bulk_item.cell(r, 0)?.to_string(),
                    structure: bulk_item.cell(r, 1)?.to_string(),
                    percent: bulk_item.parse_cell(r, 2)?,
                    quantity: bulk_item.parse_cell(r, 3)?,
                    orientation: orientation_from_cells(bulk_item, r, 4)?,
                };
                Ok((row.molecule.clone(), row))
            })
            .collect::<Result<Vec<_>>>()?;
        container.bulk = reorder_rows(bulk_rows, &container.job.molecules, config::COMPARTMENT_BULK_NAME)?;

        for block in items.block_names() {
            let (sphere, prefix) = if block.starts_with(config::COMPARTMENT_BLOCK_SPHERE) {
                (true, config::COMPARTMENT_BLOCK_SPHERE)
            } else if block.starts_with(config::COMPARTMENT_BLOCK_XY_LAYER) {
                (false, config::COMPARTMENT_BLOCK_XY_LAYER)
            } else {
                continue;
            };
            let index: usize = block[prefix.len()..]
                .parse()
                .map_err(|_| CompartmentError::malformed(format!("bad block name {block}")))?;
            if block_name(prefix, index) != block {
                return Err(CompartmentError::malformed(format!("bad block name {block}")));
            }
            let compartment = container.compartment_from_block(items, &block, index, sphere)?;
            container.insert_compartment(compartment)?;
        }

        for index in 0..container.compartments.len() {
            container.check_compartment_geometry(index, GeometrySource::Data);
        }
        for row in 0..container.bulk.len() {
            container.update_percent_range(row);
            container.warn_on_broken_percent_sum(row);
        }
        Ok(container)
    }

    /// Bulk and compartment percents of a molecule row must add up to 100.
    /// Files that break this still load; the row is reported once.
    pub(super) fn warn_on_broken_percent_sum(&self, row: usize) -> bool {
        let total = self.bulk[row].percent
            + self.compartments.iter().map(|c| c.rows[row].percent).sum::<f64>();
        // each rounded percent may be off by half a unit in the last decimal
        let unit = 10f64.powi(-(self.config.composition_decimals as i32));
        let tolerance = 0.5 * unit * (1 + self.compartments.len()) as f64;
        let broken = (total - 100.0).abs() > tolerance;
        if broken {
            log::warn!(
                "percentages of {} add up to {total} instead of 100",
                self.bulk[row].molecule
            );
        }
        broken
    }

    fn compartment_from_block(
        &self,
        items: &ValueItemContainer,
        block: &str,
        index: usize,
        sphere: bool,
    ) -> Result<Compartment> {
        let names = record_names(sphere, index);
        let missing = |name: &str| CompartmentError::malformed(format!("block {block} lacks {name}"));
        let composition = items
            .item_of_block(block, &names.composition)
            .ok_or_else(|| missing(names.composition.as_str()))?;
        let rows = (0..composition.row_count())
            .map(|r| {
                let row = CompositionRow {
                    molecule: composition.cell(r, 0)?.to_string(),
                    structure: composition.cell(r, 1)?.to_string(),
                    percent: composition.parse_cell(r, 2)?,
                    max_percent: 0.0,
                    quantity: composition.parse_cell(r, 3)?,
                    surface_percent: composition.parse_cell(r, 4)?,
                    quantity_in_volume: composition.parse_cell(r, 5)?,
                    quantity_on_surface: composition.parse_cell(r, 6)?,
                    orientation: orientation_from_cells(composition, r, 7)?,
                };
                Ok((row.molecule.clone(), row))
            })
            .collect::<Result<Vec<_>>>()?;
        let rows = reorder_rows(rows, &self.job.molecules, &names.composition)?;

        let data = items
            .item_of_block(block, &names.data)
            .ok_or_else(|| missing(names.data.as_str()))?;
        let geometry = geometry_from_record(data, sphere)?;
        if let Some(display) = items.item_of_block(block, &names.display) {
            let plain = if sphere { SPHERE_COLUMNS } else { XY_LAYER_COLUMNS };
            if display.rows()?.first().map(Vec::len) == Some(plain) {
                log::debug!("upgrading display record {} with DPD mirror columns", names.display);
            }
        }
        let specified_name = items
            .item_of_block(block, &names.specified_name)
            .map(|item| item.scalar_value().map(str::to_string))
            .transpose()?
            .unwrap_or_default();

        Ok(Compartment {
            block_name: block.to_string(),
            index,
            specified_name,
            rows,
            display: super::scaled_geometry(&geometry, self.length_conversion_factor),
            geometry,
            error: data.error.clone(),
        })
    }
}
