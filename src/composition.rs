// Chemical composition of the bulk and of compartments: job input types,
// typed table rows and the closed-form size formulas used when molecules move
// between bulk and a compartment.

pub mod orientation;

#[cfg(test)]
mod tests;

pub use orientation::{Orientation, OrientationChoice, OrientationOptions};

use crate::config;
use crate::error::{CompartmentError, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoleculeInfo {
    pub name: String,
    pub structure: String,
    pub quantity: u64,
    pub particles_per_molecule: u64,
    #[serde(default)]
    pub protein: bool,
}

impl MoleculeInfo {
    pub fn new(
        name: impl Into<String>,
        structure: impl Into<String>,
        quantity: u64,
        particles_per_molecule: u64,
    ) -> Self {
        Self {
            name: name.into(),
            structure: structure.into(),
            quantity,
            particles_per_molecule,
            protein: false,
        }
    }

    pub fn with_protein(mut self, protein: bool) -> Self {
        self.protein = protein;
        self
    }

    /// Same molecule type; quantities may differ.
    pub fn is_same_molecule(&self, other: &MoleculeInfo) -> bool {
        self.name == other.name
            && self.structure == other.structure
            && self.particles_per_molecule == other.particles_per_molecule
            && self.protein == other.protein
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleInfo {
    pub symbol: String,
    pub name: String,
    /// Particle volume in cubic Angstrom.
    pub volume: f64,
}

/// Everything the container needs from the surrounding job: box size, density
/// and molecule/particle catalogs. Replaces process-global lookups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub x_length: f64,
    pub y_length: f64,
    pub z_length: f64,
    pub density: f64,
    pub molecules: Vec<MoleculeInfo>,
    #[serde(default)]
    pub particles: Vec<ParticleInfo>,
    #[serde(default)]
    pub length_conversion_factor: Option<f64>,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl JobDefinition {
    pub fn new(
        (x_length, y_length, z_length): (f64, f64, f64),
        density: f64,
        molecules: Vec<MoleculeInfo>,
        particles: Vec<ParticleInfo>,
    ) -> Result<Self> {
        let job = Self {
            x_length,
            y_length,
            z_length,
            density,
            molecules,
            particles,
            length_conversion_factor: None,
            random_seed: None,
        };
        job.validate()?;
        Ok(job)
    }

    pub fn with_length_conversion_factor(mut self, factor: f64) -> Result<Self> {
        self.length_conversion_factor = Some(factor);
        self.validate()?;
        Ok(self)
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (axis, length) in [("x", self.x_length), ("y", self.y_length), ("z", self.z_length)] {
            if !(length > 0.0) || !length.is_finite() {
                return Err(CompartmentError::invalid(format!(
                    "box {axis} length must be positive, got {length}"
                )));
            }
        }
        if !(self.density > 0.0) || !self.density.is_finite() {
            return Err(CompartmentError::invalid(format!(
                "density must be positive, got {}",
                self.density
            )));
        }
        if self.molecules.is_empty() {
            return Err(CompartmentError::invalid("at least one molecule is required"));
        }
        for (i, molecule) in self.molecules.iter().enumerate() {
            if molecule.name.is_empty() {
                return Err(CompartmentError::invalid(format!("molecule {i} has no name")));
            }
            if molecule.particles_per_molecule == 0 {
                return Err(CompartmentError::invalid(format!(
                    "molecule {} must have at least one particle",
                    molecule.name
                )));
            }
            if self.molecules[..i].iter().any(|m| m.name == molecule.name) {
                return Err(CompartmentError::invalid(format!(
                    "duplicate molecule name {}",
                    molecule.name
                )));
            }
        }
        if let Some(particle) = self.particles.iter().find(|p| !(p.volume > 0.0)) {
            return Err(CompartmentError::invalid(format!(
                "particle {} must have a positive volume",
                particle.symbol
            )));
        }
        match self.length_conversion_factor {
            Some(f) if !(f > 0.0) || !f.is_finite() => Err(CompartmentError::invalid(format!(
                "length conversion factor must be positive, got {f}"
            ))),
            Some(_) => Ok(()),
            None if self.particles.is_empty() => Err(CompartmentError::invalid(
                "particles are required when no length conversion factor is given",
            )),
            None => Ok(()),
        }
    }

    /// DPD length to Angstrom. Explicit value, else `cbrt(density · V)` with
    /// the smallest particle volume as the standard particle.
    pub fn length_conversion_factor(&self) -> f64 {
        if let Some(factor) = self.length_conversion_factor {
            return factor;
        }
        let standard_volume = self
            .particles
            .iter()
            .map(|p| p.volume)
            .fold(f64::INFINITY, f64::min);
        if standard_volume.is_finite() {
            (self.density * standard_volume).cbrt()
        } else {
            1.0
        }
    }

    pub fn random_seed(&self) -> u64 {
        self.random_seed.unwrap_or(config::DETERMINISTIC_RANDOM_SEED_DEFAULT)
    }

    pub fn total_number_of_particles(&self) -> u64 {
        self.molecules
            .iter()
            .map(|m| m.quantity * m.particles_per_molecule)
            .sum()
    }

    pub fn has_same_molecules(&self, other: &JobDefinition) -> bool {
        self.molecules.len() == other.molecules.len()
            && self
                .molecules
                .iter()
                .zip(&other.molecules)
                .all(|(a, b)| a.is_same_molecule(b))
    }
}

/// Bulk row: molecules not assigned to any compartment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulkRow {
    pub molecule: String,
    pub structure: String,
    pub percent: f64,
    pub quantity: u64,
    pub orientation: OrientationChoice,
}

impl BulkRow {
    pub fn for_molecule(molecule: &MoleculeInfo) -> Self {
        Self {
            molecule: molecule.name.clone(),
            structure: molecule.structure.clone(),
            percent: 100.0,
            quantity: molecule.quantity,
            orientation: OrientationChoice::bulk(molecule.protein),
        }
    }
}

/// One molecule row of a compartment's composition table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositionRow {
    pub molecule: String,
    pub structure: String,
    pub percent: f64,
    /// Live upper bound: own percent plus the current bulk percent.
    pub max_percent: f64,
    pub quantity: u64,
    pub surface_percent: f64,
    pub quantity_in_volume: u64,
    pub quantity_on_surface: u64,
    pub orientation: OrientationChoice,
}

impl CompositionRow {
    pub fn empty(molecule: &MoleculeInfo, bulk_percent: f64) -> Self {
        Self {
            molecule: molecule.name.clone(),
            structure: molecule.structure.clone(),
            percent: 0.0,
            max_percent: bulk_percent,
            quantity: 0,
            surface_percent: 0.0,
            quantity_in_volume: 0,
            quantity_on_surface: 0,
            orientation: OrientationChoice::none(),
        }
    }

    pub fn is_surface_occupied(&self) -> bool {
        self.surface_percent > 0.0
    }

    /// Recomputes the volume/surface split from quantity and surface percent.
    pub fn update_distribution(&mut self) {
        let (volume, surface) = split_volume_surface(self.quantity, self.surface_percent);
        self.quantity_in_volume = volume;
        self.quantity_on_surface = surface;
    }
}

/// Truncates (never rounds) to `decimals` places. Used for sizes so a body is
/// always marginally smaller than its exact value.
pub fn truncate(value: f64, decimals: u32) -> f64 {
    let factor = decimal_factor(decimals);
    (value * factor).trunc() / factor
}

/// Rounds to `decimals` places; percentages are kept at a fixed precision.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = decimal_factor(decimals);
    (value * factor).round() / factor
}

fn decimal_factor(decimals: u32) -> f64 {
    10f64.powi(decimals.min(config::MAXIMUM_NUMBER_OF_DECIMALS) as i32)
}

/// Redistributes `total` molecules between bulk and a compartment by their
/// percentages: bulk gets `floor(fraction · total)`, the compartment the rest.
pub fn split_quantities(bulk_percent: f64, compartment_percent: f64, total: u64) -> (u64, u64) {
    let denominator = bulk_percent + compartment_percent;
    if !(denominator > 0.0) {
        return (total, 0);
    }
    let fraction = (bulk_percent / denominator).clamp(0.0, 1.0);
    let bulk = ((fraction * total as f64).floor() as u64).min(total);
    (bulk, total - bulk)
}

/// `(volume, surface)` molecule counts; surface count is floored.
pub fn split_volume_surface(quantity: u64, surface_percent: f64) -> (u64, u64) {
    let surface = ((surface_percent.clamp(0.0, 100.0) / 100.0 * quantity as f64).floor() as u64)
        .min(quantity);
    (quantity - surface, surface)
}

/// Radius of a sphere holding `particles` at `density`, truncated and floored
/// at `minimum`.
pub fn sphere_radius(particles: u64, density: f64, decimals: u32, minimum: f64) -> f64 {
    let exact = (config::FACTOR_3_DIV_4_PI * particles as f64 / density).cbrt();
    truncate(exact, decimals).max(minimum)
}

/// z-length of an x·y slab holding `particles` at `density`, truncated and
/// floored at `minimum`.
pub fn layer_z_length(
    particles: u64,
    density: f64,
    x_length: f64,
    y_length: f64,
    decimals: u32,
    minimum: f64,
) -> f64 {
    let exact = particles as f64 / (density * x_length * y_length);
    truncate(exact, decimals).max(minimum)
}

/// Simple cubic lattice placement needs exactly one populated row whose
/// molecule is a single particle.
pub fn is_lattice_possible(rows: &[CompositionRow], molecules: &[MoleculeInfo]) -> bool {
    let mut populated = rows.iter().enumerate().filter(|(_, r)| r.percent > 0.0);
    match (populated.next(), populated.next()) {
        (Some((index, _)), None) => molecules
            .get(index)
            .is_some_and(|m| m.particles_per_molecule == 1),
        _ => false,
    }
}

/// Σ quantity × particles-per-molecule over the rows.
pub fn number_of_particles(rows: &[CompositionRow], molecules: &[MoleculeInfo]) -> u64 {
    rows.iter()
        .zip(molecules)
        .map(|(row, molecule)| row.quantity * molecule.particles_per_molecule)
        .sum()
}
