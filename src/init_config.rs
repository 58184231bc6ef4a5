// init_config.rs
// Loads the job description (box, density, molecule and particle catalogs) from TOML

use crate::composition::{JobDefinition, MoleculeInfo, ParticleInfo};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize)]
pub struct JobConfig {
    #[serde(rename = "box")]
    pub simulation_box: BoxConfig,
    pub density: f64,
    /// DPD length unit in Angstrom. Derived from density and the smallest
    /// particle volume when omitted.
    pub length_conversion_factor: Option<f64>,
    pub random_seed: Option<u64>,
    pub molecules: Vec<MoleculeConfig>,
    #[serde(default)]
    pub particles: Vec<ParticleConfig>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BoxConfig {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MoleculeConfig {
    pub name: String,
    /// Defaults to the molecule name
    pub structure: Option<String>,
    pub quantity: u64,
    #[serde(default = "default_particles_per_molecule")]
    pub particles_per_molecule: u64,
    #[serde(default)]
    pub protein: bool,
}

fn default_particles_per_molecule() -> u64 {
    1
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ParticleConfig {
    pub symbol: String,
    pub name: Option<String>,
    /// Cubic Angstrom
    pub volume: f64,
}

impl JobConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validated job definition for a new compartment container.
    pub fn to_job_definition(&self) -> Result<JobDefinition> {
        let molecules = self
            .molecules
            .iter()
            .map(|m| {
                MoleculeInfo::new(
                    m.name.clone(),
                    m.structure.clone().unwrap_or_else(|| m.name.clone()),
                    m.quantity,
                    m.particles_per_molecule,
                )
                .with_protein(m.protein)
            })
            .collect();
        let particles = self
            .particles
            .iter()
            .map(|p| ParticleInfo {
                symbol: p.symbol.clone(),
                name: p.name.clone().unwrap_or_else(|| p.symbol.clone()),
                volume: p.volume,
            })
            .collect();
        let b = &self.simulation_box;
        let mut job = JobDefinition {
            x_length: b.x,
            y_length: b.y,
            z_length: b.z,
            density: self.density,
            molecules,
            particles,
            length_conversion_factor: None,
            random_seed: self.random_seed,
        };
        if let Some(factor) = self.length_conversion_factor {
            job = job.with_length_conversion_factor(factor)?;
        }
        job.validate()?;
        Ok(job)
    }
}
