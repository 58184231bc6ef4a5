// Centralized constants and tunables for the compartment model

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ====================
// Geometry correction factors
// ====================
/// Inflates radius / half-lengths for point containment so that points on the
/// rendered surface still count as inside.
pub const FACTOR_FOR_GRAPHICS_NUMBER_CORRECTION: f64 = 1.001;
/// Minimum compartment size relative to the box, also the inward correction
/// (1 + factor) applied when snapping a body back into the box.
pub const MINIMUM_COMPARTMENT_FACTOR: f64 = 0.001;
pub const DECREASE_FACTOR: f64 = 0.999;
/// Touching bodies count as overlapping; this absorbs float jitter at contact.
pub const OVERLAP_EPSILON: f64 = 1.0e-9;
pub const FACTOR_3_DIV_4_PI: f64 = 0.75 / std::f64::consts::PI;
pub const FACTOR_4_PI_DIV_3: f64 = 4.0 * std::f64::consts::PI / 3.0;

// ====================
// Sampling
// ====================
pub const DETERMINISTIC_RANDOM_SEED_DEFAULT: u64 = 1;
pub const DEFAULT_NUMBER_OF_TRIALS_FOR_COMPARTMENT: usize = 100;
pub const MINIMUM_NUMBER_OF_TRIALS_FOR_COMPARTMENT: usize = 1;

// ====================
// Number formats
// ====================
pub const NUMBER_OF_DECIMALS_FOR_COMPOSITIONS: u32 = 2;
pub const NUMBER_OF_DECIMALS_FOR_GRAPHICS_COORDINATES: u32 = 3;
pub const BOX_SIZE_NUMBER_OF_DECIMALS: u32 = 6;
/// f64 carries about 15 significant decimals; more only overflows 10^n.
pub const MAXIMUM_NUMBER_OF_DECIMALS: u32 = 15;
pub const MAXIMUM_NUMBER_OF_COMPARTMENTS: usize = 1_000_000;
pub const INITIAL_NUMBER_OF_BODIES: usize = 10;

// ====================
// Display
// ====================
pub const IS_CONSTANT_COMPARTMENT_BODY_VOLUME_DEFAULT: bool = true;
pub const COLOR_SHAPE_ATTENUATION_COMPARTMENT_DEFAULT: f64 = 1.0;
pub const COLOR_SHAPE_ATTENUATION_COMPARTMENT_MINIMUM: f64 = 0.0;
pub const COLOR_SHAPE_ATTENUATION_COMPARTMENT_MAXIMUM: f64 = 5.0;

// ====================
// Block and record names (persistence addressing)
// ====================
pub const COMPARTMENT_BLOCK_BULK: &str = "Block01Bulk";
pub const COMPARTMENT_BLOCK_HIDDEN: &str = "Block02Hidden";
pub const COMPARTMENT_BLOCK_SPHERE: &str = "Block03Sphere";
pub const COMPARTMENT_BLOCK_XY_LAYER: &str = "Block04XyLayer";

pub const BOX_INFO_NAME: &str = "BOX_INFO";
pub const DENSITY_INFO_NAME: &str = "DENSITY_INFO";
pub const MOLECULE_INFO_NAME: &str = "MOLECULE_INFO";
pub const PARTICLE_INFO_NAME: &str = "PARTICLE_INFO";
pub const COMPARTMENT_BULK_NAME: &str = "COMPARTMENT_BULK";
pub const COMPARTMENT_LENGTH_CONVERSION_NAME: &str = "COMPARTMENT_LENGTH_CONVERSION";
pub const COMPARTMENT_GEOMETRY_RANDOM_SEED_NAME: &str = "COMPARTMENT_GEOMETRY_RANDOM_SEED";
pub const COMPARTMENT_SPHERE_SPECIFIED_NAME: &str = "COMPARTMENT_SPHERE_SPECIFIED_NAME";
pub const COMPARTMENT_XY_LAYER_SPECIFIED_NAME: &str = "COMPARTMENT_XY_LAYER_SPECIFIED_NAME";

// Compartment record names are assembled as
// <kind prefix><compartment part>[<record part>]<index>.
pub const CHEMICAL_COMPOSITION_PREFIX_NAME: &str = "CHEMICAL_COMPOSITION_";
pub const GEOMETRY_PREFIX_NAME: &str = "GEOMETRY_";
pub const COMPARTMENT_SPHERE_NAME_PART: &str = "COMPARTMENT_SPHERE_";
pub const COMPARTMENT_XY_LAYER_NAME_PART: &str = "COMPARTMENT_XY_LAYER_";
pub const GEOMETRY_DATA_NAME_PART: &str = "DATA_";
pub const GEOMETRY_DISPLAY_NAME_PART: &str = "DISPLAY_";

pub const XML_VERSION: &str = "Version 1.0.0";
pub const OUT_OF_BOX_ERROR: &str = "Compartment is out of simulation box";

/// Runtime tunables of the compartment model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompartmentConfig {
    /// Rejection-sampling trial budget for free-volume points and spheres
    #[serde(default = "default_number_of_trials")]
    pub number_of_trials: usize,
    /// Magnification keeps body volume constant
    #[serde(default = "default_constant_volume")]
    pub constant_volume: bool,
    /// Depth cue strength for body colors, 0..=5
    #[serde(default = "default_depth_attenuation")]
    pub depth_attenuation: f64,
    /// Decimals kept when deriving radius / z-length from particle counts
    #[serde(default = "default_geometry_decimals")]
    pub geometry_decimals: u32,
    #[serde(default = "default_composition_decimals")]
    pub composition_decimals: u32,
}

fn default_number_of_trials() -> usize {
    DEFAULT_NUMBER_OF_TRIALS_FOR_COMPARTMENT
}

fn default_constant_volume() -> bool {
    IS_CONSTANT_COMPARTMENT_BODY_VOLUME_DEFAULT
}

fn default_depth_attenuation() -> f64 {
    COLOR_SHAPE_ATTENUATION_COMPARTMENT_DEFAULT
}

fn default_geometry_decimals() -> u32 {
    BOX_SIZE_NUMBER_OF_DECIMALS
}

fn default_composition_decimals() -> u32 {
    NUMBER_OF_DECIMALS_FOR_COMPOSITIONS
}

impl Default for CompartmentConfig {
    fn default() -> Self {
        Self {
            number_of_trials: default_number_of_trials(),
            constant_volume: default_constant_volume(),
            depth_attenuation: default_depth_attenuation(),
            geometry_decimals: default_geometry_decimals(),
            composition_decimals: default_composition_decimals(),
        }
    }
}

impl CompartmentConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CompartmentConfig = toml::from_str(&content)?;
        Ok(config.sanitized())
    }

    /// Clamp out-of-range values instead of rejecting the whole file.
    pub fn sanitized(mut self) -> Self {
        self.number_of_trials = self
            .number_of_trials
            .max(MINIMUM_NUMBER_OF_TRIALS_FOR_COMPARTMENT);
        self.depth_attenuation = clamp_depth_attenuation(self.depth_attenuation);
        self.geometry_decimals = self.geometry_decimals.min(MAXIMUM_NUMBER_OF_DECIMALS);
        self.composition_decimals = self.composition_decimals.min(MAXIMUM_NUMBER_OF_DECIMALS);
        self
    }
}

pub fn clamp_depth_attenuation(value: f64) -> f64 {
    if !value.is_finite() {
        return COLOR_SHAPE_ATTENUATION_COMPARTMENT_DEFAULT;
    }
    value.clamp(
        COLOR_SHAPE_ATTENUATION_COMPARTMENT_MINIMUM,
        COLOR_SHAPE_ATTENUATION_COMPARTMENT_MAXIMUM,
    )
}
