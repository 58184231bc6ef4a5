// composition/orientation.rs
// Orientation choices for molecules in the bulk and in compartments, and the
// rules deciding which choices a composition row may offer.

use crate::body::LayerFace;
use crate::error::{CompartmentError, Result};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use std::fmt;
use std::str::FromStr;

pub type OrientationOptions = SmallVec<[Orientation; 11]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    None,
    Random,
    Structure3D,
    Random3D,
    WholeSphereSurface,
    /// Polar caps of the sphere, `|dz| >= r/2`
    UpperSphereSurface,
    /// Equatorial band, `|dz| <= r/2`
    MiddleSphereSurface,
    XyTopBottom,
    YzLeftRight,
    XzFrontBack,
    XyTop,
    XyBottom,
    YzLeft,
    YzRight,
    XzFront,
    XzBack,
    AllSurfaces,
    SimpleCubicLattice,
}

impl Orientation {
    pub const LAYER_SURFACES: [Orientation; 10] = [
        Orientation::XyTopBottom,
        Orientation::YzLeftRight,
        Orientation::XzFrontBack,
        Orientation::XyTop,
        Orientation::XyBottom,
        Orientation::YzLeft,
        Orientation::YzRight,
        Orientation::XzFront,
        Orientation::XzBack,
        Orientation::AllSurfaces,
    ];

    /// Persisted key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::None => "none",
            Orientation::Random => "random",
            Orientation::Structure3D => "3DStructure",
            Orientation::Random3D => "3DRandom",
            Orientation::WholeSphereSurface => "randomWholeSurfaceOfSphere",
            Orientation::UpperSphereSurface => "randomUpperSurfaceOfSphere",
            Orientation::MiddleSphereSurface => "randomMiddleSurfaceOfSphere",
            Orientation::XyTopBottom => "randomXyTopBottomSurfaceOfXyLayer",
            Orientation::YzLeftRight => "randomYzLeftRightSurfaceOfXyLayer",
            Orientation::XzFrontBack => "randomXzFrontBackSurfaceOfXyLayer",
            Orientation::XyTop => "randomXyTopSurfaceOfXyLayer",
            Orientation::XyBottom => "randomXyBottomSurfaceOfXyLayer",
            Orientation::YzLeft => "randomYzLeftSurfaceOfXyLayer",
            Orientation::YzRight => "randomYzRightSurfaceOfXyLayer",
            Orientation::XzFront => "randomXzFrontSurfaceOfXyLayer",
            Orientation::XzBack => "randomXzBackSurfaceOfXyLayer",
            Orientation::AllSurfaces => "randomAllSurfacesOfXyLayer",
            Orientation::SimpleCubicLattice => "simpleCubicLattice",
        }
    }

    /// Layer faces covered by a layer surface choice.
    pub fn layer_faces(&self) -> Option<&'static [LayerFace]> {
        use LayerFace::*;
        let faces: &'static [LayerFace] = match self {
            Orientation::XyTopBottom => &[XyTop, XyBottom],
            Orientation::YzLeftRight => &[YzLeft, YzRight],
            Orientation::XzFrontBack => &[XzFront, XzBack],
            Orientation::XyTop => &[XyTop],
            Orientation::XyBottom => &[XyBottom],
            Orientation::YzLeft => &[YzLeft],
            Orientation::YzRight => &[YzRight],
            Orientation::XzFront => &[XzFront],
            Orientation::XzBack => &[XzBack],
            Orientation::AllSurfaces => &LayerFace::ALL,
            _ => return None,
        };
        Some(faces)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = CompartmentError;

    fn from_str(s: &str) -> Result<Self> {
        const ALL: [Orientation; 18] = [
            Orientation::None,
            Orientation::Random,
            Orientation::Structure3D,
            Orientation::Random3D,
            Orientation::WholeSphereSurface,
            Orientation::UpperSphereSurface,
            Orientation::MiddleSphereSurface,
            Orientation::XyTopBottom,
            Orientation::YzLeftRight,
            Orientation::XzFrontBack,
            Orientation::XyTop,
            Orientation::XyBottom,
            Orientation::YzLeft,
            Orientation::YzRight,
            Orientation::XzFront,
            Orientation::XzBack,
            Orientation::AllSurfaces,
            Orientation::SimpleCubicLattice,
        ];
        ALL.into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| CompartmentError::malformed(format!("unknown orientation {s}")))
    }
}

// ==========================
// Option sets
// ==========================

pub fn none_only() -> OrientationOptions {
    smallvec![Orientation::None]
}

pub fn random_only() -> OrientationOptions {
    smallvec![Orientation::Random]
}

pub fn random_3d() -> OrientationOptions {
    smallvec![Orientation::Random, Orientation::Structure3D, Orientation::Random3D]
}

pub fn sphere_surfaces() -> OrientationOptions {
    smallvec![
        Orientation::WholeSphereSurface,
        Orientation::UpperSphereSurface,
        Orientation::MiddleSphereSurface
    ]
}

pub fn layer_surfaces() -> OrientationOptions {
    Orientation::LAYER_SURFACES.into_iter().collect()
}

pub fn layer_surfaces_with_lattice() -> OrientationOptions {
    let mut options = layer_surfaces();
    options.push(Orientation::SimpleCubicLattice);
    options
}

pub fn random_with_lattice() -> OrientationOptions {
    smallvec![Orientation::Random, Orientation::SimpleCubicLattice]
}

/// Selected orientation plus the choices currently offered for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientationChoice {
    pub selected: Orientation,
    pub options: OrientationOptions,
}

impl OrientationChoice {
    pub fn new(selected: Orientation, options: OrientationOptions) -> Self {
        Self { selected, options }
    }

    pub fn none() -> Self {
        Self::new(Orientation::None, none_only())
    }

    pub fn bulk(protein: bool) -> Self {
        if protein {
            Self::new(Orientation::Random3D, random_3d())
        } else {
            Self::new(Orientation::Random, random_only())
        }
    }

    pub fn is_none(&self) -> bool {
        self.selected == Orientation::None
    }

    pub fn is_valid(&self) -> bool {
        self.options.contains(&self.selected)
    }

    /// Selects `orientation` if it is offered.
    pub fn select(&mut self, orientation: Orientation) -> bool {
        if self.options.contains(&orientation) {
            self.selected = orientation;
            true
        } else {
            false
        }
    }

    /// New option set; the current selection survives if still offered,
    /// otherwise `default` is taken.
    fn coerced(&self, options: OrientationOptions, default: Orientation) -> Self {
        let selected = if options.contains(&self.selected) {
            self.selected
        } else {
            default
        };
        Self::new(selected, options)
    }
}

/// Row facts the orientation rules depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowFacts {
    pub protein: bool,
    pub quantity_in_volume: u64,
    pub quantity_on_surface: u64,
    pub surface_occupied: bool,
}

impl RowFacts {
    fn is_empty(&self) -> bool {
        self.quantity_in_volume == 0 && self.quantity_on_surface == 0
    }
}

/// Orientation of a sphere compartment row after an edit.
pub fn sphere_orientation(current: &OrientationChoice, facts: RowFacts) -> OrientationChoice {
    if facts.is_empty() {
        return OrientationChoice::none();
    }
    if facts.protein {
        if current.options.as_slice() == random_3d().as_slice() {
            return current.clone();
        }
        let selected = if facts.quantity_in_volume == 1 {
            Orientation::Structure3D
        } else {
            Orientation::Random3D
        };
        return OrientationChoice::new(selected, random_3d());
    }
    if facts.quantity_on_surface == 0 {
        OrientationChoice::new(Orientation::Random, random_only())
    } else {
        current.coerced(sphere_surfaces(), Orientation::WholeSphereSurface)
    }
}

/// Default choice and option set for a populated xy-layer row.
fn layer_defaults(protein: bool, surface_occupied: bool, lattice_possible: bool) -> (Orientation, OrientationOptions) {
    match (lattice_possible, surface_occupied) {
        (true, true) => (Orientation::XyTopBottom, layer_surfaces_with_lattice()),
        (true, false) => (Orientation::Random, random_with_lattice()),
        (false, true) => (Orientation::XyTopBottom, layer_surfaces()),
        (false, false) if protein => (Orientation::Random3D, random_3d()),
        (false, false) => (Orientation::Random, random_only()),
    }
}

/// Orientation of the edited xy-layer row.
pub fn layer_orientation(current: &OrientationChoice, facts: RowFacts, lattice_possible: bool) -> OrientationChoice {
    if facts.is_empty() {
        return OrientationChoice::none();
    }
    let (default, options) = layer_defaults(facts.protein, facts.surface_occupied, lattice_possible);
    if current.is_none() {
        OrientationChoice::new(default, options)
    } else {
        current.coerced(options, default)
    }
}

/// Re-options another populated row of the same layer after lattice
/// eligibility may have changed. Rows pinned to none stay untouched.
pub fn reoption_layer_row(current: &OrientationChoice, facts: RowFacts, lattice_possible: bool) -> OrientationChoice {
    if current.is_none() {
        return current.clone();
    }
    let (default, options) = layer_defaults(facts.protein, facts.surface_occupied, lattice_possible);
    current.coerced(options, default)
}
