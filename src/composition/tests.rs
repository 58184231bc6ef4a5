// composition/tests.rs
// Size formulas, quantity splits, job validation and orientation rules

#[cfg(test)]
mod formulas {
    use crate::composition::*;

    #[test]
    fn truncate_never_rounds_up() {
        assert_eq!(truncate(1.23999, 2), 1.23);
        assert_eq!(truncate(2.0, 3), 2.0);
        assert_eq!(round_to(69.999999, 2), 70.0);
    }

    #[test]
    fn quantities_follow_percent_split() {
        assert_eq!(split_quantities(70.0, 30.0, 1000), (700, 300));
        let (bulk, comp) = split_quantities(33.33, 66.67, 10);
        assert_eq!(bulk + comp, 10);
        assert_eq!(bulk, 3);
        assert_eq!(split_quantities(0.0, 0.0, 5), (5, 0));
        assert_eq!(split_quantities(0.0, 25.0, 5), (0, 5));
    }

    #[test]
    fn volume_and_surface_always_sum_to_quantity() {
        for quantity in [0u64, 1, 7, 300, 12345] {
            for surface in [0.0, 12.5, 33.33, 50.0, 99.99, 100.0] {
                let (volume, on_surface) = split_volume_surface(quantity, surface);
                assert_eq!(volume + on_surface, quantity);
            }
        }
        assert_eq!(split_volume_surface(300, 50.0), (150, 150));
        assert_eq!(split_volume_surface(7, 50.0), (4, 3));
    }

    #[test]
    fn sphere_radius_holds_particle_volume() {
        let radius = sphere_radius(3000, 3.0, 6, 0.01);
        let exact = (0.75 / std::f64::consts::PI * 1000.0f64).cbrt();
        assert!(radius <= exact && exact - radius < 1e-6);
        assert_eq!(sphere_radius(0, 3.0, 6, 0.01), 0.01);
    }

    #[test]
    fn layer_z_length_fills_slab() {
        // 300 particles at density 3 in a 10 x 10 slab: z = 1
        assert_eq!(layer_z_length(300, 3.0, 10.0, 10.0, 6, 0.01), 1.0);
        assert_eq!(layer_z_length(0, 3.0, 10.0, 10.0, 6, 0.01), 0.01);
    }

    fn molecules() -> Vec<MoleculeInfo> {
        vec![
            MoleculeInfo::new("W", "W", 1000, 1),
            MoleculeInfo::new("DMPC", "C-C-P", 100, 3),
        ]
    }

    #[test]
    fn lattice_needs_single_one_particle_row() {
        let mols = molecules();
        let mut rows: Vec<CompositionRow> = mols.iter().map(|m| CompositionRow::empty(m, 100.0)).collect();
        assert!(!is_lattice_possible(&rows, &mols));
        rows[0].percent = 10.0;
        assert!(is_lattice_possible(&rows, &mols));
        rows[1].percent = 5.0;
        assert!(!is_lattice_possible(&rows, &mols));
        rows[0].percent = 0.0;
        assert!(!is_lattice_possible(&rows, &mols), "multi-particle molecule");
    }

    #[test]
    fn particle_count_weights_molecule_size() {
        let mols = molecules();
        let mut rows: Vec<CompositionRow> = mols.iter().map(|m| CompositionRow::empty(m, 100.0)).collect();
        rows[0].quantity = 10;
        rows[1].quantity = 4;
        assert_eq!(number_of_particles(&rows, &mols), 22);
    }
}

#[cfg(test)]
mod job {
    use crate::composition::{JobDefinition, MoleculeInfo, ParticleInfo};

    fn particles() -> Vec<ParticleInfo> {
        vec![
            ParticleInfo { symbol: "W".into(), name: "Water".into(), volume: 30.0 },
            ParticleInfo { symbol: "C".into(), name: "Carbon".into(), volume: 45.0 },
        ]
    }

    #[test]
    fn validation_rejects_bad_input() {
        let mols = vec![MoleculeInfo::new("W", "W", 10, 1)];
        assert!(JobDefinition::new((0.0, 1.0, 1.0), 3.0, mols.clone(), particles()).is_err());
        assert!(JobDefinition::new((1.0, 1.0, 1.0), 0.0, mols.clone(), particles()).is_err());
        assert!(JobDefinition::new((1.0, 1.0, 1.0), 3.0, vec![], particles()).is_err());
        assert!(JobDefinition::new((1.0, 1.0, 1.0), 3.0, mols.clone(), vec![]).is_err());
        let twice = vec![MoleculeInfo::new("W", "W", 1, 1), MoleculeInfo::new("W", "W", 2, 1)];
        assert!(JobDefinition::new((1.0, 1.0, 1.0), 3.0, twice, particles()).is_err());
        let empty = vec![MoleculeInfo::new("X", "X", 1, 0)];
        assert!(JobDefinition::new((1.0, 1.0, 1.0), 3.0, empty, particles()).is_err());
    }

    #[test]
    fn conversion_factor_uses_smallest_particle() {
        let job = JobDefinition::new(
            (10.0, 10.0, 10.0),
            3.0,
            vec![MoleculeInfo::new("W", "W", 10, 1)],
            particles(),
        )
        .unwrap();
        assert!((job.length_conversion_factor() - 90f64.cbrt()).abs() < 1e-12);
        assert_eq!(job.random_seed(), 1);
        let explicit = job.with_length_conversion_factor(6.46).unwrap();
        assert_eq!(explicit.length_conversion_factor(), 6.46);
        assert!(explicit.with_length_conversion_factor(-1.0).is_err());
    }

    #[test]
    fn molecule_identity_ignores_quantity() {
        let a = MoleculeInfo::new("W", "W", 10, 1);
        let b = MoleculeInfo::new("W", "W", 99, 1);
        assert!(a.is_same_molecule(&b));
        assert!(!a.is_same_molecule(&b.clone().with_protein(true)));
    }
}

#[cfg(test)]
mod orientation {
    use crate::body::LayerFace;
    use crate::composition::orientation::*;

    fn facts(volume: u64, surface: u64, protein: bool) -> RowFacts {
        RowFacts {
            protein,
            quantity_in_volume: volume,
            quantity_on_surface: surface,
            surface_occupied: surface > 0,
        }
    }

    #[test]
    fn keys_parse_back() {
        for o in Orientation::LAYER_SURFACES {
            assert_eq!(o.as_str().parse::<Orientation>().unwrap(), o);
        }
        assert_eq!("3DRandom".parse::<Orientation>().unwrap(), Orientation::Random3D);
        assert!("sideways".parse::<Orientation>().is_err());
    }

    #[test]
    fn empty_rows_are_pinned_to_none() {
        let current = OrientationChoice::new(Orientation::Random, random_only());
        assert_eq!(sphere_orientation(&current, facts(0, 0, false)), OrientationChoice::none());
        assert_eq!(layer_orientation(&current, facts(0, 0, false), true), OrientationChoice::none());
    }

    #[test]
    fn sphere_rules() {
        let none = OrientationChoice::none();
        let single_protein = sphere_orientation(&none, facts(1, 0, true));
        assert_eq!(single_protein.selected, Orientation::Structure3D);
        let many_proteins = sphere_orientation(&none, facts(5, 0, true));
        assert_eq!(many_proteins.selected, Orientation::Random3D);
        // protein rows keep an existing 3D selection
        assert_eq!(sphere_orientation(&single_protein, facts(5, 0, true)), single_protein);

        let volume_only = sphere_orientation(&none, facts(5, 0, false));
        assert_eq!(volume_only.options.as_slice(), random_only().as_slice());
        let surface = sphere_orientation(&volume_only, facts(3, 2, false));
        assert_eq!(surface.selected, Orientation::WholeSphereSurface);
        assert_eq!(surface.options.len(), 3);
    }

    #[test]
    fn layer_rules_from_none() {
        let none = OrientationChoice::none();
        let a = layer_orientation(&none, facts(5, 5, false), true);
        assert_eq!(a.selected, Orientation::XyTopBottom);
        assert_eq!(a.options.len(), 11);
        let b = layer_orientation(&none, facts(5, 0, false), true);
        assert_eq!(b.options.as_slice(), random_with_lattice().as_slice());
        let c = layer_orientation(&none, facts(5, 5, false), false);
        assert_eq!(c.options.len(), 10);
        let d = layer_orientation(&none, facts(5, 0, true), false);
        assert_eq!(d.selected, Orientation::Random3D);
        let e = layer_orientation(&none, facts(5, 0, false), false);
        assert_eq!(e.selected, Orientation::Random);
        for choice in [a, b, c, d, e] {
            assert!(choice.is_valid());
        }
    }

    #[test]
    fn losing_lattice_coerces_other_rows() {
        let lattice = OrientationChoice::new(Orientation::SimpleCubicLattice, layer_surfaces_with_lattice());
        let surface_row = reoption_layer_row(&lattice, facts(2, 2, false), false);
        assert_eq!(surface_row.selected, Orientation::XyTopBottom);
        assert!(!surface_row.options.contains(&Orientation::SimpleCubicLattice));

        let mut kept = OrientationChoice::new(Orientation::XyTop, layer_surfaces_with_lattice());
        kept = reoption_layer_row(&kept, facts(2, 2, false), false);
        assert_eq!(kept.selected, Orientation::XyTop);

        let volume_row = OrientationChoice::new(Orientation::SimpleCubicLattice, random_with_lattice());
        assert_eq!(reoption_layer_row(&volume_row, facts(4, 0, false), false).selected, Orientation::Random);
        assert_eq!(reoption_layer_row(&OrientationChoice::none(), facts(4, 0, false), true), OrientationChoice::none());
    }

    #[test]
    fn select_only_offered_choices() {
        let mut choice = OrientationChoice::new(Orientation::XyTopBottom, layer_surfaces());
        assert!(choice.select(Orientation::AllSurfaces));
        assert!(!choice.select(Orientation::SimpleCubicLattice));
        assert_eq!(choice.selected, Orientation::AllSurfaces);
        assert_eq!(Orientation::AllSurfaces.layer_faces().unwrap().len(), 6);
        assert_eq!(Orientation::XyTopBottom.layer_faces().unwrap(), &[LayerFace::XyTop, LayerFace::XyBottom]);
        assert!(Orientation::Random.layer_faces().is_none());
    }
}
