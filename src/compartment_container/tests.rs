// compartment_container/tests.rs
// Composition propagation, compartment lifecycle, geometry records and persistence

#[cfg(test)]
mod fixtures {
    use crate::compartment_container::CompartmentContainer;
    use crate::composition::{JobDefinition, MoleculeInfo, ParticleInfo};
    use crate::config::CompartmentConfig;

    pub fn job(length: f64) -> JobDefinition {
        JobDefinition::new(
            (length, length, length),
            3.0,
            vec![
                MoleculeInfo::new("W", "W", 1000, 1),
                MoleculeInfo::new("DMPC", "C-C-P", 100, 3),
            ],
            vec![ParticleInfo { symbol: "W".into(), name: "Water".into(), volume: 30.0 }],
        )
        .unwrap()
    }

    pub fn container() -> CompartmentContainer {
        CompartmentContainer::new(job(10.0), CompartmentConfig::default()).unwrap()
    }

    pub fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }
}

#[cfg(test)]
mod composition {
    use super::fixtures::{assert_close, container};
    use crate::body::BodyGeometry;
    use crate::composition::round_to;
    use crate::error::CompartmentError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn new_compartment_is_empty() {
        let mut c = container();
        let block = c.add_compartment_sphere("core").unwrap();
        assert_eq!(block, "Block03Sphere0000001");
        let compartment = c.compartment(&block).unwrap();
        assert_eq!(compartment.specified_name(), "core");
        assert!(compartment.rows().iter().all(|r| r.percent == 0.0 && r.quantity == 0));
        assert_eq!(compartment.rows()[0].max_percent, 100.0);
        assert_eq!(c.bulk()[0].percent, 100.0);
        assert!(c.compartment_box().contains_body(&block));
    }

    #[test]
    fn layer_percent_moves_molecules_out_of_bulk() {
        let mut c = container();
        let block = c.add_compartment_xy_layer("membrane").unwrap();
        c.set_composition_percent(&block, 0, 30.0).unwrap();
        assert_eq!(c.bulk()[0].percent, 70.0);
        assert_eq!(c.bulk()[0].quantity, 700);
        let row = &c.compartment(&block).unwrap().rows()[0];
        assert_eq!(row.quantity, 300);
        assert_eq!(row.quantity_in_volume, 300);

        // 300 particles at density 3 over a 10 x 10 slab
        let BodyGeometry::XyLayer(l) = c.compartment(&block).unwrap().geometry().clone() else {
            panic!("layer expected");
        };
        assert_eq!((l.x_length, l.y_length), (10.0, 10.0));
        assert_close(l.z_length, 1.0);
        assert!(!c.compartment(&block).unwrap().is_out_of_box());
    }

    #[test]
    fn percent_moves_molecules_out_of_bulk() {
        let mut c = container();
        let block = c.add_compartment_sphere("core").unwrap();
        let changes = c.set_composition_percent(&block, 0, 30.0).unwrap();
        assert!(changes.bulk_rows.contains(&0));
        assert!(changes.composition_rows.contains(&(block.clone(), 0)));
        assert!(changes.geometry.contains(&block));

        assert_eq!(c.bulk()[0].percent, 70.0);
        assert_eq!(c.bulk()[0].quantity, 700);
        let row = &c.compartment(&block).unwrap().rows()[0];
        assert_eq!(row.quantity, 300);
        assert_eq!(row.quantity_in_volume, 300);
        assert_eq!(row.max_percent, 100.0);

        // 300 particles at density 3 fill a sphere of volume 100
        let BodyGeometry::Sphere(s) = c.compartment(&block).unwrap().geometry().clone() else {
            panic!("sphere expected");
        };
        let exact = (75.0 / std::f64::consts::PI).cbrt();
        assert!(s.radius <= exact && exact - s.radius < 1e-6);
        let BodyGeometry::Sphere(d) = c.compartment(&block).unwrap().display_geometry().clone() else {
            panic!("sphere expected");
        };
        assert_close(d.radius, s.radius * c.length_conversion_factor());
    }

    #[test]
    fn unchanged_percent_is_a_no_op() {
        let mut c = container();
        let block = c.add_compartment_sphere("").unwrap();
        c.set_composition_percent(&block, 0, 30.0).unwrap();
        assert!(c.set_composition_percent(&block, 0, 30.0).unwrap().is_empty());
        assert!(c.set_composition_percent(&block, 0, 30.001).unwrap().is_empty());
    }

    #[test]
    fn edits_outside_bounds_are_rejected() {
        let mut c = container();
        let a = c.add_compartment_sphere("a").unwrap();
        let b = c.add_compartment_sphere("b").unwrap();
        c.set_composition_percent(&a, 0, 60.0).unwrap();
        assert_eq!(c.compartment(&b).unwrap().rows()[0].max_percent, 40.0);
        assert!(c.set_composition_percent(&b, 0, 40.5).is_err());
        assert!(c.set_composition_percent(&b, 0, -1.0).is_err());
        assert!(c.set_composition_percent(&b, 0, f64::NAN).is_err());
        assert!(c.set_surface_percent(&b, 0, 101.0).is_err());
        assert!(matches!(
            c.set_composition_percent(&b, 7, 1.0),
            Err(CompartmentError::RowOutOfRange { row: 7, .. })
        ));
        assert!(matches!(
            c.set_composition_percent("Block03Sphere0000009", 0, 1.0),
            Err(CompartmentError::UnknownBlock(_))
        ));
        assert_eq!(c.bulk()[0].percent, 40.0);
    }

    #[test]
    fn random_edits_keep_totals() {
        let mut c = container();
        let blocks = vec![
            c.add_compartment_sphere("s").unwrap(),
            c.add_compartment_xy_layer("l").unwrap(),
            c.add_compartment_sphere("t").unwrap(),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..300 {
            let block = &blocks[rng.random_range(0..blocks.len())];
            let row = rng.random_range(0..2);
            let max = c.compartment(block).unwrap().rows()[row].max_percent;
            let percent = round_to(rng.random_range(0.0..=max), 2);
            c.set_composition_percent(block, row, percent).unwrap();
            if rng.random_bool(0.3) {
                let surface = round_to(rng.random_range(0.0..=100.0), 2);
                c.set_surface_percent(block, row, surface).unwrap();
            }

            for (row, molecule) in c.molecules().iter().enumerate() {
                let bulk = &c.bulk()[row];
                let percent: f64 =
                    bulk.percent + c.compartments().iter().map(|k| k.rows()[row].percent).sum::<f64>();
                assert!((percent - 100.0).abs() < 1e-6, "row {row} sums to {percent}");
                let quantity: u64 =
                    bulk.quantity + c.compartments().iter().map(|k| k.rows()[row].quantity).sum::<u64>();
                assert_eq!(quantity, molecule.quantity);
                for k in c.compartments() {
                    let r = &k.rows()[row];
                    assert_close(r.max_percent, round_to(r.percent + bulk.percent, 2));
                    assert_eq!(r.quantity_in_volume + r.quantity_on_surface, r.quantity);
                    assert!(r.orientation.is_valid());
                    assert_eq!(r.quantity == 0, r.orientation.is_none());
                }
            }
        }
    }

    #[test]
    fn refresh_is_idempotent() {
        let mut c = container();
        let block = c.add_compartment_xy_layer("m").unwrap();
        c.set_composition_percent(&block, 0, 25.0).unwrap();
        c.set_composition_percent(&block, 1, 50.0).unwrap();
        c.set_surface_percent(&block, 1, 40.0).unwrap();
        c.refresh_compartment(&block).unwrap();
        let once = c.compartment(&block).unwrap().clone();
        let bulk = c.bulk().to_vec();
        c.refresh_compartment(&block).unwrap();
        assert_eq!(c.compartment(&block).unwrap(), &once);
        assert_eq!(c.bulk(), bulk.as_slice());
    }

    #[test]
    fn removal_returns_molecules_to_bulk() {
        let mut c = container();
        let a = c.add_compartment_sphere("a").unwrap();
        let b = c.add_compartment_xy_layer("b").unwrap();
        c.set_composition_percent(&a, 0, 30.0).unwrap();
        c.set_composition_percent(&b, 0, 20.0).unwrap();
        assert!(c.remove_compartment(&a));
        assert!(!c.remove_compartment(&a));
        assert_eq!(c.bulk()[0].percent, 80.0);
        assert_eq!(c.bulk()[0].quantity, 800);
        assert_eq!(c.compartment(&b).unwrap().rows()[0].max_percent, 100.0);
        assert!(!c.compartment_box().contains_body(&a));
        c.clear();
        assert!(!c.has_compartments());
        assert_eq!(c.bulk()[0].quantity, 1000);
        assert_eq!(c.compartment_box().body_count(), 0);
    }
}

#[cfg(test)]
mod naming {
    use super::fixtures::container;

    #[test]
    fn block_names_take_first_free_index() {
        let mut c = container();
        let s1 = c.add_compartment_sphere("").unwrap();
        let s2 = c.add_compartment_sphere("").unwrap();
        let l1 = c.add_compartment_xy_layer("").unwrap();
        assert_eq!(s2, "Block03Sphere0000002");
        assert_eq!(l1, "Block04XyLayer0000001");
        assert!(c.remove_compartment(&s1));
        assert_eq!(c.add_compartment_sphere("").unwrap(), s1);
        assert_eq!(c.block_names(), vec![s1.as_str(), s2.as_str(), l1.as_str()]);
        assert!(c.is_sphere_compartment(&s2));
        assert!(c.is_xy_layer_compartment(&l1));
        assert!(!c.is_xy_layer_compartment(&s2));
        assert_eq!(c.compartment(&s2).unwrap().index(), 2);
    }
}

#[cfg(test)]
mod geometry {
    use super::fixtures::{assert_close, container};
    use crate::body::{BodyGeometry, BodySphere, BodyXyLayer};
    use crate::compartment_box::Axis;
    use crate::compartment_container::{CompartmentContainer, GeometrySource};
    use crate::config::{self, CompartmentConfig};
    use crate::geometry::PointInSpace;

    fn sphere(x: f64, y: f64, z: f64, r: f64) -> BodyGeometry {
        BodyGeometry::Sphere(BodySphere::new(PointInSpace::new(x, y, z), r).unwrap())
    }

    #[test]
    fn data_and_display_move_together() {
        let mut c = container();
        let block = c.add_compartment_sphere("").unwrap();
        let factor = c.length_conversion_factor();
        c.set_geometry(&block, GeometrySource::Display, sphere(20.0, 20.0, 20.0, 8.0))
            .unwrap();
        let data = c.compartment(&block).unwrap().geometry().clone();
        assert_close(data.center().x, 20.0 / factor);
        let BodyGeometry::Sphere(s) = data else { panic!("sphere expected") };
        assert_close(s.radius, 8.0 / factor);
        assert_eq!(c.compartment_box().get_body(&block).unwrap().geometry(), &data);

        c.set_geometry_data(&block, sphere(4.0, 5.0, 6.0, 1.0)).unwrap();
        let display = c.compartment(&block).unwrap().display_geometry();
        assert_close(display.center().z, 6.0 * factor);
    }

    #[test]
    fn out_of_box_sets_and_clears_error() {
        let mut c = container();
        let block = c.add_compartment_sphere("").unwrap();
        let changes = c.set_geometry_data(&block, sphere(9.5, 5.0, 5.0, 2.0)).unwrap();
        assert!(changes.errors.contains(&block));
        assert_eq!(c.compartment(&block).unwrap().error(), Some(config::OUT_OF_BOX_ERROR));
        assert!(c.has_error());

        let changes = c.correct_out_of_box(&block).unwrap();
        assert!(changes.errors.contains(&block));
        assert!(!c.has_error());
        assert!(c.compartment(&block).unwrap().geometry().center().x <= 8.0);
    }

    #[test]
    fn geometry_kind_must_match() {
        let mut c = container();
        let block = c.add_compartment_sphere("").unwrap();
        let layer = BodyGeometry::XyLayer(
            BodyXyLayer::new(PointInSpace::new(5.0, 5.0, 5.0), 10.0, 10.0, 1.0).unwrap(),
        );
        assert!(c.set_geometry_data(&block, layer).is_err());
        assert!(c.set_geometry_data("Block03Sphere0000042", sphere(1.0, 1.0, 1.0, 0.5)).is_err());
    }

    #[test]
    fn layers_snap_to_top_and_bottom() {
        let mut c = container();
        let block = c.add_compartment_xy_layer("").unwrap();
        c.set_composition_percent(&block, 0, 30.0).unwrap();
        assert!(!c.is_xy_layer_near_bottom(&block));
        c.move_xy_layer_to_bottom(&block).unwrap();
        assert!(c.is_xy_layer_near_bottom(&block));
        assert!(!c.compartment(&block).unwrap().is_out_of_box());
        c.move_xy_layer_to_top(&block).unwrap();
        assert!(c.is_xy_layer_near_top(&block));
        let sphere_block = c.add_compartment_sphere("").unwrap();
        assert!(c.move_xy_layer_to_top(&sphere_block).is_err());
    }

    #[test]
    fn magnification_updates_both_records() {
        let mut c = container();
        let block = c.add_compartment_sphere("").unwrap();
        c.set_composition_percent(&block, 0, 30.0).unwrap();
        let before = c.compartment(&block).unwrap().clone();
        assert!(c.magnify_compartment(&block, Axis::X, 0.5).is_none());
        assert_eq!(c.compartment(&block).unwrap(), &before);

        let config = CompartmentConfig { constant_volume: false, ..CompartmentConfig::default() };
        let mut c = CompartmentContainer::new(super::fixtures::job(10.0), config).unwrap();
        let block = c.add_compartment_sphere("").unwrap();
        c.set_composition_percent(&block, 0, 30.0).unwrap();
        let BodyGeometry::Sphere(old) = c.compartment(&block).unwrap().geometry().clone() else {
            panic!("sphere expected")
        };
        assert!(c.magnify_compartment(&block, Axis::X, 0.5).is_some());
        let compartment = c.compartment(&block).unwrap();
        let (BodyGeometry::Sphere(new), BodyGeometry::Sphere(shown)) =
            (compartment.geometry(), compartment.display_geometry())
        else {
            panic!("sphere expected")
        };
        assert_close(new.radius, old.radius + 0.5);
        assert_close(shown.radius, new.radius * c.length_conversion_factor());
    }
}

#[cfg(test)]
mod orientation {
    use super::fixtures::container;
    use crate::composition::orientation::{self, Orientation};

    #[test]
    fn sphere_surface_rows_offer_surface_choices() {
        let mut c = container();
        let block = c.add_compartment_sphere("").unwrap();
        c.set_composition_percent(&block, 0, 30.0).unwrap();
        let row = &c.compartment(&block).unwrap().rows()[0];
        assert_eq!(row.orientation.selected, Orientation::Random);
        c.set_surface_percent(&block, 0, 50.0).unwrap();
        let row = &c.compartment(&block).unwrap().rows()[0];
        assert_eq!((row.quantity_in_volume, row.quantity_on_surface), (150, 150));
        assert_eq!(row.orientation.selected, Orientation::WholeSphereSurface);
        assert!(c.set_orientation(&block, 0, Orientation::UpperSphereSurface).unwrap());
        assert!(!c.set_orientation(&block, 0, Orientation::XyTop).unwrap());
    }

    #[test]
    fn lattice_is_withdrawn_when_a_second_molecule_joins() {
        let mut c = container();
        let block = c.add_compartment_xy_layer("").unwrap();
        c.set_composition_percent(&block, 0, 10.0).unwrap();
        let row = &c.compartment(&block).unwrap().rows()[0];
        assert_eq!(row.orientation.options.as_slice(), orientation::random_with_lattice().as_slice());
        assert!(c.set_orientation(&block, 0, Orientation::SimpleCubicLattice).unwrap());

        let changes = c.set_composition_percent(&block, 1, 10.0).unwrap();
        assert!(changes.composition_rows.contains(&(block.clone(), 0)));
        let rows = c.compartment(&block).unwrap().rows();
        assert_eq!(rows[0].orientation.selected, Orientation::Random);
        assert!(!rows[0].orientation.options.contains(&Orientation::SimpleCubicLattice));
        assert_eq!(rows[1].orientation.selected, Orientation::Random);
    }
}

#[cfg(test)]
mod persistence {
    use super::fixtures::{container, job};
    use crate::compartment_container::CompartmentContainer;
    use crate::composition::orientation::{self, Orientation};
    use crate::config::{self, CompartmentConfig};

    fn populated() -> CompartmentContainer {
        let mut c = container();
        let s = c.add_compartment_sphere("core").unwrap();
        c.set_composition_percent(&s, 0, 30.0).unwrap();
        c.set_surface_percent(&s, 0, 20.0).unwrap();
        let l = c.add_compartment_xy_layer("membrane").unwrap();
        c.set_composition_percent(&l, 1, 80.0).unwrap();
        c.move_xy_layer_to_bottom(&l).unwrap();
        c
    }

    #[test]
    fn broken_percent_sums_still_load() {
        let c = populated();
        assert!((0..c.bulk().len()).all(|row| !c.warn_on_broken_percent_sum(row)));
        let mut items = c.to_value_items();
        items.get_mut(config::COMPARTMENT_BULK_NAME).unwrap().rows_mut().unwrap()[0][2] = "12.5".into();
        let back = CompartmentContainer::from_value_items(&items, CompartmentConfig::default()).unwrap();
        assert_eq!(back.bulk()[0].percent, 12.5);
        assert!(back.warn_on_broken_percent_sum(0));
        assert!(!back.warn_on_broken_percent_sum(1));
    }

    #[test]
    fn xml_round_trip_restores_container() {
        let c = populated();
        let xml = c.to_xml_string().unwrap();
        let back = CompartmentContainer::try_from_xml_str(&xml, CompartmentConfig::default()).unwrap();
        assert_eq!(back.to_value_items(), c.to_value_items());
        assert_eq!(back.compartments(), c.compartments());
        assert_eq!(back.bulk(), c.bulk());
        assert_eq!(back.length_conversion_factor(), c.length_conversion_factor());
        assert_eq!(back.compartment("Block03Sphere0000001").unwrap().specified_name(), "core");
    }

    #[test]
    fn broken_xml_yields_none() {
        assert!(CompartmentContainer::from_xml_str("<nope/>", CompartmentConfig::default()).is_none());
        let xml = populated().to_xml_string().unwrap().replace("Block03Sphere0000001", "Block03SphereX");
        assert!(CompartmentContainer::from_xml_str(&xml, CompartmentConfig::default()).is_none());
    }

    #[test]
    fn legacy_records_are_upgraded() {
        let c = populated();
        let mut items = c.to_value_items();
        items.remove(config::COMPARTMENT_GEOMETRY_RANDOM_SEED_NAME);
        let display = "GEOMETRY_COMPARTMENT_SPHERE_DISPLAY_1";
        items.get_mut(display).unwrap().rows_mut().unwrap()[0].truncate(4);
        let composition = "CHEMICAL_COMPOSITION_COMPARTMENT_SPHERE_1";
        for row in items.get_mut(composition).unwrap().rows_mut().unwrap() {
            row.truncate(8);
        }

        let back = CompartmentContainer::from_value_items(&items, CompartmentConfig::default()).unwrap();
        assert_eq!(back.geometry_random_seed(), config::DETERMINISTIC_RANDOM_SEED_DEFAULT);
        let upgraded = back.to_value_items();
        assert_eq!(upgraded.require(display).unwrap().rows().unwrap()[0].len(), 8);
        let rows = back.compartment("Block03Sphere0000001").unwrap().rows();
        assert_eq!(rows[0].orientation.selected, Orientation::WholeSphereSurface);
        assert_eq!(rows[0].orientation.options.as_slice(), orientation::sphere_surfaces().as_slice());
        assert!(rows[1].orientation.is_none());
    }

    #[test]
    fn rows_are_matched_by_molecule_name() {
        let c = populated();
        let mut items = c.to_value_items();
        items.get_mut(config::COMPARTMENT_BULK_NAME).unwrap().rows_mut().unwrap().reverse();
        let back = CompartmentContainer::from_value_items(&items, CompartmentConfig::default()).unwrap();
        assert_eq!(back.bulk(), c.bulk());

        items.get_mut(config::COMPARTMENT_BULK_NAME).unwrap().rows_mut().unwrap().pop();
        assert!(CompartmentContainer::from_value_items(&items, CompartmentConfig::default()).is_err());
    }

    #[test]
    fn modified_container_replays_compositions() {
        let c = populated().clone();
        let larger = job(20.0);
        let modified = c.get_modified_compartment_container(larger).unwrap();
        assert_eq!(modified.geometry_random_seed(), c.geometry_random_seed());
        assert_eq!(modified.block_names(), c.block_names());
        for (old, new) in c.compartments().iter().zip(modified.compartments()) {
            assert_eq!(old.specified_name(), new.specified_name());
            for (a, b) in old.rows().iter().zip(new.rows()) {
                assert_eq!(a.percent, b.percent);
                assert_eq!(a.quantity, b.quantity);
                assert_eq!(a.surface_percent, b.surface_percent);
                assert_eq!(a.orientation, b.orientation);
            }
        }
        assert_eq!(modified.bulk()[0].percent, 70.0);
        assert!(modified.is_xy_layer_near_bottom("Block04XyLayer0000001"));
        assert!(!modified.has_error());
    }

    #[test]
    fn modified_container_needs_same_molecules() {
        let c = populated();
        let mut other = job(10.0);
        other.molecules.pop();
        assert!(c.get_modified_compartment_container(other).is_none());
        assert!(container().get_modified_compartment_container(job(12.0)).is_none());
    }
}

#[cfg(test)]
mod positions {
    use super::fixtures::container;
    use crate::body::BodyGeometry;
    use crate::composition::Orientation;
    use crate::error::CompartmentError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn sphere_rows_fill_volume_then_surface() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut c = container();
        let block = c.add_compartment_sphere("vesicle").unwrap();
        c.set_composition_percent(&block, 0, 30.0).unwrap();
        c.set_surface_percent(&block, 0, 50.0).unwrap();
        assert!(c.set_orientation(&block, 0, Orientation::UpperSphereSurface).unwrap());

        let positions = c.molecule_positions(&block, 0, &mut rng).unwrap();
        assert_eq!(positions.len(), 300);
        let BodyGeometry::Sphere(s) = c.compartment(&block).unwrap().geometry().clone() else {
            panic!("sphere expected");
        };
        let (volume, surface) = positions.split_at(150);
        assert!(volume.iter().all(|p| s.is_in_volume(p)));
        let r = s.radius * crate::config::DECREASE_FACTOR;
        for p in surface {
            assert!((p.distance(&s.center) - r).abs() < 1e-9);
            assert!((p.z - s.center.z).abs() >= 0.5 * r - 1e-12);
        }
        // the empty row has nothing to place
        assert!(c.molecule_positions(&block, 1, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn lattice_rows_fill_the_layer() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut c = container();
        let block = c.add_compartment_xy_layer("crystal").unwrap();
        c.set_composition_percent(&block, 0, 30.0).unwrap();
        assert!(c.set_orientation(&block, 0, Orientation::SimpleCubicLattice).unwrap());

        let positions = c.molecule_positions(&block, 0, &mut rng).unwrap();
        assert_eq!(positions.len(), 300);
        let BodyGeometry::XyLayer(l) = c.compartment(&block).unwrap().geometry().clone() else {
            panic!("layer expected");
        };
        assert!(positions.iter().all(|p| l.is_in_volume(p)));
        // a lattice does not depend on the generator
        let again = c.molecule_positions(&block, 0, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(positions, again);
    }

    #[test]
    fn unknown_rows_and_blocks_are_errors() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut c = container();
        let block = c.add_compartment_sphere("core").unwrap();
        assert!(matches!(
            c.molecule_positions("Block03Sphere0000009", 0, &mut rng),
            Err(CompartmentError::UnknownBlock(_))
        ));
        assert!(matches!(
            c.molecule_positions(&block, 7, &mut rng),
            Err(CompartmentError::RowOutOfRange { row: 7, .. })
        ));
    }
}
