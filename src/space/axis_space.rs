//! The global axis space of a designspace document
//!
//! Axis declarations are given in user coordinates; source locations live
//! in design coordinates. Everything stored here (default location, poles)
//! has already been pushed through each axis's user -> design mapping.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use super::location::{make_dense, make_sparse, merge, piecewise_linear_map, split_by_pole};
use super::{Location, LocationKey};
use crate::model::{CrossAxisMapping, FontAxis};

/// Pole values of one axis, in user coordinates: `{min, default, max}` for
/// continuous axes, every declared value for discrete ones.
pub fn unpack_axis(axis: &FontAxis) -> (FontAxis, Vec<f64>) {
    let poles = match axis {
        FontAxis::Continuous(continuous) => vec![
            continuous.min_value,
            continuous.header.default_value,
            continuous.max_value,
        ],
        FontAxis::Discrete(discrete) => discrete.values.clone(),
    };
    (axis.clone(), poles)
}

/// User -> design coordinate for one axis value.
pub fn map_forward(axis: &FontAxis, value: f64) -> f64 {
    piecewise_linear_map(value, axis.mapping())
}

#[derive(Debug, Clone, Default)]
pub struct AxisSpace {
    pub axes: Vec<FontAxis>,
    pub mappings: Vec<CrossAxisMapping>,
    default_location: Location,
    pole_positions: HashMap<String, Vec<f64>>,
}

impl AxisSpace {
    pub fn new(axes: Vec<FontAxis>, mappings: Vec<CrossAxisMapping>) -> Self {
        let mut default_location = Location::new();
        let mut pole_positions = HashMap::new();
        let mut unpacked = Vec::with_capacity(axes.len());

        for declared in &axes {
            let (axis, poles) = unpack_axis(declared);
            let mut mapped: Vec<f64> = poles.iter().map(|p| map_forward(&axis, *p)).collect();
            mapped.sort_by(f64::total_cmp);
            mapped.dedup();
            default_location.insert(
                axis.name().to_string(),
                map_forward(&axis, axis.default_value()),
            );
            pole_positions.insert(axis.name().to_string(), mapped);
            unpacked.push(axis);
        }

        debug!(
            "Axis space: {} axes, default location {:?}",
            unpacked.len(),
            default_location
        );

        Self {
            axes: unpacked,
            mappings,
            default_location,
            pole_positions,
        }
    }

    pub fn default_location(&self) -> &Location {
        &self.default_location
    }

    pub fn pole_positions(&self) -> &HashMap<String, Vec<f64>> {
        &self.pole_positions
    }

    pub fn axis_names(&self) -> BTreeSet<&str> {
        self.default_location.keys().map(String::as_str).collect()
    }

    pub fn has_axis(&self, name: &str) -> bool {
        self.default_location.contains_key(name)
    }

    pub fn to_dense(&self, location: &Location) -> Location {
        make_dense(location, &self.default_location)
    }

    pub fn to_sparse(&self, location: &Location) -> Location {
        make_sparse(location, &self.default_location)
    }

    pub fn key(&self, location: &Location) -> LocationKey {
        LocationKey::new(&self.to_dense(location))
    }

    /// Every pole location of the space, one per pole value per axis, with
    /// all other axes at their default.
    pub fn pole_locations(&self) -> Vec<Location> {
        let mut locations = Vec::new();
        for (name, poles) in &self.pole_positions {
            for pole in poles {
                let mut location = self.default_location.clone();
                location.insert(name.clone(), *pole);
                locations.push(location);
            }
        }
        locations
    }

    /// The part of `location` that selects a global source: font axes not
    /// shadowed by a local axis, filled up with the default location.
    pub fn global_portion(&self, location: &Location, local_axes: &BTreeSet<&str>) -> Location {
        let global: Location = location
            .iter()
            .filter(|(name, _)| self.has_axis(name) && !local_axes.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        merge(&self.default_location, &global)
    }

    /// `(at_pole, not_at_pole)` split of a location.
    pub fn split_by_pole(&self, location: &Location) -> (Location, Location) {
        split_by_pole(location, &self.pole_positions)
    }

    /// A location is sparse when some axis value in it is off every pole.
    pub fn is_sparse_location(&self, location: &Location) -> bool {
        !self.split_by_pole(location).1.is_empty()
    }

    /// The location with every off-pole axis reset to its default.
    pub fn pole_projection(&self, location: &Location) -> Location {
        let (at_pole, _) = self.split_by_pole(location);
        merge(&self.default_location, &at_pole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_axis() -> FontAxis {
        let mut axis = FontAxis::continuous("weight", "wght", 100.0, 400.0, 900.0);
        axis.header_mut().mapping = vec![(100.0, 0.0), (400.0, 100.0), (900.0, 1000.0)];
        axis
    }

    #[test]
    fn default_and_poles_are_mapped() {
        let space = AxisSpace::new(vec![weight_axis()], vec![]);
        assert_eq!(space.default_location().get("weight"), Some(&100.0));
        assert_eq!(space.pole_positions()["weight"], vec![0.0, 100.0, 1000.0]);
    }

    #[test]
    fn discrete_axis_poles_are_its_values() {
        let italic = FontAxis::discrete("italic", "ital", vec![0.0, 1.0], 0.0);
        let (_, poles) = unpack_axis(&italic);
        assert_eq!(poles, vec![0.0, 1.0]);
    }

    #[test]
    fn local_axes_shadow_global_portion() {
        let space = AxisSpace::new(
            vec![
                weight_axis(),
                FontAxis::continuous("width", "wdth", 50.0, 100.0, 100.0),
            ],
            vec![],
        );
        let location = Location::from([
            ("weight".to_string(), 1000.0),
            ("width".to_string(), 75.0),
            ("flair".to_string(), 3.0),
        ]);
        let local = BTreeSet::from(["width"]);
        let global = space.global_portion(&location, &local);
        assert_eq!(
            global,
            Location::from([("weight".to_string(), 1000.0), ("width".to_string(), 100.0)])
        );
    }

    #[test]
    fn off_pole_locations_are_sparse() {
        let space = AxisSpace::new(vec![weight_axis()], vec![]);
        let mid = Location::from([("weight".to_string(), 500.0)]);
        assert!(space.is_sparse_location(&mid));
        assert_eq!(space.pole_projection(&mid), space.default_location().clone());
        assert!(!space.is_sparse_location(&Location::from([("weight".to_string(), 1000.0)])));
    }
}
