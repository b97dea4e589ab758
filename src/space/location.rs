//! Location encodings
//!
//! A location maps axis names to values. It is *dense* when every axis of
//! the space is present and *sparse* when only the axes that differ from a
//! given default are. [`LocationKey`] is the canonical, hashable form used
//! for lookups.

use std::collections::{BTreeMap, HashMap};

pub type Location = BTreeMap<String, f64>;

/// Canonical lookup key for a location: entries sorted by axis name, values
/// compared bitwise (with `-0.0` folded into `0.0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey(Vec<(String, u64)>);

impl LocationKey {
    pub fn new(location: &Location) -> Self {
        LocationKey(
            location
                .iter()
                .map(|(name, value)| {
                    let value = if *value == 0.0 { 0.0 } else { *value };
                    (name.clone(), value.to_bits())
                })
                .collect(),
        )
    }
}

impl From<&Location> for LocationKey {
    fn from(location: &Location) -> Self {
        LocationKey::new(location)
    }
}

/// Fill every axis of `default` that `location` lacks. Axes unknown to
/// `default` are dropped.
pub fn make_dense(location: &Location, default: &Location) -> Location {
    default
        .iter()
        .map(|(name, value)| (name.clone(), *location.get(name).unwrap_or(value)))
        .collect()
}

/// Keep only the axes of `default` whose value in `location` differs.
pub fn make_sparse(location: &Location, default: &Location) -> Location {
    default
        .iter()
        .filter_map(|(name, default_value)| match location.get(name) {
            Some(value) if value != default_value => Some((name.clone(), *value)),
            _ => None,
        })
        .collect()
}

/// Overlay `over` on top of `base`.
pub fn merge(base: &Location, over: &Location) -> Location {
    let mut merged = base.clone();
    merged.extend(over.iter().map(|(name, value)| (name.clone(), *value)));
    merged
}

/// Piecewise-linear map through `(input, output)` pairs; values outside the
/// mapped range are shifted by the nearest segment end.
pub fn piecewise_linear_map(value: f64, mapping: &[(f64, f64)]) -> f64 {
    if mapping.is_empty() {
        return value;
    }
    if let Some((_, output)) = mapping.iter().find(|(input, _)| *input == value) {
        return *output;
    }

    let (min_in, min_out) = mapping
        .iter()
        .copied()
        .fold((f64::INFINITY, 0.0), |acc, pair| if pair.0 < acc.0 { pair } else { acc });
    if value < min_in {
        return value + min_out - min_in;
    }
    let (max_in, max_out) = mapping
        .iter()
        .copied()
        .fold((f64::NEG_INFINITY, 0.0), |acc, pair| if pair.0 > acc.0 { pair } else { acc });
    if value > max_in {
        return value + max_out - max_in;
    }

    let (a, va) = mapping
        .iter()
        .copied()
        .filter(|(input, _)| *input < value)
        .fold((f64::NEG_INFINITY, 0.0), |acc, pair| if pair.0 > acc.0 { pair } else { acc });
    let (b, vb) = mapping
        .iter()
        .copied()
        .filter(|(input, _)| *input > value)
        .fold((f64::INFINITY, 0.0), |acc, pair| if pair.0 < acc.0 { pair } else { acc });
    va + (vb - va) * (value - a) / (b - a)
}

/// Split `location` into the axes sitting on one of their poles and the rest.
pub fn split_by_pole(
    location: &Location,
    poles: &HashMap<String, Vec<f64>>,
) -> (Location, Location) {
    let mut at_pole = Location::new();
    let mut not_at_pole = Location::new();
    for (name, value) in location {
        let on_pole = poles
            .get(name)
            .is_some_and(|values| values.contains(value));
        if on_pole {
            at_pole.insert(name.clone(), *value);
        } else {
            not_at_pole.insert(name.clone(), *value);
        }
    }
    (at_pole, not_at_pole)
}
