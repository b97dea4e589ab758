//! The unified variable-glyph model
//!
//! A [`VariableGlyph`] is what clients see: local axes, a list of sources
//! each tied to a design-space location, and named layers with the static
//! outline/metric data. Instances are built fresh on every read and are
//! never cached by the backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::path::OutlineData;
use super::transform::DecomposedTransform;
use super::CustomData;
use crate::space::Location;

/// Custom-data key under which the free-text glyph note is exposed
pub const GLYPH_NOTE_KEY: &str = "fontra.glyph.note";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableGlyph {
    pub name: String,
    pub axes: Vec<GlyphAxis>,
    pub sources: Vec<GlyphSource>,
    pub layers: BTreeMap<String, Layer>,
    pub custom_data: CustomData,
}

impl VariableGlyph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Names of every glyph used as a component in any layer.
    pub fn component_names(&self) -> std::collections::BTreeSet<String> {
        self.layers
            .values()
            .flat_map(|layer| layer.glyph.components.iter())
            .map(|component| component.name.clone())
            .collect()
    }

    /// True if any component needs the variable-component storage form.
    pub fn has_variable_components(&self) -> bool {
        self.layers
            .values()
            .flat_map(|layer| layer.glyph.components.iter())
            .any(|component| {
                !component.location.is_empty() || component.transformation.has_center()
            })
    }
}

/// A glyph-scoped axis. May shadow a global axis of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlyphAxis {
    pub name: String,
    pub min_value: f64,
    pub default_value: f64,
    pub max_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlyphSource {
    /// Display name; empty when fully derived from the font source
    pub name: String,
    pub layer_name: String,
    /// Delta added on top of the `location_base` location
    pub location: Location,
    /// Identifier of the font source supplying the base location
    pub location_base: Option<String>,
    pub inactive: bool,
    pub custom_data: CustomData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Layer {
    pub glyph: StaticGlyph,
    pub custom_data: CustomData,
}

impl Layer {
    pub fn new(glyph: StaticGlyph) -> Self {
        Self {
            glyph,
            custom_data: CustomData::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticGlyph {
    pub path: OutlineData,
    pub components: Vec<Component>,
    pub x_advance: Option<f64>,
    pub y_advance: Option<f64>,
    pub vertical_origin: Option<f64>,
    pub anchors: Vec<Anchor>,
    pub guidelines: Vec<Guideline>,
    pub background_image: Option<BackgroundImage>,
}

impl Default for StaticGlyph {
    fn default() -> Self {
        Self {
            path: OutlineData::default(),
            components: Vec::new(),
            x_advance: Some(500.0),
            y_advance: None,
            vertical_origin: None,
            anchors: Vec::new(),
            guidelines: Vec::new(),
            background_image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub transformation: DecomposedTransform,
    #[serde(default)]
    pub location: Location,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transformation: DecomposedTransform::default(),
            location: Location::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Guideline {
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbaColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundImage {
    pub identifier: String,
    #[serde(default)]
    pub transformation: DecomposedTransform,
    #[serde(default = "full_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub color: Option<RgbaColor>,
}

fn full_opacity() -> f64 {
    1.0
}

impl BackgroundImage {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            transformation: DecomposedTransform::default(),
            opacity: 1.0,
            color: None,
        }
    }
}
