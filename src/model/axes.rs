//! Font axes and cross-axis mappings
//!
//! Continuous and discrete axes share name, tag, default, mapping, labels
//! and the hidden flag; only the range representation differs, so the axis
//! is a two-variant enum over one shared header.

use serde::{Deserialize, Serialize};

use crate::space::Location;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FontAxis {
    Continuous(ContinuousAxis),
    Discrete(DiscreteAxis),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisHeader {
    pub name: String,
    pub label: String,
    pub tag: String,
    pub default_value: f64,
    /// Piecewise-linear user -> design mapping as `(input, output)` pairs
    #[serde(default)]
    pub mapping: Vec<(f64, f64)>,
    #[serde(default)]
    pub value_labels: Vec<AxisValueLabel>,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuousAxis {
    #[serde(flatten)]
    pub header: AxisHeader,
    pub min_value: f64,
    pub max_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscreteAxis {
    #[serde(flatten)]
    pub header: AxisHeader,
    pub values: Vec<f64>,
}

impl FontAxis {
    pub fn continuous(
        name: &str,
        tag: &str,
        min_value: f64,
        default_value: f64,
        max_value: f64,
    ) -> Self {
        FontAxis::Continuous(ContinuousAxis {
            header: AxisHeader {
                name: name.to_string(),
                label: name.to_string(),
                tag: tag.to_string(),
                default_value,
                ..Default::default()
            },
            min_value,
            max_value,
        })
    }

    pub fn discrete(name: &str, tag: &str, values: Vec<f64>, default_value: f64) -> Self {
        FontAxis::Discrete(DiscreteAxis {
            header: AxisHeader {
                name: name.to_string(),
                label: name.to_string(),
                tag: tag.to_string(),
                default_value,
                ..Default::default()
            },
            values,
        })
    }

    pub fn header(&self) -> &AxisHeader {
        match self {
            FontAxis::Continuous(axis) => &axis.header,
            FontAxis::Discrete(axis) => &axis.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut AxisHeader {
        match self {
            FontAxis::Continuous(axis) => &mut axis.header,
            FontAxis::Discrete(axis) => &mut axis.header,
        }
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn default_value(&self) -> f64 {
        self.header().default_value
    }

    pub fn mapping(&self) -> &[(f64, f64)] {
        &self.header().mapping
    }

    /// Whether `value` (user space) lies inside the axis range.
    pub fn contains(&self, value: f64) -> bool {
        match self {
            FontAxis::Continuous(axis) => axis.min_value <= value && value <= axis.max_value,
            FontAxis::Discrete(axis) => axis.values.contains(&value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisValueLabel {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub linked_value: Option<f64>,
    #[serde(default)]
    pub elidable: bool,
    #[serde(default)]
    pub older_sibling: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossAxisMapping {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub group_description: Option<String>,
    pub input_location: Location,
    pub output_location: Location,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    pub axes: Vec<FontAxis>,
    pub mappings: Vec<CrossAxisMapping>,
}
