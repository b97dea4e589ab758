//! Font-wide data: family info, sources, kerning, features, images

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::glyph::Guideline;
use super::CustomData;
use crate::space::Location;

/// Family-level naming and licensing metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontInfo {
    pub family_name: Option<String>,
    pub version_major: Option<i64>,
    pub version_minor: Option<i64>,
    pub copyright: Option<String>,
    pub trademark: Option<String>,
    pub description: Option<String>,
    pub sample_text: Option<String>,
    pub designer: Option<String>,
    #[serde(rename = "designerURL")]
    pub designer_url: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(rename = "manufacturerURL")]
    pub manufacturer_url: Option<String>,
    pub license_description: Option<String>,
    #[serde(rename = "licenseInfoURL")]
    pub license_info_url: Option<String>,
    #[serde(rename = "vendorID")]
    pub vendor_id: Option<String>,
    pub custom_data: CustomData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LineMetric {
    pub value: f64,
    #[serde(default)]
    pub zone: f64,
}

impl LineMetric {
    pub fn new(value: f64, zone: f64) -> Self {
        Self { value, zone }
    }
}

/// One point of the global design space as seen by clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontSource {
    pub name: String,
    pub location: Location,
    pub italic_angle: f64,
    pub line_metrics_horizontal_layout: BTreeMap<String, LineMetric>,
    pub line_metrics_vertical_layout: BTreeMap<String, LineMetric>,
    pub guidelines: Vec<Guideline>,
    pub is_sparse: bool,
    pub custom_data: CustomData,
}

/// A kerning table. `values[left][right][i]` belongs to `source_identifiers[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Kerning {
    pub groups_side1: BTreeMap<String, Vec<String>>,
    pub groups_side2: BTreeMap<String, Vec<String>>,
    pub source_identifiers: Vec<String>,
    pub values: BTreeMap<String, BTreeMap<String, Vec<Option<f64>>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenTypeFeatures {
    pub language: String,
    pub text: String,
}

impl OpenTypeFeatures {
    pub fn fea(text: impl Into<String>) -> Self {
        Self {
            language: "fea".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Png,
    Jpeg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub image_type: ImageType,
    pub data: Vec<u8>,
}
